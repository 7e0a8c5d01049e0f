//! Generic CRUD execution against PostgreSQL.
//!
//! Rows travel as JSON objects keyed by field name. Columns are decoded by
//! their catalog kind; relations are attached after the main query in batches.

use crate::error::{AppError, FieldError, ModelError};
use crate::model::{ColumnInfo, ColumnKind, Relation, ResolvedEntity, ResolvedModel};
use crate::query::{Criteria, PageRequest};
use crate::service::validation::ref_id;
use crate::sql::{self, BindValue, ColumnValue, QueryBuf, TIMESTAMP_FORMAT};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgArguments, PgRow};
use sqlx::query::Query;
use sqlx::{PgConnection, PgPool, Postgres, Row};
use std::collections::HashMap;

pub struct CrudService;

/// Join-table rows to replace for one many-to-many relation.
struct LinkWrite<'a> {
    join_table: &'a str,
    own_column: &'a str,
    other_column: &'a str,
    ids: Vec<i64>,
}

struct Writes<'a> {
    columns: Vec<ColumnValue<'a>>,
    links: Vec<LinkWrite<'a>>,
}

impl CrudService {
    /// Insert one row and its relation links in a transaction. Returns the stored row.
    pub async fn create(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        body: &Map<String, Value>,
    ) -> Result<Value, AppError> {
        let writes = collect_writes(entity, body, false)?;
        let mut tx = pool.begin().await?;
        let q = sql::insert(entity, &writes.columns);
        let row = bind(&q).fetch_one(&mut *tx).await?;
        let id: i64 = row.try_get(0)?;
        for link in &writes.links {
            replace_links(&mut tx, id, link).await?;
        }
        tx.commit().await?;
        tracing::debug!(entity = %entity.name, id, "created");
        Self::find_one(pool, model, entity, id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("{} {}", entity.name, id)))
    }

    /// Full replace: absent or null columns become NULL, relation sets are replaced.
    /// Returns `None` when the row does not exist.
    pub async fn update(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let writes = collect_writes(entity, body, false)?;
        Self::apply(pool, model, entity, id, writes).await
    }

    /// Applies only non-null fields; relation sets are replaced only when present.
    pub async fn partial_update(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: i64,
        body: &Map<String, Value>,
    ) -> Result<Option<Value>, AppError> {
        let writes = collect_writes(entity, body, true)?;
        Self::apply(pool, model, entity, id, writes).await
    }

    async fn apply(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: i64,
        writes: Writes<'_>,
    ) -> Result<Option<Value>, AppError> {
        let mut tx = pool.begin().await?;
        let q = sql::update(entity, id, &writes.columns);
        if bind(&q).fetch_optional(&mut *tx).await?.is_none() {
            return Ok(None);
        }
        for link in &writes.links {
            replace_links(&mut tx, id, link).await?;
        }
        tx.commit().await?;
        tracing::debug!(entity = %entity.name, id, "updated");
        Self::find_one(pool, model, entity, id).await
    }

    /// Fetch one row by id with every relation loaded.
    pub async fn find_one(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        id: i64,
    ) -> Result<Option<Value>, AppError> {
        let q = sql::select_by_id(entity, id);
        let Some(row) = bind(&q).fetch_optional(pool).await? else {
            return Ok(None);
        };
        let mut rows = vec![decode_row(entity, &row)?];
        attach_relations(pool, model, entity, &mut rows, true).await?;
        Ok(rows.pop().map(Value::Object))
    }

    /// One page of rows matching the criteria, plus the total match count.
    /// Many-to-many relations are loaded only when `eager`; many-to-one summaries always.
    pub async fn find_by_criteria(
        pool: &PgPool,
        model: &ResolvedModel,
        entity: &ResolvedEntity,
        criteria: &Criteria,
        page: &PageRequest,
        eager: bool,
    ) -> Result<(Vec<Value>, u64), AppError> {
        let total = Self::count_by_criteria(pool, entity, criteria).await?;
        let q = sql::select_page(entity, criteria, page);
        let mut rows = bind(&q)
            .fetch_all(pool)
            .await?
            .iter()
            .map(|r| decode_row(entity, r))
            .collect::<Result<Vec<_>, _>>()?;
        attach_relations(pool, model, entity, &mut rows, eager).await?;
        Ok((rows.into_iter().map(Value::Object).collect(), total))
    }

    pub async fn count_by_criteria(pool: &PgPool, entity: &ResolvedEntity, criteria: &Criteria) -> Result<u64, AppError> {
        let q = sql::count(entity, criteria);
        let n: i64 = bind(&q).fetch_one(pool).await?.try_get(0)?;
        Ok(n.max(0) as u64)
    }

    pub async fn exists(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<bool, AppError> {
        let q = sql::exists(entity, id);
        Ok(bind(&q).fetch_one(pool).await?.try_get(0)?)
    }

    /// Delete one row by id. Returns whether a row was removed.
    pub async fn delete(pool: &PgPool, entity: &ResolvedEntity, id: i64) -> Result<bool, AppError> {
        let q = sql::delete(entity, id);
        let deleted = bind(&q).fetch_optional(pool).await?.is_some();
        tracing::debug!(entity = %entity.name, id, deleted, "delete");
        Ok(deleted)
    }
}

fn bind(q: &QueryBuf) -> Query<'_, Postgres, PgArguments> {
    tracing::debug!(sql = %q.sql, params = ?q.params, "query");
    let mut query = sqlx::query(&q.sql);
    for p in &q.params {
        query = query.bind(p.clone());
    }
    query
}

async fn replace_links(conn: &mut PgConnection, id: i64, link: &LinkWrite<'_>) -> Result<(), AppError> {
    let q = sql::delete_links(link.join_table, link.own_column, id);
    bind(&q).execute(&mut *conn).await?;
    if !link.ids.is_empty() {
        let q = sql::insert_links(link.join_table, link.own_column, link.other_column, id, &link.ids);
        bind(&q).execute(&mut *conn).await?;
    }
    Ok(())
}

fn mismatch(entity: &ResolvedEntity, field: &str, message: &str) -> AppError {
    AppError::Validation {
        entity: entity.name.clone(),
        errors: vec![FieldError {
            object_name: entity.name.clone(),
            field: field.to_string(),
            message: message.to_string(),
        }],
    }
}

/// Column and link writes for a body. With `partial`, absent and null fields are skipped;
/// otherwise they clear the column (or the relation set).
fn collect_writes<'a>(entity: &'a ResolvedEntity, body: &Map<String, Value>, partial: bool) -> Result<Writes<'a>, AppError> {
    let mut columns = Vec::new();
    let mut links = Vec::new();
    for col in entity.columns.iter().filter(|c| !c.primary_key) {
        match body.get(&col.field).filter(|v| !v.is_null()) {
            Some(v) => {
                let value = BindValue::from_json(col.kind, v).map_err(|_| mismatch(entity, &col.field, "TypeMismatch"))?;
                columns.push((col.name.as_str(), col.kind, value));
            }
            None if partial => {}
            None => columns.push((col.name.as_str(), col.kind, BindValue::Null)),
        }
    }
    for rel in &entity.relations {
        let value = body.get(rel.field()).filter(|v| !v.is_null());
        match rel {
            Relation::ManyToOne { field, column, .. } => match value {
                Some(v) => {
                    let id = ref_id(v).ok_or_else(|| mismatch(entity, field, "TypeMismatch"))?;
                    columns.push((column.as_str(), ColumnKind::BigInt, BindValue::I64(id)));
                }
                None if partial => {}
                None => columns.push((column.as_str(), ColumnKind::BigInt, BindValue::Null)),
            },
            Relation::ManyToMany {
                field,
                join_table,
                own_column,
                other_column,
                ..
            } => {
                let ids = match value {
                    Some(Value::Array(items)) => {
                        let mut ids: Vec<i64> = Vec::with_capacity(items.len());
                        for item in items {
                            let id = ref_id(item).ok_or_else(|| mismatch(entity, field, "TypeMismatch"))?;
                            if !ids.contains(&id) {
                                ids.push(id);
                            }
                        }
                        ids
                    }
                    Some(_) => return Err(mismatch(entity, field, "TypeMismatch")),
                    None if partial => continue,
                    None => Vec::new(),
                };
                links.push(LinkWrite {
                    join_table: join_table.as_str(),
                    own_column: own_column.as_str(),
                    other_column: other_column.as_str(),
                    ids,
                });
            }
        }
    }
    Ok(Writes { columns, links })
}

fn decode_column(row: &PgRow, col: &ColumnInfo) -> Result<Value, AppError> {
    let name = col.name.as_str();
    Ok(match col.kind {
        ColumnKind::BigInt => row.try_get::<Option<i64>, _>(name)?.map(Value::from),
        ColumnKind::Int => row.try_get::<Option<i32>, _>(name)?.map(Value::from),
        ColumnKind::Text | ColumnKind::Enum(_) => row.try_get::<Option<String>, _>(name)?.map(Value::from),
        ColumnKind::Blob => row
            .try_get::<Option<Vec<u8>>, _>(name)?
            .map(|b| Value::String(STANDARD.encode(b))),
        ColumnKind::Timestamp => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(name)?
            .map(|t| Value::String(t.format(TIMESTAMP_FORMAT).to_string())),
    }
    .unwrap_or(Value::Null))
}

/// Own columns by field name; many-to-one fields hold the raw key until relations are attached.
fn decode_row(entity: &ResolvedEntity, row: &PgRow) -> Result<Map<String, Value>, AppError> {
    let mut map = Map::new();
    for col in &entity.columns {
        map.insert(col.field.clone(), decode_column(row, col)?);
    }
    for rel in &entity.relations {
        if let Relation::ManyToOne { field, column, .. } = rel {
            let key: Option<i64> = row.try_get(column.as_str())?;
            map.insert(field.clone(), key.map(Value::from).unwrap_or(Value::Null));
        }
    }
    Ok(map)
}

async fn attach_relations(
    pool: &PgPool,
    model: &ResolvedModel,
    entity: &ResolvedEntity,
    rows: &mut [Map<String, Value>],
    eager_many: bool,
) -> Result<(), AppError> {
    if rows.is_empty() {
        return Ok(());
    }
    let pk = &entity.pk().field;
    let ids: Vec<i64> = rows.iter().filter_map(|r| r.get(pk).and_then(Value::as_i64)).collect();
    for rel in &entity.relations {
        match rel {
            Relation::ManyToMany {
                field,
                join_table,
                own_column,
                other_column,
                ..
            } => {
                if !eager_many {
                    continue;
                }
                let q = sql::select_links(join_table, own_column, other_column, &ids);
                let mut by_owner: HashMap<i64, Vec<Value>> = HashMap::new();
                for link in bind(&q).fetch_all(pool).await? {
                    let owner: i64 = link.try_get("owner")?;
                    let related: i64 = link.try_get("related")?;
                    by_owner.entry(owner).or_default().push(json!({ "id": related }));
                }
                for row in rows.iter_mut() {
                    let linked = row
                        .get(pk)
                        .and_then(Value::as_i64)
                        .and_then(|id| by_owner.remove(&id))
                        .unwrap_or_default();
                    row.insert(field.clone(), Value::Array(linked));
                }
            }
            Relation::ManyToOne {
                field,
                target,
                summary_fields,
                ..
            } => {
                let target = model.entity(target).ok_or_else(|| ModelError::MissingReference {
                    kind: "entity",
                    id: target.clone(),
                })?;
                let columns = summary_fields
                    .iter()
                    .map(|f| {
                        target.column_by_field(f).ok_or_else(|| ModelError::MissingReference {
                            kind: "field",
                            id: f.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                let mut keys: Vec<i64> = rows.iter().filter_map(|r| r.get(field).and_then(Value::as_i64)).collect();
                keys.sort_unstable();
                keys.dedup();
                let q = sql::select_summaries(target, &columns, &keys);
                let target_pk = &target.pk().field;
                let mut summaries: HashMap<i64, Value> = HashMap::new();
                for r in bind(&q).fetch_all(pool).await? {
                    let mut summary = Map::new();
                    for col in &columns {
                        summary.insert(col.field.clone(), decode_column(&r, col)?);
                    }
                    if let Some(id) = summary.get(target_pk).and_then(Value::as_i64) {
                        summaries.insert(id, Value::Object(summary));
                    }
                }
                for row in rows.iter_mut() {
                    if let Some(key) = row.get(field).and_then(Value::as_i64) {
                        let summary = summaries.get(&key).cloned().unwrap_or_else(|| json!({ "id": key }));
                        row.insert(field.clone(), summary);
                    }
                }
            }
        }
    }
    Ok(())
}
