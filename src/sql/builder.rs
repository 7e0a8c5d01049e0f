//! Builds parameterized statements from resolved entities.
//!
//! Identifiers come only from the catalog and are always quoted; values are
//! always bind parameters with a `::type` cast taken from the column kind.

use crate::model::{ColumnInfo, ColumnKind, Relation, RelationPath, ResolvedEntity};
use crate::query::{Criteria, Filter, FilterOp, FilterTarget, PageRequest};
use crate::sql::BindValue;
use serde_json::Value;

/// Quote identifier for PostgreSQL (safe: only from the catalog).
pub fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

#[derive(Debug, Default)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<BindValue>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf::default()
    }

    /// Pushes a parameter and returns its cast placeholder, e.g. `$3::bigint`.
    fn push_param(&mut self, v: BindValue, kind: ColumnKind) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), kind.pg_type())
    }

    fn push_id(&mut self, id: i64) -> String {
        self.push_param(BindValue::I64(id), ColumnKind::BigInt)
    }

    fn push_id_list(&mut self, ids: &[i64]) -> String {
        ids.iter().map(|id| self.push_id(*id)).collect::<Vec<_>>().join(", ")
    }
}

/// Columns read back for an entity: its own columns plus many-to-one keys.
pub fn select_column_list(entity: &ResolvedEntity) -> String {
    entity
        .columns
        .iter()
        .map(|c| quoted(&c.name))
        .chain(entity.relations.iter().filter_map(|r| match r {
            Relation::ManyToOne { column, .. } => Some(quoted(column)),
            Relation::ManyToMany { .. } => None,
        }))
        .collect::<Vec<_>>()
        .join(", ")
}

fn pk(entity: &ResolvedEntity) -> String {
    quoted(&entity.pk().name)
}

fn where_clause(q: &mut QueryBuf, entity: &ResolvedEntity, criteria: &Criteria) -> String {
    let parts: Vec<String> = criteria.filters.iter().map(|f| filter_sql(q, entity, f)).collect();
    if parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", parts.join(" AND "))
    }
}

fn filter_sql(q: &mut QueryBuf, entity: &ResolvedEntity, f: &Filter) -> String {
    match &f.target {
        FilterTarget::Column { name, kind } => condition(q, &quoted(name), *kind, f),
        FilterTarget::Relation(path) => {
            let (select_col, table, cond_col) = match path {
                RelationPath::JoinTable {
                    join_table,
                    own_column,
                    other_column,
                } => (own_column.as_str(), join_table.as_str(), other_column.as_str()),
                RelationPath::Reverse { table, fk_column } => (fk_column.as_str(), table.as_str(), "id"),
                RelationPath::Column(col) => {
                    return condition(q, &quoted(col), ColumnKind::BigInt, f);
                }
            };
            let sub = format!("SELECT {} FROM {}", quoted(select_col), quoted(table));
            if f.op == FilterOp::Specified {
                let not = if f.values.first() == Some(&Value::Bool(true)) { "" } else { "NOT " };
                return format!(
                    "{} {}IN ({} WHERE {} IS NOT NULL)",
                    pk(entity),
                    not,
                    sub,
                    quoted(select_col)
                );
            }
            let cond = condition(q, &quoted(cond_col), ColumnKind::BigInt, f);
            format!("{} IN ({} WHERE {})", pk(entity), sub, cond)
        }
    }
}

fn condition(q: &mut QueryBuf, col: &str, kind: ColumnKind, f: &Filter) -> String {
    let cmp = |q: &mut QueryBuf, op: &str| {
        let ph = q.push_param(BindValue::from_plain(&f.values[0]), kind);
        format!("{} {} {}", col, op, ph)
    };
    match f.op {
        FilterOp::Equals => cmp(q, "="),
        FilterOp::NotEquals => cmp(q, "<>"),
        FilterOp::GreaterThan => cmp(q, ">"),
        FilterOp::LessThan => cmp(q, "<"),
        FilterOp::GreaterThanOrEqual => cmp(q, ">="),
        FilterOp::LessThanOrEqual => cmp(q, "<="),
        FilterOp::In | FilterOp::NotIn => {
            let list = f
                .values
                .iter()
                .map(|v| q.push_param(BindValue::from_plain(v), kind))
                .collect::<Vec<_>>()
                .join(", ");
            let not = if f.op == FilterOp::NotIn { "NOT " } else { "" };
            format!("{} {}IN ({})", col, not, list)
        }
        FilterOp::Specified => {
            if f.values.first() == Some(&Value::Bool(true)) {
                format!("{} IS NOT NULL", col)
            } else {
                format!("{} IS NULL", col)
            }
        }
        FilterOp::Contains | FilterOp::DoesNotContain => {
            let raw = f.values[0].as_str().unwrap_or_default();
            let pattern = format!("%{}%", escape_like(raw));
            let ph = q.push_param(BindValue::Text(pattern), ColumnKind::Text);
            let not = if f.op == FilterOp::DoesNotContain { "NOT " } else { "" };
            format!("UPPER({}) {}LIKE UPPER({})", col, not, ph)
        }
    }
}

fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Paged SELECT with criteria, ORDER BY from the page request.
pub fn select_page(entity: &ResolvedEntity, criteria: &Criteria, page: &PageRequest) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, criteria);
    let order = page
        .sort
        .iter()
        .map(|s| format!("{} {}", quoted(&s.column), s.direction.sql()))
        .collect::<Vec<_>>()
        .join(", ");
    let order_sql = if order.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order)
    };
    q.sql = format!(
        "SELECT {} FROM {}{}{} LIMIT {} OFFSET {}",
        select_column_list(entity),
        quoted(&entity.table_name),
        where_sql,
        order_sql,
        page.size,
        page.offset()
    );
    q
}

pub fn count(entity: &ResolvedEntity, criteria: &Criteria) -> QueryBuf {
    let mut q = QueryBuf::new();
    let where_sql = where_clause(&mut q, entity, criteria);
    q.sql = format!("SELECT COUNT(*) FROM {}{}", quoted(&entity.table_name), where_sql);
    q
}

pub fn select_by_id(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_id(id);
    q.sql = format!(
        "SELECT {} FROM {} WHERE {} = {}",
        select_column_list(entity),
        quoted(&entity.table_name),
        pk(entity),
        ph
    );
    q
}

pub fn exists(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_id(id);
    q.sql = format!(
        "SELECT EXISTS (SELECT 1 FROM {} WHERE {} = {})",
        quoted(&entity.table_name),
        pk(entity),
        ph
    );
    q
}

/// A column write: database column, its kind and the value.
pub type ColumnValue<'a> = (&'a str, ColumnKind, BindValue);

/// INSERT of the given columns; the primary key comes from its default. Returns the new id.
pub fn insert(entity: &ResolvedEntity, values: &[ColumnValue<'_>]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&entity.table_name);
    if values.is_empty() {
        q.sql = format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, pk(entity));
        return q;
    }
    let mut cols = Vec::with_capacity(values.len());
    let mut placeholders = Vec::with_capacity(values.len());
    for (name, kind, v) in values {
        cols.push(quoted(name));
        placeholders.push(q.push_param(v.clone(), *kind));
    }
    q.sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
        table,
        cols.join(", "),
        placeholders.join(", "),
        pk(entity)
    );
    q
}

/// UPDATE of the given columns by id, returning the id when the row exists.
/// With nothing to set, degrades to an existence probe with the same result shape.
pub fn update(entity: &ResolvedEntity, id: i64, values: &[ColumnValue<'_>]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let table = quoted(&entity.table_name);
    if values.is_empty() {
        let ph = q.push_id(id);
        q.sql = format!("SELECT {} FROM {} WHERE {} = {}", pk(entity), table, pk(entity), ph);
        return q;
    }
    let sets = values
        .iter()
        .map(|(name, kind, v)| format!("{} = {}", quoted(name), q.push_param(v.clone(), *kind)))
        .collect::<Vec<_>>()
        .join(", ");
    let ph = q.push_id(id);
    q.sql = format!(
        "UPDATE {} SET {} WHERE {} = {} RETURNING {}",
        table,
        sets,
        pk(entity),
        ph,
        pk(entity)
    );
    q
}

pub fn delete(entity: &ResolvedEntity, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_id(id);
    q.sql = format!(
        "DELETE FROM {} WHERE {} = {} RETURNING {}",
        quoted(&entity.table_name),
        pk(entity),
        ph,
        pk(entity)
    );
    q
}

/// Removes every join-table row owned by `id`.
pub fn delete_links(join_table: &str, own_column: &str, id: i64) -> QueryBuf {
    let mut q = QueryBuf::new();
    let ph = q.push_id(id);
    q.sql = format!("DELETE FROM {} WHERE {} = {}", quoted(join_table), quoted(own_column), ph);
    q
}

/// Inserts one join-table row per related id. `others` must be non-empty.
pub fn insert_links(join_table: &str, own_column: &str, other_column: &str, id: i64, others: &[i64]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let rows = others
        .iter()
        .map(|other| {
            let a = q.push_id(id);
            let b = q.push_id(*other);
            format!("({}, {})", a, b)
        })
        .collect::<Vec<_>>()
        .join(", ");
    q.sql = format!(
        "INSERT INTO {} ({}, {}) VALUES {}",
        quoted(join_table),
        quoted(own_column),
        quoted(other_column),
        rows
    );
    q
}

/// `(owner, related)` id pairs for a batch of owners, ordered by related id.
pub fn select_links(join_table: &str, own_column: &str, other_column: &str, ids: &[i64]) -> QueryBuf {
    let mut q = QueryBuf::new();
    if ids.is_empty() {
        q.sql = format!(
            "SELECT {} AS owner, {} AS related FROM {} WHERE 1 = 0",
            quoted(own_column),
            quoted(other_column),
            quoted(join_table)
        );
        return q;
    }
    let list = q.push_id_list(ids);
    q.sql = format!(
        "SELECT {} AS owner, {} AS related FROM {} WHERE {} IN ({}) ORDER BY {}",
        quoted(own_column),
        quoted(other_column),
        quoted(join_table),
        quoted(own_column),
        list,
        quoted(other_column)
    );
    q
}

/// Summary columns of `target` rows for a batch of ids.
pub fn select_summaries(target: &ResolvedEntity, columns: &[&ColumnInfo], ids: &[i64]) -> QueryBuf {
    let mut q = QueryBuf::new();
    let cols = columns.iter().map(|c| quoted(&c.name)).collect::<Vec<_>>().join(", ");
    let table = quoted(&target.table_name);
    if ids.is_empty() {
        q.sql = format!("SELECT {} FROM {} WHERE 1 = 0", cols, table);
        return q;
    }
    let list = q.push_id_list(ids);
    q.sql = format!("SELECT {} FROM {} WHERE {} IN ({})", cols, table, pk(target), list);
    q
}
