//! Apply the catalog to the database: id sequence, entity tables, join tables, and foreign-key indexes.
//! Entities are created in model order, so referenced tables must come first.

use crate::error::{AppError, ModelError};
use crate::model::{validate_model, ColumnInfo, ColumnKind, Relation, ResolvedModel};
use crate::sql::quoted;
use sqlx::PgPool;

/// Sequence shared by every primary key.
pub const ID_SEQUENCE: &str = "sequence_generator";

fn column_def(col: &ColumnInfo) -> String {
    let name = quoted(&col.name);
    let mut def = format!("{} {}", name, col.kind.pg_type());
    if !col.nullable {
        def.push_str(" NOT NULL");
    }
    if col.primary_key {
        def.push_str(&format!(" DEFAULT nextval('{}')", ID_SEQUENCE));
    }
    if let ColumnKind::Enum(values) = col.kind {
        let list = values
            .iter()
            .map(|v| format!("'{}'", v.replace('\'', "''")))
            .collect::<Vec<_>>()
            .join(", ");
        def.push_str(&format!(" CHECK ({} IN ({}))", name, list));
    }
    def
}

/// Idempotent DDL for the whole model, in execution order.
pub fn migration_statements(model: &ResolvedModel) -> Result<Vec<String>, AppError> {
    let table_of = |target: &str| {
        model
            .entity(target)
            .map(|e| (quoted(&e.table_name), quoted(&e.pk().name)))
            .ok_or_else(|| ModelError::MissingReference {
                kind: "entity",
                id: target.to_string(),
            })
    };

    let mut statements = vec![format!(
        "CREATE SEQUENCE IF NOT EXISTS {} START WITH 1050 INCREMENT BY 50",
        quoted(ID_SEQUENCE)
    )];
    let mut join_tables = Vec::new();
    let mut indexes = Vec::new();

    for entity in &model.entities {
        let table = quoted(&entity.table_name);
        let mut col_defs: Vec<String> = entity.columns.iter().map(column_def).collect();
        for rel in &entity.relations {
            match rel {
                Relation::ManyToOne { column, target, .. } => {
                    let (target_table, target_pk) = table_of(target)?;
                    col_defs.push(format!(
                        "{} bigint REFERENCES {} ({}) ON DELETE NO ACTION",
                        quoted(column),
                        target_table,
                        target_pk
                    ));
                    indexes.push(format!(
                        "CREATE INDEX IF NOT EXISTS {} ON {} ({})",
                        quoted(&format!("idx_{}__{}", entity.table_name, column)),
                        table,
                        quoted(column)
                    ));
                }
                Relation::ManyToMany {
                    join_table,
                    own_column,
                    other_column,
                    target,
                    ..
                } => {
                    let (target_table, target_pk) = table_of(target)?;
                    join_tables.push(format!(
                        "CREATE TABLE IF NOT EXISTS {} (\n  {} bigint NOT NULL REFERENCES {} ({}) ON DELETE CASCADE,\n  \
                         {} bigint NOT NULL REFERENCES {} ({}) ON DELETE CASCADE,\n  PRIMARY KEY ({}, {})\n)",
                        quoted(join_table),
                        quoted(own_column),
                        table,
                        quoted(&entity.pk().name),
                        quoted(other_column),
                        target_table,
                        target_pk,
                        quoted(own_column),
                        quoted(other_column)
                    ));
                }
            }
        }
        col_defs.push(format!("PRIMARY KEY ({})", quoted(&entity.pk().name)));
        statements.push(format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n)",
            table,
            col_defs.join(",\n  ")
        ));
    }
    statements.extend(join_tables);
    statements.extend(indexes);
    Ok(statements)
}

/// Validates the model, then creates whatever part of the schema is missing.
pub async fn apply_migrations(pool: &PgPool, model: &ResolvedModel) -> Result<(), AppError> {
    validate_model(model)?;
    let statements = migration_statements(model)?;
    for sql in &statements {
        tracing::debug!(sql = %sql, "migration");
        sqlx::query(sql).execute(pool).await?;
    }
    tracing::info!(statements = statements.len(), "schema up to date");
    Ok(())
}
