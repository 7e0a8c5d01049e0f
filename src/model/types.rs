//! Resolved entity model: catalog descriptors flattened for runtime use.

use crate::case::to_camel_case;
use std::collections::HashMap;

/// Storage kind of a column. Drives DDL, parameter casts, row decoding and filter operators.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColumnKind {
    BigInt,
    Int,
    Text,
    /// Binary payload, exchanged as base64 in JSON and stored as bytea.
    Blob,
    /// Text column restricted to the listed values.
    Enum(&'static [&'static str]),
    Timestamp,
}

impl ColumnKind {
    /// PostgreSQL type used for DDL and parameter casts.
    pub fn pg_type(&self) -> &'static str {
        match self {
            ColumnKind::BigInt => "bigint",
            ColumnKind::Int => "integer",
            ColumnKind::Text | ColumnKind::Enum(_) => "text",
            ColumnKind::Blob => "bytea",
            ColumnKind::Timestamp => "timestamp",
        }
    }

    pub fn is_filterable(&self) -> bool {
        !matches!(self, ColumnKind::Blob | ColumnKind::Timestamp)
    }

    pub fn is_sortable(&self) -> bool {
        !matches!(self, ColumnKind::Blob)
    }
}

/// Per-column request rules, checked by `RequestValidator`.
#[derive(Clone, Debug, Default)]
pub struct ValidationRule {
    pub min_length: Option<u32>,
    pub minimum: Option<i64>,
}

#[derive(Clone, Debug)]
pub struct ColumnInfo {
    /// Database column name.
    pub name: String,
    /// JSON field name.
    pub field: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub primary_key: bool,
    pub rules: ValidationRule,
}

impl ColumnInfo {
    /// Nullable column whose JSON name is the camelCase form of `name`.
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        ColumnInfo {
            name: name.to_string(),
            field: to_camel_case(name),
            kind,
            nullable: true,
            primary_key: false,
            rules: ValidationRule::default(),
        }
    }

    pub fn id() -> Self {
        ColumnInfo {
            nullable: false,
            primary_key: true,
            ..ColumnInfo::new("id", ColumnKind::BigInt)
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn field(mut self, field: &str) -> Self {
        self.field = field.to_string();
        self
    }

    pub fn min_length(mut self, n: u32) -> Self {
        self.rules.min_length = Some(n);
        self
    }

    pub fn minimum(mut self, n: i64) -> Self {
        self.rules.minimum = Some(n);
        self
    }
}

/// Association exposed as a JSON field on the owning entity.
#[derive(Clone, Debug)]
pub enum Relation {
    /// Ids kept in a join table; JSON is an array of `{ "id": n }`.
    ManyToMany {
        field: String,
        join_table: String,
        /// Join-table column pointing at this entity.
        own_column: String,
        /// Join-table column pointing at the target.
        other_column: String,
        target: String,
    },
    /// Foreign key column on this entity; JSON is an object with the target's summary fields.
    ManyToOne {
        field: String,
        column: String,
        target: String,
        summary_fields: Vec<String>,
    },
}

impl Relation {
    pub fn field(&self) -> &str {
        match self {
            Relation::ManyToMany { field, .. } | Relation::ManyToOne { field, .. } => field,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Relation::ManyToMany { target, .. } | Relation::ManyToOne { target, .. } => target,
        }
    }
}

/// How an id-based criteria filter (e.g. `personId.equals`) reaches the related rows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RelationPath {
    /// `SELECT <own_column> FROM <join_table> WHERE <other_column> ...`
    JoinTable {
        join_table: String,
        own_column: String,
        other_column: String,
    },
    /// `SELECT <fk_column> FROM <table> WHERE id ...`: the other table points at us.
    Reverse { table: String, fk_column: String },
    /// Our own foreign key column.
    Column(String),
}

#[derive(Clone, Debug)]
pub struct RelationFilter {
    /// Criteria field name, e.g. `personId`.
    pub field: String,
    pub path: RelationPath,
}

#[derive(Clone, Debug)]
pub struct ResolvedEntity {
    /// Singular entity name used in alerts and problem bodies (`film`).
    pub name: String,
    pub table_name: String,
    /// URL segment under `/api` (`films`).
    pub path_segment: String,
    pub columns: Vec<ColumnInfo>,
    pub relations: Vec<Relation>,
    pub relation_filters: Vec<RelationFilter>,
}

impl ResolvedEntity {
    pub fn pk(&self) -> &ColumnInfo {
        self.columns
            .iter()
            .find(|c| c.primary_key)
            .unwrap_or(&self.columns[0])
    }

    pub fn column_by_field(&self, field: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.field == field)
    }

    pub fn relation_by_field(&self, field: &str) -> Option<&Relation> {
        self.relations.iter().find(|r| r.field() == field)
    }

    pub fn relation_filter(&self, field: &str) -> Option<&RelationFilter> {
        self.relation_filters.iter().find(|f| f.field == field)
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedModel {
    pub entities: Vec<ResolvedEntity>,
    pub entity_by_path: HashMap<String, usize>,
    pub entity_by_name: HashMap<String, usize>,
}

impl ResolvedModel {
    pub fn new(entities: Vec<ResolvedEntity>) -> Self {
        let entity_by_path = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.path_segment.clone(), i))
            .collect();
        let entity_by_name = entities
            .iter()
            .enumerate()
            .map(|(i, e)| (e.name.clone(), i))
            .collect();
        ResolvedModel {
            entities,
            entity_by_path,
            entity_by_name,
        }
    }

    pub fn entity_by_path(&self, path: &str) -> Option<&ResolvedEntity> {
        self.entity_by_path.get(path).map(|&i| &self.entities[i])
    }

    pub fn entity(&self, name: &str) -> Option<&ResolvedEntity> {
        self.entity_by_name.get(name).map(|&i| &self.entities[i])
    }
}
