//! The streaming catalog: films, the people who appear in them, and episodes.

use super::types::{
    ColumnInfo, ColumnKind, Relation, RelationFilter, RelationPath, ResolvedEntity, ResolvedModel,
};

pub const GENDERS: &[&str] = &[
    "COMEDY",
    "DRAMA",
    "ADVENTURE",
    "ACTION",
    "CRIME",
    "THRILLER",
    "ROMANCE",
    "DOCUMENTARY",
    "ANIMATED",
    "FANTASY",
    "MUSICALS",
    "SCIFI",
    "HORROR",
];

pub const FILM_TYPES: &[&str] = &["MOVIE", "SERIES", "DOCUMENTARY"];

const FILM_PERSON_TABLE: &str = "rel_film__person";

fn film() -> ResolvedEntity {
    ResolvedEntity {
        name: "film".into(),
        table_name: "film".into(),
        path_segment: "films".into(),
        columns: vec![
            ColumnInfo::id(),
            ColumnInfo::new("title", ColumnKind::Text).required().min_length(3),
            ColumnInfo::new("synopsis", ColumnKind::Text),
            ColumnInfo::new("views", ColumnKind::Int).minimum(0),
            ColumnInfo::new("cover", ColumnKind::Blob),
            ColumnInfo::new("cover_content_type", ColumnKind::Text),
            ColumnInfo::new("reviews", ColumnKind::BigInt),
            ColumnInfo::new("gender", ColumnKind::Enum(GENDERS)),
            ColumnInfo::new("film_type", ColumnKind::Enum(FILM_TYPES)),
            ColumnInfo::new("jhi_order", ColumnKind::Int).field("order").minimum(0),
            ColumnInfo::new("url", ColumnKind::Text).required(),
            ColumnInfo::new("publication_date", ColumnKind::Timestamp),
            ColumnInfo::new("inclusion_date", ColumnKind::Timestamp),
        ],
        relations: vec![Relation::ManyToMany {
            field: "people".into(),
            join_table: FILM_PERSON_TABLE.into(),
            own_column: "film_id".into(),
            other_column: "person_id".into(),
            target: "person".into(),
        }],
        relation_filters: vec![
            RelationFilter {
                field: "personId".into(),
                path: RelationPath::JoinTable {
                    join_table: FILM_PERSON_TABLE.into(),
                    own_column: "film_id".into(),
                    other_column: "person_id".into(),
                },
            },
            RelationFilter {
                field: "episodesId".into(),
                path: RelationPath::Reverse {
                    table: "episode".into(),
                    fk_column: "film_id".into(),
                },
            },
        ],
    }
}

fn person() -> ResolvedEntity {
    ResolvedEntity {
        name: "person".into(),
        table_name: "person".into(),
        path_segment: "people".into(),
        columns: vec![
            ColumnInfo::id(),
            ColumnInfo::new("name", ColumnKind::Text).required().min_length(3),
            ColumnInfo::new("cover", ColumnKind::Blob),
            ColumnInfo::new("cover_content_type", ColumnKind::Text),
        ],
        relations: Vec::new(),
        relation_filters: vec![RelationFilter {
            field: "filmId".into(),
            path: RelationPath::JoinTable {
                join_table: FILM_PERSON_TABLE.into(),
                own_column: "person_id".into(),
                other_column: "film_id".into(),
            },
        }],
    }
}

fn episode() -> ResolvedEntity {
    ResolvedEntity {
        name: "episode".into(),
        table_name: "episode".into(),
        path_segment: "episodes".into(),
        columns: vec![
            ColumnInfo::id(),
            ColumnInfo::new("title", ColumnKind::Text).required().min_length(3),
            ColumnInfo::new("synopsis", ColumnKind::Text),
            ColumnInfo::new("jhi_order", ColumnKind::Int).field("order"),
        ],
        relations: vec![Relation::ManyToOne {
            field: "film".into(),
            column: "film_id".into(),
            target: "film".into(),
            summary_fields: vec!["id".into(), "title".into()],
        }],
        relation_filters: vec![RelationFilter {
            field: "filmId".into(),
            path: RelationPath::Column("film_id".into()),
        }],
    }
}

/// Builds the catalog model. Entities are ordered so that referenced tables come first.
pub fn streaming_model() -> ResolvedModel {
    ResolvedModel::new(vec![person(), film(), episode()])
}
