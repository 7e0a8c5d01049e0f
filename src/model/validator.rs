//! Model validation: referential integrity between entities, relations and paths.

use crate::error::ModelError;
use crate::model::{Relation, ResolvedModel};
use std::collections::HashSet;

pub fn validate_model(model: &ResolvedModel) -> Result<(), ModelError> {
    let mut path_segments = HashSet::new();
    for entity in &model.entities {
        let pks = entity.columns.iter().filter(|c| c.primary_key).count();
        if pks != 1 {
            return Err(ModelError::InvalidPrimaryKey {
                entity: entity.name.clone(),
                count: pks,
            });
        }
        if !path_segments.insert(entity.path_segment.as_str()) {
            return Err(ModelError::DuplicatePathSegment(entity.path_segment.clone()));
        }

        let mut fields = HashSet::new();
        let names = entity
            .columns
            .iter()
            .map(|c| c.field.as_str())
            .chain(entity.relations.iter().map(Relation::field));
        for field in names {
            if !fields.insert(field) {
                return Err(ModelError::DuplicateField {
                    entity: entity.name.clone(),
                    field: field.to_string(),
                });
            }
        }

        for rel in &entity.relations {
            let target = model.entity(rel.target()).ok_or_else(|| ModelError::MissingReference {
                kind: "entity",
                id: rel.target().to_string(),
            })?;
            if let Relation::ManyToOne { summary_fields, .. } = rel {
                for f in summary_fields {
                    if target.column_by_field(f).is_none() {
                        return Err(ModelError::MissingReference {
                            kind: "summary field",
                            id: format!("{}.{}", target.name, f),
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::streaming_model;

    #[test]
    fn catalog_is_consistent() {
        validate_model(&streaming_model()).unwrap();
    }

    #[test]
    fn duplicate_path_segment_is_rejected() {
        let mut entities = streaming_model().entities;
        entities[1].path_segment = "people".into();
        let model = ResolvedModel::new(entities);
        assert!(matches!(
            validate_model(&model),
            Err(ModelError::DuplicatePathSegment(p)) if p == "people"
        ));
    }

    #[test]
    fn dangling_relation_target_is_rejected() {
        let mut entities = streaming_model().entities;
        entities.retain(|e| e.name != "person");
        let model = ResolvedModel::new(entities);
        assert!(matches!(
            validate_model(&model),
            Err(ModelError::MissingReference { kind: "entity", .. })
        ));
    }
}
