//! Request body validation from the column rules of an entity.

use crate::error::{AppError, FieldError};
use crate::model::{ColumnInfo, ColumnKind, Relation, ResolvedEntity};
use crate::sql::parse_timestamp;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{Map, Value};

pub struct RequestValidator;

impl RequestValidator {
    /// Validate a POST/PUT body: NOT NULL columns must be present and non-null.
    pub fn validate(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<(), AppError> {
        Self::run(entity, body, false)
    }

    /// Validate only the fields present in a PATCH body. Nulls mean "leave unchanged".
    pub fn validate_partial(entity: &ResolvedEntity, body: &Map<String, Value>) -> Result<(), AppError> {
        Self::run(entity, body, true)
    }

    fn run(entity: &ResolvedEntity, body: &Map<String, Value>, partial: bool) -> Result<(), AppError> {
        let mut errors = Vec::new();
        let mut reject = |field: &str, message: &str| {
            errors.push(FieldError {
                object_name: entity.name.clone(),
                field: field.to_string(),
                message: message.to_string(),
            })
        };
        for col in entity.columns.iter().filter(|c| !c.primary_key) {
            match body.get(&col.field) {
                None | Some(Value::Null) => {
                    if !partial && !col.nullable {
                        reject(&col.field, "NotNull");
                    }
                }
                Some(v) => {
                    if let Err(message) = validate_field(col, v) {
                        reject(&col.field, message);
                    }
                }
            }
        }
        for rel in &entity.relations {
            let Some(v) = body.get(rel.field()).filter(|v| !v.is_null()) else {
                continue;
            };
            let ok = match rel {
                Relation::ManyToMany { .. } => v.as_array().is_some_and(|items| items.iter().all(|i| ref_id(i).is_some())),
                Relation::ManyToOne { .. } => ref_id(v).is_some(),
            };
            if !ok {
                reject(rel.field(), "TypeMismatch");
            }
        }
        if errors.is_empty() {
            Ok(())
        } else {
            tracing::debug!(entity = %entity.name, errors = errors.len(), "request rejected by validation");
            Err(AppError::Validation {
                entity: entity.name.clone(),
                errors,
            })
        }
    }
}

/// Id of a `{ "id": n }` reference object.
pub fn ref_id(v: &Value) -> Option<i64> {
    v.as_object()?.get("id")?.as_i64()
}

fn validate_field(col: &ColumnInfo, v: &Value) -> Result<(), &'static str> {
    match col.kind {
        ColumnKind::BigInt => {
            v.as_i64().ok_or("TypeMismatch")?;
        }
        ColumnKind::Int => {
            let n = v.as_i64().ok_or("TypeMismatch")?;
            if i32::try_from(n).is_err() {
                return Err("TypeMismatch");
            }
        }
        ColumnKind::Text => {
            let s = v.as_str().ok_or("TypeMismatch")?;
            if let Some(min) = col.rules.min_length {
                if s.chars().count() < min as usize {
                    return Err("Size");
                }
            }
        }
        ColumnKind::Enum(values) => {
            let s = v.as_str().ok_or("TypeMismatch")?;
            if !values.contains(&s) {
                return Err("TypeMismatch");
            }
        }
        ColumnKind::Blob => {
            let s = v.as_str().ok_or("TypeMismatch")?;
            if STANDARD.decode(s).is_err() {
                return Err("Base64");
            }
        }
        ColumnKind::Timestamp => {
            let s = v.as_str().ok_or("TypeMismatch")?;
            if parse_timestamp(s).is_none() {
                return Err("TypeMismatch");
            }
        }
    }
    if let (Some(min), Some(n)) = (col.rules.minimum, v.as_i64()) {
        if n < min {
            return Err("Min");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::streaming_model;
    use serde_json::json;

    fn errors_of(result: Result<(), AppError>) -> Vec<(String, String)> {
        match result {
            Err(AppError::Validation { errors, .. }) => errors.into_iter().map(|e| (e.field, e.message)).collect(),
            Err(other) => panic!("unexpected error {other:?}"),
            Ok(()) => Vec::new(),
        }
    }

    #[test]
    fn full_validation_collects_every_error() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let body = json!({ "title": "ab", "views": -1, "gender": "WESTERN", "cover": "%%%" });
        let errors = errors_of(RequestValidator::validate(film, body.as_object().unwrap()));
        assert_eq!(
            errors,
            vec![
                ("title".to_string(), "Size".to_string()),
                ("views".to_string(), "Min".to_string()),
                ("cover".to_string(), "Base64".to_string()),
                ("gender".to_string(), "TypeMismatch".to_string()),
                ("url".to_string(), "NotNull".to_string()),
            ]
        );
    }

    #[test]
    fn partial_validation_ignores_missing_and_null() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let body = json!({ "title": null, "views": 10 });
        assert!(RequestValidator::validate_partial(film, body.as_object().unwrap()).is_ok());
        let body = json!({ "order": -2 });
        assert_eq!(
            errors_of(RequestValidator::validate_partial(film, body.as_object().unwrap())),
            vec![("order".to_string(), "Min".to_string())]
        );
    }

    #[test]
    fn relation_shapes_are_checked() {
        let model = streaming_model();
        let episode = model.entity_by_path("episodes").unwrap();
        let body = json!({ "title": "Pilot", "film": { "id": "x" } });
        assert_eq!(
            errors_of(RequestValidator::validate(episode, body.as_object().unwrap())),
            vec![("film".to_string(), "TypeMismatch".to_string())]
        );
        let film = model.entity_by_path("films").unwrap();
        let body = json!({ "title": "Heat", "url": "http://x", "people": [{ "id": 1 }, { "id": 2 }] });
        assert!(RequestValidator::validate(film, body.as_object().unwrap()).is_ok());
    }

    #[test]
    fn int_range_is_enforced() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let body = json!({ "views": 3_000_000_000i64 });
        assert_eq!(
            errors_of(RequestValidator::validate_partial(film, body.as_object().unwrap())),
            vec![("views".to_string(), "TypeMismatch".to_string())]
        );
    }
}
