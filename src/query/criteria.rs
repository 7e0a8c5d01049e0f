//! Criteria filters parsed from `<field>.<operator>=value` query parameters.
//!
//! Every filter must match (conjunction). `in` / `notIn` take values from
//! repeated keys and from comma-separated lists alike.

use crate::error::AppError;
use crate::model::{ColumnKind, RelationPath, ResolvedEntity};
use crate::query::RESERVED_KEYS;
use serde_json::Value;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Equals,
    NotEquals,
    In,
    NotIn,
    Specified,
    Contains,
    DoesNotContain,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
}

impl FilterOp {
    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "equals" => FilterOp::Equals,
            "notEquals" => FilterOp::NotEquals,
            "in" => FilterOp::In,
            "notIn" => FilterOp::NotIn,
            "specified" => FilterOp::Specified,
            "contains" => FilterOp::Contains,
            "doesNotContain" => FilterOp::DoesNotContain,
            "greaterThan" => FilterOp::GreaterThan,
            "lessThan" => FilterOp::LessThan,
            "greaterThanOrEqual" => FilterOp::GreaterThanOrEqual,
            "lessThanOrEqual" => FilterOp::LessThanOrEqual,
            _ => return None,
        })
    }

    fn is_common(&self) -> bool {
        matches!(
            self,
            FilterOp::Equals | FilterOp::NotEquals | FilterOp::In | FilterOp::NotIn | FilterOp::Specified
        )
    }

    fn is_range(&self) -> bool {
        matches!(
            self,
            FilterOp::GreaterThan | FilterOp::LessThan | FilterOp::GreaterThanOrEqual | FilterOp::LessThanOrEqual
        )
    }

    fn is_string(&self) -> bool {
        matches!(self, FilterOp::Contains | FilterOp::DoesNotContain)
    }

    fn allowed_for(&self, kind: ColumnKind) -> bool {
        match kind {
            ColumnKind::Text => self.is_common() || self.is_string(),
            ColumnKind::BigInt | ColumnKind::Int => self.is_common() || self.is_range(),
            ColumnKind::Enum(_) => self.is_common(),
            ColumnKind::Blob | ColumnKind::Timestamp => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FilterTarget {
    Column { name: String, kind: ColumnKind },
    Relation(RelationPath),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Filter {
    pub target: FilterTarget,
    pub op: FilterOp,
    /// Typed values; a single `Bool` for `specified`.
    pub values: Vec<Value>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Criteria {
    pub filters: Vec<Filter>,
}

impl Criteria {
    pub fn parse(entity: &ResolvedEntity, pairs: &[(String, String)]) -> Result<Self, AppError> {
        let mut filters: Vec<Filter> = Vec::new();
        for (key, raw) in pairs {
            if RESERVED_KEYS.contains(&key.as_str()) {
                continue;
            }
            let Some((field, op_str)) = key.rsplit_once('.') else {
                continue;
            };
            let op = FilterOp::parse(op_str)
                .ok_or_else(|| AppError::BadRequest(format!("unknown filter operator '{}' in '{}'", op_str, key)))?;

            let (target, kind) = if let Some(col) = entity.column_by_field(field) {
                (
                    FilterTarget::Column {
                        name: col.name.clone(),
                        kind: col.kind,
                    },
                    col.kind,
                )
            } else if let Some(rf) = entity.relation_filter(field) {
                let target = match &rf.path {
                    RelationPath::Column(name) => FilterTarget::Column {
                        name: name.clone(),
                        kind: ColumnKind::BigInt,
                    },
                    other => FilterTarget::Relation(other.clone()),
                };
                if !op.is_common() {
                    return Err(AppError::BadRequest(format!("operator '{}' not supported on '{}'", op_str, field)));
                }
                (target, ColumnKind::BigInt)
            } else {
                return Err(AppError::BadRequest(format!("unknown filter field '{}'", field)));
            };
            if !op.allowed_for(kind) {
                return Err(AppError::BadRequest(format!("operator '{}' not supported on '{}'", op_str, field)));
            }

            let values = match op {
                FilterOp::Specified => vec![Value::Bool(parse_bool(raw).ok_or_else(|| {
                    AppError::BadRequest(format!("'{}' expects true or false", key))
                })?)],
                FilterOp::In | FilterOp::NotIn => {
                    let values = raw
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(|s| typed_value(kind, s, key))
                        .collect::<Result<Vec<_>, _>>()?;
                    // repeated keys extend the list of an earlier filter on the same field
                    if let Some(existing) = filters.iter_mut().find(|f| f.op == op && f.target == target) {
                        existing.values.extend(values);
                        continue;
                    }
                    values
                }
                _ => vec![typed_value(kind, raw, key)?],
            };
            filters.push(Filter { target, op, values });
        }
        if let Some(f) = filters
            .iter()
            .find(|f| matches!(f.op, FilterOp::In | FilterOp::NotIn) && f.values.is_empty())
        {
            return Err(AppError::BadRequest(format!("empty value list for {:?} filter", f.op)));
        }
        Ok(Criteria { filters })
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" => Some(true),
        "false" => Some(false),
        _ => None,
    }
}

fn typed_value(kind: ColumnKind, s: &str, key: &str) -> Result<Value, AppError> {
    match kind {
        ColumnKind::BigInt => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| AppError::BadRequest(format!("'{}' expects an integer, got '{}'", key, s))),
        ColumnKind::Int => s
            .trim()
            .parse::<i32>()
            .map(Value::from)
            .map_err(|_| AppError::BadRequest(format!("'{}' expects an integer, got '{}'", key, s))),
        ColumnKind::Enum(values) => {
            if values.contains(&s) {
                Ok(Value::String(s.to_string()))
            } else {
                Err(AppError::BadRequest(format!("'{}' is not a valid value for '{}'", s, key)))
            }
        }
        _ => Ok(Value::String(s.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::streaming_model;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn string_and_range_filters_are_typed() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let c = Criteria::parse(
            film,
            &pairs(&[("title.contains", "matrix"), ("views.greaterThan", "10"), ("page", "2")]),
        )
        .unwrap();
        assert_eq!(c.filters.len(), 2);
        assert_eq!(c.filters[0].op, FilterOp::Contains);
        assert_eq!(c.filters[0].values, vec![Value::from("matrix")]);
        assert_eq!(c.filters[1].values, vec![Value::from(10)]);
    }

    #[test]
    fn in_filter_merges_repeated_keys_and_comma_lists() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let c = Criteria::parse(
            film,
            &pairs(&[("gender.in", "COMEDY,DRAMA"), ("gender.in", "HORROR")]),
        )
        .unwrap();
        assert_eq!(c.filters.len(), 1);
        assert_eq!(c.filters[0].values.len(), 3);
    }

    #[test]
    fn relation_filter_resolves_path() {
        let model = streaming_model();
        let episode = model.entity_by_path("episodes").unwrap();
        let c = Criteria::parse(episode, &pairs(&[("filmId.equals", "7")])).unwrap();
        assert_eq!(
            c.filters[0].target,
            FilterTarget::Column {
                name: "film_id".into(),
                kind: ColumnKind::BigInt
            }
        );

        let film = model.entity_by_path("films").unwrap();
        let c = Criteria::parse(film, &pairs(&[("personId.specified", "false")])).unwrap();
        assert!(matches!(c.filters[0].target, FilterTarget::Relation(RelationPath::JoinTable { .. })));
        assert_eq!(c.filters[0].values, vec![Value::Bool(false)]);
    }

    #[test]
    fn negated_and_range_operators_parse() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let c = Criteria::parse(
            film,
            &pairs(&[
                ("title.notEquals", "Alien"),
                ("gender.notIn", "HORROR, DRAMA"),
                ("title.doesNotContain", "god"),
                ("views.lessThan", "100"),
                ("views.greaterThanOrEqual", "5"),
                ("reviews.lessThanOrEqual", "9000000000"),
                ("distinct", "true"),
            ]),
        )
        .unwrap();
        let ops: Vec<FilterOp> = c.filters.iter().map(|f| f.op).collect();
        assert_eq!(
            ops,
            vec![
                FilterOp::NotEquals,
                FilterOp::NotIn,
                FilterOp::DoesNotContain,
                FilterOp::LessThan,
                FilterOp::GreaterThanOrEqual,
                FilterOp::LessThanOrEqual,
            ]
        );
        assert_eq!(c.filters[1].values, vec![Value::from("HORROR"), Value::from("DRAMA")]);
        assert_eq!(c.filters[3].values, vec![Value::from(100)]);
        assert_eq!(c.filters[5].values, vec![Value::from(9_000_000_000i64)]);
    }

    #[test]
    fn relation_filters_accept_negations() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let c = Criteria::parse(film, &pairs(&[("personId.notIn", "1,2"), ("personId.notIn", "3")])).unwrap();
        assert_eq!(c.filters.len(), 1);
        assert_eq!(c.filters[0].op, FilterOp::NotIn);
        assert_eq!(c.filters[0].values, vec![Value::from(1), Value::from(2), Value::from(3)]);

        let episode = model.entity_by_path("episodes").unwrap();
        let c = Criteria::parse(episode, &pairs(&[("filmId.notEquals", "7")])).unwrap();
        assert_eq!(c.filters[0].op, FilterOp::NotEquals);
        assert_eq!(c.filters[0].values, vec![Value::from(7)]);

        assert!(Criteria::parse(episode, &pairs(&[("filmId.lessThan", "7")])).is_err());
    }

    #[test]
    fn invalid_filters_are_rejected() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        for bad in [
            ("title.greaterThan", "a"),
            ("views.contains", "1"),
            ("gender.equals", "WESTERN"),
            ("views.equals", "many"),
            ("nope.equals", "1"),
            ("title.startsWith", "x"),
            ("cover.specified", "true"),
            ("personId.contains", "1"),
        ] {
            assert!(Criteria::parse(film, &pairs(&[bad])).is_err(), "{:?} should be rejected", bad);
        }
    }

    #[test]
    fn bare_keys_are_ignored() {
        let model = streaming_model();
        let film = model.entity_by_path("films").unwrap();
        let c = Criteria::parse(film, &pairs(&[("cacheBuster", "123"), ("eagerload", "true")])).unwrap();
        assert!(c.is_empty());
    }
}
