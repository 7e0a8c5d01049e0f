//! Typed bind parameters for PostgreSQL, converted from JSON by column kind.

use crate::model::ColumnKind;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, NaiveDateTime};
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::{Database, Type};
use std::fmt;

/// Wire format of timestamp columns in JSON.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

/// A value bound to a PostgreSQL query. Placeholders carry a `::type` cast,
/// so each variant only needs a wire type the cast accepts.
#[derive(Clone, PartialEq)]
pub enum BindValue {
    Null,
    I64(i64),
    Text(String),
    Bytes(Vec<u8>),
}

// Blobs are logged by size only.
impl fmt::Debug for BindValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindValue::Null => f.write_str("Null"),
            BindValue::I64(n) => write!(f, "I64({})", n),
            BindValue::Text(s) => write!(f, "Text({:?})", s),
            BindValue::Bytes(b) => write!(f, "Bytes({} bytes)", b.len()),
        }
    }
}

impl BindValue {
    /// Converts a request value for a column of `kind`. Callers validate first;
    /// an `Err` carries a short reason for the field error.
    pub fn from_json(kind: ColumnKind, v: &Value) -> Result<Self, String> {
        if v.is_null() {
            return Ok(BindValue::Null);
        }
        match kind {
            ColumnKind::BigInt | ColumnKind::Int => v.as_i64().map(BindValue::I64).ok_or_else(|| "expected an integer".into()),
            ColumnKind::Text | ColumnKind::Enum(_) => v
                .as_str()
                .map(|s| BindValue::Text(s.to_string()))
                .ok_or_else(|| "expected a string".into()),
            ColumnKind::Blob => {
                let s = v.as_str().ok_or("expected a base64 string")?;
                STANDARD.decode(s).map(BindValue::Bytes).map_err(|e| e.to_string())
            }
            ColumnKind::Timestamp => {
                let s = v.as_str().ok_or("expected a timestamp string")?;
                parse_timestamp(s)
                    .map(|t| BindValue::Text(t.format(TIMESTAMP_FORMAT).to_string()))
                    .ok_or_else(|| format!("'{}' is not a timestamp", s))
            }
        }
    }

    /// Converts an already-typed criteria value (integer or string).
    pub fn from_plain(v: &Value) -> Self {
        match v {
            Value::Number(n) => n.as_i64().map(BindValue::I64).unwrap_or(BindValue::Null),
            Value::String(s) => BindValue::Text(s.clone()),
            Value::Null => BindValue::Null,
            other => BindValue::Text(other.to_string()),
        }
    }
}

/// Accepts RFC 3339 (offset dropped after conversion to UTC) or a naive
/// `YYYY-MM-DDTHH:MM:SS[.fff]` / `YYYY-MM-DD HH:MM:SS` timestamp.
pub fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(s, f).ok())
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        match self {
            BindValue::Null => Ok(IsNull::Yes),
            BindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf),
            BindValue::Text(s) => <String as Encode<Postgres>>::encode_by_ref(s, buf),
            BindValue::Bytes(b) => <Vec<u8> as Encode<Postgres>>::encode_by_ref(b, buf),
        }
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            BindValue::I64(_) => <i64 as Type<Postgres>>::type_info(),
            BindValue::Bytes(_) => <Vec<u8> as Type<Postgres>>::type_info(),
            BindValue::Null | BindValue::Text(_) => <String as Type<Postgres>>::type_info(),
        })
    }
}

impl Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        <String as Type<Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_by_kind() {
        assert_eq!(BindValue::from_json(ColumnKind::Int, &json!(12)).unwrap(), BindValue::I64(12));
        assert_eq!(
            BindValue::from_json(ColumnKind::Blob, &json!("aGVsbG8=")).unwrap(),
            BindValue::Bytes(b"hello".to_vec())
        );
        assert_eq!(BindValue::from_json(ColumnKind::Text, &Value::Null).unwrap(), BindValue::Null);
        assert!(BindValue::from_json(ColumnKind::BigInt, &json!("12")).is_err());
        assert!(BindValue::from_json(ColumnKind::Blob, &json!("not base64!")).is_err());
    }

    #[test]
    fn timestamps_are_normalized() {
        assert_eq!(
            BindValue::from_json(ColumnKind::Timestamp, &json!("2024-03-01T10:15:00Z")).unwrap(),
            BindValue::Text("2024-03-01T10:15:00".into())
        );
        assert!(parse_timestamp("2024-03-01 10:15:00").is_some());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn fractional_seconds_survive_both_directions() {
        let written = BindValue::from_json(ColumnKind::Timestamp, &json!("2020-01-02T03:04:05.123")).unwrap();
        assert_eq!(written, BindValue::Text("2020-01-02T03:04:05.123".into()));
        let stored = parse_timestamp("2020-01-02T03:04:05.123").unwrap();
        assert_eq!(stored.format(TIMESTAMP_FORMAT).to_string(), "2020-01-02T03:04:05.123");
        let whole = parse_timestamp("2020-01-02T03:04:05").unwrap();
        assert_eq!(whole.format(TIMESTAMP_FORMAT).to_string(), "2020-01-02T03:04:05");
    }
}
