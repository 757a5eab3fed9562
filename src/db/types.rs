//! PostgreSQL row to JSON conversion.
//!
//! Type conversion uses a two-phase approach:
//! 1. `TypeCategory` classifies the column's type name
//! 2. a per-category decoder extracts the value
//!
//! Anything that cannot be decoded becomes `null` and is logged at debug
//! level; catalog queries cast exotic types (inet, interval, xid) to text.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde_json::Value as JsonValue;
use sqlx::postgres::PgRow;
use sqlx::postgres::types::{Oid, PgInterval};
use sqlx::{Column, Row, TypeInfo};

pub type JsonRow = serde_json::Map<String, JsonValue>;

// =============================================================================
// Type Classification
// =============================================================================

/// Logical category for column types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    SmallInt,
    Int,
    BigInt,
    Oid,
    Real,
    Double,
    Decimal,
    Boolean,
    Json,
    Uuid,
    TimestampTz,
    Timestamp,
    Date,
    Time,
    Interval,
    Binary,
    Text,
}

/// Classify a PostgreSQL type name (as reported by sqlx) into a category.
pub fn categorize_type(type_name: &str) -> TypeCategory {
    match type_name.to_ascii_uppercase().as_str() {
        "INT2" | "SMALLINT" => TypeCategory::SmallInt,
        "INT4" | "INT" | "INTEGER" => TypeCategory::Int,
        "INT8" | "BIGINT" => TypeCategory::BigInt,
        "OID" => TypeCategory::Oid,
        "FLOAT4" | "REAL" => TypeCategory::Real,
        "FLOAT8" | "DOUBLE PRECISION" => TypeCategory::Double,
        "NUMERIC" | "DECIMAL" => TypeCategory::Decimal,
        "BOOL" | "BOOLEAN" => TypeCategory::Boolean,
        "JSON" | "JSONB" => TypeCategory::Json,
        "UUID" => TypeCategory::Uuid,
        "TIMESTAMPTZ" => TypeCategory::TimestampTz,
        "TIMESTAMP" => TypeCategory::Timestamp,
        "DATE" => TypeCategory::Date,
        "TIME" => TypeCategory::Time,
        "INTERVAL" => TypeCategory::Interval,
        "BYTEA" => TypeCategory::Binary,
        _ => TypeCategory::Text,
    }
}

// =============================================================================
// Binary Encoding
// =============================================================================

/// Encode binary data as base64.
pub fn encode_binary_value(bytes: &[u8]) -> JsonValue {
    JsonValue::String(STANDARD.encode(bytes))
}

/// Render an interval the way `psql` does for the common cases.
pub fn format_interval(interval: &PgInterval) -> String {
    let mut parts = Vec::new();
    if interval.months != 0 {
        let (years, months) = (interval.months / 12, interval.months % 12);
        if years != 0 {
            parts.push(plural(years as i64, "year"));
        }
        if months != 0 {
            parts.push(plural(months as i64, "mon"));
        }
    }
    if interval.days != 0 {
        parts.push(plural(interval.days as i64, "day"));
    }
    let micros = interval.microseconds;
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let micros = micros.unsigned_abs();
        let secs = micros / 1_000_000;
        let frac = micros % 1_000_000;
        let clock = format!("{}{:02}:{:02}:{:02}", sign, secs / 3600, (secs / 60) % 60, secs % 60);
        if frac == 0 {
            parts.push(clock);
        } else {
            parts.push(format!("{clock}.{frac:06}"));
        }
    }
    parts.join(" ")
}

fn plural(n: i64, unit: &str) -> String {
    if n.abs() == 1 {
        format!("{n} {unit}")
    } else {
        format!("{n} {unit}s")
    }
}

// =============================================================================
// Row to JSON Trait
// =============================================================================

/// Trait for converting database rows to JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> JsonRow;
    fn column_names(&self) -> Vec<String>;
}

impl RowToJson for PgRow {
    fn to_json_map(&self) -> JsonRow {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| {
                let type_name = col.type_info().name();
                let value = decode_column(self, idx, type_name, categorize_type(type_name));
                (col.name().to_string(), value)
            })
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns()
            .iter()
            .map(|col| col.name().to_string())
            .collect()
    }
}

// =============================================================================
// Decoders
// =============================================================================

fn decode_column(row: &PgRow, idx: usize, type_name: &str, category: TypeCategory) -> JsonValue {
    let decoded = match category {
        TypeCategory::SmallInt => get::<i16>(row, idx).map(|v| v.map(JsonValue::from)),
        TypeCategory::Int => get::<i32>(row, idx).map(|v| v.map(JsonValue::from)),
        TypeCategory::BigInt => get::<i64>(row, idx).map(|v| v.map(JsonValue::from)),
        TypeCategory::Oid => get::<Oid>(row, idx).map(|v| v.map(|oid| JsonValue::from(oid.0))),
        TypeCategory::Real => get::<f32>(row, idx).map(|v| v.map(|f| float_value(f as f64))),
        TypeCategory::Double => get::<f64>(row, idx).map(|v| v.map(float_value)),
        TypeCategory::Decimal => get::<rust_decimal::Decimal>(row, idx)
            .map(|v| v.map(|d| JsonValue::String(d.to_string()))),
        TypeCategory::Boolean => get::<bool>(row, idx).map(|v| v.map(JsonValue::Bool)),
        TypeCategory::Json => get::<JsonValue>(row, idx),
        TypeCategory::Uuid => get::<sqlx::types::Uuid>(row, idx)
            .map(|v| v.map(|u| JsonValue::String(u.to_string()))),
        TypeCategory::TimestampTz => get::<chrono::DateTime<chrono::Utc>>(row, idx)
            .map(|v| v.map(|t| JsonValue::String(t.to_rfc3339()))),
        TypeCategory::Timestamp => get::<chrono::NaiveDateTime>(row, idx)
            .map(|v| v.map(|t| JsonValue::String(t.to_string()))),
        TypeCategory::Date => get::<chrono::NaiveDate>(row, idx)
            .map(|v| v.map(|d| JsonValue::String(d.to_string()))),
        TypeCategory::Time => get::<chrono::NaiveTime>(row, idx)
            .map(|v| v.map(|t| JsonValue::String(t.to_string()))),
        TypeCategory::Interval => get::<PgInterval>(row, idx)
            .map(|v| v.map(|i| JsonValue::String(format_interval(&i)))),
        TypeCategory::Binary => {
            get::<Vec<u8>>(row, idx).map(|v| v.map(|b| encode_binary_value(&b)))
        }
        TypeCategory::Text => get::<String>(row, idx).map(|v| v.map(JsonValue::String)),
    };

    match decoded {
        Ok(Some(value)) => value,
        Ok(None) => JsonValue::Null,
        Err(e) => {
            tracing::debug!(column = idx, type_name = %type_name, error = %e, "Failed to decode column");
            JsonValue::Null
        }
    }
}

fn get<'r, T>(row: &'r PgRow, idx: usize) -> Result<Option<T>, sqlx::Error>
where
    T: sqlx::Decode<'r, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    row.try_get::<Option<T>, _>(idx)
}

fn float_value(v: f64) -> JsonValue {
    serde_json::Number::from_f64(v)
        .map(JsonValue::Number)
        .unwrap_or_else(|| JsonValue::String(v.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categorize_integers() {
        assert_eq!(categorize_type("INT2"), TypeCategory::SmallInt);
        assert_eq!(categorize_type("INT4"), TypeCategory::Int);
        assert_eq!(categorize_type("int8"), TypeCategory::BigInt);
        assert_eq!(categorize_type("OID"), TypeCategory::Oid);
    }

    #[test]
    fn test_interval_is_not_an_integer() {
        assert_eq!(categorize_type("INTERVAL"), TypeCategory::Interval);
    }

    #[test]
    fn test_categorize_other() {
        assert_eq!(categorize_type("NUMERIC"), TypeCategory::Decimal);
        assert_eq!(categorize_type("JSONB"), TypeCategory::Json);
        assert_eq!(categorize_type("TIMESTAMPTZ"), TypeCategory::TimestampTz);
        assert_eq!(categorize_type("BYTEA"), TypeCategory::Binary);
        assert_eq!(categorize_type("NAME"), TypeCategory::Text);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Text);
    }

    #[test]
    fn test_encode_binary_value() {
        assert_eq!(
            encode_binary_value(b"hello world"),
            JsonValue::String("aGVsbG8gd29ybGQ=".to_string())
        );
        assert_eq!(
            encode_binary_value(&[0xFF, 0xFE, 0x00, 0x01]),
            JsonValue::String("//4AAQ==".to_string())
        );
    }

    #[test]
    fn test_format_interval() {
        let lag = PgInterval {
            months: 0,
            days: 0,
            microseconds: 1_500_000,
        };
        assert_eq!(format_interval(&lag), "00:00:01.500000");

        let long = PgInterval {
            months: 14,
            days: 1,
            microseconds: 3_600_000_000,
        };
        assert_eq!(format_interval(&long), "1 year 2 mons 1 day 01:00:00");

        let zero = PgInterval {
            months: 0,
            days: 0,
            microseconds: 0,
        };
        assert_eq!(format_interval(&zero), "00:00:00");
    }

    #[test]
    fn test_float_value_non_finite() {
        assert_eq!(float_value(f64::NAN), JsonValue::String("NaN".to_string()));
        assert_eq!(float_value(1.5), serde_json::json!(1.5));
    }
}
