//! SQLite value mapping.
//!
//! SQLite is dynamically typed: a column declared `INTEGER` may hold text,
//! and expressions carry no declared type at all. Values are therefore
//! decoded by the storage class of each individual value rather than by the
//! column's declared type.

use crate::models::Row;
use serde_json::Value as JsonValue;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

/// SQLite storage classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Null,
    Integer,
    Real,
    Text,
    Blob,
}

impl StorageClass {
    /// Map a runtime type name reported by the driver.
    pub fn from_type_name(name: &str) -> Self {
        match name.to_ascii_uppercase().as_str() {
            "NULL" => Self::Null,
            "INTEGER" | "INT" | "INT8" | "BIGINT" | "BOOLEAN" => Self::Integer,
            "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => Self::Real,
            "BLOB" => Self::Blob,
            _ => Self::Text,
        }
    }
}

/// Encode binary data as base64 text.
pub fn encode_blob(bytes: &[u8]) -> JsonValue {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    JsonValue::String(STANDARD.encode(bytes))
}

/// Render a JSON cell value as plain text (CSV fields, sampling).
///
/// NULL becomes `None` so callers can choose their own representation.
pub fn value_to_text(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::Bool(b) => Some(if *b { "1" } else { "0" }.to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

/// Trait for converting database rows to ordered JSON maps.
pub trait RowToJson {
    fn to_json_map(&self) -> Row;
    fn column_names(&self) -> Vec<String>;
}

impl RowToJson for SqliteRow {
    fn to_json_map(&self) -> Row {
        self.columns()
            .iter()
            .enumerate()
            .map(|(idx, col)| (col.name().to_string(), decode_column(self, idx)))
            .collect()
    }

    fn column_names(&self) -> Vec<String> {
        self.columns().iter().map(|c| c.name().to_string()).collect()
    }
}

/// Decode one column by the storage class of its value.
pub fn decode_column(row: &SqliteRow, idx: usize) -> JsonValue {
    let class = match row.try_get_raw(idx) {
        Ok(raw) if raw.is_null() => StorageClass::Null,
        Ok(raw) => StorageClass::from_type_name(raw.type_info().name()),
        Err(_) => return JsonValue::Null,
    };

    match class {
        StorageClass::Null => JsonValue::Null,
        StorageClass::Integer => row
            .try_get::<i64, _>(idx)
            .map(|v| JsonValue::Number(v.into()))
            .unwrap_or(JsonValue::Null),
        StorageClass::Real => row
            .try_get::<f64, _>(idx)
            .map(|v| {
                serde_json::Number::from_f64(v)
                    .map(JsonValue::Number)
                    .unwrap_or_else(|| JsonValue::String(v.to_string()))
            })
            .unwrap_or(JsonValue::Null),
        StorageClass::Text => row
            .try_get::<String, _>(idx)
            .map(JsonValue::String)
            .unwrap_or(JsonValue::Null),
        StorageClass::Blob => row
            .try_get::<Vec<u8>, _>(idx)
            .map(|v| encode_blob(&v))
            .unwrap_or(JsonValue::Null),
    }
}
