//! Query-related data models.
//!
//! This module defines parameter values accepted by `execute_sql` and the
//! row/result shapes produced by statement execution.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

/// One result row: column name to value, in result-column order.
pub type Row = serde_json::Map<String, JsonValue>;

/// A parameter value for parameterized statements.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    #[default]
    Null,
    /// Boolean value (stored by SQLite as 0/1)
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Array or object, bound as its JSON text
    Json(JsonValue),
}

impl QueryParam {
    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }
}

impl From<JsonValue> for QueryParam {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or_default()),
            },
            JsonValue::String(s) => Self::String(s),
            other => Self::Json(other),
        }
    }
}

/// Statement parameters: a list for positional placeholders or an
/// object for named ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum QueryParams {
    /// Values for `?` / `?NNN` placeholders, in order
    Positional(Vec<QueryParam>),
    /// Values for `:name` / `@name` / `$name` placeholders
    Named(BTreeMap<String, QueryParam>),
}

impl QueryParams {
    pub fn len(&self) -> usize {
        match self {
            Self::Positional(v) => v.len(),
            Self::Named(m) => m.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of executing one SQL request.
#[derive(Debug, Clone)]
pub enum StatementOutcome {
    /// A data-returning statement.
    Rows { columns: Vec<String>, rows: Vec<Row> },
    /// A mutating statement (DML, DDL, transaction control).
    Changes {
        rows_affected: u64,
        last_insert_rowid: Option<i64>,
    },
}
