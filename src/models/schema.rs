//! Schema-related data models.
//!
//! These types describe catalog objects (tables, columns, indexes,
//! triggers, views) as reported by SQLite's `sqlite_master` table and
//! introspection pragmas.

use super::Row;
use schemars::JsonSchema;
use serde::Serialize;

/// Column definition in a table schema.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ColumnDefinition {
    /// Ordinal position (0-based) in the table declaration
    pub cid: i64,
    pub name: String,
    /// Declared type as written in CREATE TABLE (may be empty)
    pub data_type: String,
    pub nullable: bool,
    /// Default value expression as written in CREATE TABLE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,
    pub is_primary_key: bool,
    /// 1-based position within a composite primary key
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_key_position: Option<i64>,
}

impl ColumnDefinition {
    pub fn new(cid: i64, name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            cid,
            name: name.into(),
            data_type: data_type.into(),
            nullable: true,
            default_value: None,
            is_primary_key: false,
            primary_key_position: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_default(mut self, default: Option<String>) -> Self {
        self.default_value = default;
        self
    }

    /// Mark as part of the primary key; `position` is SQLite's 1-based pk index.
    pub fn with_primary_key(mut self, position: i64) -> Self {
        if position > 0 {
            self.is_primary_key = true;
            self.primary_key_position = Some(position);
        }
        self
    }
}

/// Index information.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct IndexInfo {
    pub name: String,
    /// Table the index belongs to
    pub table: String,
    pub is_unique: bool,
    /// How the index was created: "c" (CREATE INDEX), "u" (UNIQUE constraint), "pk" (PRIMARY KEY)
    pub origin: String,
    /// True for partial indexes (CREATE INDEX ... WHERE)
    pub is_partial: bool,
    /// Indexed columns in key order; expressions appear as "<expr>"
    pub columns: Vec<String>,
    /// CREATE INDEX statement; absent for automatic indexes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Foreign key constraint.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ForeignKey {
    /// Local columns
    pub columns: Vec<String>,
    pub referenced_table: String,
    /// Referenced columns; empty when the parent's primary key is implied
    pub referenced_columns: Vec<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// When a trigger fires relative to its event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
pub enum TriggerTiming {
    #[serde(rename = "BEFORE")]
    Before,
    #[serde(rename = "AFTER")]
    After,
    #[serde(rename = "INSTEAD OF")]
    InsteadOf,
}

/// Statement type that fires a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerEvent {
    Insert,
    Update,
    Delete,
}

/// Trigger information.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct TriggerInfo {
    pub name: String,
    /// Table or view the trigger is attached to
    pub table: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timing: Option<TriggerTiming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<TriggerEvent>,
    /// CREATE TRIGGER statement
    pub sql: Option<String>,
}

/// View information.
#[derive(Debug, Clone, PartialEq, Serialize, JsonSchema)]
pub struct ViewInfo {
    pub name: String,
    /// CREATE VIEW statement
    pub sql: Option<String>,
    /// Result column names
    pub columns: Vec<String>,
}

/// Complete schema of one table.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnDefinition>,
    pub primary_key: Vec<String>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexInfo>,
    pub row_count: i64,
    /// First few rows, in engine order
    pub sample_rows: Vec<Row>,
}

/// Per-table overview used by database statistics and schema summaries.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSummary {
    pub name: String,
    pub row_count: i64,
    pub column_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub primary_key: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub foreign_keys: Vec<ForeignKey>,
}

/// Number of objects of each kind in the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, JsonSchema)]
pub struct CatalogCounts {
    pub tables: i64,
    pub views: i64,
    pub indexes: i64,
    pub triggers: i64,
}
