//! Import/export data models.

use super::QueryParam;
use schemars::JsonSchema;
use serde::Serialize;

/// A data file decoded into named fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedRecords {
    /// Field names in first-seen order
    pub fields: Vec<String>,
    /// One entry per record: (field, value) pairs present in that record
    pub records: Vec<Vec<(String, QueryParam)>>,
}

/// Serialized table contents ready to be written.
#[derive(Debug, Clone)]
pub struct ExportData {
    pub columns: Vec<String>,
    pub row_count: usize,
    pub content: Vec<u8>,
}

/// Outcome of an import.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImportSummary {
    /// Table the rows were inserted into
    pub table: String,
    pub rows_imported: u64,
    /// File fields that matched table columns and were inserted
    pub columns: Vec<String>,
    /// File fields ignored because the table has no such column
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_fields: Vec<String>,
    /// True when the table was created by this import
    pub table_created: bool,
}
