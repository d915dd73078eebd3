//! Maintenance result models.

use super::{CatalogCounts, TableSummary};
use schemars::JsonSchema;
use serde::Serialize;

/// Storage-level statistics read from pragmas.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct StorageStats {
    pub page_size: i64,
    pub page_count: i64,
    pub freelist_count: i64,
    pub journal_mode: String,
    pub sqlite_version: String,
}

/// A newly created database file.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CreatedDatabase {
    pub path: String,
    pub sqlite_version: String,
    pub size_bytes: u64,
}

/// A completed backup.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BackupReport {
    pub source_path: String,
    pub backup_path: String,
    pub source_size_bytes: u64,
    pub backup_size_bytes: u64,
    /// True when an existing file at the backup path was replaced
    pub overwritten: bool,
}

/// Aggregate statistics for a database file.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct DatabaseInfo {
    pub path: String,
    pub file_size_bytes: u64,
    /// File size formatted for humans, e.g. "12 kB"
    pub file_size: String,
    pub storage: StorageStats,
    pub objects: CatalogCounts,
    /// Sum of row counts across user tables
    pub total_rows: i64,
    pub tables: Vec<TableSummary>,
}
