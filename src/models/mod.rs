//! Data models for the SQLite MCP Server.
//!
//! This module re-exports all model types used throughout the application.

pub mod maintenance;
pub mod query;
pub mod schema;
pub mod transfer;

// Re-export commonly used types
pub use maintenance::{BackupReport, CreatedDatabase, DatabaseInfo, StorageStats};
pub use query::{QueryParam, QueryParams, Row, StatementOutcome};
pub use schema::{
    CatalogCounts, ColumnDefinition, ForeignKey, IndexInfo, TableSchema, TableSummary,
    TriggerEvent, TriggerInfo, TriggerTiming, ViewInfo,
};
pub use transfer::{ExportData, ImportSummary, ParsedRecords};
