//! MCP tool implementations.
//!
//! This module contains all database tool handlers:
//! - `schema`: list tables, columns, indexes, triggers and views; describe a table
//! - `execute`: run arbitrary SQL with bound parameters
//! - `transfer`: export tables to CSV/JSON and import them back
//! - `maintenance`: create, back up and report on database files
//! - `explain`: show query plans without running the statement
//! - `format`: table and markdown rendering shared by row-returning tools

pub mod execute;
pub mod explain;
pub mod format;
pub mod maintenance;
pub mod schema;
pub mod transfer;

pub use execute::{ExecuteSqlInput, ExecuteSqlOutput, ExecuteToolHandler};
pub use explain::{ExplainToolHandler, QueryPlanInput, QueryPlanOutput};
pub use maintenance::{
    BackupDatabaseInput, BackupDatabaseOutput, CreateDatabaseOutput, MaintenanceToolHandler,
};
pub use schema::{
    DatabaseInput, ListColumnsOutput, ListIndexesOutput, ListTablesOutput, ListTriggersOutput,
    ListViewsOutput, SchemaSummaryOutput, SchemaToolHandler, TableFilterInput, TableInput,
};
pub use transfer::{
    ExportDataInput, ExportDataOutput, ImportDataInput, ImportDataOutput, TransferToolHandler,
};
