//! Database access layer.
//!
//! This module provides SQLite access for the tool handlers:
//! - Path validation and per-call connections
//! - Placeholder scanning and parameter binding
//! - Statement classification and execution
//! - Schema introspection
//! - Import/export and file maintenance
//! - Value decoding

pub mod connection;
pub mod executor;
pub mod maintenance;
pub mod params;
pub mod schema;
pub mod transfer;
pub mod types;

pub use connection::{DbHandle, OpenMode, PathPolicy, SqliteConnector};
pub use executor::{PlanStep, QueryExecutor, StatementKind};
pub use maintenance::DatabaseMaintenance;
pub use schema::SchemaInspector;
pub use transfer::TableTransfer;
