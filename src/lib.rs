//! SQLite MCP Server Library
//!
//! This library provides MCP (Model Context Protocol) tools for AI assistants
//! to work with SQLite database files: schema inspection, parameterized SQL
//! execution, CSV/JSON import and export, backups and query plans.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod tools;
pub mod transport;

pub use config::{Config, ServerSettings};
pub use error::DbError;
pub use mcp::SqliteService;
