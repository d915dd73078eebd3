//! Schema introspection tools.
//!
//! This module implements `list_tables`, `list_columns`, `get_table_info`,
//! `list_indexes`, `list_triggers`, `list_views` and `get_schema_summary`.
//! Every tool opens the database read-only.

use crate::db::schema::SchemaInspector;
use crate::db::{OpenMode, SqliteConnector};
use crate::error::DbResult;
use crate::models::{
    ColumnDefinition, IndexInfo, TableSchema, TableSummary, TriggerInfo, ViewInfo,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Input for tools that only need a database path.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DatabaseInput {
    /// Path to the SQLite database file
    pub db_path: String,
}

/// Input for tools that inspect one table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableInput {
    /// Path to the SQLite database file
    pub db_path: String,
    /// Name of the table
    pub table_name: String,
}

/// Input for catalog listings that can be narrowed to one table.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableFilterInput {
    /// Path to the SQLite database file
    pub db_path: String,
    /// Only report objects attached to this table
    #[serde(default)]
    pub table_name: Option<String>,
}

/// Output from the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    /// Table names ordered by name; internal sqlite_* tables are excluded
    pub tables: Vec<String>,
    pub count: usize,
}

/// Output from the list_columns tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListColumnsOutput {
    pub table: String,
    /// Columns in declaration order
    pub columns: Vec<ColumnDefinition>,
    pub count: usize,
}

/// Output from the list_indexes tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListIndexesOutput {
    pub indexes: Vec<IndexInfo>,
    pub count: usize,
}

/// Output from the list_triggers tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTriggersOutput {
    pub triggers: Vec<TriggerInfo>,
    pub count: usize,
}

/// Output from the list_views tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListViewsOutput {
    pub views: Vec<ViewInfo>,
    pub count: usize,
}

/// Output from the get_schema_summary tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SchemaSummaryOutput {
    pub tables: Vec<TableSummary>,
    pub table_count: usize,
    /// Number of foreign-key relationships across all tables
    pub relationship_count: usize,
    pub total_rows: i64,
}

/// Handler for schema introspection tools.
pub struct SchemaToolHandler {
    connector: Arc<SqliteConnector>,
}

impl SchemaToolHandler {
    pub fn new(connector: Arc<SqliteConnector>) -> Self {
        Self { connector }
    }

    pub async fn list_tables(&self, input: DatabaseInput) -> DbResult<ListTablesOutput> {
        let tables = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                SchemaInspector::list_tables(conn).await
            })
            .await?;

        info!(db_path = %input.db_path, count = tables.len(), "Listed tables");
        Ok(ListTablesOutput {
            count: tables.len(),
            tables,
        })
    }

    pub async fn list_columns(&self, input: TableInput) -> DbResult<ListColumnsOutput> {
        let (table, columns) = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                let table = SchemaInspector::require_table(conn, &input.table_name).await?;
                let columns = SchemaInspector::list_columns(conn, &table).await?;
                Ok((table, columns))
            })
            .await?;

        info!(db_path = %input.db_path, table = %table, count = columns.len(), "Listed columns");
        Ok(ListColumnsOutput {
            table,
            count: columns.len(),
            columns,
        })
    }

    pub async fn get_table_info(&self, input: TableInput) -> DbResult<TableSchema> {
        let schema = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                SchemaInspector::describe_table(conn, &input.table_name).await
            })
            .await?;

        info!(
            db_path = %input.db_path,
            table = %schema.name,
            columns = schema.columns.len(),
            row_count = schema.row_count,
            "Described table"
        );
        Ok(schema)
    }

    pub async fn list_indexes(&self, input: TableFilterInput) -> DbResult<ListIndexesOutput> {
        let indexes = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                SchemaInspector::list_indexes(conn, input.table_name.as_deref()).await
            })
            .await?;

        info!(db_path = %input.db_path, count = indexes.len(), "Listed indexes");
        Ok(ListIndexesOutput {
            count: indexes.len(),
            indexes,
        })
    }

    pub async fn list_triggers(&self, input: TableFilterInput) -> DbResult<ListTriggersOutput> {
        let triggers = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                SchemaInspector::list_triggers(conn, input.table_name.as_deref()).await
            })
            .await?;

        info!(db_path = %input.db_path, count = triggers.len(), "Listed triggers");
        Ok(ListTriggersOutput {
            count: triggers.len(),
            triggers,
        })
    }

    pub async fn list_views(&self, input: DatabaseInput) -> DbResult<ListViewsOutput> {
        let views = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                SchemaInspector::list_views(conn).await
            })
            .await?;

        info!(db_path = %input.db_path, count = views.len(), "Listed views");
        Ok(ListViewsOutput {
            count: views.len(),
            views,
        })
    }

    pub async fn schema_summary(&self, input: DatabaseInput) -> DbResult<SchemaSummaryOutput> {
        let tables = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                SchemaInspector::table_summaries(conn).await
            })
            .await?;

        let relationship_count = tables.iter().map(|t| t.foreign_keys.len()).sum();
        info!(
            db_path = %input.db_path,
            tables = tables.len(),
            relationships = relationship_count,
            "Summarized schema"
        );
        Ok(SchemaSummaryOutput {
            table_count: tables.len(),
            relationship_count,
            total_rows: tables.iter().map(|t| t.row_count).sum(),
            tables,
        })
    }
}
