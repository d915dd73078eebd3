//! SQL execution tool.
//!
//! This module implements the `execute_sql` MCP tool. Any statement is
//! accepted; data-returning statements yield rows, everything else yields
//! change counts. Parameter values are always bound, never spliced.

use crate::db::{OpenMode, QueryExecutor, SqliteConnector};
use crate::error::DbResult;
use crate::models::{QueryParams, Row, StatementOutcome};
use crate::tools::format::{OutputFormat, format_changes};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Input for the execute_sql tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteSqlInput {
    /// Path to the SQLite database file
    pub db_path: String,
    /// SQL to run. Without parameters, several `;`-separated statements may be sent.
    pub sql_query: String,
    /// Values for placeholders: a list for `?`/`?NNN`, an object for `:name`/`@name`/`$name`
    #[serde(default)]
    pub parameters: Option<QueryParams>,
    /// Output format: "json" returns rows, "table" an ASCII table, "markdown" a markdown table
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output from the execute_sql tool.
#[derive(Debug, Clone, Default, Serialize, JsonSchema)]
pub struct ExecuteSqlOutput {
    /// Result column names. Empty for mutating statements.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<String>,
    /// Result rows. Empty for mutating statements or when format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<Row>,
    /// Number of rows returned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    /// Number of rows changed by a mutating statement
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    /// Rowid of the inserted row for INSERT/REPLACE
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_rowid: Option<i64>,
    /// Status message for mutating statements
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Pre-formatted output when format is table or markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
}

impl ExecuteSqlOutput {
    fn from_outcome(outcome: StatementOutcome, format: OutputFormat, execution_time_ms: u64) -> Self {
        match outcome {
            StatementOutcome::Rows { columns, rows } => {
                let row_count = Some(rows.len());
                match format.render(&columns, &rows, execution_time_ms) {
                    Some(formatted) => Self {
                        row_count,
                        formatted: Some(formatted),
                        execution_time_ms,
                        ..Default::default()
                    },
                    None => Self {
                        columns,
                        rows,
                        row_count,
                        execution_time_ms,
                        ..Default::default()
                    },
                }
            }
            StatementOutcome::Changes {
                rows_affected,
                last_insert_rowid,
            } => Self {
                rows_affected: Some(rows_affected),
                last_insert_rowid,
                message: Some(format_changes(rows_affected, execution_time_ms)),
                execution_time_ms,
                ..Default::default()
            },
        }
    }
}

/// Handler for the execute_sql tool.
pub struct ExecuteToolHandler {
    connector: Arc<SqliteConnector>,
}

impl ExecuteToolHandler {
    pub fn new(connector: Arc<SqliteConnector>) -> Self {
        Self { connector }
    }

    /// Handle the execute_sql tool call.
    pub async fn execute_sql(&self, input: ExecuteSqlInput) -> DbResult<ExecuteSqlOutput> {
        let start = Instant::now();
        let format = input.format;

        let outcome = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadWrite, async |conn| {
                QueryExecutor::execute(conn, &input.sql_query, input.parameters.clone()).await
            })
            .await?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        let output = ExecuteSqlOutput::from_outcome(outcome, format, execution_time_ms);

        info!(
            db_path = %input.db_path,
            row_count = ?output.row_count,
            rows_affected = ?output.rows_affected,
            execution_time_ms,
            "SQL executed"
        );
        Ok(output)
    }
}
