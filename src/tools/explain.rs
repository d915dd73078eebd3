//! Query plan tool.
//!
//! This module implements the `get_query_plan` MCP tool. The statement is
//! prefixed with `EXPLAIN QUERY PLAN` on a read-only connection, so it is
//! compiled but never run. Placeholders may be left unbound.

use crate::db::{OpenMode, PlanStep, QueryExecutor, SqliteConnector};
use crate::error::DbResult;
use crate::models::Row;
use crate::tools::format::OutputFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;
use tracing::info;

/// Input for the get_query_plan tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct QueryPlanInput {
    /// Path to the SQLite database file
    pub db_path: String,
    /// A single SQL statement to explain (without the EXPLAIN prefix)
    pub sql_query: String,
    /// Also return the VDBE bytecode listing from EXPLAIN. Default: false
    #[serde(default)]
    pub include_bytecode: bool,
    /// Output format: "json" returns structured steps, "table" an ASCII table, "markdown" a markdown table
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output from the get_query_plan tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct QueryPlanOutput {
    /// The SQL statement that was explained
    pub sql: String,
    /// Plan steps in engine order. Empty if format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<PlanStep>,
    /// Plan rendered as an indented tree, as the sqlite3 shell prints it
    pub tree: String,
    /// EXPLAIN opcode listing when include_bytecode is set. Empty if format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bytecode: Vec<Row>,
    /// Pre-formatted output when format is table or markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// Time taken to run EXPLAIN in milliseconds
    pub execution_time_ms: u64,
}

/// Render plan steps as the tree the sqlite3 shell prints for `.eqp on`.
pub fn plan_tree(steps: &[PlanStep]) -> String {
    fn walk(steps: &[PlanStep], parent: i64, prefix: &str, out: &mut String) {
        let children: Vec<&PlanStep> = steps.iter().filter(|s| s.parent == parent).collect();
        for (i, step) in children.iter().enumerate() {
            let last = i + 1 == children.len();
            out.push_str(prefix);
            out.push_str(if last { "`--" } else { "|--" });
            out.push_str(&step.detail);
            out.push('\n');
            // A step that is its own parent would recurse forever.
            if step.id != parent {
                let nested = format!("{}{}", prefix, if last { "   " } else { "|  " });
                walk(steps, step.id, &nested, out);
            }
        }
    }

    let mut out = String::from("QUERY PLAN\n");
    walk(steps, 0, "", &mut out);
    out
}

fn steps_as_rows(steps: &[PlanStep]) -> Vec<Row> {
    steps
        .iter()
        .map(|s| {
            let mut row = Row::new();
            row.insert("id".into(), json!(s.id));
            row.insert("parent".into(), json!(s.parent));
            row.insert("detail".into(), json!(s.detail));
            row
        })
        .collect()
}

/// Handler for the get_query_plan tool.
pub struct ExplainToolHandler {
    connector: Arc<SqliteConnector>,
}

impl ExplainToolHandler {
    pub fn new(connector: Arc<SqliteConnector>) -> Self {
        Self { connector }
    }

    /// Build the output with formatting based on `OutputFormat`.
    fn build_output(
        steps: Vec<PlanStep>,
        bytecode: Vec<Row>,
        sql: &str,
        execution_time_ms: u64,
        format: OutputFormat,
    ) -> QueryPlanOutput {
        let tree = plan_tree(&steps);
        let plan_columns = ["id", "parent", "detail"].map(String::from);

        let formatted = format
            .render(&plan_columns, &steps_as_rows(&steps), execution_time_ms)
            .map(|mut text| {
                let bytecode_columns: Vec<String> =
                    bytecode.first().map(|r| r.keys().cloned().collect()).unwrap_or_default();
                if let Some(listing) = format.render(&bytecode_columns, &bytecode, execution_time_ms) {
                    if !bytecode.is_empty() {
                        text.push_str("\n\n");
                        text.push_str(&listing);
                    }
                }
                text
            });

        match formatted {
            Some(formatted) => QueryPlanOutput {
                sql: sql.to_string(),
                steps: Vec::new(),
                tree,
                bytecode: Vec::new(),
                formatted: Some(formatted),
                execution_time_ms,
            },
            None => QueryPlanOutput {
                sql: sql.to_string(),
                steps,
                tree,
                bytecode,
                formatted: None,
                execution_time_ms,
            },
        }
    }

    /// Handle the get_query_plan tool call.
    pub async fn query_plan(&self, input: QueryPlanInput) -> DbResult<QueryPlanOutput> {
        let start = Instant::now();
        let sql = input.sql_query.trim();

        let (steps, bytecode) = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                let steps = QueryExecutor::query_plan(conn, sql).await?;
                let bytecode = if input.include_bytecode {
                    QueryExecutor::bytecode(conn, sql).await?
                } else {
                    Vec::new()
                };
                Ok((steps, bytecode))
            })
            .await?;

        let execution_time_ms = start.elapsed().as_millis() as u64;
        info!(
            db_path = %input.db_path,
            steps = steps.len(),
            execution_time_ms,
            "Query plan generated"
        );
        Ok(Self::build_output(
            steps,
            bytecode,
            sql,
            execution_time_ms,
            input.format,
        ))
    }
}
