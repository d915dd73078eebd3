//! The MCP tool surface.
//!
//! [`SqliteService`] registers the fourteen SQLite tools with rmcp and maps
//! handler errors onto MCP errors. Every tool takes the database path as an
//! argument; no connection outlives a single call.

use crate::config::ServerSettings;
use crate::db::SqliteConnector;
use crate::error::{DbError, ErrorContext};
use crate::models::{DatabaseInfo, TableSchema};
use crate::tools::execute::{ExecuteSqlInput, ExecuteSqlOutput, ExecuteToolHandler};
use crate::tools::explain::{ExplainToolHandler, QueryPlanInput, QueryPlanOutput};
use crate::tools::maintenance::{
    BackupDatabaseInput, BackupDatabaseOutput, CreateDatabaseOutput, MaintenanceToolHandler,
};
use crate::tools::schema::{
    DatabaseInput, ListColumnsOutput, ListIndexesOutput, ListTablesOutput, ListTriggersOutput,
    ListViewsOutput, SchemaSummaryOutput, SchemaToolHandler, TableFilterInput, TableInput,
};
use crate::tools::transfer::{
    ExportDataInput, ExportDataOutput, ImportDataInput, ImportDataOutput, TransferToolHandler,
};
use rmcp::Json;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct SqliteService {
    /// Opens databases through the configured path policy
    connector: Arc<SqliteConnector>,
    /// Immutable server settings (path policy, default data format)
    settings: Arc<ServerSettings>,
    /// Generated by `#[tool_router]`
    tool_router: ToolRouter<Self>,
}

impl SqliteService {
    /// Create a new SqliteService from the server settings.
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            connector: Arc::new(SqliteConnector::new(settings.path_policy.clone())),
            settings: Arc::new(settings),
            tool_router: Self::tool_router(),
        }
    }

    fn schema_handler(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(self.connector.clone())
    }

    fn maintenance_handler(&self) -> MaintenanceToolHandler {
        MaintenanceToolHandler::new(self.connector.clone())
    }

    fn transfer_handler(&self) -> TransferToolHandler {
        TransferToolHandler::new(self.connector.clone(), self.settings.clone())
    }
}

/// Map a handler error to an MCP error carrying the call context.
fn tool_error(db_path: &str, sql: Option<&str>) -> impl FnOnce(DbError) -> McpError + use<> {
    let mut ctx = ErrorContext::for_path(db_path);
    if let Some(sql) = sql {
        ctx = ctx.with_sql(sql);
    }
    move |e| e.into_mcp_error(&ctx)
}

#[tool_router]
impl SqliteService {
    #[tool(
        description = "Create a new, empty SQLite database file.\nFails if a file already exists at db_path; existing files are never modified.\nParent directories are created."
    )]
    async fn create_database(
        &self,
        Parameters(input): Parameters<DatabaseInput>,
    ) -> Result<Json<CreateDatabaseOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.maintenance_handler()
            .create_database(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Report database statistics: file size, page size/count, journal mode, SQLite version,\nobject counts, total rows and per-table row/column counts."
    )]
    async fn get_database_info(
        &self,
        Parameters(input): Parameters<DatabaseInput>,
    ) -> Result<Json<DatabaseInfo>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.maintenance_handler()
            .database_info(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Copy a database to backup_path as a consistent snapshot (VACUUM INTO).\nFails if backup_path exists unless overwrite is true."
    )]
    async fn backup_database(
        &self,
        Parameters(input): Parameters<BackupDatabaseInput>,
    ) -> Result<Json<BackupDatabaseOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.maintenance_handler()
            .backup_database(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(description = "List user tables in the database, ordered by name.")]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<DatabaseInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.schema_handler()
            .list_tables(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "List the columns of a table in declaration order.\nReturns name, declared type, nullability, default value and primary-key membership."
    )]
    async fn list_columns(
        &self,
        Parameters(input): Parameters<TableInput>,
    ) -> Result<Json<ListColumnsOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.schema_handler()
            .list_columns(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Describe a table: columns, primary key, foreign keys, indexes, row count and up to 5 sample rows."
    )]
    async fn get_table_info(
        &self,
        Parameters(input): Parameters<TableInput>,
    ) -> Result<Json<TableSchema>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.schema_handler()
            .get_table_info(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "List indexes with their table, uniqueness, origin and columns in key order.\nPass table_name to restrict to one table."
    )]
    async fn list_indexes(
        &self,
        Parameters(input): Parameters<TableFilterInput>,
    ) -> Result<Json<ListIndexesOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.schema_handler()
            .list_indexes(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "List triggers with timing, event and defining SQL.\nPass table_name to restrict to one table or view."
    )]
    async fn list_triggers(
        &self,
        Parameters(input): Parameters<TableFilterInput>,
    ) -> Result<Json<ListTriggersOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.schema_handler()
            .list_triggers(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(description = "List views with their defining SQL and result columns.")]
    async fn list_views(
        &self,
        Parameters(input): Parameters<DatabaseInput>,
    ) -> Result<Json<ListViewsOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.schema_handler()
            .list_views(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Summarize the whole schema in one call: every table with row count, column count,\nprimary key and foreign-key relationships."
    )]
    async fn get_schema_summary(
        &self,
        Parameters(input): Parameters<DatabaseInput>,
    ) -> Result<Json<SchemaSummaryOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.schema_handler()
            .schema_summary(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Execute SQL and return rows or change counts.\nUse parameters for values: a list for ? / ?NNN placeholders, an object for :name / @name / $name.\nWithout parameters several ;-separated statements may be sent; the last one decides the result shape.\nOutput format: json (default), table, or markdown."
    )]
    async fn execute_sql(
        &self,
        Parameters(input): Parameters<ExecuteSqlInput>,
    ) -> Result<Json<ExecuteSqlOutput>, McpError> {
        let on_error = tool_error(&input.db_path, Some(&input.sql_query));
        ExecuteToolHandler::new(self.connector.clone())
            .execute_sql(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Export a table to a CSV or JSON file.\nDefault output path: <database dir>/<table>_<timestamp>.<ext>. Use limit to cap the row count."
    )]
    async fn export_data(
        &self,
        Parameters(input): Parameters<ExportDataInput>,
    ) -> Result<Json<ExportDataOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.transfer_handler()
            .export_data(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Import a CSV (with header) or JSON (array of objects) file into a table.\nOnly fields matching table columns are inserted. Set create_table to create a missing table with TEXT columns.\nThe import runs in one transaction: any failing row rolls back everything."
    )]
    async fn import_data(
        &self,
        Parameters(input): Parameters<ImportDataInput>,
    ) -> Result<Json<ImportDataOutput>, McpError> {
        let on_error = tool_error(&input.db_path, None);
        self.transfer_handler()
            .import_data(input)
            .await
            .map(Json)
            .map_err(on_error)
    }

    #[tool(
        description = "Show the query plan for one statement without executing it (EXPLAIN QUERY PLAN).\nPlaceholders may be left unbound. Set include_bytecode for the EXPLAIN opcode listing.\nOutput format: \"json\" returns structured steps, \"table\" returns ASCII table, \"markdown\" returns markdown table."
    )]
    async fn get_query_plan(
        &self,
        Parameters(input): Parameters<QueryPlanInput>,
    ) -> Result<Json<QueryPlanOutput>, McpError> {
        let on_error = tool_error(&input.db_path, Some(&input.sql_query));
        ExplainToolHandler::new(self.connector.clone())
            .query_plan(input)
            .await
            .map(Json)
            .map_err(on_error)
    }
}

#[tool_handler]
impl ServerHandler for SqliteService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sqlite-mcp-server".to_owned(),
                title: Some("SQLite MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "SQLite tools for inspecting, querying and maintaining database files.\n\
                \n\
                ## Workflow\n\
                1. Pass the database file path as `db_path` in every call\n\
                2. Explore with `get_schema_summary`, `list_tables` and `get_table_info`\n\
                3. Query or modify data with `execute_sql`, always binding values through `parameters`\n\
                4. Check expensive queries with `get_query_plan` before running them\n\
                \n\
                ## Files\n\
                - `create_database` never overwrites an existing file\n\
                - `backup_database` needs `overwrite: true` to replace an existing backup\n\
                - `export_data` / `import_data` read and write CSV or JSON\n\
                - When the server runs with an allowed root directory, relative paths resolve\n\
                  inside it and paths outside it are rejected"
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_service() -> SqliteService {
        SqliteService::new(ServerSettings::default())
    }

    #[test]
    fn test_server_info() {
        let service = create_test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, "sqlite-mcp-server");
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("db_path"));
    }

    #[test]
    fn test_all_tools_registered() {
        let service = create_test_service();
        let mut names: Vec<String> = service
            .tool_router
            .list_all()
            .into_iter()
            .map(|t| t.name.to_string())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "backup_database",
                "create_database",
                "execute_sql",
                "export_data",
                "get_database_info",
                "get_query_plan",
                "get_schema_summary",
                "get_table_info",
                "import_data",
                "list_columns",
                "list_indexes",
                "list_tables",
                "list_triggers",
                "list_views",
            ]
        );
    }

    #[tokio::test]
    async fn test_tools_run_through_service() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("svc.db").display().to_string();
        let service = create_test_service();

        let Json(created) = service
            .create_database(Parameters(DatabaseInput {
                db_path: db_path.clone(),
            }))
            .await
            .unwrap();
        assert!(created.size_bytes > 0);

        let Json(output) = service
            .execute_sql(Parameters(ExecuteSqlInput {
                db_path: db_path.clone(),
                sql_query: "CREATE TABLE t (a TEXT); INSERT INTO t VALUES ('x')".into(),
                parameters: None,
                format: Default::default(),
            }))
            .await
            .unwrap();
        assert_eq!(output.rows_affected, Some(1));

        let Json(tables) = service
            .list_tables(Parameters(DatabaseInput {
                db_path: db_path.clone(),
            }))
            .await
            .unwrap();
        assert_eq!(tables.tables, vec!["t"]);
    }

    #[tokio::test]
    async fn test_tool_failure_maps_to_mcp_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let db_path = dir.path().join("missing.db").display().to_string();
        let service = create_test_service();

        let err = service
            .get_table_info(Parameters(TableInput {
                db_path: db_path.clone(),
                table_name: "t".into(),
            }))
            .await
            .err()
            .expect("expected error");
        let data = err.data.unwrap();
        assert_eq!(data["kind"], "not_found");
        assert_eq!(data["db_path"], db_path);
        assert!(!dir.path().join("missing.db").exists());
    }

    #[test]
    fn test_tool_error_attaches_context() {
        let err = tool_error("/tmp/a.db", Some("SELECT * FROM nope"))(DbError::table_not_found(
            "nope",
        ));
        let data = err.data.unwrap();
        assert_eq!(data["kind"], "table_not_found");
        assert_eq!(data["db_path"], "/tmp/a.db");
        assert_eq!(data["sql"], "SELECT * FROM nope");
    }
}
