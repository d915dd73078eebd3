//! Shared fixtures for integration tests.

#![allow(dead_code)]

use serde_json::Value as JsonValue;
use sqlite_mcp_server::config::{DataFormat, ServerSettings};
use sqlite_mcp_server::db::{PathPolicy, SqliteConnector};
use sqlite_mcp_server::models::{QueryParams, Row};
use sqlite_mcp_server::tools::{
    DatabaseInput, ExecuteSqlInput, ExecuteSqlOutput, ExecuteToolHandler, MaintenanceToolHandler,
    SchemaToolHandler, TransferToolHandler,
};
use sqlite_mcp_server::tools::format::OutputFormat;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

pub const SHOP_SCHEMA: &str = r#"
    CREATE TABLE customers (
        id INTEGER PRIMARY KEY,
        name TEXT NOT NULL,
        email TEXT UNIQUE,
        tier TEXT DEFAULT 'basic'
    );
    CREATE TABLE orders (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        customer_id INTEGER NOT NULL REFERENCES customers(id) ON DELETE CASCADE,
        total REAL,
        note TEXT
    );
    CREATE INDEX idx_orders_customer ON orders(customer_id, total);
    CREATE VIEW big_orders AS SELECT id, total FROM orders WHERE total > 100;
    CREATE TRIGGER orders_audit AFTER INSERT ON orders BEGIN SELECT 1; END;
    INSERT INTO customers (id, name, email, tier) VALUES
        (1, 'Ada', 'ada@example.com', 'gold'),
        (2, 'Grace', 'grace@example.com', NULL),
        (3, 'O''Brien', NULL, 'basic');
    INSERT INTO orders (customer_id, total, note) VALUES
        (1, 250.5, 'first, with comma'),
        (1, 19.99, NULL),
        (3, 120.0, 'line one
line two');
"#;

/// A temporary directory plus handlers wired to it.
pub struct Fixture {
    pub dir: TempDir,
    pub connector: Arc<SqliteConnector>,
    pub settings: Arc<ServerSettings>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_policy(PathPolicy::unrestricted())
    }

    pub fn with_policy(policy: PathPolicy) -> Self {
        let dir = TempDir::new().unwrap();
        let settings = ServerSettings::new(policy.clone(), DataFormat::Csv);
        Self {
            dir,
            connector: Arc::new(SqliteConnector::new(policy)),
            settings: Arc::new(settings),
        }
    }

    /// Absolute path for a file inside the fixture directory.
    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_str().unwrap().to_string()
    }

    pub fn path_buf(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn schema(&self) -> SchemaToolHandler {
        SchemaToolHandler::new(self.connector.clone())
    }

    pub fn executor(&self) -> ExecuteToolHandler {
        ExecuteToolHandler::new(self.connector.clone())
    }

    pub fn maintenance(&self) -> MaintenanceToolHandler {
        MaintenanceToolHandler::new(self.connector.clone())
    }

    pub fn transfer(&self) -> TransferToolHandler {
        TransferToolHandler::new(self.connector.clone(), self.settings.clone())
    }

    /// Create an empty database file and return its path.
    pub async fn create_db(&self, name: &str) -> String {
        let db_path = self.path(name);
        self.maintenance()
            .create_database(DatabaseInput {
                db_path: db_path.clone(),
            })
            .await
            .unwrap();
        db_path
    }

    /// Create a database populated with the shop schema.
    pub async fn shop_db(&self, name: &str) -> String {
        let db_path = self.create_db(name).await;
        self.exec(&db_path, SHOP_SCHEMA, None).await;
        db_path
    }

    pub async fn exec(
        &self,
        db_path: &str,
        sql: &str,
        parameters: Option<QueryParams>,
    ) -> ExecuteSqlOutput {
        self.executor()
            .execute_sql(ExecuteSqlInput {
                db_path: db_path.to_string(),
                sql_query: sql.to_string(),
                parameters,
                format: OutputFormat::Json,
            })
            .await
            .unwrap()
    }

    /// Run a query and return its rows.
    pub async fn rows(&self, db_path: &str, sql: &str) -> Vec<Row> {
        self.exec(db_path, sql, None).await.rows
    }

    /// Rows of a table rendered as sorted text tuples, for multiset comparison.
    pub async fn table_snapshot(&self, db_path: &str, table: &str) -> Vec<Vec<Option<String>>> {
        let rows = self
            .rows(db_path, &format!("SELECT * FROM \"{}\"", table))
            .await;
        let mut snapshot: Vec<Vec<Option<String>>> = rows
            .iter()
            .map(|row| row.values().map(text_of).collect())
            .collect();
        snapshot.sort();
        snapshot
    }
}

/// Text form of a JSON cell; NULL stays `None`.
pub fn text_of(value: &JsonValue) -> Option<String> {
    match value {
        JsonValue::Null => None,
        JsonValue::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

pub fn positional(values: Vec<JsonValue>) -> Option<QueryParams> {
    Some(serde_json::from_value(JsonValue::Array(values)).unwrap())
}

pub fn named(value: JsonValue) -> Option<QueryParams> {
    Some(serde_json::from_value(value).unwrap())
}
