//! Database file maintenance tools.
//!
//! This module implements `create_database`, `backup_database` and
//! `get_database_info`.

use crate::db::{DatabaseMaintenance, SqliteConnector};
use crate::error::DbResult;
use crate::models::{BackupReport, DatabaseInfo};
use crate::tools::schema::DatabaseInput;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Output from the create_database tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CreateDatabaseOutput {
    pub path: String,
    pub sqlite_version: String,
    pub size_bytes: u64,
    pub message: String,
}

/// Input for the backup_database tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct BackupDatabaseInput {
    /// Path to the SQLite database file to back up
    pub db_path: String,
    /// Destination file for the backup
    pub backup_path: String,
    /// Replace an existing file at backup_path. Default: false
    #[serde(default)]
    pub overwrite: bool,
}

/// Output from the backup_database tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct BackupDatabaseOutput {
    #[serde(flatten)]
    pub report: BackupReport,
    pub message: String,
}

/// Handler for maintenance tools.
pub struct MaintenanceToolHandler {
    connector: Arc<SqliteConnector>,
}

impl MaintenanceToolHandler {
    pub fn new(connector: Arc<SqliteConnector>) -> Self {
        Self { connector }
    }

    pub async fn create_database(&self, input: DatabaseInput) -> DbResult<CreateDatabaseOutput> {
        let created = DatabaseMaintenance::create_database(&self.connector, &input.db_path).await?;
        Ok(CreateDatabaseOutput {
            message: format!("Database created at {}", created.path),
            path: created.path,
            sqlite_version: created.sqlite_version,
            size_bytes: created.size_bytes,
        })
    }

    pub async fn backup_database(
        &self,
        input: BackupDatabaseInput,
    ) -> DbResult<BackupDatabaseOutput> {
        let report = DatabaseMaintenance::backup_database(
            &self.connector,
            &input.db_path,
            &input.backup_path,
            input.overwrite,
        )
        .await?;
        Ok(BackupDatabaseOutput {
            message: format!(
                "Backed up {} to {}",
                report.source_path, report.backup_path
            ),
            report,
        })
    }

    pub async fn database_info(&self, input: DatabaseInput) -> DbResult<DatabaseInfo> {
        let info = DatabaseMaintenance::database_info(&self.connector, &input.db_path).await?;
        info!(
            db_path = %input.db_path,
            tables = info.objects.tables,
            total_rows = info.total_rows,
            file_size = %info.file_size,
            "Collected database info"
        );
        Ok(info)
    }
}
