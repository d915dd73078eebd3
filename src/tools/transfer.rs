//! Data import and export tools.
//!
//! This module implements the `export_data` and `import_data` MCP tools.

use crate::config::{DataFormat, ServerSettings};
use crate::db::transfer::{
    self, TableTransfer, default_export_path, format_from_extension, parse_records,
};
use crate::db::{OpenMode, SqliteConnector};
use crate::error::{DbError, DbResult};
use crate::models::ImportSummary;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Input for the export_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExportDataInput {
    /// Path to the SQLite database file
    pub db_path: String,
    /// Table to export
    pub table_name: String,
    /// "csv" or "json" (case-insensitive). Defaults to the server's configured format.
    #[serde(default)]
    pub format: Option<String>,
    /// Destination file. Default: <database dir>/<table>_<timestamp>.<ext>
    #[serde(default)]
    pub output_path: Option<String>,
    /// Maximum number of rows to export. Omit or 0 for all rows.
    #[serde(default)]
    pub limit: Option<u64>,
}

/// Output from the export_data tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExportDataOutput {
    /// File that was written
    pub output_path: String,
    pub table: String,
    pub format: DataFormat,
    pub row_count: usize,
    pub columns: Vec<String>,
    pub bytes_written: u64,
}

/// Input for the import_data tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ImportDataInput {
    /// Path to the SQLite database file
    pub db_path: String,
    /// Table to insert into
    pub table_name: String,
    /// CSV (with header row) or JSON (array of objects) file to read
    pub file_path: String,
    /// "csv" or "json" (case-insensitive). Defaults to the file extension, then the server's configured format.
    #[serde(default)]
    pub format: Option<String>,
    /// Create the table (all columns TEXT) if it does not exist. Default: false
    #[serde(default)]
    pub create_table: bool,
}

/// Output from the import_data tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ImportDataOutput {
    pub file_path: String,
    pub format: DataFormat,
    #[serde(flatten)]
    pub summary: ImportSummary,
}

fn parse_format(raw: Option<&str>) -> DbResult<Option<DataFormat>> {
    raw.map(|f| f.parse::<DataFormat>().map_err(DbError::format))
        .transpose()
}

/// Handler for import/export tools.
pub struct TransferToolHandler {
    connector: Arc<SqliteConnector>,
    settings: Arc<ServerSettings>,
}

impl TransferToolHandler {
    pub fn new(connector: Arc<SqliteConnector>, settings: Arc<ServerSettings>) -> Self {
        Self {
            connector,
            settings,
        }
    }

    /// Handle the export_data tool call.
    pub async fn export_data(&self, input: ExportDataInput) -> DbResult<ExportDataOutput> {
        let format = parse_format(input.format.as_deref())?.unwrap_or(self.settings.default_format);
        let db_path = self.connector.resolve(&input.db_path)?;
        let explicit_output = input
            .output_path
            .as_deref()
            .map(|p| self.connector.resolve(p))
            .transpose()?;

        let export = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadOnly, async |conn| {
                TableTransfer::export_table(conn, &input.table_name, format, input.limit).await
            })
            .await?;

        let output_path = explicit_output.unwrap_or_else(|| {
            default_export_path(
                &db_path,
                input.table_name.trim(),
                format,
                chrono::Local::now().naive_local(),
            )
        });
        let bytes_written = transfer::write_export(&output_path, &export.content).await?;

        info!(
            db_path = %input.db_path,
            table = %input.table_name,
            output_path = %output_path.display(),
            row_count = export.row_count,
            bytes_written,
            "Exported table"
        );
        Ok(ExportDataOutput {
            output_path: output_path.display().to_string(),
            table: input.table_name.trim().to_string(),
            format,
            row_count: export.row_count,
            columns: export.columns,
            bytes_written,
        })
    }

    /// Handle the import_data tool call.
    pub async fn import_data(&self, input: ImportDataInput) -> DbResult<ImportDataOutput> {
        let file_path = self.connector.resolve(&input.file_path)?;
        let format = match parse_format(input.format.as_deref())? {
            Some(format) => format,
            None => self.infer_format(&file_path),
        };

        let content = transfer::read_import(&file_path).await?;
        let parsed = parse_records(&content, format)?;

        let summary = self
            .connector
            .with_connection(&input.db_path, OpenMode::ReadWrite, async |conn| {
                TableTransfer::import_records(conn, &input.table_name, &parsed, input.create_table)
                    .await
            })
            .await?;

        info!(
            db_path = %input.db_path,
            table = %summary.table,
            file_path = %file_path.display(),
            rows_imported = summary.rows_imported,
            table_created = summary.table_created,
            "Imported data"
        );
        Ok(ImportDataOutput {
            file_path: file_path.display().to_string(),
            format,
            summary,
        })
    }

    fn infer_format(&self, path: &Path) -> DataFormat {
        format_from_extension(path).unwrap_or(self.settings.default_format)
    }
}
