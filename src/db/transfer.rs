//! Table import and export in CSV and JSON.
//!
//! Exports stream rows out of `SELECT *` into an in-memory buffer. Imports
//! run every statement (including an optional CREATE TABLE) inside one
//! transaction, so a failing record leaves the database untouched.

use crate::config::DataFormat;
use crate::db::maintenance::create_parent_dirs;
use crate::db::schema::{SchemaInspector, quote_identifier};
use crate::db::types::{RowToJson, value_to_text};
use crate::error::{DbError, DbResult};
use crate::models::{ExportData, ImportSummary, ParsedRecords, QueryParam, Row};
use futures_util::TryStreamExt;
use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use sqlx::Connection;
use sqlx::sqlite::SqliteConnection;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Table import and export operations.
pub struct TableTransfer;

impl TableTransfer {
    /// Serialize a table's rows, optionally capped at `limit` (0 means all).
    pub async fn export_table(
        conn: &mut SqliteConnection,
        table: &str,
        format: DataFormat,
        limit: Option<u64>,
    ) -> DbResult<ExportData> {
        let table = SchemaInspector::require_table(conn, table).await?;
        let limit = limit
            .filter(|&n| n > 0)
            .map(|n| i64::try_from(n).unwrap_or(i64::MAX));

        let mut sql = format!("SELECT * FROM {}", quote_identifier(&table));
        if limit.is_some() {
            sql.push_str(" LIMIT ?1");
        }

        let mut query = sqlx::query(&sql);
        if let Some(n) = limit {
            query = query.bind(n);
        }

        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        {
            let mut stream = query.fetch(&mut *conn);
            while let Some(row) = stream.try_next().await? {
                if columns.is_empty() {
                    columns = row.column_names();
                }
                rows.push(row.to_json_map());
            }
        }
        if columns.is_empty() {
            columns = SchemaInspector::list_columns(conn, &table)
                .await?
                .into_iter()
                .map(|c| c.name)
                .collect();
        }

        let content = match format {
            DataFormat::Csv => write_csv(&columns, &rows)?,
            DataFormat::Json => serde_json::to_vec_pretty(&rows)
                .map_err(|e| DbError::internal(format!("JSON serialization failed: {}", e)))?,
        };

        debug!(table = %table, rows = rows.len(), format = %format, "Exported table");
        Ok(ExportData {
            columns,
            row_count: rows.len(),
            content,
        })
    }

    /// Insert parsed records into `table` atomically.
    pub async fn import_records(
        conn: &mut SqliteConnection,
        table: &str,
        parsed: &ParsedRecords,
        create_table: bool,
    ) -> DbResult<ImportSummary> {
        let mut tx = conn.begin().await?;
        match Self::import_in_transaction(&mut tx, table, parsed, create_table).await {
            Ok(summary) => {
                tx.commit().await?;
                Ok(summary)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    debug!(error = %rollback_err, "Rollback after failed import also failed");
                }
                Err(e)
            }
        }
    }

    async fn import_in_transaction(
        conn: &mut SqliteConnection,
        table: &str,
        parsed: &ParsedRecords,
        create_table: bool,
    ) -> DbResult<ImportSummary> {
        let (table, table_created) = match SchemaInspector::require_table(conn, table).await {
            Ok(name) => (name, false),
            Err(DbError::TableNotFound { table }) if create_table => {
                let ddl = create_table_sql(&table, &parsed.fields);
                sqlx::query(&ddl).execute(&mut *conn).await?;
                debug!(table = %table, columns = parsed.fields.len(), "Created table for import");
                (table, true)
            }
            Err(e) => return Err(e),
        };

        // Column names compare case-insensitively in SQLite.
        let table_columns: HashMap<String, String> = SchemaInspector::list_columns(conn, &table)
            .await?
            .into_iter()
            .map(|c| (c.name.to_lowercase(), c.name))
            .collect();

        let (matched, skipped): (Vec<&String>, Vec<&String>) = parsed
            .fields
            .iter()
            .partition(|f| table_columns.contains_key(&f.to_lowercase()));
        if matched.is_empty() {
            return Err(DbError::format(format!(
                "No matching columns found between the file ({}) and table '{}'",
                parsed.fields.join(", "),
                table
            )));
        }

        let quoted_table = quote_identifier(&table);
        let mut rows_imported = 0u64;
        for record in &parsed.records {
            let values: Vec<(&String, &QueryParam)> = record
                .iter()
                .filter_map(|(field, value)| {
                    table_columns
                        .get(&field.to_lowercase())
                        .map(|column| (column, value))
                })
                .collect();
            if values.is_empty() {
                continue;
            }

            let column_list = values
                .iter()
                .map(|(c, _)| quote_identifier(c))
                .collect::<Vec<_>>()
                .join(", ");
            let placeholders = (1..=values.len())
                .map(|i| format!("?{}", i))
                .collect::<Vec<_>>()
                .join(", ");
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                quoted_table, column_list, placeholders
            );

            let mut query = sqlx::query(&sql);
            for (_, value) in &values {
                query = crate::db::params::bind_sqlite_param(query, value);
            }
            let result = query.execute(&mut *conn).await?;
            rows_imported += result.rows_affected();
        }

        Ok(ImportSummary {
            table,
            rows_imported,
            columns: matched.into_iter().cloned().collect(),
            skipped_fields: skipped.into_iter().cloned().collect(),
            table_created,
        })
    }
}

/// Default export location: `<database dir>/<table>_<YYYYmmdd_HHMMSS>.<ext>`.
pub fn default_export_path(
    db_path: &Path,
    table: &str,
    format: DataFormat,
    now: NaiveDateTime,
) -> PathBuf {
    let stem: String = table
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let file_name = format!(
        "{}_{}.{}",
        stem,
        now.format("%Y%m%d_%H%M%S"),
        format.extension()
    );
    db_path
        .parent()
        .map(|dir| dir.join(&file_name))
        .unwrap_or_else(|| PathBuf::from(&file_name))
}

/// Pick the import format from the file extension, if it names one.
pub fn format_from_extension(path: &Path) -> Option<DataFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(|ext| ext.parse().ok())
}

/// Write export content, creating parent directories. Returns bytes written.
pub async fn write_export(path: &Path, content: &[u8]) -> DbResult<u64> {
    create_parent_dirs(path).await?;
    tokio::fs::write(path, content)
        .await
        .map_err(|e| DbError::from_io(path, e))?;
    Ok(content.len() as u64)
}

/// Read an import file.
pub async fn read_import(path: &Path) -> DbResult<Vec<u8>> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| DbError::from_io(path, e))?;
    if meta.is_dir() {
        return Err(DbError::invalid_input(format!(
            "{} is a directory, not a data file",
            path.display()
        )));
    }
    tokio::fs::read(path)
        .await
        .map_err(|e| DbError::from_io(path, e))
}

fn create_table_sql(table: &str, fields: &[String]) -> String {
    let columns = fields
        .iter()
        .map(|f| format!("{} TEXT", quote_identifier(f)))
        .collect::<Vec<_>>()
        .join(", ");
    format!("CREATE TABLE {} ({})", quote_identifier(table), columns)
}

/// Render rows as CSV with a header line; NULL becomes an empty field.
pub fn write_csv(columns: &[String], rows: &[Row]) -> DbResult<Vec<u8>> {
    let csv_err = |e: csv::Error| DbError::internal(format!("CSV serialization failed: {}", e));

    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(columns).map_err(csv_err)?;
    for row in rows {
        let record = columns.iter().map(|c| {
            row.get(c)
                .and_then(value_to_text)
                .unwrap_or_default()
        });
        writer.write_record(record).map_err(csv_err)?;
    }
    writer
        .into_inner()
        .map_err(|e| DbError::internal(format!("CSV serialization failed: {}", e)))
}

/// Decode an import file in the given format.
pub fn parse_records(content: &[u8], format: DataFormat) -> DbResult<ParsedRecords> {
    match format {
        DataFormat::Csv => parse_csv(content),
        DataFormat::Json => parse_json(content),
    }
}

// Export writes NULL as an empty field, so read it back the same way.
fn csv_value(field: &str) -> QueryParam {
    if field.is_empty() {
        QueryParam::Null
    } else {
        QueryParam::String(field.to_string())
    }
}

/// Decode CSV with a mandatory header row. Rows whose fields are all empty are skipped.
pub fn parse_csv(content: &[u8]) -> DbResult<ParsedRecords> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(content);

    let fields: Vec<String> = reader
        .headers()
        .map_err(|e| DbError::format(format!("Cannot read CSV header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    validate_fields(&fields, "CSV header")?;

    let mut records = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record =
            record.map_err(|e| DbError::format(format!("Malformed CSV record {}: {}", line + 1, e)))?;
        if record.iter().all(|v| v.is_empty()) {
            continue;
        }
        records.push(fields.iter().cloned().zip(record.iter().map(csv_value)).collect());
    }
    Ok(ParsedRecords { fields, records })
}

/// Decode a JSON array of objects. Fields are collected in first-seen order.
pub fn parse_json(content: &[u8]) -> DbResult<ParsedRecords> {
    let value: JsonValue = serde_json::from_slice(content)
        .map_err(|e| DbError::format(format!("Invalid JSON: {}", e)))?;
    let JsonValue::Array(items) = value else {
        return Err(DbError::format("JSON file must contain an array of objects"));
    };
    if items.is_empty() {
        return Err(DbError::format("JSON file must contain a non-empty array of objects"));
    }

    let mut fields: Vec<String> = Vec::new();
    let mut records = Vec::with_capacity(items.len());
    for (i, item) in items.into_iter().enumerate() {
        let JsonValue::Object(map) = item else {
            return Err(DbError::format(format!(
                "JSON array element {} is not an object",
                i
            )));
        };
        let mut record = Vec::with_capacity(map.len());
        for (key, value) in map {
            if !fields.contains(&key) {
                fields.push(key.clone());
            }
            record.push((key, QueryParam::from(value)));
        }
        records.push(record);
    }
    validate_fields(&fields, "JSON object keys")?;
    Ok(ParsedRecords { fields, records })
}

fn validate_fields(fields: &[String], what: &str) -> DbResult<()> {
    if fields.is_empty() {
        return Err(DbError::format(format!("{} contains no fields", what)));
    }
    if fields.iter().any(|f| f.is_empty()) {
        return Err(DbError::format(format!("{} contains an empty field name", what)));
    }
    Ok(())
}
