//! Database file lifecycle: creation, backup and statistics.

use crate::db::connection::{DbHandle, OpenMode, SqliteConnector};
use crate::db::schema::SchemaInspector;
use crate::error::{DbError, DbResult};
use crate::models::{BackupReport, CreatedDatabase, DatabaseInfo, StorageStats};
use sqlx::sqlite::SqliteConnection;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// File-level maintenance operations.
pub struct DatabaseMaintenance;

impl DatabaseMaintenance {
    /// Create a new, empty database file.
    ///
    /// The file is created exclusively, so an existing file is reported as
    /// `AlreadyExists` and never opened or modified.
    pub async fn create_database(
        connector: &SqliteConnector,
        raw_path: &str,
    ) -> DbResult<CreatedDatabase> {
        let path = connector.resolve(raw_path)?;
        create_parent_dirs(&path).await?;

        tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| DbError::from_io(&path, e))?;

        let mut handle = match connector.open_resolved(path.clone(), OpenMode::Create).await {
            Ok(handle) => handle,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        // A write transaction makes SQLite emit the file header.
        let result = async {
            sqlx::query("PRAGMA user_version = 0")
                .execute(handle.conn())
                .await?;
            sqlite_version(handle.conn()).await
        }
        .await;
        handle.close().await;

        let sqlite_version = match result {
            Ok(version) => version,
            Err(e) => {
                let _ = tokio::fs::remove_file(&path).await;
                return Err(e);
            }
        };

        let size_bytes = file_size(&path).await?;
        info!(path = %path.display(), size_bytes, "Created SQLite database");
        Ok(CreatedDatabase {
            path: path.display().to_string(),
            sqlite_version,
            size_bytes,
        })
    }

    /// Copy a database with `VACUUM INTO`, producing a consistent snapshot.
    pub async fn backup_database(
        connector: &SqliteConnector,
        raw_source: &str,
        raw_target: &str,
        overwrite: bool,
    ) -> DbResult<BackupReport> {
        let source = connector.resolve(raw_source)?;
        let target = connector.resolve(raw_target)?;
        if target.to_str().is_none() {
            return Err(DbError::invalid_input("Backup path must be valid UTF-8"));
        }

        let handle = connector
            .open_resolved(source.clone(), OpenMode::ReadOnly)
            .await?;

        let overwritten = Self::vacuum_into(handle, &source, &target, overwrite).await?;

        let report = BackupReport {
            source_path: source.display().to_string(),
            backup_path: target.display().to_string(),
            source_size_bytes: file_size(&source).await?,
            backup_size_bytes: file_size(&target).await?,
            overwritten,
        };
        info!(
            source = %report.source_path,
            backup = %report.backup_path,
            bytes = report.backup_size_bytes,
            "Backed up SQLite database"
        );
        Ok(report)
    }

    /// Snapshot into a sibling staging file, then rename it over `target`.
    /// An existing target is only replaced once the copy has succeeded.
    async fn vacuum_into(
        mut handle: DbHandle,
        source: &Path,
        target: &Path,
        overwrite: bool,
    ) -> DbResult<bool> {
        let result = async {
            if same_file(source, target).await {
                return Err(DbError::invalid_input(
                    "Backup path must differ from the source database",
                ));
            }

            let overwritten = match tokio::fs::metadata(target).await {
                Ok(meta) if meta.is_dir() => {
                    return Err(DbError::invalid_input(format!(
                        "{} is a directory",
                        target.display()
                    )));
                }
                Ok(_) if !overwrite => return Err(DbError::already_exists(target)),
                Ok(_) => true,
                Err(e) if e.kind() == ErrorKind::NotFound => false,
                Err(e) => return Err(DbError::from_io(target, e)),
            };
            create_parent_dirs(target).await?;

            let staging = staging_path(target);
            let staging_str = staging
                .to_str()
                .ok_or_else(|| DbError::invalid_input("Backup path must be valid UTF-8"))?;
            let copied = async {
                sqlx::query("VACUUM INTO ?1")
                    .bind(staging_str)
                    .execute(handle.conn())
                    .await?;
                tokio::fs::rename(&staging, target)
                    .await
                    .map_err(|e| DbError::from_io(target, e))
            }
            .await;
            if let Err(e) = copied {
                match tokio::fs::remove_file(&staging).await {
                    Err(cleanup) if cleanup.kind() != ErrorKind::NotFound => {
                        warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging file");
                    }
                    _ => {}
                }
                return Err(e);
            }
            debug!(target = %target.display(), "VACUUM INTO completed");
            Ok(overwritten)
        }
        .await;
        handle.close().await;
        result
    }

    /// Gather file, storage and catalog statistics.
    pub async fn database_info(
        connector: &SqliteConnector,
        raw_path: &str,
    ) -> DbResult<DatabaseInfo> {
        let mut handle = connector.open(raw_path, OpenMode::ReadOnly).await?;
        let path = handle.path().to_path_buf();

        let result = async {
            let conn = handle.conn();
            let storage = storage_stats(conn).await?;
            let objects = SchemaInspector::catalog_counts(conn).await?;
            let tables = SchemaInspector::table_summaries(conn).await?;
            Ok::<_, DbError>((storage, objects, tables))
        }
        .await;
        handle.close().await;
        let (storage, objects, tables) = result?;

        let file_size_bytes = file_size(&path).await?;
        Ok(DatabaseInfo {
            path: path.display().to_string(),
            file_size_bytes,
            file_size: format_size(file_size_bytes),
            storage,
            objects,
            total_rows: tables.iter().map(|t| t.row_count).sum(),
            tables,
        })
    }
}

/// Read page and journal statistics plus the engine version.
pub async fn storage_stats(conn: &mut SqliteConnection) -> DbResult<StorageStats> {
    let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
        .fetch_one(&mut *conn)
        .await?;
    let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
        .fetch_one(&mut *conn)
        .await?;
    let freelist_count: i64 = sqlx::query_scalar("PRAGMA freelist_count")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = sqlx::query_scalar("PRAGMA journal_mode")
        .fetch_one(&mut *conn)
        .await?;

    Ok(StorageStats {
        page_size,
        page_count,
        freelist_count,
        journal_mode,
        sqlite_version: sqlite_version(conn).await?,
    })
}

async fn sqlite_version(conn: &mut SqliteConnection) -> DbResult<String> {
    let version: String = sqlx::query_scalar("SELECT sqlite_version()")
        .fetch_one(&mut *conn)
        .await?;
    Ok(version)
}

/// Format bytes as a human-readable size (1024-based units).
pub fn format_size(bytes: u64) -> String {
    humansize::format_size(bytes, humansize::WINDOWS)
}

async fn file_size(path: &Path) -> DbResult<u64> {
    let meta = tokio::fs::metadata(path)
        .await
        .map_err(|e| DbError::from_io(path, e))?;
    Ok(meta.len())
}

/// Create the directories leading up to `path`.
pub async fn create_parent_dirs(path: &Path) -> DbResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| DbError::from_io(parent, e)),
        _ => Ok(()),
    }
}

/// Hidden file next to `target` that `VACUUM INTO` writes before the rename.
fn staging_path(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default();
    target.with_file_name(format!(".{}.{}-{}.partial", name, std::process::id(), stamp))
}

async fn same_file(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}
