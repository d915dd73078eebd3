//! Path validation and per-call SQLite connections.
//!
//! Every tool call resolves its paths through a [`PathPolicy`] and opens a
//! single [`DbHandle`] for the duration of the call. Handles are never
//! pooled or shared; dropping one closes the underlying connection, and
//! handlers close it explicitly before returning.

use crate::error::{DbError, DbResult};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection};
use sqlx::{ConnectOptions, Connection};
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Restricts which filesystem locations tools may touch.
#[derive(Debug, Clone, Default)]
pub struct PathPolicy {
    allowed_root: Option<PathBuf>,
}

impl PathPolicy {
    /// Accept any path the process can reach.
    pub fn unrestricted() -> Self {
        Self { allowed_root: None }
    }

    /// Confine all paths to `root`, which must be an existing directory.
    pub fn restricted(root: impl AsRef<Path>) -> Result<Self, String> {
        let root = root.as_ref();
        let canonical = std::fs::canonicalize(root)
            .map_err(|e| format!("Allowed root {} is not accessible: {}", root.display(), e))?;
        if !canonical.is_dir() {
            return Err(format!(
                "Allowed root {} is not a directory",
                canonical.display()
            ));
        }
        Ok(Self {
            allowed_root: Some(canonical),
        })
    }

    pub fn allowed_root(&self) -> Option<&Path> {
        self.allowed_root.as_deref()
    }

    /// Validate a caller-supplied path and return the path to use.
    ///
    /// With a root configured, relative paths resolve under it and the
    /// result (after `..` normalisation and symlink resolution of the
    /// existing prefix) must stay inside it.
    pub fn resolve(&self, raw: &str) -> DbResult<PathBuf> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DbError::invalid_input("Path must not be empty"));
        }
        let path = PathBuf::from(trimmed);

        let Some(root) = &self.allowed_root else {
            return Ok(path);
        };

        let joined = if path.is_absolute() {
            path
        } else {
            root.join(path)
        };
        let normalized = normalize_lexically(&joined)
            .ok_or_else(|| DbError::permission(&joined, "path climbs above the filesystem root"))?;
        let real = resolve_existing_prefix(&normalized).unwrap_or(normalized);

        if !real.starts_with(root) {
            warn!(path = %real.display(), root = %root.display(), "Rejected path outside allowed root");
            return Err(DbError::permission(
                &real,
                format!("path is outside the allowed directory {}", root.display()),
            ));
        }
        Ok(real)
    }
}

/// Remove `.` and `..` components without touching the filesystem.
fn normalize_lexically(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    return None;
                }
            }
            Component::Normal(part) => out.push(part),
        }
    }
    Some(out)
}

/// Canonicalize the longest existing ancestor and re-append the rest.
fn resolve_existing_prefix(path: &Path) -> Option<PathBuf> {
    let mut existing = path;
    let mut rest = Vec::new();
    loop {
        if let Ok(real) = std::fs::canonicalize(existing) {
            let mut out = real;
            for part in rest.iter().rev() {
                out.push(part);
            }
            return Some(out);
        }
        rest.push(existing.file_name()?.to_os_string());
        existing = existing.parent()?;
    }
}

/// How a tool needs to open its database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Inspection only; the file must exist.
    ReadOnly,
    /// Reads and writes; the file must exist.
    ReadWrite,
    /// Create the file if it is absent.
    Create,
}

/// One open connection to one database file.
pub struct DbHandle {
    path: PathBuf,
    conn: SqliteConnection,
}

impl DbHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn conn(&mut self) -> &mut SqliteConnection {
        &mut self.conn
    }

    /// Close the connection, logging rather than failing on close errors.
    pub async fn close(self) {
        let path = self.path;
        if let Err(e) = self.conn.close().await {
            warn!(path = %path.display(), error = %e, "Error closing SQLite connection");
        }
    }
}

/// Opens SQLite files on behalf of tool handlers.
#[derive(Debug, Clone, Default)]
pub struct SqliteConnector {
    policy: PathPolicy,
}

impl SqliteConnector {
    pub fn new(policy: PathPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &PathPolicy {
        &self.policy
    }

    /// Resolve a path through the configured policy.
    pub fn resolve(&self, raw: &str) -> DbResult<PathBuf> {
        self.policy.resolve(raw)
    }

    /// Validate `raw` and open a connection in the requested mode.
    pub async fn open(&self, raw: &str, mode: OpenMode) -> DbResult<DbHandle> {
        let path = self.resolve(raw)?;
        self.open_resolved(path, mode).await
    }

    /// Open `raw`, run `op` on the connection, then close it whatever the outcome.
    pub async fn with_connection<T>(
        &self,
        raw: &str,
        mode: OpenMode,
        op: impl AsyncFnOnce(&mut SqliteConnection) -> DbResult<T>,
    ) -> DbResult<T> {
        let mut handle = self.open(raw, mode).await?;
        let result = op(handle.conn()).await;
        handle.close().await;
        result
    }

    /// Open an already-resolved path.
    pub async fn open_resolved(&self, path: PathBuf, mode: OpenMode) -> DbResult<DbHandle> {
        if mode != OpenMode::Create {
            let meta = tokio::fs::metadata(&path)
                .await
                .map_err(|e| DbError::from_io(&path, e))?;
            if meta.is_dir() {
                return Err(DbError::invalid_input(format!(
                    "{} is a directory, not a database file",
                    path.display()
                )));
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(mode == OpenMode::Create)
            .read_only(mode == OpenMode::ReadOnly);

        let mut conn = match options.connect().await {
            Ok(conn) => conn,
            Err(e) => return Err(open_error(&path, e)),
        };

        // The header is only read on first access, so probe the catalog.
        if let Err(e) = sqlx::query("SELECT count(*) FROM sqlite_master")
            .fetch_one(&mut conn)
            .await
        {
            let _ = conn.close().await;
            return Err(open_error(&path, e));
        }

        debug!(path = %path.display(), mode = ?mode, "Opened SQLite database");
        Ok(DbHandle { path, conn })
    }
}

fn open_error(path: &Path, err: sqlx::Error) -> DbError {
    match err {
        sqlx::Error::Io(io) => DbError::from_io(path, io),
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            if let Err(io) = std::fs::File::open(path) {
                if io.kind() == std::io::ErrorKind::PermissionDenied {
                    return DbError::permission(path, io.to_string());
                }
            }
            DbError::engine_open(path, message)
        }
        other => DbError::engine_open(path, other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_lexically() {
        assert_eq!(
            normalize_lexically(Path::new("/a/b/../c/./d.db")),
            Some(PathBuf::from("/a/c/d.db"))
        );
        assert_eq!(normalize_lexically(Path::new("/../etc")), None);
    }

    #[test]
    fn test_unrestricted_passes_path_through() {
        let policy = PathPolicy::unrestricted();
        assert_eq!(
            policy.resolve(" data/app.db ").unwrap(),
            PathBuf::from("data/app.db")
        );
    }

    #[test]
    fn test_empty_path_rejected() {
        let err = PathPolicy::unrestricted().resolve("   ").unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[test]
    fn test_restricted_resolves_relative_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy::restricted(dir.path()).unwrap();
        let resolved = policy.resolve("sub/app.db").unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();
        assert_eq!(resolved, root.join("sub/app.db"));
    }

    #[test]
    fn test_restricted_rejects_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let policy = PathPolicy::restricted(dir.path()).unwrap();
        let err = policy.resolve("../outside.db").unwrap_err();
        assert!(matches!(err, DbError::Permission { .. }));
        let err = policy.resolve("/etc/passwd").unwrap_err();
        assert!(matches!(err, DbError::Permission { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn test_restricted_rejects_symlink_escape() {
        let root = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), root.path().join("link")).unwrap();
        let policy = PathPolicy::restricted(root.path()).unwrap();
        let err = policy.resolve("link/app.db").unwrap_err();
        assert!(matches!(err, DbError::Permission { .. }));
    }

    #[test]
    fn test_restricted_requires_existing_directory() {
        assert!(PathPolicy::restricted("/no/such/root/dir").is_err());
    }

    #[tokio::test]
    async fn test_open_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let connector = SqliteConnector::default();
        let missing = dir.path().join("missing.db");
        let err = connector
            .open(missing.to_str().unwrap(), OpenMode::ReadOnly)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::NotFound { .. }));
        assert!(!missing.exists());
    }

    #[tokio::test]
    async fn test_open_garbage_file_is_engine_open_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.db");
        std::fs::write(&path, b"this is definitely not a sqlite database file header").unwrap();
        let err = SqliteConnector::default()
            .open(path.to_str().unwrap(), OpenMode::ReadOnly)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::EngineOpen { .. }), "{:?}", err);
    }

    #[tokio::test]
    async fn test_open_directory_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = SqliteConnector::default()
            .open(dir.path().to_str().unwrap(), OpenMode::ReadWrite)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, DbError::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_create_mode_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("new.db");
        let handle = SqliteConnector::default()
            .open(path.to_str().unwrap(), OpenMode::Create)
            .await
            .unwrap();
        assert_eq!(handle.path(), path.as_path());
        handle.close().await;
        assert!(path.exists());
    }
}
