//! Error types for the SQLite MCP Server.
//!
//! Every failure a tool can hit (filesystem, engine, malformed input) is
//! folded into [`DbError`] so handlers can return it through `?` and the
//! MCP layer can turn it into a structured error response with a kind,
//! a message and, where useful, a suggestion for the caller.

use std::path::Path;
use thiserror::Error;

/// Maximum number of SQL characters echoed back in error context.
pub const MAX_SQL_CONTEXT_CHARS: usize = 200;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Database file not found: {path}")]
    NotFound { path: String },

    #[error("File already exists: {path}")]
    AlreadyExists { path: String },

    #[error("Permission denied: {path} - {reason}")]
    Permission { path: String, reason: String },

    #[error("Cannot open database {path}: {message}")]
    EngineOpen { path: String, message: String },

    #[error("Table '{table}' not found")]
    TableNotFound { table: String },

    #[error("SQL syntax error: {message}")]
    Syntax { message: String },

    #[error("SQL execution failed: {message}")]
    Execution {
        message: String,
        /// Extended SQLite result code, e.g. "2067" for a UNIQUE violation
        code: Option<String>,
    },

    #[error("Parameter mismatch: {message}")]
    ParameterMismatch { message: String },

    #[error("Invalid file format: {message}")]
    Format { message: String },

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    pub fn not_found(path: impl AsRef<Path>) -> Self {
        Self::NotFound {
            path: path.as_ref().display().to_string(),
        }
    }

    pub fn already_exists(path: impl AsRef<Path>) -> Self {
        Self::AlreadyExists {
            path: path.as_ref().display().to_string(),
        }
    }

    pub fn permission(path: impl AsRef<Path>, reason: impl Into<String>) -> Self {
        Self::Permission {
            path: path.as_ref().display().to_string(),
            reason: reason.into(),
        }
    }

    pub fn engine_open(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::EngineOpen {
            path: path.as_ref().display().to_string(),
            message: message.into(),
        }
    }

    pub fn table_not_found(table: impl Into<String>) -> Self {
        Self::TableNotFound {
            table: table.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    pub fn execution(message: impl Into<String>, code: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            code,
        }
    }

    pub fn parameter_mismatch(message: impl Into<String>) -> Self {
        Self::ParameterMismatch {
            message: message.into(),
        }
    }

    pub fn format(message: impl Into<String>) -> Self {
        Self::Format {
            message: message.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Classify a filesystem error raised while touching `path`.
    pub fn from_io(path: impl AsRef<Path>, err: std::io::Error) -> Self {
        Self::classify_io(path.as_ref(), err)
    }

    fn classify_io(path: &Path, err: std::io::Error) -> Self {
        use std::io::ErrorKind;
        match err.kind() {
            ErrorKind::NotFound => Self::not_found(path),
            ErrorKind::AlreadyExists => Self::already_exists(path),
            ErrorKind::PermissionDenied => Self::permission(path, err.to_string()),
            _ => Self::internal(format!("I/O error on {}: {}", path.display(), err)),
        }
    }

    /// Short machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::AlreadyExists { .. } => "already_exists",
            Self::Permission { .. } => "permission",
            Self::EngineOpen { .. } => "engine_open",
            Self::TableNotFound { .. } => "table_not_found",
            Self::Syntax { .. } => "syntax",
            Self::Execution { .. } => "execution",
            Self::ParameterMismatch { .. } => "parameter_mismatch",
            Self::Format { .. } => "format",
            Self::InvalidInput { .. } => "invalid_input",
            Self::Internal { .. } => "internal",
        }
    }

    /// Get the suggestion for this error, if available.
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => {
                Some("Check the path, or call create_database to create a new database file")
            }
            Self::AlreadyExists { .. } => {
                Some("Choose a different path or remove the existing file first")
            }
            Self::Permission { .. } => {
                Some("Use a path inside the allowed directory that the server can read and write")
            }
            Self::EngineOpen { .. } => Some("Verify the file is a valid SQLite database"),
            Self::TableNotFound { .. } => Some("Call list_tables to see the available tables"),
            Self::Syntax { .. } => Some("Check the SQL syntax; SQLite dialect is expected"),
            Self::ParameterMismatch { .. } => Some(
                "Supply one value per placeholder: a list for ?/?NNN, an object for :name/@name/$name",
            ),
            Self::Format { .. } => Some(
                "CSV needs a header row; JSON needs a non-empty array of objects whose keys match column names",
            ),
            Self::Execution { .. } | Self::InvalidInput { .. } | Self::Internal { .. } => None,
        }
    }
}

/// Classify sqlx errors into the tool error taxonomy.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                let code = db_err.code().map(|c| c.to_string());
                if is_syntax_message(&message) {
                    DbError::syntax(message)
                } else if let Some(table) = missing_table(&message) {
                    DbError::table_not_found(table)
                } else {
                    DbError::execution(message, code)
                }
            }
            sqlx::Error::Protocol(msg) if msg.contains("parameter") => {
                DbError::parameter_mismatch(msg)
            }
            sqlx::Error::RowNotFound => DbError::execution("No rows returned", None),
            sqlx::Error::Io(io_err) => io_err.into(),
            sqlx::Error::ColumnNotFound(col) => {
                DbError::execution(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("SQLite worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Path reported for filesystem errors that arrive without one.
const UNKNOWN_PATH: &str = "<unknown path>";

impl From<std::io::Error> for DbError {
    fn from(err: std::io::Error) -> Self {
        Self::classify_io(Path::new(UNKNOWN_PATH), err)
    }
}

fn is_syntax_message(message: &str) -> bool {
    message.contains("syntax error")
        || message.starts_with("incomplete input")
        || message.starts_with("unrecognized token")
}

/// Extract the table name from SQLite's "no such table: x" message.
fn missing_table(message: &str) -> Option<String> {
    message
        .strip_prefix("no such table: ")
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Call context attached to errors returned to the client.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    pub db_path: Option<String>,
    pub sql: Option<String>,
}

impl ErrorContext {
    pub fn for_path(db_path: impl Into<String>) -> Self {
        Self {
            db_path: Some(db_path.into()),
            sql: None,
        }
    }

    pub fn with_sql(mut self, sql: &str) -> Self {
        self.sql = Some(truncate_sql(sql));
        self
    }
}

/// Truncate SQL for inclusion in error payloads.
pub fn truncate_sql(sql: &str) -> String {
    let trimmed = sql.trim();
    if trimmed.chars().count() <= MAX_SQL_CONTEXT_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_SQL_CONTEXT_CHARS).collect();
    out.push_str("...");
    out
}

fn error_data(err: &DbError, ctx: Option<&ErrorContext>) -> serde_json::Value {
    let mut data = serde_json::Map::new();
    data.insert("kind".into(), err.kind().into());
    if let Some(s) = err.suggestion() {
        data.insert("suggestion".into(), s.into());
    }
    if let DbError::Execution { code: Some(code), .. } = err {
        data.insert("code".into(), code.clone().into());
    }
    if let Some(ctx) = ctx {
        if let Some(path) = &ctx.db_path {
            data.insert("db_path".into(), path.clone().into());
        }
        if let Some(sql) = &ctx.sql {
            data.insert("sql".into(), sql.clone().into());
        }
    }
    serde_json::Value::Object(data)
}

impl DbError {
    /// Convert into an MCP error, attaching the call context.
    pub fn into_mcp_error(self, ctx: &ErrorContext) -> rmcp::ErrorData {
        let data = Some(error_data(&self, Some(ctx)));
        mcp_error(self, data)
    }
}

fn mcp_error(err: DbError, data: Option<serde_json::Value>) -> rmcp::ErrorData {
    match &err {
        DbError::NotFound { .. } | DbError::TableNotFound { .. } => {
            rmcp::ErrorData::resource_not_found(err.to_string(), data)
        }
        DbError::EngineOpen { .. } | DbError::Internal { .. } => {
            rmcp::ErrorData::internal_error(err.to_string(), data)
        }
        DbError::AlreadyExists { .. }
        | DbError::Permission { .. }
        | DbError::Syntax { .. }
        | DbError::Execution { .. }
        | DbError::ParameterMismatch { .. }
        | DbError::Format { .. }
        | DbError::InvalidInput { .. } => rmcp::ErrorData::invalid_params(err.to_string(), data),
    }
}

/// Convert DbError to MCP ErrorData for semantic error categorization.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        let data = Some(error_data(&err, None));
        mcp_error(err, data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DbError::table_not_found("users");
        assert_eq!(err.to_string(), "Table 'users' not found");
    }

    #[test]
    fn test_error_suggestion() {
        let err = DbError::table_not_found("users");
        assert!(err.suggestion().unwrap().contains("list_tables"));
        assert!(DbError::internal("boom").suggestion().is_none());
    }

    #[test]
    fn test_not_found_maps_to_resource_not_found() {
        let mcp_err: rmcp::ErrorData = DbError::not_found("/tmp/missing.db").into();
        assert_eq!(mcp_err.code.0, -32002);
    }

    #[test]
    fn test_table_not_found_maps_to_resource_not_found() {
        let mcp_err: rmcp::ErrorData = DbError::table_not_found("t").into();
        assert_eq!(mcp_err.code.0, -32002);
    }

    #[test]
    fn test_syntax_maps_to_invalid_params() {
        let mcp_err: rmcp::ErrorData = DbError::syntax("near \"SELEC\": syntax error").into();
        assert_eq!(mcp_err.code.0, -32602);
    }

    #[test]
    fn test_engine_open_maps_to_internal_error() {
        let mcp_err: rmcp::ErrorData =
            DbError::engine_open("/tmp/x.db", "file is not a database").into();
        assert_eq!(mcp_err.code.0, -32603);
    }

    #[test]
    fn test_error_data_carries_kind_and_suggestion() {
        let mcp_err: rmcp::ErrorData = DbError::already_exists("/tmp/a.db").into();
        let data = mcp_err.data.unwrap();
        assert_eq!(data["kind"], "already_exists");
        assert!(data["suggestion"].as_str().is_some());
    }

    #[test]
    fn test_error_context_is_attached() {
        let ctx = ErrorContext::for_path("/tmp/app.db").with_sql("SELECT * FROM nope");
        let mcp_err = DbError::table_not_found("nope").into_mcp_error(&ctx);
        let data = mcp_err.data.unwrap();
        assert_eq!(data["db_path"], "/tmp/app.db");
        assert_eq!(data["sql"], "SELECT * FROM nope");
    }

    #[test]
    fn test_execution_code_in_data() {
        let err = DbError::execution("UNIQUE constraint failed: t.id", Some("2067".into()));
        let mcp_err: rmcp::ErrorData = err.into();
        assert_eq!(mcp_err.data.unwrap()["code"], "2067");
    }

    #[test]
    fn test_truncate_sql() {
        let long = "x".repeat(500);
        let truncated = truncate_sql(&long);
        assert_eq!(truncated.chars().count(), MAX_SQL_CONTEXT_CHARS + 3);
        assert!(truncated.ends_with("..."));
        assert_eq!(truncate_sql("  SELECT 1  "), "SELECT 1");
    }

    #[test]
    fn test_io_conversions_agree() {
        use std::io::{Error, ErrorKind};

        let with_path = DbError::from_io("/data/app.db", Error::from(ErrorKind::NotFound));
        let without_path: DbError = Error::from(ErrorKind::NotFound).into();
        assert_eq!(with_path.kind(), "not_found");
        assert_eq!(without_path.kind(), with_path.kind());
        assert!(with_path.to_string().contains("/data/app.db"));

        let denied: DbError = Error::from(ErrorKind::PermissionDenied).into();
        assert_eq!(denied.kind(), "permission");
        let other: DbError = Error::other("disk on fire").into();
        assert_eq!(other.kind(), "internal");
    }

    #[test]
    fn test_missing_table_extraction() {
        assert_eq!(missing_table("no such table: users"), Some("users".into()));
        assert_eq!(missing_table("no such column: x"), None);
    }

    #[test]
    fn test_syntax_message_detection() {
        assert!(is_syntax_message("near \"FORM\": syntax error"));
        assert!(is_syntax_message("incomplete input"));
        assert!(!is_syntax_message("UNIQUE constraint failed: t.id"));
    }
}
