//! Server configuration from CLI flags and `MCP_*` environment variables.
//!
//! The parsed [`Config`] is reduced to an immutable [`ServerSettings`] value
//! which every tool handler receives explicitly.

use crate::db::PathPolicy;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_HTTP_HOST: &str = "127.0.0.1";
pub const DEFAULT_HTTP_PORT: u16 = 8080;
pub const DEFAULT_MCP_ENDPOINT: &str = "/";

/// Transport mode for the MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum TransportMode {
    /// Standard input/output (for CLI integration)
    #[default]
    Stdio,
    /// HTTP with Server-Sent Events (for web clients)
    Http,
}

impl std::fmt::Display for TransportMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdio => write!(f, "stdio"),
            Self::Http => write!(f, "http"),
        }
    }
}

/// File format used by import and export.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    ValueEnum,
    serde::Serialize,
    serde::Deserialize,
    schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum DataFormat {
    /// Comma-separated values with a header row
    #[default]
    #[serde(alias = "CSV")]
    Csv,
    /// Array of objects keyed by column name
    #[serde(alias = "JSON")]
    Json,
}

impl DataFormat {
    /// File extension for this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for DataFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Unsupported format '{}'. Use 'csv' or 'json'",
                other
            )),
        }
    }
}

/// Command-line and environment configuration.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sqlite-mcp-server",
    about = "MCP server for SQLite - lets AI assistants inspect, query, import, export and back up SQLite files",
    version
)]
pub struct Config {
    /// Transport mode (stdio or http)
    #[arg(short, long, value_enum, default_value_t = TransportMode::Stdio, env = "MCP_TRANSPORT")]
    pub transport: TransportMode,

    /// HTTP host to bind to (http transport only)
    #[arg(long, default_value = DEFAULT_HTTP_HOST, env = "MCP_HTTP_HOST")]
    pub http_host: String,

    /// HTTP port to bind to (http transport only)
    #[arg(long, default_value_t = DEFAULT_HTTP_PORT, env = "MCP_HTTP_PORT")]
    pub http_port: u16,

    /// Path the MCP service is mounted at (http transport only)
    #[arg(long, default_value = DEFAULT_MCP_ENDPOINT, env = "MCP_ENDPOINT")]
    pub mcp_endpoint: String,

    /// Restrict every database and file path to this directory.
    /// Relative tool paths resolve against it.
    #[arg(long, value_name = "DIR", env = "MCP_ALLOWED_ROOT")]
    pub allowed_root: Option<PathBuf>,

    /// Format used by export_data/import_data when the call omits one
    #[arg(long, value_enum, default_value_t = DataFormat::Csv, env = "MCP_DEFAULT_EXPORT_FORMAT")]
    pub default_export_format: DataFormat,

    /// Tracing filter used when RUST_LOG is unset (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "MCP_LOG_LEVEL")]
    pub log_level: String,

    /// Emit log lines as JSON
    #[arg(long, env = "MCP_JSON_LOGS")]
    pub json_logs: bool,

    /// Write logs to stderr. Off by default so stdio clients see nothing but protocol frames.
    #[arg(long, env = "MCP_ENABLE_LOGS")]
    pub enable_logs: bool,
}

impl Config {
    /// Build the settings handed to tool handlers.
    ///
    /// Fails when `--allowed-root` is not an existing directory.
    pub fn settings(&self) -> Result<ServerSettings, String> {
        let path_policy = match &self.allowed_root {
            Some(root) => PathPolicy::restricted(root)?,
            None => PathPolicy::unrestricted(),
        };
        Ok(ServerSettings::new(path_policy, self.default_export_format))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            transport: TransportMode::Stdio,
            http_host: DEFAULT_HTTP_HOST.to_string(),
            http_port: DEFAULT_HTTP_PORT,
            mcp_endpoint: DEFAULT_MCP_ENDPOINT.to_string(),
            allowed_root: None,
            default_export_format: DataFormat::Csv,
            log_level: "info".to_string(),
            json_logs: false,
            enable_logs: false,
        }
    }
}

/// Immutable per-process settings passed into every tool call.
#[derive(Debug, Clone, Default)]
pub struct ServerSettings {
    /// Where database and data files may live
    pub path_policy: PathPolicy,
    /// Format used when import/export calls omit one
    pub default_format: DataFormat,
}

impl ServerSettings {
    pub fn new(path_policy: PathPolicy, default_format: DataFormat) -> Self {
        Self {
            path_policy,
            default_format,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.transport, TransportMode::Stdio);
        assert_eq!(config.http_host, DEFAULT_HTTP_HOST);
        assert_eq!(config.http_port, DEFAULT_HTTP_PORT);
        assert_eq!(config.default_export_format, DataFormat::Csv);
        assert!(config.allowed_root.is_none());
    }

    #[test]
    fn test_parse_defaults_match_default_impl() {
        let parsed = Config::try_parse_from(["sqlite-mcp-server"]).unwrap();
        let default = Config::default();
        assert_eq!(parsed.transport, default.transport);
        assert_eq!(parsed.mcp_endpoint, default.mcp_endpoint);
        assert_eq!(parsed.default_export_format, default.default_export_format);
        assert!(!parsed.enable_logs);
    }

    #[test]
    fn test_parse_cli_args() {
        let config = Config::try_parse_from([
            "sqlite-mcp-server",
            "--transport",
            "http",
            "--http-port",
            "9000",
            "--default-export-format",
            "json",
            "--allowed-root",
            "/srv/data",
        ])
        .unwrap();
        assert_eq!(config.transport, TransportMode::Http);
        assert_eq!(config.http_port, 9000);
        assert_eq!(config.default_export_format, DataFormat::Json);
        assert_eq!(config.allowed_root, Some(PathBuf::from("/srv/data")));
    }

    #[test]
    fn test_settings_unrestricted_by_default() {
        let settings = Config::default().settings().unwrap();
        assert!(settings.path_policy.allowed_root().is_none());
        assert_eq!(settings.default_format, DataFormat::Csv);
    }

    #[test]
    fn test_settings_rejects_missing_root() {
        let config = Config {
            allowed_root: Some(PathBuf::from("/definitely/not/a/real/dir")),
            ..Config::default()
        };
        assert!(config.settings().is_err());
    }

    #[test]
    fn test_data_format_from_str() {
        assert_eq!("CSV".parse::<DataFormat>().unwrap(), DataFormat::Csv);
        assert_eq!(" json ".parse::<DataFormat>().unwrap(), DataFormat::Json);
        assert!("xml".parse::<DataFormat>().is_err());
    }

    #[test]
    fn test_data_format_deserialize_aliases() {
        let f: DataFormat = serde_json::from_str("\"JSON\"").unwrap();
        assert_eq!(f, DataFormat::Json);
        let f: DataFormat = serde_json::from_str("\"csv\"").unwrap();
        assert_eq!(f, DataFormat::Csv);
    }

    #[test]
    fn test_transport_display() {
        assert_eq!(TransportMode::Stdio.to_string(), "stdio");
        assert_eq!(TransportMode::Http.to_string(), "http");
    }
}
