//! `sqlite-mcp-server` binary.
//!
//! Parses the command line, sets up logging and serves MCP over the chosen
//! transport until shutdown.

use clap::Parser;
use sqlite_mcp_server::config::{Config, ServerSettings, TransportMode};
use sqlite_mcp_server::error::DbResult;
use sqlite_mcp_server::transport::{HttpTransport, StdioTransport, Transport};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logging is opt-in. When enabled it writes to stderr, since stdout belongs
/// to the protocol in stdio mode.
fn init_tracing(config: &Config) {
    if !config.enable_logs {
        return;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));
    let registry = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().with_ansi(false).with_writer(std::io::stderr))
            .init();
    }
}

async fn serve(config: &Config, settings: ServerSettings) -> DbResult<()> {
    match config.transport {
        TransportMode::Stdio => StdioTransport::new(settings).run().await,
        TransportMode::Http => {
            HttpTransport::new(
                settings,
                &config.http_host,
                config.http_port,
                &config.mcp_endpoint,
            )
            .run()
            .await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();
    init_tracing(&config);

    let settings = match config.settings() {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("sqlite-mcp-server: {}", e);
            eprintln!("Usage: sqlite-mcp-server [--allowed-root <dir>] [--transport stdio|http]");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        transport = %config.transport,
        allowed_root = ?settings.path_policy.allowed_root(),
        default_format = %settings.default_format,
        "sqlite-mcp-server starting"
    );

    match serve(&config, settings).await {
        Ok(()) => {
            info!("Shut down cleanly");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Transport failed");
            eprintln!("sqlite-mcp-server: {}", e);
            ExitCode::FAILURE
        }
    }
}
