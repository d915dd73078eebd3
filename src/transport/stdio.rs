//! Stdio transport: JSON-RPC frames on stdin/stdout, the usual mode when
//! an MCP client launches the server as a subprocess.

use crate::config::ServerSettings;
use crate::error::{DbError, DbResult};
use crate::mcp::SqliteService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::{ServiceExt, transport::stdio};
use tracing::{info, warn};

/// Serves one MCP session over stdin/stdout.
pub struct StdioTransport {
    settings: ServerSettings,
}

impl StdioTransport {
    pub fn new(settings: ServerSettings) -> Self {
        Self { settings }
    }
}

impl Transport for StdioTransport {
    async fn run(&self) -> DbResult<()> {
        info!("Starting MCP server with stdio transport");

        let running = SqliteService::new(self.settings.clone())
            .serve(stdio())
            .await
            .map_err(|e| DbError::internal(format!("Failed to start stdio transport: {}", e)))?;

        tokio::select! {
            result = running.waiting() => match result {
                Ok(reason) => {
                    info!(reason = ?reason, "Client closed the stdio session");
                    Ok(())
                }
                Err(e) => {
                    warn!(error = %e, "Stdio session ended with an error");
                    Err(DbError::internal(format!("Stdio transport error: {}", e)))
                }
            },
            _ = wait_for_signal() => {
                // A pending stdin read cannot be cancelled, and no connection
                // outlives its tool call, so leave the process directly.
                info!("Shutdown signal received, exiting");
                std::process::exit(0)
            }
        }
    }

    fn name(&self) -> &'static str {
        "stdio"
    }
}
