//! Streamable HTTP transport.
//!
//! Each MCP session gets its own [`SqliteService`] built from the shared
//! [`ServerSettings`]; rmcp's streamable HTTP service is mounted on an
//! axum router at the configured endpoint.

use crate::config::ServerSettings;
use crate::error::{DbError, DbResult};
use crate::mcp::SqliteService;
use crate::transport::{Transport, wait_for_signal};
use rmcp::transport::streamable_http_server::{
    StreamableHttpService, session::local::LocalSessionManager,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tracing::{error, info, warn};

/// Upper bound on the graceful phase; open SSE streams would otherwise keep the server alive.
const GRACEFUL_TIMEOUT: Duration = Duration::from_secs(30);

/// Serves MCP over HTTP with SSE streaming responses.
pub struct HttpTransport {
    settings: ServerSettings,
    host: String,
    port: u16,
    endpoint: String,
}

/// Canonical endpoint form: one leading slash, no trailing slash.
fn normalize_endpoint(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    format!("/{}", trimmed)
}

impl HttpTransport {
    /// Create a transport for `host:port`; `endpoint` is normalised to `/path`.
    pub fn new(
        settings: ServerSettings,
        host: impl Into<String>,
        port: u16,
        endpoint: impl AsRef<str>,
    ) -> Self {
        Self {
            settings,
            host: host.into(),
            port,
            endpoint: normalize_endpoint(endpoint.as_ref()),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn router(&self) -> axum::Router {
        let settings = self.settings.clone();
        let service = StreamableHttpService::new(
            move || Ok(SqliteService::new(settings.clone())),
            LocalSessionManager::default().into(),
            Default::default(),
        );

        // nest_service rejects "/", so the root endpoint uses the fallback.
        if self.endpoint == "/" {
            axum::Router::new().fallback_service(service)
        } else {
            axum::Router::new().nest_service(&self.endpoint, service)
        }
    }
}

/// Resolves once shutdown has started and then either the timeout elapses
/// or a second signal arrives.
async fn forced_exit(started: Arc<Notify>) {
    started.notified().await;
    info!(
        timeout_secs = GRACEFUL_TIMEOUT.as_secs(),
        "Waiting for open sessions to close (signal again to force exit)"
    );
    tokio::select! {
        _ = tokio::time::sleep(GRACEFUL_TIMEOUT) => warn!("Graceful shutdown timed out"),
        _ = wait_for_signal() => warn!("Second signal received, exiting now"),
    }
}

impl Transport for HttpTransport {
    async fn run(&self) -> DbResult<()> {
        let bind_addr = self.bind_addr();
        let listener = TcpListener::bind(&bind_addr).await.map_err(|e| {
            DbError::internal(format!(
                "Cannot listen on {}: {}. Is the port already in use?",
                bind_addr, e
            ))
        })?;
        info!(addr = %bind_addr, endpoint = %self.endpoint, "HTTP transport listening");

        let started = Arc::new(Notify::new());
        let trigger = started.clone();
        let server = axum::serve(listener, self.router()).with_graceful_shutdown(async move {
            wait_for_signal().await;
            trigger.notify_one();
        });

        tokio::select! {
            result = server => match result {
                Ok(()) => info!("HTTP server stopped"),
                Err(e) => {
                    error!(error = %e, "HTTP server failed");
                    return Err(DbError::internal(format!("HTTP server error: {}", e)));
                }
            },
            _ = forced_exit(started) => {}
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
