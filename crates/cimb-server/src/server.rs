use std::sync::Arc;

use tokio::net::TcpListener;

use cimb_auth::ServerAuthenticator;

use crate::config::ServerConfig;
use crate::dispatch::{EchoHandler, RequestHandler};
use crate::error::{ServerError, ServerResult};
use crate::handler::AppState;
use crate::router::build_router;
use crate::stats::RequestStats;

/// CIM broker HTTP server.
pub struct CimServer {
    config: ServerConfig,
    state: AppState,
}

impl CimServer {
    /// A server that echoes every payload back. Use
    /// [`with_handler`](Self::with_handler) to plug in real dispatch.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_handler(config, Arc::new(EchoHandler))
    }

    pub fn with_handler(config: ServerConfig, handler: Arc<dyn RequestHandler>) -> Self {
        let state = AppState {
            auth: Arc::new(ServerAuthenticator::new(config.auth.clone())),
            handler,
            stats: Arc::new(RequestStats::new()),
        };
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn stats(&self) -> Arc<RequestStats> {
        Arc::clone(&self.state.stats)
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), self.config.max_payload_size)
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        self.config.validate()?;
        let app = self.router();
        let listener = TcpListener::bind((self.config.bind_host.as_str(), self.config.port)).await?;
        tracing::info!(
            auth = self.config.auth.enabled,
            "CIM server listening on {}",
            self.config.bind_display()
        );
        axum::serve(listener, app)
            .await
            .map_err(|e| ServerError::Internal(e.to_string()))
    }
}
