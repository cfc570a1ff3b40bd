use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all broker endpoints.
///
/// Request bodies over `max_payload_size` bytes are refused with 413 before
/// the handler runs.
pub fn build_router(state: AppState, max_payload_size: usize) -> Router {
    Router::new()
        .route("/health", get(handler::health_handler))
        .route("/cimom", post(handler::cimom_handler))
        .layer(DefaultBodyLimit::max(max_payload_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
