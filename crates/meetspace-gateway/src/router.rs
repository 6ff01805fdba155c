use axum::Router;
use axum::middleware;
use axum::routing::{get, post};
use tower_http::trace::TraceLayer;

use crate::api;
use crate::identity;
use crate::state::SharedState;

/// Build the main application router with all routes.
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/stream", post(api::stream_reply))
        .route("/history", get(api::history))
        .route("/clear", post(api::clear))
        .route("/api/status", get(api::status))
        .layer(middleware::from_fn(identity::ensure_identity))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
