//! Health check endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::json::HealthResponse;
use crate::AppState;

/// Health check routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let stopping = state.shutdown.is_cancelled() || state.feed.is_closed();

    Json(HealthResponse {
        status: if stopping { "stopping" } else { "healthy" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        subscribers: state.feed.subscriber_count(),
        last_id: state.feed.last_id(),
    })
}
