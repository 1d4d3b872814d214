//! Feed status endpoint.

use axum::{extract::State, routing::get, Json, Router};

use crate::json::{StatusResponse, SubscriberJson};
use crate::AppState;

/// Status routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/status", get(status))
}

async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        feed: state.feed.status(),
        sessions: state.feed.subscribers().iter().map(SubscriberJson::from).collect(),
    })
}
