//! Live stream endpoint.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{sse::Sse, IntoResponse, Response},
    routing::get,
    Router,
};
use flightfeed_core::{Identifier, Opened, SessionRequest};

use crate::error::AppError;
use crate::json::FeedParams;
use crate::routes::resolve_since;
use crate::sse::session_stream;
use crate::AppState;

/// Stream routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/stream", get(stream))
}

async fn stream(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let since = resolve_since(&params, &headers)?;
    open_stream(&state, since)
}

/// Attach a streaming session and wrap it as an SSE response.
pub(crate) fn open_stream(state: &AppState, since: Option<Identifier>) -> Result<Response, AppError> {
    let request = SessionRequest::Stream { since };
    match state.feed.open_session(request, state.shutdown.child_token()) {
        Opened::Stream(session) => {
            tracing::info!(
                subscriber_id = session.id(),
                since = ?since,
                subscribers = state.feed.subscriber_count(),
                "stream opened"
            );
            Ok(Sse::new(session_stream(session)).into_response())
        }
        Opened::Snapshot(_) => Err(AppError::Internal(
            "stream request produced a snapshot".into(),
        )),
    }
}
