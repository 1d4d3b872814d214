//! Schedule endpoint: JSON catch-up or live stream, chosen by `Accept`.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use flightfeed_core::{Opened, SessionRequest};
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::json::FeedParams;
use crate::routes::stream::open_stream;
use crate::routes::{negotiate, resolve_since, Format};
use crate::AppState;

/// Schedule routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/schedule", get(schedule))
}

async fn schedule(
    State(state): State<AppState>,
    Query(params): Query<FeedParams>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let since = resolve_since(&params, &headers)?;

    match negotiate(&headers)? {
        Format::EventStream => open_stream(&state, since),
        Format::Json => {
            let request = SessionRequest::Snapshot { since };
            match state.feed.open_session(request, CancellationToken::new()) {
                Opened::Snapshot(batch) => {
                    tracing::debug!(since = ?since, records = batch.len(), "schedule snapshot");
                    Ok(Json(batch.records).into_response())
                }
                Opened::Stream(_) => Err(AppError::Internal(
                    "snapshot request produced a stream".into(),
                )),
            }
        }
    }
}
