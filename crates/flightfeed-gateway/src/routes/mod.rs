//! HTTP route handlers.

pub mod health;
pub mod metrics;
pub mod schedule;
pub mod status;
pub mod stream;

use axum::http::{header, HeaderMap};
use flightfeed_core::Identifier;

use crate::error::AppError;
use crate::json::FeedParams;

/// Header carrying the last event id on `EventSource` reconnects.
pub const LAST_EVENT_ID: &str = "last-event-id";

/// Catch-up bound from the `last-known-id` query parameter, falling back to
/// the `Last-Event-ID` header. A token that is present but malformed is a
/// bad request.
pub fn resolve_since(params: &FeedParams, headers: &HeaderMap) -> Result<Option<Identifier>, AppError> {
    let token = match params.last_known_id.as_deref() {
        Some(token) => Some(token),
        None => headers
            .get(LAST_EVENT_ID)
            .map(|value| {
                value
                    .to_str()
                    .map_err(|_| AppError::BadRequest("Last-Event-ID is not valid text".into()))
            })
            .transpose()?,
    };

    token
        .map(Identifier::parse)
        .transpose()
        .map_err(AppError::from)
}

/// Representation requested through `Accept`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// One-shot JSON array.
    Json,
    /// Server-sent events.
    EventStream,
}

/// Pick a representation from the `Accept` header.
///
/// The first supported media range wins. A missing header means JSON.
pub fn negotiate(headers: &HeaderMap) -> Result<Format, AppError> {
    let Some(accept) = headers.get(header::ACCEPT) else {
        return Ok(Format::Json);
    };
    let accept = accept
        .to_str()
        .map_err(|_| AppError::NotAcceptable("Accept header is not valid text".into()))?;

    for range in accept.split(',') {
        let media = range.split(';').next().unwrap_or_default().trim();
        if media.eq_ignore_ascii_case("text/event-stream") {
            return Ok(Format::EventStream);
        }
        if media.eq_ignore_ascii_case("application/json")
            || media.eq_ignore_ascii_case("application/*")
            || media == "*/*"
        {
            return Ok(Format::Json);
        }
    }

    Err(AppError::NotAcceptable(format!(
        "unsupported Accept `{accept}`; use application/json or text/event-stream"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn accept(value: &'static str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static(value));
        headers
    }

    #[test]
    fn test_negotiate() {
        assert_eq!(negotiate(&HeaderMap::new()).unwrap(), Format::Json);
        assert_eq!(negotiate(&accept("application/json")).unwrap(), Format::Json);
        assert_eq!(negotiate(&accept("*/*")).unwrap(), Format::Json);
        assert_eq!(
            negotiate(&accept("text/event-stream")).unwrap(),
            Format::EventStream
        );
        assert_eq!(
            negotiate(&accept("text/html, text/event-stream;q=0.9")).unwrap(),
            Format::EventStream
        );
        assert!(matches!(
            negotiate(&accept("text/html")),
            Err(AppError::NotAcceptable(_))
        ));
    }

    #[test]
    fn test_resolve_since() {
        let mut headers = HeaderMap::new();
        let none = FeedParams::default();
        assert_eq!(resolve_since(&none, &headers).unwrap(), None);

        headers.insert(LAST_EVENT_ID, HeaderValue::from_static("41"));
        assert_eq!(
            resolve_since(&none, &headers).unwrap(),
            Some(Identifier::new(41))
        );

        let param = FeedParams {
            last_known_id: Some("7".into()),
        };
        assert_eq!(
            resolve_since(&param, &headers).unwrap(),
            Some(Identifier::new(7))
        );

        let bad = FeedParams {
            last_known_id: Some("seven".into()),
        };
        assert!(matches!(
            resolve_since(&bad, &headers),
            Err(AppError::BadRequest(_))
        ));
    }
}
