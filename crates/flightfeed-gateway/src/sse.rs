//! Server-sent event encoding of session output.

use axum::response::sse::Event;
use flightfeed_core::{CatchUp, FeedEvent, Session, SessionEvent};
use futures::stream::{self, Stream};

/// Event name of a single live record.
pub const SCHEDULED_DEPARTURE_EVENT: &str = "scheduled_departure";

/// Event name of the catch-up batch.
pub const DAILY_SCHEDULE_EVENT: &str = "daily_schedule";

/// Encode the catch-up batch as one event carrying a JSON array.
pub fn catch_up_event(batch: &CatchUp) -> Result<Event, axum::Error> {
    let event = Event::default().event(DAILY_SCHEDULE_EVENT);
    let event = match batch.last_id {
        Some(id) => event.id(id.to_string()),
        None => event,
    };
    event.json_data(&batch.records)
}

/// Encode a live event.
pub fn feed_event(event: &FeedEvent) -> Result<Event, axum::Error> {
    match event {
        FeedEvent::Departure(record) => Event::default()
            .event(SCHEDULED_DEPARTURE_EVENT)
            .id(record.id().to_string())
            .json_data(record.as_ref()),
        FeedEvent::KeepAlive(at) => {
            Ok(Event::default().comment(format!("keep-alive#{}", at.timestamp_millis())))
        }
    }
}

/// Turn a session into an SSE stream.
///
/// The catch-up batch, if any, is emitted first; live events follow until
/// the session ends. Nothing is emitted once the session is cancelled.
/// Dropping the stream drops the session, which detaches it from the feed.
pub fn session_stream(
    session: Session,
) -> impl Stream<Item = Result<Event, axum::Error>> + Send + 'static {
    stream::unfold(session, |mut session| async move {
        let event = match session.next().await? {
            SessionEvent::CatchUp(batch) => catch_up_event(&batch),
            SessionEvent::Live(event) => feed_event(&event),
        };
        Some((event, session))
    })
}
