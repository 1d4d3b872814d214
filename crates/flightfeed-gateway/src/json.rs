//! JSON request and response types for the HTTP gateway.

use flightfeed_core::broadcast::SubscriberInfo;
use flightfeed_core::{FeedStatus, Identifier};
use serde::{Deserialize, Serialize};

/// Query string accepted by `/schedule` and `/stream`.
#[derive(Debug, Default, Deserialize)]
pub struct FeedParams {
    /// Catch-up token: the last identifier the client saw.
    #[serde(rename = "last-known-id")]
    pub last_known_id: Option<String>,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `healthy`, or `stopping` once shutdown began.
    pub status: String,
    /// Gateway version.
    pub version: String,
    /// Attached live subscribers.
    pub subscribers: usize,
    /// Last delivered identifier.
    pub last_id: Option<Identifier>,
}

/// One attached subscriber in the status report.
#[derive(Debug, Serialize)]
pub struct SubscriberJson {
    pub id: u64,
    pub age_ms: u64,
    pub events_sent: u64,
    pub queued: usize,
}

impl From<&SubscriberInfo> for SubscriberJson {
    fn from(info: &SubscriberInfo) -> Self {
        Self {
            id: info.id,
            age_ms: info.age.as_millis() as u64,
            events_sent: info.events_sent,
            queued: info.queued,
        }
    }
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Feed state and counters.
    #[serde(flatten)]
    pub feed: FeedStatus,
    /// Attached subscribers.
    pub sessions: Vec<SubscriberJson>,
}
