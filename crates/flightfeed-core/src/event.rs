//! Events carried on the broadcast channel.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::record::{Identifier, Record};

/// A single live event delivered to attached subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// A newly due record.
    Departure(Arc<Record>),
    /// Periodic marker keeping idle connections open. Carries no data.
    KeepAlive(DateTime<Utc>),
}

impl FeedEvent {
    /// Keep-alive stamped with the current time.
    pub fn keep_alive() -> Self {
        FeedEvent::KeepAlive(Utc::now())
    }

    /// Identifier of the carried record, if any.
    pub fn id(&self) -> Option<Identifier> {
        match self {
            FeedEvent::Departure(record) => Some(record.id()),
            FeedEvent::KeepAlive(_) => None,
        }
    }

    /// The carried record, if any.
    pub fn record(&self) -> Option<&Arc<Record>> {
        match self {
            FeedEvent::Departure(record) => Some(record),
            FeedEvent::KeepAlive(_) => None,
        }
    }

    /// Whether this is a keep-alive marker.
    pub fn is_keep_alive(&self) -> bool {
        matches!(self, FeedEvent::KeepAlive(_))
    }
}

impl From<Arc<Record>> for FeedEvent {
    fn from(record: Arc<Record>) -> Self {
        FeedEvent::Departure(record)
    }
}
