//! Subscriber sessions.
//!
//! A stream session delivers an optional catch-up batch first and then every
//! live event published after it attached. The two halves are captured
//! atomically with respect to publishing, so nothing is lost or repeated at
//! the seam.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::broadcast::Subscription;
use crate::event::FeedEvent;
use crate::record::{Identifier, Record};

/// What a client asked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionRequest {
    /// One-shot read of retained history, optionally from `since` (inclusive).
    Snapshot { since: Option<Identifier> },
    /// Live stream. With `since`, retained records `>= since` come first.
    Stream { since: Option<Identifier> },
}

impl SessionRequest {
    /// Catch-up bound carried by the request.
    pub fn since(&self) -> Option<Identifier> {
        match *self {
            SessionRequest::Snapshot { since } | SessionRequest::Stream { since } => since,
        }
    }
}

/// Batch of retained records handed to a client before live delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CatchUp {
    /// Records in identifier order.
    pub records: Vec<Arc<Record>>,
    /// Cursor position when the batch was taken.
    pub last_id: Option<Identifier>,
}

impl CatchUp {
    /// Number of records in the batch.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the batch is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Result of opening a session.
pub enum Opened {
    /// Snapshot request: the batch, and nothing else.
    Snapshot(CatchUp),
    /// Stream request.
    Stream(Session),
}

/// Item yielded by [`Session::next`].
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The catch-up batch. Yielded at most once, before anything live.
    CatchUp(CatchUp),
    /// A live event.
    Live(FeedEvent),
}

/// One attached streaming client.
pub struct Session {
    catch_up: Option<CatchUp>,
    subscription: Subscription<FeedEvent>,
    cancel: CancellationToken,
    finished: bool,
}

impl Session {
    pub(crate) fn new(
        catch_up: Option<CatchUp>,
        subscription: Subscription<FeedEvent>,
        cancel: CancellationToken,
    ) -> Self {
        tracing::debug!(
            subscriber_id = subscription.id(),
            catch_up = ?catch_up.as_ref().map(CatchUp::len),
            "session opened"
        );
        Self {
            catch_up,
            subscription,
            cancel,
            finished: false,
        }
    }

    /// Subscriber id backing this session.
    pub fn id(&self) -> u64 {
        self.subscription.id()
    }

    /// Take the pending catch-up batch, if it was not yet delivered.
    pub fn catch_up(&mut self) -> Option<CatchUp> {
        self.catch_up.take()
    }

    /// Token that ends this session when cancelled.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel the session. No event is yielded afterwards.
    pub fn cancel(&mut self) {
        self.cancel.cancel();
        self.finish();
    }

    /// Next thing to send.
    ///
    /// Returns `None` once the session is cancelled, the subscriber was
    /// evicted, or the feed shut down. Cancellation wins over pending data.
    pub async fn next(&mut self) -> Option<SessionEvent> {
        if self.finished || self.cancel.is_cancelled() {
            self.finish();
            return None;
        }
        if let Some(batch) = self.catch_up.take() {
            return Some(SessionEvent::CatchUp(batch));
        }

        let next = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            event = self.subscription.recv() => event,
        };

        match next {
            Some(event) => Some(SessionEvent::Live(event)),
            None => {
                self.finish();
                None
            }
        }
    }

    /// Non-blocking variant of [`next`](Self::next).
    pub fn try_next(&mut self) -> Option<SessionEvent> {
        if self.finished || self.cancel.is_cancelled() {
            self.finish();
            return None;
        }
        if let Some(batch) = self.catch_up.take() {
            return Some(SessionEvent::CatchUp(batch));
        }
        self.subscription.try_recv().map(SessionEvent::Live)
    }

    /// Whether the session has ended.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    fn finish(&mut self) {
        if !self.finished {
            self.finished = true;
            self.subscription.detach();
            tracing::debug!(subscriber_id = self.subscription.id(), "session closed");
        }
    }
}
