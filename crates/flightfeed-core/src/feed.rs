//! The feed: cursor, retained history and broadcast channel behind one lock.
//!
//! Poll results are committed and published while the state write lock is
//! held, and new subscribers take their catch-up snapshot and attach under
//! the read lock. A subscriber therefore sees every record exactly once
//! across catch-up and live delivery.

use std::sync::Arc;

use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::broadcast::{Broadcaster, PublishReport, SubscriberInfo};
use crate::clock::{DayKey, TimeCutoff};
use crate::config::FeedConfig;
use crate::cursor::Cursor;
use crate::event::FeedEvent;
use crate::history::RetainedHistory;
use crate::metrics::{FeedMetrics, LiveGauges, SharedFeedMetrics};
use crate::record::{Identifier, Record};
use crate::session::{CatchUp, Opened, Session, SessionRequest};
use crate::source::SourceQuery;

#[derive(Debug, Default)]
struct FeedState {
    cursor: Cursor,
    history: RetainedHistory,
    version: u64,
}

/// A poll prepared against a consistent view of the cursor.
///
/// The query runs with no lock held; [`Feed::apply_poll`] then commits its
/// result if nothing else committed in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPlan {
    /// Query to run against the record source.
    pub query: SourceQuery,
    /// Whether this poll moves the feed onto a new day.
    pub rolled_over: bool,
    version: u64,
}

impl PollPlan {
    /// Whether this poll replaces history rather than extending it.
    pub fn is_bulk(&self) -> bool {
        self.query.after.is_none()
    }
}

/// Summary of a committed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PollOutcome {
    /// Day polled.
    pub day: DayKey,
    /// Records taken into history.
    pub delivered: usize,
    /// Unbounded load: history replaced, nothing published.
    pub bulk: bool,
    /// First poll of a new day.
    pub rolled_over: bool,
    /// Cursor position after the commit.
    pub last_id: Option<Identifier>,
    /// Subscribers evicted while publishing.
    pub evicted: usize,
    /// False when a concurrent commit made this result stale and it was dropped.
    pub applied: bool,
}

/// Point-in-time description of the feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedStatus {
    /// Day the cursor is on.
    pub day: Option<NaiveDate>,
    /// Last delivered identifier.
    pub last_id: Option<Identifier>,
    /// Records retained for catch-up.
    pub retained_records: usize,
    /// Committed polls so far.
    pub version: u64,
    /// Attached subscribers.
    pub subscribers: usize,
    /// Per-subscriber queue capacity.
    pub subscriber_buffer: usize,
    /// Seconds since start.
    pub uptime_secs: u64,
    /// Source queries issued.
    pub polls: u64,
    /// Source queries that failed.
    pub poll_failures: u64,
}

/// Live feed of due records.
pub struct Feed {
    state: RwLock<FeedState>,
    channel: Broadcaster<FeedEvent>,
    metrics: SharedFeedMetrics,
}

impl Feed {
    /// Create an empty feed.
    pub fn new(config: &FeedConfig) -> Self {
        Self::with_metrics(config, Arc::new(FeedMetrics::new()))
    }

    /// Create an empty feed reporting into `metrics`.
    pub fn with_metrics(config: &FeedConfig, metrics: SharedFeedMetrics) -> Self {
        Self {
            state: RwLock::new(FeedState::default()),
            channel: Broadcaster::new(config.subscriber_buffer),
            metrics,
        }
    }

    /// Metrics handle.
    pub fn metrics(&self) -> &SharedFeedMetrics {
        &self.metrics
    }

    /// Copy of the current cursor.
    pub fn cursor(&self) -> Cursor {
        self.state.read().cursor.clone()
    }

    /// Last delivered identifier.
    pub fn last_id(&self) -> Option<Identifier> {
        self.state.read().cursor.last_id()
    }

    /// Full retained history for today.
    pub fn snapshot(&self) -> Vec<Arc<Record>> {
        self.state.read().history.query(None)
    }

    /// Retained records `>= since`, or everything without a bound.
    pub fn catch_up(&self, since: Option<Identifier>) -> CatchUp {
        let state = self.state.read();
        CatchUp {
            records: state.history.query(since),
            last_id: state.cursor.last_id(),
        }
    }

    /// Open a client session.
    ///
    /// Snapshots return retained history and never attach. Streams attach
    /// to the live channel; a stream carrying `since` first yields the
    /// catch-up batch, one without starts live from now. The session ends
    /// when `cancel` fires.
    pub fn open_session(&self, request: SessionRequest, cancel: CancellationToken) -> Opened {
        match request {
            SessionRequest::Snapshot { since } => Opened::Snapshot(self.catch_up(since)),
            SessionRequest::Stream { since } => {
                let (catch_up, subscription) = {
                    let state = self.state.read();
                    let catch_up = since.map(|since| CatchUp {
                        records: state.history.query(Some(since)),
                        last_id: state.cursor.last_id(),
                    });
                    (catch_up, self.channel.attach())
                };
                self.metrics.record_attach();
                Opened::Stream(Session::new(catch_up, subscription, cancel))
            }
        }
    }

    /// Prepare a poll for `day` up to `cutoff`.
    pub fn plan_poll(&self, day: DayKey, cutoff: TimeCutoff) -> PollPlan {
        let state = self.state.read();
        let mut cursor = state.cursor.clone();
        let rolled_over = cursor.observe_day(day);
        PollPlan {
            query: cursor.query(day, cutoff),
            rolled_over,
            version: state.version,
        }
    }

    /// Commit the records fetched for `plan`.
    ///
    /// A bulk result replaces retained history without publishing. An
    /// incremental result is appended and each record is published, in
    /// order, before the lock is released.
    pub fn apply_poll(&self, plan: PollPlan, records: Vec<Record>) -> PollOutcome {
        let day = plan.query.day;
        let bulk = plan.is_bulk();
        let mut state = self.state.write();

        if state.version != plan.version {
            tracing::warn!(
                planned = plan.version,
                current = state.version,
                "discarding stale poll result"
            );
            return PollOutcome {
                day,
                delivered: 0,
                bulk,
                rolled_over: false,
                last_id: state.cursor.last_id(),
                evicted: 0,
                applied: false,
            };
        }

        state.cursor.observe_day(day);
        let mut records: Vec<Arc<Record>> = records.into_iter().map(Arc::new).collect();
        if let Some(last) = state.cursor.last_id() {
            records.retain(|r| r.id() > last);
        }

        let mut evicted = 0;
        if bulk {
            state.history.replace_all(records.iter().cloned());
        } else {
            state.history.append(records.iter().cloned());
        }
        state.cursor.advance(&records);
        state.version += 1;

        if !bulk {
            for record in &records {
                let report = self.channel.publish(FeedEvent::Departure(Arc::clone(record)));
                self.metrics.record_publish(report.evicted);
                evicted += report.evicted;
            }
        }
        self.metrics.record_poll(records.len(), bulk, plan.rolled_over);

        PollOutcome {
            day,
            delivered: records.len(),
            bulk,
            rolled_over: plan.rolled_over,
            last_id: state.cursor.last_id(),
            evicted,
            applied: true,
        }
    }

    /// Publish a keep-alive marker to every subscriber.
    pub fn publish_keepalive(&self) -> PublishReport {
        let report = self.channel.publish(FeedEvent::keep_alive());
        self.metrics.record_keepalive(report.evicted);
        report
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.channel.subscriber_count()
    }

    /// Details of attached subscribers.
    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        self.channel.subscribers()
    }

    /// Current status.
    pub fn status(&self) -> FeedStatus {
        let state = self.state.read();
        FeedStatus {
            day: state.cursor.current_day(),
            last_id: state.cursor.last_id(),
            retained_records: state.history.len(),
            version: state.version,
            subscribers: self.channel.subscriber_count(),
            subscriber_buffer: self.channel.buffer(),
            uptime_secs: self.metrics.uptime_secs(),
            polls: self.metrics.polls(),
            poll_failures: self.metrics.polls_failed(),
        }
    }

    /// Prometheus exposition of metrics and live gauges.
    pub fn prometheus(&self) -> String {
        let gauges = {
            let state = self.state.read();
            LiveGauges {
                subscribers: self.channel.subscriber_count(),
                retained_records: state.history.len(),
                last_id: state.cursor.last_id().map(Identifier::value),
            }
        };
        self.metrics.to_prometheus(&gauges)
    }

    /// End every live stream and refuse new subscribers.
    pub fn close(&self) {
        self.channel.close();
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.channel.is_closed()
    }
}
