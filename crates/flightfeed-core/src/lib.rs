//! Flightfeed core.
//!
//! A live, resumable feed of records that become due over the course of a
//! day. A [`Poller`] queries a [`RecordSource`] on a fixed interval and
//! commits new records into a [`Feed`], which retains them for same-day
//! catch-up and fans them out to attached subscriber [`Session`]s.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod broadcast;
pub mod clock;
pub mod config;
pub mod cursor;
pub mod error;
pub mod event;
pub mod feed;
pub mod history;
pub mod keepalive;
pub mod metrics;
pub mod poller;
pub mod record;
pub mod service;
pub mod session;
pub mod source;

pub use broadcast::{Broadcaster, PublishReport, Subscription};
pub use clock::{Clock, DayKey, ManualClock, SystemClock, TimeCutoff};
pub use config::FeedConfig;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use event::FeedEvent;
pub use feed::{Feed, FeedStatus, PollOutcome, PollPlan};
pub use history::RetainedHistory;
pub use metrics::{FeedMetrics, SharedFeedMetrics};
pub use poller::Poller;
pub use record::{Identifier, Record};
pub use service::FeedService;
pub use session::{CatchUp, Opened, Session, SessionEvent, SessionRequest};
pub use source::{MemorySource, RecordSource, SourceQuery, SqliteSource, SqliteSourceConfig};
