//! Feed engine configuration.

use std::time::Duration;

use crate::broadcast::DEFAULT_SUBSCRIBER_BUFFER;
use crate::error::{Error, Result};

/// Default poll interval in milliseconds.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Default keep-alive interval in seconds.
pub const DEFAULT_KEEPALIVE_SECS: u64 = 30;

/// Timing and sizing knobs for the feed engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// Interval between record source polls.
    pub poll_interval: Duration,
    /// Interval between keep-alive markers. `None` disables them.
    pub keepalive_interval: Option<Duration>,
    /// Per-subscriber live event queue capacity.
    pub subscriber_buffer: usize,
    /// Poll immediately at startup instead of after the first interval.
    pub poll_on_start: bool,
}

impl FeedConfig {
    /// Configuration with defaults.
    pub fn new() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            keepalive_interval: Some(Duration::from_secs(DEFAULT_KEEPALIVE_SECS)),
            subscriber_buffer: DEFAULT_SUBSCRIBER_BUFFER,
            poll_on_start: true,
        }
    }

    /// Set the poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the keep-alive interval.
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = Some(interval);
        self
    }

    /// Disable keep-alive markers.
    pub fn without_keepalive(mut self) -> Self {
        self.keepalive_interval = None;
        self
    }

    /// Set the per-subscriber queue capacity.
    pub fn with_subscriber_buffer(mut self, buffer: usize) -> Self {
        self.subscriber_buffer = buffer;
        self
    }

    /// Wait one interval before the first poll.
    pub fn with_delayed_start(mut self) -> Self {
        self.poll_on_start = false;
        self
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(Error::Config("poll interval must be non-zero".into()));
        }
        if matches!(self.keepalive_interval, Some(i) if i.is_zero()) {
            return Err(Error::Config("keep-alive interval must be non-zero".into()));
        }
        if self.subscriber_buffer == 0 {
            return Err(Error::Config("subscriber buffer must be at least 1".into()));
        }
        Ok(())
    }
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self::new()
    }
}
