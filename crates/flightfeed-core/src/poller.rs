//! Periodic record source polling.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::clock::{day_key, time_cutoff, Clock};
use crate::config::FeedConfig;
use crate::error::{Error, Result};
use crate::feed::{Feed, PollOutcome};
use crate::source::RecordSource;

/// Drives the feed from a record source on a fixed interval.
pub struct Poller {
    feed: Arc<Feed>,
    source: Arc<dyn RecordSource>,
    clock: Arc<dyn Clock>,
    interval: Duration,
    poll_on_start: bool,
}

impl Poller {
    /// Create a poller.
    pub fn new(
        feed: Arc<Feed>,
        source: Arc<dyn RecordSource>,
        clock: Arc<dyn Clock>,
        config: &FeedConfig,
    ) -> Self {
        Self {
            feed,
            source,
            clock,
            interval: config.poll_interval,
            poll_on_start: config.poll_on_start,
        }
    }

    /// Run one poll now.
    ///
    /// On a source failure the feed is left untouched, including a pending
    /// day rollover, and the error is returned.
    pub async fn poll(&self) -> Result<PollOutcome> {
        let now = self.clock.now();
        let plan = self.feed.plan_poll(day_key(now), time_cutoff(now));

        let source = Arc::clone(&self.source);
        let query = plan.query;
        let started = Instant::now();
        let fetched = tokio::task::spawn_blocking(move || source.fetch(&query))
            .await
            .map_err(Error::from)
            .and_then(|result| result);
        self.feed
            .metrics()
            .record_fetch(started.elapsed(), fetched.is_ok());

        let records = fetched?;
        Ok(self.feed.apply_poll(plan, records))
    }

    /// Poll until `token` is cancelled.
    ///
    /// Polls never overlap: a slow query delays the next tick instead of
    /// stacking up. Failures are logged and retried on the next tick.
    pub async fn run(self, token: CancellationToken) {
        info!(
            source = self.source.name(),
            interval_ms = self.interval.as_millis() as u64,
            "poller started"
        );

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !self.poll_on_start {
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = ticker.tick() => {}
            }

            match self.poll().await {
                Ok(outcome) => log_outcome(&outcome),
                Err(e) => warn!(
                    source = self.source.name(),
                    error = %e,
                    "poll failed, retrying next tick"
                ),
            }
        }

        info!("poller stopped");
    }
}

fn log_outcome(outcome: &PollOutcome) {
    if !outcome.applied {
        return;
    }
    if outcome.rolled_over {
        info!(day = %outcome.day, records = outcome.delivered, "day rollover");
    } else if outcome.bulk {
        info!(day = %outcome.day, records = outcome.delivered, last_id = ?outcome.last_id, "loaded day");
    } else if outcome.delivered > 0 {
        info!(
            records = outcome.delivered,
            last_id = ?outcome.last_id,
            evicted = outcome.evicted,
            "published new records"
        );
    } else {
        debug!(last_id = ?outcome.last_id, "no new records");
    }
}
