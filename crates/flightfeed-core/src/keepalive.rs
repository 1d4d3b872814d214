//! Keep-alive markers for idle connections.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::feed::Feed;

/// Publish a keep-alive on `feed` every `interval` until `token` is cancelled.
///
/// The first marker goes out one interval after start.
pub async fn run(feed: Arc<Feed>, interval: Duration, token: CancellationToken) {
    tracing::info!(interval_secs = interval.as_secs(), "keep-alive task started");

    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                let report = feed.publish_keepalive();
                tracing::trace!(
                    subscribers = report.delivered,
                    evicted = report.evicted,
                    "keep-alive sent"
                );
            }
        }
    }

    tracing::info!("keep-alive task stopped");
}
