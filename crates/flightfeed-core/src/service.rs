//! Background task lifecycle.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::clock::Clock;
use crate::config::FeedConfig;
use crate::error::Result;
use crate::feed::Feed;
use crate::keepalive;
use crate::poller::Poller;
use crate::source::RecordSource;

/// A running feed: the poller and keep-alive tasks plus the shared [`Feed`].
pub struct FeedService {
    feed: Arc<Feed>,
    source: Arc<dyn RecordSource>,
    token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl FeedService {
    /// Validate `config` and spawn the background tasks.
    pub fn start(
        config: FeedConfig,
        source: Arc<dyn RecordSource>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate()?;

        let feed = Arc::new(Feed::new(&config));
        let token = CancellationToken::new();
        let mut tasks = Vec::with_capacity(2);

        let poller = Poller::new(Arc::clone(&feed), Arc::clone(&source), clock, &config);
        tasks.push(tokio::spawn(poller.run(token.child_token())));

        if let Some(interval) = config.keepalive_interval {
            tasks.push(tokio::spawn(keepalive::run(
                Arc::clone(&feed),
                interval,
                token.child_token(),
            )));
        }

        tracing::info!(
            source = source.name(),
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            keepalive_secs = ?config.keepalive_interval.map(|i| i.as_secs()),
            subscriber_buffer = config.subscriber_buffer,
            "feed service started"
        );

        Ok(Self {
            feed,
            source,
            token,
            tasks,
        })
    }

    /// The shared feed.
    pub fn feed(&self) -> &Arc<Feed> {
        &self.feed
    }

    /// Token cancelled on shutdown. Sessions should use a child of it.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Stop polling, end every live stream, then release the record source.
    pub async fn shutdown(self) {
        self.token.cancel();
        for task in self.tasks {
            if let Err(e) = task.await {
                tracing::warn!(error = %e, "feed task ended abnormally");
            }
        }
        self.feed.close();
        self.source.close();
        tracing::info!("feed service stopped");
    }
}
