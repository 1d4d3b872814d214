//! Fan-out of live events to attached subscribers.
//!
//! Every subscriber owns a bounded queue. Publishing never waits on a
//! subscriber: an event is either queued immediately or the subscriber is
//! evicted, which ends its stream once the already-queued events drain. A
//! client that gets evicted reconnects with its last seen identifier and
//! catches up from retained history.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

/// Default per-subscriber queue capacity.
pub const DEFAULT_SUBSCRIBER_BUFFER: usize = 256;

struct SubscriberEntry<T> {
    sender: mpsc::Sender<T>,
    created_at: Instant,
    events_sent: u64,
}

struct Shared<T> {
    subscribers: Mutex<HashMap<u64, SubscriberEntry<T>>>,
    next_id: AtomicU64,
    buffer: usize,
    closed: AtomicBool,
}

impl<T> Shared<T> {
    fn detach(&self, id: u64) {
        if let Some(entry) = self.subscribers.lock().remove(&id) {
            tracing::debug!(
                subscriber_id = id,
                events_sent = entry.events_sent,
                age_ms = entry.created_at.elapsed().as_millis() as u64,
                "subscriber detached"
            );
        }
    }
}

/// Outcome of a single publish.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// Subscribers the event was queued for.
    pub delivered: usize,
    /// Subscribers dropped because their queue was full.
    pub evicted: usize,
    /// Subscribers found already gone.
    pub closed: usize,
}

/// Snapshot of one attached subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriberInfo {
    /// Subscriber id.
    pub id: u64,
    /// Time since attach.
    pub age: Duration,
    /// Events queued for this subscriber so far.
    pub events_sent: u64,
    /// Events currently waiting in its queue.
    pub queued: usize,
}

/// Multi-subscriber broadcast channel with per-subscriber bounded queues.
pub struct Broadcaster<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Clone> Broadcaster<T> {
    /// Create a channel whose subscribers each buffer up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                subscribers: Mutex::new(HashMap::new()),
                next_id: AtomicU64::new(1),
                buffer: buffer.max(1),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Attach a new subscriber.
    ///
    /// The subscriber sees every event published after this call returns.
    /// Once the channel is closed, the returned subscription is already ended.
    pub fn attach(&self) -> Subscription<T> {
        let id = self.shared.next_id.fetch_add(1, Ordering::SeqCst);
        let (sender, receiver) = mpsc::channel(self.shared.buffer);

        let mut subscribers = self.shared.subscribers.lock();
        if !self.shared.closed.load(Ordering::SeqCst) {
            subscribers.insert(
                id,
                SubscriberEntry {
                    sender,
                    created_at: Instant::now(),
                    events_sent: 0,
                },
            );
            tracing::debug!(
                subscriber_id = id,
                subscribers = subscribers.len(),
                "subscriber attached"
            );
        }
        drop(subscribers);

        Subscription {
            id,
            receiver,
            shared: Arc::downgrade(&self.shared),
        }
    }

    /// Queue `event` for every attached subscriber without blocking.
    pub fn publish(&self, event: T) -> PublishReport {
        let mut report = PublishReport::default();
        let mut subscribers = self.shared.subscribers.lock();

        subscribers.retain(|&id, entry| match entry.sender.try_send(event.clone()) {
            Ok(()) => {
                entry.events_sent += 1;
                report.delivered += 1;
                true
            }
            Err(TrySendError::Full(_)) => {
                tracing::warn!(
                    subscriber_id = id,
                    events_sent = entry.events_sent,
                    capacity = self.shared.buffer,
                    "subscriber queue full, evicting"
                );
                report.evicted += 1;
                false
            }
            Err(TrySendError::Closed(_)) => {
                report.closed += 1;
                false
            }
        });

        report
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.subscribers.lock().len()
    }

    /// Details of every attached subscriber, ordered by id.
    pub fn subscribers(&self) -> Vec<SubscriberInfo> {
        let subscribers = self.shared.subscribers.lock();
        let mut info: Vec<_> = subscribers
            .iter()
            .map(|(&id, entry)| SubscriberInfo {
                id,
                age: entry.created_at.elapsed(),
                events_sent: entry.events_sent,
                queued: self.shared.buffer - entry.sender.capacity(),
            })
            .collect();
        info.sort_by_key(|s| s.id);
        info
    }

    /// Per-subscriber queue capacity.
    pub fn buffer(&self) -> usize {
        self.shared.buffer
    }

    /// Detach everyone and refuse new subscribers.
    ///
    /// Queued events are still delivered before each stream ends.
    pub fn close(&self) {
        let dropped = {
            let mut subscribers = self.shared.subscribers.lock();
            self.shared.closed.store(true, Ordering::SeqCst);
            std::mem::take(&mut *subscribers)
        };
        tracing::debug!(subscribers = dropped.len(), "broadcast channel closed");
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Receiving end held by one subscriber.
///
/// Dropping it detaches the subscriber; detaching twice, or after eviction,
/// is a no-op.
pub struct Subscription<T> {
    id: u64,
    receiver: mpsc::Receiver<T>,
    shared: Weak<Shared<T>>,
}

impl<T> Subscription<T> {
    /// Subscriber id.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Next event, or `None` once the subscriber was evicted or the channel
    /// closed and the queue is drained.
    pub async fn recv(&mut self) -> Option<T> {
        self.receiver.recv().await
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Detach explicitly. Events still queued are discarded.
    pub fn detach(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.detach(self.id);
        }
        self.receiver.close();
        while self.receiver.try_recv().is_ok() {}
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.detach(self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_all_subscribers() {
        let channel = Broadcaster::new(8);
        let mut a = channel.attach();
        let mut b = channel.attach();
        assert_eq!(channel.subscriber_count(), 2);

        let report = channel.publish(1u32);
        assert_eq!(report.delivered, 2);

        assert_eq!(a.recv().await, Some(1));
        assert_eq!(b.recv().await, Some(1));
    }

    #[tokio::test]
    async fn test_late_subscriber_misses_earlier_events() {
        let channel = Broadcaster::new(8);
        channel.publish(1u32);

        let mut late = channel.attach();
        channel.publish(2);
        assert_eq!(late.recv().await, Some(2));
    }

    #[tokio::test]
    async fn test_drop_detaches() {
        let channel = Broadcaster::<u32>::new(8);
        let a = channel.attach();
        let mut b = channel.attach();
        assert_eq!(channel.subscriber_count(), 2);

        drop(a);
        assert_eq!(channel.subscriber_count(), 1);

        channel.publish(1);
        b.detach();
        b.detach();
        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(b.recv().await, None);
        drop(b);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_slow_subscriber_is_evicted_without_blocking() {
        let channel = Broadcaster::new(2);
        let mut slow = channel.attach();
        let mut fast = channel.attach();

        for i in 0..2u32 {
            channel.publish(i);
            assert_eq!(fast.recv().await, Some(i));
        }

        let report = channel.publish(2);
        assert_eq!(report.evicted, 1);
        assert_eq!(report.delivered, 1);
        assert_eq!(channel.subscriber_count(), 1);
        assert_eq!(fast.recv().await, Some(2));

        // Queued events drain, then the stream ends.
        assert_eq!(slow.recv().await, Some(0));
        assert_eq!(slow.recv().await, Some(1));
        assert_eq!(slow.recv().await, None);
    }

    #[tokio::test]
    async fn test_close_ends_streams() {
        let channel = Broadcaster::new(4);
        let mut sub = channel.attach();
        channel.publish(7u32);
        channel.close();

        assert_eq!(channel.subscriber_count(), 0);
        assert_eq!(sub.recv().await, Some(7));
        assert_eq!(sub.recv().await, None);

        let mut after = channel.attach();
        assert_eq!(after.recv().await, None);
        assert_eq!(channel.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_attach_racing_close_never_outlives_channel() {
        let channel = Arc::new(Broadcaster::<u32>::new(4));
        let closer = {
            let channel = channel.clone();
            std::thread::spawn(move || channel.close())
        };
        let mut subs: Vec<_> = (0..64).map(|_| channel.attach()).collect();
        closer.join().unwrap();

        assert_eq!(channel.subscriber_count(), 0);
        for sub in &mut subs {
            assert_eq!(sub.recv().await, None);
        }
    }

    #[tokio::test]
    async fn test_subscriber_info() {
        let channel = Broadcaster::new(4);
        let _a = channel.attach();
        let _b = channel.attach();
        channel.publish(1u32);

        let info = channel.subscribers();
        assert_eq!(info.len(), 2);
        assert!(info[0].id < info[1].id);
        assert_eq!(info[0].events_sent, 1);
        assert_eq!(info[0].queued, 1);
    }
}
