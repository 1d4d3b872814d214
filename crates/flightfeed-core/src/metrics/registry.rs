//! Feed counters and their Prometheus exposition.

use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::histogram::Histogram;

/// Point-in-time values owned by the feed rather than counted here.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveGauges {
    /// Attached subscribers.
    pub subscribers: usize,
    /// Records retained for today's catch-up.
    pub retained_records: usize,
    /// Last identifier delivered today.
    pub last_id: Option<i64>,
}

/// Counters for polling, publishing and subscriber churn.
pub struct FeedMetrics {
    started_at: Instant,

    polls: AtomicU64,
    polls_failed: AtomicU64,
    bulk_loads: AtomicU64,
    rollovers: AtomicU64,
    records_delivered: AtomicU64,
    source_latency: Histogram,

    events_published: AtomicU64,
    keepalives_published: AtomicU64,

    subscribers_attached: AtomicU64,
    subscribers_evicted: AtomicU64,
}

impl FeedMetrics {
    /// Fresh, zeroed counters.
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            polls: AtomicU64::new(0),
            polls_failed: AtomicU64::new(0),
            bulk_loads: AtomicU64::new(0),
            rollovers: AtomicU64::new(0),
            records_delivered: AtomicU64::new(0),
            source_latency: Histogram::source_latency(),
            events_published: AtomicU64::new(0),
            keepalives_published: AtomicU64::new(0),
            subscribers_attached: AtomicU64::new(0),
            subscribers_evicted: AtomicU64::new(0),
        }
    }

    /// Record a source round trip, successful or not.
    pub fn record_fetch(&self, elapsed: Duration, ok: bool) {
        self.polls.fetch_add(1, Ordering::Relaxed);
        self.source_latency
            .observe(u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX));
        if !ok {
            self.polls_failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a committed poll.
    pub fn record_poll(&self, records: usize, bulk: bool, rolled_over: bool) {
        self.records_delivered
            .fetch_add(records as u64, Ordering::Relaxed);
        if bulk {
            self.bulk_loads.fetch_add(1, Ordering::Relaxed);
        }
        if rolled_over {
            self.rollovers.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record one published record event and the subscribers it evicted.
    pub fn record_publish(&self, evicted: usize) {
        self.events_published.fetch_add(1, Ordering::Relaxed);
        self.subscribers_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Record one published keep-alive and the subscribers it evicted.
    pub fn record_keepalive(&self, evicted: usize) {
        self.keepalives_published.fetch_add(1, Ordering::Relaxed);
        self.subscribers_evicted
            .fetch_add(evicted as u64, Ordering::Relaxed);
    }

    /// Record a subscriber attach.
    pub fn record_attach(&self) {
        self.subscribers_attached.fetch_add(1, Ordering::Relaxed);
    }

    /// Seconds since the counters were created.
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Source queries issued.
    pub fn polls(&self) -> u64 {
        self.polls.load(Ordering::Relaxed)
    }

    /// Source queries that failed.
    pub fn polls_failed(&self) -> u64 {
        self.polls_failed.load(Ordering::Relaxed)
    }

    /// Unbounded loads (startup or rollover).
    pub fn bulk_loads(&self) -> u64 {
        self.bulk_loads.load(Ordering::Relaxed)
    }

    /// Day rollovers observed.
    pub fn rollovers(&self) -> u64 {
        self.rollovers.load(Ordering::Relaxed)
    }

    /// Records taken into history.
    pub fn records_delivered(&self) -> u64 {
        self.records_delivered.load(Ordering::Relaxed)
    }

    /// Record events published live.
    pub fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }

    /// Keep-alive markers published.
    pub fn keepalives_published(&self) -> u64 {
        self.keepalives_published.load(Ordering::Relaxed)
    }

    /// Subscribers ever attached.
    pub fn subscribers_attached(&self) -> u64 {
        self.subscribers_attached.load(Ordering::Relaxed)
    }

    /// Subscribers evicted for falling behind.
    pub fn subscribers_evicted(&self) -> u64 {
        self.subscribers_evicted.load(Ordering::Relaxed)
    }

    /// Source round-trip latency.
    pub fn source_latency(&self) -> &Histogram {
        &self.source_latency
    }

    /// Render Prometheus text exposition.
    pub fn to_prometheus(&self, live: &LiveGauges) -> String {
        let mut out = String::new();

        gauge(&mut out, "flightfeed_uptime_seconds", "Process uptime in seconds", self.uptime_secs());
        gauge(
            &mut out,
            "flightfeed_subscribers",
            "Currently attached subscribers",
            live.subscribers as u64,
        );
        gauge(
            &mut out,
            "flightfeed_retained_records",
            "Records retained for same-day catch-up",
            live.retained_records as u64,
        );
        if let Some(last_id) = live.last_id {
            gauge(&mut out, "flightfeed_last_id", "Last delivered record identifier", last_id);
        }

        counter(&mut out, "flightfeed_polls_total", "Record source queries issued", self.polls());
        counter(
            &mut out,
            "flightfeed_poll_failures_total",
            "Record source queries that failed",
            self.polls_failed(),
        );
        counter(&mut out, "flightfeed_bulk_loads_total", "Unbounded day loads", self.bulk_loads());
        counter(&mut out, "flightfeed_rollovers_total", "Day rollovers", self.rollovers());
        counter(
            &mut out,
            "flightfeed_records_total",
            "Records taken into retained history",
            self.records_delivered(),
        );
        counter(
            &mut out,
            "flightfeed_events_published_total",
            "Record events published to subscribers",
            self.events_published(),
        );
        counter(
            &mut out,
            "flightfeed_keepalives_total",
            "Keep-alive markers published",
            self.keepalives_published(),
        );
        counter(
            &mut out,
            "flightfeed_subscribers_attached_total",
            "Subscribers ever attached",
            self.subscribers_attached(),
        );
        counter(
            &mut out,
            "flightfeed_subscribers_evicted_total",
            "Subscribers evicted for a full queue",
            self.subscribers_evicted(),
        );

        let name = "flightfeed_source_latency_microseconds";
        let _ = writeln!(out, "# HELP {name} Record source query latency");
        let _ = writeln!(out, "# TYPE {name} histogram");
        for (bound, count) in self.source_latency.cumulative() {
            if bound == u64::MAX {
                let _ = writeln!(out, "{name}_bucket{{le=\"+Inf\"}} {count}");
            } else {
                let _ = writeln!(out, "{name}_bucket{{le=\"{bound}\"}} {count}");
            }
        }
        let _ = writeln!(out, "{name}_sum {}", self.source_latency.sum());
        let _ = writeln!(out, "{name}_count {}", self.source_latency.count());

        out
    }

    /// Zero every counter.
    pub fn reset(&self) {
        for counter in [
            &self.polls,
            &self.polls_failed,
            &self.bulk_loads,
            &self.rollovers,
            &self.records_delivered,
            &self.events_published,
            &self.keepalives_published,
            &self.subscribers_attached,
            &self.subscribers_evicted,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.source_latency.reset();
    }
}

impl Default for FeedMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn gauge(out: &mut String, name: &str, help: &str, value: impl std::fmt::Display) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} gauge");
    let _ = writeln!(out, "{name} {value}\n");
}

fn counter(out: &mut String, name: &str, help: &str, value: u64) {
    let _ = writeln!(out, "# HELP {name} {help}");
    let _ = writeln!(out, "# TYPE {name} counter");
    let _ = writeln!(out, "{name} {value}\n");
}

/// Shared metrics handle.
pub type SharedFeedMetrics = Arc<FeedMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poll_counters() {
        let metrics = FeedMetrics::new();
        metrics.record_fetch(Duration::from_micros(400), true);
        metrics.record_poll(5, true, false);
        metrics.record_fetch(Duration::from_millis(3), false);
        metrics.record_fetch(Duration::from_micros(100), true);
        metrics.record_poll(2, true, true);

        assert_eq!(metrics.polls(), 3);
        assert_eq!(metrics.polls_failed(), 1);
        assert_eq!(metrics.bulk_loads(), 2);
        assert_eq!(metrics.rollovers(), 1);
        assert_eq!(metrics.records_delivered(), 7);
        assert_eq!(metrics.source_latency().count(), 3);
    }

    #[test]
    fn test_prometheus_exposition() {
        let metrics = FeedMetrics::new();
        metrics.record_attach();
        metrics.record_publish(1);
        metrics.record_fetch(Duration::from_micros(50), true);

        let text = metrics.to_prometheus(&LiveGauges {
            subscribers: 3,
            retained_records: 10,
            last_id: Some(42),
        });

        assert!(text.contains("# TYPE flightfeed_subscribers gauge\nflightfeed_subscribers 3\n"));
        assert!(text.contains("flightfeed_last_id 42\n"));
        assert!(text.contains("flightfeed_subscribers_evicted_total 1\n"));
        assert!(text.contains("flightfeed_source_latency_microseconds_bucket{le=\"250\"} 1\n"));
        assert!(text.contains("flightfeed_source_latency_microseconds_bucket{le=\"+Inf\"} 1\n"));
        assert!(text.contains("flightfeed_source_latency_microseconds_count 1\n"));
    }

    #[test]
    fn test_last_id_omitted_until_known() {
        let metrics = FeedMetrics::new();
        let text = metrics.to_prometheus(&LiveGauges::default());
        assert!(!text.contains("flightfeed_last_id"));
        assert!(text.contains("flightfeed_subscribers 0\n"));
    }

    #[test]
    fn test_reset() {
        let metrics = FeedMetrics::new();
        metrics.record_fetch(Duration::from_micros(5), false);
        metrics.record_keepalive(0);
        metrics.reset();
        assert_eq!(metrics.polls(), 0);
        assert_eq!(metrics.polls_failed(), 0);
        assert_eq!(metrics.keepalives_published(), 0);
        assert_eq!(metrics.source_latency().count(), 0);
    }
}
