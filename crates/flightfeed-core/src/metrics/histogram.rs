//! Lock-free latency histogram.

use std::sync::atomic::{AtomicU64, Ordering};

/// Fixed-bucket histogram over microsecond latencies.
///
/// Each bucket counts observations at or below its bound and above the
/// previous one; observations beyond the last bound land in an overflow slot.
pub struct Histogram {
    bounds: Vec<u64>,
    counts: Vec<AtomicU64>,
    overflow: AtomicU64,
    sum: AtomicU64,
    count: AtomicU64,
    max: AtomicU64,
}

/// Default bounds for record source queries: 250us up to 10s.
const SOURCE_LATENCY_BOUNDS_US: [u64; 10] = [
    250, 1_000, 2_500, 10_000, 25_000, 100_000, 250_000, 1_000_000, 2_500_000, 10_000_000,
];

impl Histogram {
    /// Histogram with explicit, ascending bucket bounds.
    pub fn with_bounds(bounds: &[u64]) -> Self {
        let mut bounds = bounds.to_vec();
        bounds.sort_unstable();
        bounds.dedup();
        let counts = bounds.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            bounds,
            counts,
            overflow: AtomicU64::new(0),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
            max: AtomicU64::new(0),
        }
    }

    /// Histogram tuned for record source round trips.
    pub fn source_latency() -> Self {
        Self::with_bounds(&SOURCE_LATENCY_BOUNDS_US)
    }

    /// Record one observation.
    pub fn observe(&self, value_us: u64) {
        self.sum.fetch_add(value_us, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.max.fetch_max(value_us, Ordering::Relaxed);

        let slot = self.bounds.partition_point(|&bound| bound < value_us);
        match self.counts.get(slot) {
            Some(bucket) => bucket.fetch_add(1, Ordering::Relaxed),
            None => self.overflow.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// Number of observations.
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Sum of observations.
    pub fn sum(&self) -> u64 {
        self.sum.load(Ordering::Relaxed)
    }

    /// Largest observation.
    pub fn max(&self) -> u64 {
        self.max.load(Ordering::Relaxed)
    }

    /// Mean observation, zero when empty.
    pub fn avg(&self) -> u64 {
        match self.count() {
            0 => 0,
            n => self.sum() / n,
        }
    }

    /// Upper bound of the bucket holding quantile `q` (0.0..=1.0).
    ///
    /// Quantiles falling in the overflow slot report the observed maximum.
    pub fn quantile(&self, q: f64) -> u64 {
        let total = self.count();
        if total == 0 {
            return 0;
        }
        let target = ((total as f64) * q.clamp(0.0, 1.0)).ceil().max(1.0) as u64;
        let mut seen = 0;
        for (bound, bucket) in self.bounds.iter().zip(&self.counts) {
            seen += bucket.load(Ordering::Relaxed);
            if seen >= target {
                return *bound;
            }
        }
        self.max()
    }

    /// Cumulative `(upper bound, count)` pairs, Prometheus style.
    /// The final pair uses `u64::MAX` for `+Inf`.
    pub fn cumulative(&self) -> Vec<(u64, u64)> {
        let mut running = 0;
        let mut out: Vec<_> = self
            .bounds
            .iter()
            .zip(&self.counts)
            .map(|(&bound, bucket)| {
                running += bucket.load(Ordering::Relaxed);
                (bound, running)
            })
            .collect();
        out.push((u64::MAX, running + self.overflow.load(Ordering::Relaxed)));
        out
    }

    /// Zero everything.
    pub fn reset(&self) {
        for bucket in &self.counts {
            bucket.store(0, Ordering::Relaxed);
        }
        self.overflow.store(0, Ordering::Relaxed);
        self.sum.store(0, Ordering::Relaxed);
        self.count.store(0, Ordering::Relaxed);
        self.max.store(0, Ordering::Relaxed);
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::source_latency()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_placement() {
        let hist = Histogram::with_bounds(&[10, 100, 1000]);
        hist.observe(10);
        hist.observe(11);
        hist.observe(999);
        hist.observe(5000);

        assert_eq!(
            hist.cumulative(),
            vec![(10, 1), (100, 2), (1000, 3), (u64::MAX, 4)]
        );
        assert_eq!(hist.count(), 4);
        assert_eq!(hist.max(), 5000);
        assert_eq!(hist.sum(), 10 + 11 + 999 + 5000);
    }

    #[test]
    fn test_quantiles() {
        let hist = Histogram::with_bounds(&[10, 100, 1000]);
        assert_eq!(hist.quantile(0.5), 0);

        for _ in 0..90 {
            hist.observe(5);
        }
        for _ in 0..10 {
            hist.observe(500);
        }
        assert_eq!(hist.quantile(0.5), 10);
        assert_eq!(hist.quantile(0.99), 1000);

        hist.observe(20_000);
        assert_eq!(hist.quantile(1.0), 20_000);
    }

    #[test]
    fn test_reset() {
        let hist = Histogram::source_latency();
        hist.observe(300);
        hist.reset();
        assert_eq!(hist.count(), 0);
        assert_eq!(hist.avg(), 0);
        assert!(hist.cumulative().iter().all(|&(_, n)| n == 0));
    }
}
