//! Feed observability.
//!
//! ```ignore
//! use flightfeed_core::metrics::{FeedMetrics, LiveGauges};
//!
//! let metrics = FeedMetrics::new();
//! metrics.record_fetch(std::time::Duration::from_millis(2), true);
//! metrics.record_poll(12, true, false);
//!
//! let text = metrics.to_prometheus(&LiveGauges::default());
//! ```

mod histogram;
mod registry;

pub use histogram::Histogram;
pub use registry::{FeedMetrics, LiveGauges, SharedFeedMetrics};
