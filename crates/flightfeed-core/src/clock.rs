//! Wall-clock access and the day/time keys derived from it.

use std::fmt;

use chrono::{Duration, Local, NaiveDate, NaiveDateTime, Timelike};
use parking_lot::Mutex;

/// Calendar day that scopes cursor and retained history.
pub type DayKey = NaiveDate;

/// Minute-granularity cutoff, encoded as `HHMM` (e.g. 9:05 is `905`).
///
/// This matches how scheduled times are stored in the flights dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeCutoff(u16);

impl TimeCutoff {
    /// Build a cutoff from hour and minute.
    pub fn from_hm(hour: u32, minute: u32) -> Self {
        Self((hour.min(23) * 100 + minute.min(59)) as u16)
    }

    /// The `HHMM` integer value.
    pub fn value(self) -> u16 {
        self.0
    }
}

impl fmt::Display for TimeCutoff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Day key for a point in time.
pub fn day_key(now: NaiveDateTime) -> DayKey {
    now.date()
}

/// Time cutoff for a point in time.
pub fn time_cutoff(now: NaiveDateTime) -> TimeCutoff {
    TimeCutoff::from_hm(now.hour(), now.minute())
}

/// Source of "now" for the poller.
pub trait Clock: Send + Sync {
    /// Current local date and time.
    fn now(&self) -> NaiveDateTime;
}

/// Clock backed by the host's local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Manually driven clock.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<NaiveDateTime>,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Jump to a specific instant.
    pub fn set(&self, now: NaiveDateTime) {
        *self.now.lock() = now;
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.lock()
    }
}
