//! In-memory record source.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::RwLock;

use super::{RecordSource, SourceQuery};
use crate::clock::{DayKey, TimeCutoff};
use crate::error::{Error, Result};
use crate::record::Record;

#[derive(Debug, Clone)]
struct Scheduled {
    day: DayKey,
    at: TimeCutoff,
    record: Record,
}

/// Record source holding its rows in memory.
///
/// Useful for embedding and for driving the poller deterministically. It can
/// be switched into an unavailable state to exercise failure handling.
#[derive(Debug, Default)]
pub struct MemorySource {
    rows: RwLock<Vec<Scheduled>>,
    unavailable: AtomicBool,
    closed: AtomicBool,
    queries: AtomicU64,
}

impl MemorySource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a record on `day` at `at`.
    pub fn insert(&self, day: DayKey, at: TimeCutoff, record: Record) {
        self.rows.write().push(Scheduled { day, at, record });
    }

    /// Make subsequent fetches fail (or succeed again).
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of fetches attempted so far.
    pub fn query_count(&self) -> u64 {
        self.queries.load(Ordering::SeqCst)
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl RecordSource for MemorySource {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, query: &SourceQuery) -> Result<Vec<Record>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::Source("memory source marked unavailable".to_string()));
        }

        let rows = self.rows.read();
        let mut due: Vec<Record> = rows
            .iter()
            .filter(|row| row.day == query.day && row.at <= query.cutoff)
            .filter(|row| query.after.map_or(true, |after| row.record.id() > after))
            .map(|row| row.record.clone())
            .collect();
        due.sort_by_key(Record::id);
        Ok(due)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
