//! Record sources.
//!
//! A record source answers one question: which records scheduled for `day`
//! are due by `cutoff`, optionally restricted to identifiers above `after`.
//! Results must be ordered by identifier, ascending.

mod memory;
mod sqlite;

pub use memory::MemorySource;
pub use sqlite::{SqliteSource, SqliteSourceConfig, DEFAULT_DATASET_YEAR, DEFAULT_TABLE};

use crate::clock::{DayKey, TimeCutoff};
use crate::error::Result;
use crate::record::{Identifier, Record};

/// Parameters of a single source query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceQuery {
    /// Calendar day the records belong to.
    pub day: DayKey,
    /// Latest scheduled time (inclusive) considered due.
    pub cutoff: TimeCutoff,
    /// Exclusive lower bound on identifiers; `None` for an unbounded load.
    pub after: Option<Identifier>,
}

impl SourceQuery {
    /// Unbounded query for a whole day up to `cutoff`.
    pub fn full(day: DayKey, cutoff: TimeCutoff) -> Self {
        Self {
            day,
            cutoff,
            after: None,
        }
    }

    /// Incremental query returning only identifiers above `after`.
    pub fn after(day: DayKey, cutoff: TimeCutoff, after: Identifier) -> Self {
        Self {
            day,
            cutoff,
            after: Some(after),
        }
    }
}

/// Black-box provider of due records.
///
/// Implementations are synchronous; the poller runs them on the blocking
/// thread pool.
pub trait RecordSource: Send + Sync + 'static {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Fetch due records, ordered by identifier ascending.
    fn fetch(&self, query: &SourceQuery) -> Result<Vec<Record>>;

    /// Release any underlying connection. Called once no further polls will run.
    fn close(&self) {}
}
