//! Incremental poll cursor.

use crate::clock::{DayKey, TimeCutoff};
use crate::record::{Identifier, Record};
use crate::source::SourceQuery;

/// Tracks the last delivered identifier and the day it belongs to.
///
/// `last_id` only ever holds an identifier observed from the record source and
/// never decreases within a day. The day changes lazily, when a poll runs on a
/// new calendar day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    last_id: Option<Identifier>,
    current_day: Option<DayKey>,
}

impl Cursor {
    /// Create an unset cursor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Last identifier delivered, if any.
    pub fn last_id(&self) -> Option<Identifier> {
        self.last_id
    }

    /// Day of the last poll, if any.
    pub fn current_day(&self) -> Option<DayKey> {
        self.current_day
    }

    /// True while no identifier has been observed for the current day.
    ///
    /// The next poll is then an unbounded bulk load rather than an
    /// incremental fetch.
    pub fn is_bulk_load(&self) -> bool {
        self.last_id.is_none()
    }

    /// Record the day of a poll. Returns `true` on a day rollover, in which
    /// case the identifier bound is dropped.
    pub fn observe_day(&mut self, day: DayKey) -> bool {
        let rolled_over = matches!(self.current_day, Some(previous) if previous != day);
        if rolled_over {
            self.last_id = None;
        }
        self.current_day = Some(day);
        rolled_over
    }

    /// Source query for `day` up to `cutoff`, bounded by the last identifier.
    pub fn query(&self, day: DayKey, cutoff: TimeCutoff) -> SourceQuery {
        SourceQuery {
            day,
            cutoff,
            after: self.last_id,
        }
    }

    /// Move past a batch of records. Returns `true` if the cursor moved.
    pub fn advance<R: AsRef<Record>>(&mut self, records: &[R]) -> bool {
        match records.last().map(|r| r.as_ref().id()) {
            Some(id) if self.last_id.map_or(true, |last| id > last) => {
                self.last_id = Some(id);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn day(d: u32) -> DayKey {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn test_first_observation_is_not_a_rollover() {
        let mut cursor = Cursor::new();
        assert!(!cursor.observe_day(day(1)));
        assert!(!cursor.observe_day(day(1)));
        assert_eq!(cursor.current_day(), Some(day(1)));
    }

    #[test]
    fn test_rollover_resets_identifier() {
        let mut cursor = Cursor::new();
        cursor.observe_day(day(1));
        cursor.advance(&[Record::new(1), Record::new(5)]);
        assert_eq!(cursor.last_id(), Some(Identifier::new(5)));
        assert!(!cursor.is_bulk_load());

        assert!(cursor.observe_day(day(2)));
        assert_eq!(cursor.last_id(), None);
        assert!(cursor.is_bulk_load());
    }

    #[test]
    fn test_advance_is_monotonic() {
        let mut cursor = Cursor::new();
        assert!(cursor.advance(&[Record::new(4)]));
        assert!(!cursor.advance(&[Record::new(3)]));
        assert!(!cursor.advance::<Record>(&[]));
        assert_eq!(cursor.last_id(), Some(Identifier::new(4)));
    }

    #[test]
    fn test_query_carries_bound() {
        let mut cursor = Cursor::new();
        let cutoff = TimeCutoff::from_hm(10, 0);
        assert_eq!(cursor.query(day(1), cutoff).after, None);

        cursor.advance(&[Record::new(9)]);
        assert_eq!(cursor.query(day(1), cutoff).after, Some(Identifier::new(9)));
    }
}
