//! Same-day retained history used for catch-up.

use std::sync::Arc;

use crate::record::{Identifier, Record};

/// Append-only, identifier-ordered log of every record delivered today.
///
/// Arrival order equals identifier order, so range queries are a binary
/// search for the first retained identifier at or above the bound.
#[derive(Debug, Clone, Default)]
pub struct RetainedHistory {
    records: Vec<Arc<Record>>,
}

impl RetainedHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an incremental batch.
    pub fn append<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Arc<Record>>,
    {
        let before = self.records.len();
        self.records.extend(records);
        debug_assert!(
            self.records[before.saturating_sub(1)..]
                .windows(2)
                .all(|w| w[0].id() < w[1].id()),
            "history must stay ordered by identifier"
        );
    }

    /// Replace the whole history (initial load or day rollover).
    pub fn replace_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = Arc<Record>>,
    {
        self.records = records.into_iter().collect();
    }

    /// Drop everything.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    /// Catch-up query.
    ///
    /// With a bound, returns every record whose identifier is `>= since`:
    /// the boundary record is re-delivered rather than risk losing it.
    /// Without a bound, returns the full history.
    pub fn query(&self, since: Option<Identifier>) -> Vec<Arc<Record>> {
        match since {
            Some(since) => {
                let start = self.records.partition_point(|r| r.id() < since);
                self.records[start..].to_vec()
            }
            None => self.records.clone(),
        }
    }

    /// Number of retained records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Identifier of the newest retained record.
    pub fn last_id(&self) -> Option<Identifier> {
        self.records.last().map(|r| r.id())
    }

    /// Iterate over retained records in order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Record>> {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(ids: &[i64]) -> Vec<Arc<Record>> {
        ids.iter().map(|&id| Arc::new(Record::new(id))).collect()
    }

    fn ids(records: &[Arc<Record>]) -> Vec<i64> {
        records.iter().map(|r| r.id().value()).collect()
    }

    #[test]
    fn test_query_is_inclusive_at_boundary() {
        let mut history = RetainedHistory::new();
        history.replace_all(batch(&[1, 2, 3, 5, 8]));

        assert_eq!(ids(&history.query(Some(Identifier::new(3)))), vec![3, 5, 8]);
        assert_eq!(ids(&history.query(Some(Identifier::new(4)))), vec![5, 8]);
        assert_eq!(ids(&history.query(Some(Identifier::new(0)))), vec![1, 2, 3, 5, 8]);
        assert!(history.query(Some(Identifier::new(9))).is_empty());
        assert_eq!(ids(&history.query(None)), vec![1, 2, 3, 5, 8]);
    }

    #[test]
    fn test_append_then_replace() {
        let mut history = RetainedHistory::new();
        history.replace_all(batch(&[1, 2]));
        history.append(batch(&[3]));
        assert_eq!(history.len(), 3);
        assert_eq!(history.last_id(), Some(Identifier::new(3)));

        history.replace_all(batch(&[1]));
        assert_eq!(ids(&history.query(None)), vec![1]);

        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.last_id(), None);
    }
}
