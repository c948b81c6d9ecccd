//! Resolves index hits back into stored rows.

use std::vec;

use crate::error::Result;
use crate::index::collector::DocumentHit;
use crate::maintenance::consistency::{ConsistencyGuard, GuardOutcome};
use crate::storage::{RowStore, StorageRow};

/// Reads the row of each hit, in hit order, one at a time.
///
/// Rows whose index entry turns out to be stale are skipped; the guard has
/// already queued the corrective delete. The scan is single pass and cannot
/// be restarted.
pub struct RowScanner<'a> {
    store: &'a dyn RowStore,
    guard: &'a ConsistencyGuard,
    hits: vec::IntoIter<DocumentHit>,
    skipped: usize,
}

impl<'a> RowScanner<'a> {
    pub fn new(store: &'a dyn RowStore, guard: &'a ConsistencyGuard, hits: Vec<DocumentHit>) -> Self {
        Self {
            store,
            guard,
            hits: hits.into_iter(),
            skipped: 0,
        }
    }

    /// Hits dropped so far because their entry was stale.
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl Iterator for RowScanner<'_> {
    type Item = Result<StorageRow>;

    fn next(&mut self) -> Option<Self::Item> {
        for hit in self.hits.by_ref() {
            let entry = hit.entry;
            let columns = match self.store.read_row(&entry.key) {
                Ok(columns) => columns.unwrap_or_default(),
                Err(e) => return Some(Err(e)),
            };
            match self
                .guard
                .delete_if_not_latest(&entry.key, entry.timestamp, &entry.key_string, &columns)
            {
                GuardOutcome::Handled => self.skipped += 1,
                GuardOutcome::Unchanged => return Some(Ok(StorageRow::new(entry.key, columns))),
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.hits.len()))
    }
}
