use std::fmt::Debug;
use std::sync::Arc;

use log::{debug, warn};

use crate::error::Result;
use crate::index::IndexWriter;
use crate::index::config::IndexConfig;
use crate::schema::TableSchema;
use crate::storage::{ColumnFamily, PartitionKey};

/// A corrective index delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepairTask {
    /// The row is gone; drop every entry of the partition.
    DeletePartition { key: PartitionKey },
    /// The row was rewritten; drop the entry indexed at `timestamp`.
    DeleteEntry {
        key: PartitionKey,
        key_string: String,
        timestamp: i64,
    },
}

impl RepairTask {
    /// Apply the delete. Returns the number of documents removed.
    pub fn apply(&self, writer: &dyn IndexWriter) -> Result<usize> {
        match self {
            RepairTask::DeletePartition { key } => writer.delete_partition(key),
            RepairTask::DeleteEntry {
                key,
                key_string,
                timestamp,
            } => writer.delete_entry(key, key_string, *timestamp),
        }
    }
}

/// Accepts repair tasks without waiting for them to be applied.
pub trait IndexMaintenance: Send + Sync + Debug {
    fn submit(&self, task: RepairTask) -> Result<()>;
}

/// What the guard did with a visited row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardOutcome {
    /// The entry was stale; a delete was issued where one applies and the
    /// row must be skipped.
    Handled,
    /// The entry matches the row.
    Unchanged,
}

/// Detects index entries that no longer reflect their row.
#[derive(Debug, Clone)]
pub struct ConsistencyGuard {
    schema: TableSchema,
    config: Arc<IndexConfig>,
    maintenance: Arc<dyn IndexMaintenance>,
}

impl ConsistencyGuard {
    pub fn new(
        schema: TableSchema,
        config: Arc<IndexConfig>,
        maintenance: Arc<dyn IndexMaintenance>,
    ) -> Self {
        Self {
            schema,
            config,
            maintenance,
        }
    }

    /// Check the entry indexed at `timestamp` against the row's live columns.
    ///
    /// An empty row means the partition was deleted: the whole partition is
    /// dropped from the index, provided the table still declares columns. A
    /// row whose newest indexed column was written after `timestamp` means
    /// the entry predates the row: that one entry is dropped. Either way the
    /// row is reported as handled. Deletes go through the maintenance sink,
    /// so they never change what the current search returns.
    pub fn delete_if_not_latest(
        &self,
        key: &PartitionKey,
        timestamp: i64,
        key_string: &str,
        columns: &ColumnFamily,
    ) -> GuardOutcome {
        if columns.is_empty() {
            if self.schema.has_regular_columns() {
                debug!("partition {key_string} is gone, deleting its index entries");
                self.submit(RepairTask::DeletePartition { key: key.clone() });
            }
            return GuardOutcome::Handled;
        }

        let newest = columns
            .iter()
            .filter(|(name, _)| self.config.is_indexed(name))
            .map(|(_, cell)| cell.timestamp)
            .max();

        match newest {
            Some(written) if written > timestamp => {
                debug!("entry of {key_string} at {timestamp} is older than write at {written}");
                self.submit(RepairTask::DeleteEntry {
                    key: key.clone(),
                    key_string: key_string.to_string(),
                    timestamp,
                });
                GuardOutcome::Handled
            }
            _ => GuardOutcome::Unchanged,
        }
    }

    fn submit(&self, task: RepairTask) {
        if let Err(e) = self.maintenance.submit(task) {
            warn!("failed to queue index repair: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::index::config::FieldType;
    use crate::schema::ColumnType;
    use crate::storage::Cell;

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<RepairTask>>);

    impl IndexMaintenance for Recorder {
        fn submit(&self, task: RepairTask) -> Result<()> {
            self.0.lock().push(task);
            Ok(())
        }
    }

    fn guard(schema: TableSchema) -> (ConsistencyGuard, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let config = Arc::new(IndexConfig::builder().add_field("state", FieldType::String).build());
        (ConsistencyGuard::new(schema, config, recorder.clone()), recorder)
    }

    fn schema() -> TableSchema {
        TableSchema::new("ks", "t", "key", ColumnType::Int)
            .with_column("state", ColumnType::Text)
            .with_column("notes", ColumnType::Text)
    }

    fn key() -> PartitionKey {
        PartitionKey::new(7i32.to_be_bytes().to_vec())
    }

    #[test]
    fn test_deleted_row() {
        let (guard, recorder) = guard(schema());
        let outcome = guard.delete_if_not_latest(&key(), 10, "7", &ColumnFamily::new());
        assert_eq!(outcome, GuardOutcome::Handled);
        assert_eq!(*recorder.0.lock(), vec![RepairTask::DeletePartition { key: key() }]);
    }

    #[test]
    fn test_deleted_row_without_columns_in_schema() {
        let (guard, recorder) = guard(TableSchema::new("ks", "t", "key", ColumnType::Int));
        let outcome = guard.delete_if_not_latest(&key(), 10, "7", &ColumnFamily::new());
        assert_eq!(outcome, GuardOutcome::Handled);
        assert!(recorder.0.lock().is_empty());
    }

    #[test]
    fn test_newer_indexed_write() {
        let (guard, recorder) = guard(schema());
        let columns = ColumnFamily::new().with_cell("state", Cell::new(b"CA".to_vec(), 20));
        let outcome = guard.delete_if_not_latest(&key(), 10, "7", &columns);
        assert_eq!(outcome, GuardOutcome::Handled);
        assert_eq!(
            *recorder.0.lock(),
            vec![RepairTask::DeleteEntry {
                key: key(),
                key_string: "7".to_string(),
                timestamp: 10
            }]
        );
    }

    #[test]
    fn test_current_entry() {
        let (guard, recorder) = guard(schema());
        // Only writes to indexed columns make an entry stale.
        let columns = ColumnFamily::new()
            .with_cell("state", Cell::new(b"CA".to_vec(), 10))
            .with_cell("notes", Cell::new(b"later".to_vec(), 99));
        assert_eq!(guard.delete_if_not_latest(&key(), 10, "7", &columns), GuardOutcome::Unchanged);
        assert!(recorder.0.lock().is_empty());
    }
}
