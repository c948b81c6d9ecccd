//! In-memory row store.

use std::collections::BTreeMap;

use parking_lot::RwLock;

use crate::data::DataValue;
use crate::error::{Result, RowlensError};
use crate::schema::TableSchema;
use crate::storage::{Cell, ColumnFamily, PartitionKey, RowStore};

/// A last-write-wins row store kept in memory.
///
/// Writes carry explicit timestamps so callers can reproduce out-of-order
/// and delayed writes. Deleting a partition leaves an empty column family
/// behind, the way a tombstoned partition reads back from disk.
#[derive(Debug)]
pub struct MemoryRowStore {
    schema: TableSchema,
    rows: RwLock<BTreeMap<PartitionKey, ColumnFamily>>,
}

impl MemoryRowStore {
    pub fn new(schema: TableSchema) -> Self {
        Self {
            schema,
            rows: RwLock::new(BTreeMap::new()),
        }
    }

    /// Write a raw cell. Older writes never replace newer ones.
    pub fn write_cell(&self, key: &PartitionKey, column: &str, cell: Cell) -> Result<()> {
        if self.schema.value_type(column).is_none() {
            return Err(RowlensError::storage(format!(
                "column '{column}' is not declared by {}",
                self.schema.qualified_name()
            )));
        }
        let mut rows = self.rows.write();
        let family = rows.entry(key.clone()).or_default();
        let newer = family
            .get(column)
            .is_none_or(|existing| existing.timestamp <= cell.timestamp);
        if newer {
            family.insert(column, cell);
        }
        Ok(())
    }

    /// Encode a value with the column's registered type and write it.
    pub fn write_value(
        &self,
        key: &PartitionKey,
        column: &str,
        value: impl Into<DataValue>,
        timestamp: i64,
    ) -> Result<()> {
        let ty = self.schema.value_type(column).ok_or_else(|| {
            RowlensError::storage(format!(
                "column '{column}' is not declared by {}",
                self.schema.qualified_name()
            ))
        })?;
        let bytes = ty.encode(&value.into())?;
        self.write_cell(key, column, Cell::new(bytes, timestamp))
    }

    /// Delete every column of a partition.
    pub fn delete_row(&self, key: &PartitionKey) {
        self.rows
            .write()
            .insert(key.clone(), ColumnFamily::new());
    }

    pub fn delete_column(&self, key: &PartitionKey, column: &str) {
        if let Some(family) = self.rows.write().get_mut(key) {
            family.remove(column);
        }
    }

    /// Number of partitions ever written, tombstoned ones included.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl RowStore for MemoryRowStore {
    fn schema(&self) -> &TableSchema {
        &self.schema
    }

    fn read_row(&self, key: &PartitionKey) -> Result<Option<ColumnFamily>> {
        Ok(self.rows.read().get(key).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ColumnType;

    fn store() -> MemoryRowStore {
        MemoryRowStore::new(
            TableSchema::new("ks", "t", "key", ColumnType::Int)
                .with_column("state", ColumnType::Text),
        )
    }

    fn key(k: i32) -> PartitionKey {
        PartitionKey::new(k.to_be_bytes().to_vec())
    }

    #[test]
    fn test_last_write_wins() {
        let store = store();
        store.write_value(&key(1), "state", "CA", 20).unwrap();
        store.write_value(&key(1), "state", "NY", 10).unwrap();

        let family = store.read_row(&key(1)).unwrap().unwrap();
        let cell = family.get("state").unwrap();
        assert_eq!(cell.value, b"CA");
        assert_eq!(cell.timestamp, 20);
    }

    #[test]
    fn test_delete_leaves_empty_family() {
        let store = store();
        store.write_value(&key(1), "state", "CA", 1).unwrap();
        store.delete_row(&key(1));

        assert!(store.read_row(&key(1)).unwrap().unwrap().is_empty());
        assert!(store.read_row(&key(2)).unwrap().is_none());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let store = store();
        assert!(store.write_value(&key(1), "nope", "x", 1).is_err());
    }
}
