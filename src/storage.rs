//! Row storage as consumed by the index searcher.
//!
//! The storage engine itself is an external collaborator. This module
//! defines the narrow view the query pipeline needs: partition keys, cells
//! carrying their write timestamp, column families, and the [`RowStore`]
//! trait used to read a partition by key.

pub mod filter;
pub mod memory;

use std::collections::BTreeMap;
use std::fmt::Debug;

use crate::data::DataValue;
use crate::error::Result;
use crate::schema::TableSchema;

pub use filter::ExtendedFilter;
pub use memory::MemoryRowStore;

/// Serialized partition key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionKey(Vec<u8>);

impl PartitionKey {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// The reserved key used by synthetic rows.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A single column value with its write timestamp in microseconds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub value: Vec<u8>,
    pub timestamp: i64,
}

impl Cell {
    pub fn new(value: impl Into<Vec<u8>>, timestamp: i64) -> Self {
        Self {
            value: value.into(),
            timestamp,
        }
    }
}

/// The live columns of one partition, ordered by column name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnFamily {
    cells: BTreeMap<String, Cell>,
}

impl ColumnFamily {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, column: impl Into<String>, cell: Cell) {
        self.cells.insert(column.into(), cell);
    }

    pub fn with_cell(mut self, column: impl Into<String>, cell: Cell) -> Self {
        self.insert(column, cell);
        self
    }

    pub fn get(&self, column: &str) -> Option<&Cell> {
        self.cells.get(column)
    }

    pub fn remove(&mut self, column: &str) -> Option<Cell> {
        self.cells.remove(column)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Cell)> {
        self.cells.iter().map(|(name, cell)| (name.as_str(), cell))
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.cells.retain(|name, _| keep(name));
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// A partition key together with its live columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageRow {
    pub key: PartitionKey,
    pub columns: ColumnFamily,
}

impl StorageRow {
    pub fn new(key: PartitionKey, columns: ColumnFamily) -> Self {
        Self { key, columns }
    }

    /// Decode a column with its registered type.
    ///
    /// Returns `None` if the row has no cell for the column or the column is
    /// not declared by the schema.
    pub fn value(&self, schema: &TableSchema, column: &str) -> Result<Option<DataValue>> {
        let (Some(cell), Some(ty)) = (self.columns.get(column), schema.value_type(column)) else {
            return Ok(None);
        };
        ty.decode(&cell.value).map(Some)
    }
}

/// Read access to the base table.
pub trait RowStore: Send + Sync + Debug {
    /// Schema of the base table.
    fn schema(&self) -> &TableSchema;

    /// Read the live columns of a partition.
    ///
    /// Returns `Ok(None)` for a partition that was never written. A deleted
    /// partition is reported as an empty column family.
    fn read_row(&self, key: &PartitionKey) -> Result<Option<ColumnFamily>>;
}
