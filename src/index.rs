//! The inverted index as consumed by the query pipeline.
//!
//! The index engine is an external collaborator; the pipeline only needs to
//! acquire a searcher, run a [`NativeQuery`] into a [`Collector`], and send
//! corrective deletes through an [`IndexWriter`]. [`MemoryIndex`] is an
//! in-memory implementation of all three.
//!
//! # Module Structure
//!
//! - `config`: index options (field types, meta column, shards)
//! - `analysis`: text normalization and tokenization
//! - `query`: the native query tree and its matching rules
//! - `collector`: bounded, ranked hit collection
//! - `memory`: sharded in-memory inverted index

pub mod analysis;
pub mod collector;
pub mod config;
pub mod memory;
pub mod query;

use std::fmt::Debug;

use crate::error::Result;
use crate::storage::PartitionKey;

pub use collector::{Collector, DocValues, DocumentHit, RankKey, ResultCollector, ScoredDoc};
pub use config::{FieldProperties, FieldType, IndexConfig};
pub use memory::MemoryIndex;
pub use query::{BooleanClause, NativeQuery, Occur, SortField};

/// Identifies an index and the column it is declared on.
///
/// Queries address the index through that column, and synthetic rows carry
/// their payload in it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRef {
    pub name: String,
    pub column: String,
}

impl IndexRef {
    pub fn new(name: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            column: column.into(),
        }
    }
}

/// The stored part of an index document that points back at its row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub key: PartitionKey,
    /// Textual form of the partition key.
    pub key_string: String,
    /// Write timestamp (microseconds) of the row version that was indexed.
    pub timestamp: i64,
}

impl IndexEntry {
    pub fn new(key: PartitionKey, key_string: impl Into<String>, timestamp: i64) -> Self {
        Self {
            key,
            key_string: key_string.into(),
            timestamp,
        }
    }
}

/// A point-in-time view of the index.
///
/// A searcher holds index resources for as long as it lives; dropping it
/// releases them.
pub trait IndexSearcher: Send + Sync + Debug {
    /// Number of documents in this view.
    fn max_doc(&self) -> usize;

    /// Feed every document matching `query` to `collector`.
    fn search(&self, query: &NativeQuery, collector: &mut dyn Collector) -> Result<()>;
}

/// An index that hands out searchers.
pub trait SearchableIndex: Send + Sync + Debug {
    fn acquire_searcher(&self) -> Result<Box<dyn IndexSearcher>>;
}

/// Write access used for corrective deletes.
pub trait IndexWriter: Send + Sync + Debug {
    /// Delete every document of a partition. Returns the number removed.
    fn delete_partition(&self, key: &PartitionKey) -> Result<usize>;

    /// Delete the documents of a partition indexed at exactly `timestamp`.
    fn delete_entry(&self, key: &PartitionKey, key_string: &str, timestamp: i64) -> Result<usize>;
}
