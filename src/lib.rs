//! # Rowlens
//!
//! Secondary-index queries over a wide-column row store.
//!
//! A read request carries a JSON query in the clause that targets an index
//! column. Rowlens runs that query against an inverted index, maps the hits
//! back to stored rows, drops hits whose index entries no longer match their
//! row (and schedules their removal), and optionally aggregates the result.
//!
//! ## Features
//!
//! - Structured JSON conditions and a classic query-string syntax
//! - BM25 relevance or field sorting with deterministic tie-breaking
//! - Read-time repair of stale index entries on a background worker
//! - `sum`, `values`, `count`, `min` and `max` aggregates
//! - Errors reported in-band through a meta column

pub mod data;
pub mod error;
pub mod function;
pub mod index;
pub mod maintenance;
pub mod query;
pub mod schema;
pub mod search;
pub mod storage;
mod util;

pub use data::DataValue;
pub use error::{Result, RowlensError};
pub use function::{AggregateSpec, Function, FunctionSpec};
pub use index::{
    FieldType, IndexConfig, IndexEntry, IndexRef, IndexSearcher, IndexWriter, MemoryIndex,
    SearchableIndex,
};
pub use maintenance::{BackgroundRepairer, ConsistencyGuard, GuardOutcome, IndexMaintenance, RepairTask};
pub use query::{Clause, Operator, QueryTranslator, StructuredQuery};
pub use schema::{ColumnType, TableSchema};
pub use search::{ResultRow, RowIndexSearcher};
pub use storage::{Cell, ColumnFamily, ExtendedFilter, MemoryRowStore, PartitionKey, RowStore, StorageRow};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
