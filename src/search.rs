//! The search pipeline of one index.
//!
//! A read request reaches the index as an [`ExtendedFilter`]. The searcher
//! picks the clause carrying the structured query, runs it against the
//! index, resolves the hits back into stored rows (dropping stale entries on
//! the way), applies the remaining clauses and finally the query's function.

pub mod executor;
pub mod meta;
pub mod reporter;
pub mod resolver;

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::index::config::IndexConfig;
use crate::index::{IndexRef, SearchableIndex};
use crate::maintenance::consistency::{ConsistencyGuard, IndexMaintenance};
use crate::query::clause::Clause;
use crate::query::translator::QueryTranslator;
use crate::schema::TableSchema;
use crate::storage::{ExtendedFilter, RowStore, StorageRow};

pub use executor::{ExecutionOutcome, IndexQueryExecutor};
pub use meta::make_synthetic_row;
pub use reporter::{error_payload, escape_ecma_script, report_error};
pub use resolver::RowScanner;

/// A row returned by a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultRow {
    /// A row read from the base table.
    Stored(StorageRow),
    /// A row built by the searcher, carrying an aggregate or an error in the
    /// index column.
    Synthetic(StorageRow),
}

impl ResultRow {
    pub fn row(&self) -> &StorageRow {
        match self {
            ResultRow::Stored(row) | ResultRow::Synthetic(row) => row,
        }
    }

    pub fn into_row(self) -> StorageRow {
        match self {
            ResultRow::Stored(row) | ResultRow::Synthetic(row) => row,
        }
    }

    pub fn is_synthetic(&self) -> bool {
        matches!(self, ResultRow::Synthetic(_))
    }
}

/// Answers read requests on a table through one of its indexes.
#[derive(Debug)]
pub struct RowIndexSearcher {
    index_ref: IndexRef,
    config: Arc<IndexConfig>,
    store: Arc<dyn RowStore>,
    index: Arc<dyn SearchableIndex>,
    translator: QueryTranslator,
    guard: ConsistencyGuard,
}

impl RowIndexSearcher {
    pub fn new(
        index_ref: IndexRef,
        config: Arc<IndexConfig>,
        store: Arc<dyn RowStore>,
        index: Arc<dyn SearchableIndex>,
        maintenance: Arc<dyn IndexMaintenance>,
    ) -> Self {
        let schema = store.schema().clone();
        let translator = QueryTranslator::new(schema.clone(), index_ref.clone(), Arc::clone(&config));
        let guard = ConsistencyGuard::new(schema, Arc::clone(&config), maintenance);
        Self {
            index_ref,
            config,
            store,
            index,
            translator,
            guard,
        }
    }

    pub fn index_ref(&self) -> &IndexRef {
        &self.index_ref
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn schema(&self) -> &TableSchema {
        self.store.schema()
    }

    /// Whether this index answers a request with these clauses.
    pub fn is_indexing(&self, clauses: &[Clause]) -> bool {
        self.translator.is_indexing(clauses)
    }

    /// Run a read request.
    ///
    /// Returns no rows when no clause targets this index. Failures are
    /// returned as errors, or as a single error row when the index reports
    /// through its meta column.
    pub fn search(&self, filter: &ExtendedFilter) -> Result<Vec<ResultRow>> {
        let Some((position, clause)) = self.translator.select_clause(filter.clauses()) else {
            return Ok(Vec::new());
        };
        self.run(filter, position, clause)
            .or_else(|err| report_error(err, self.config.meta_column, self.schema(), &self.index_ref))
    }

    fn run(&self, filter: &ExtendedFilter, position: usize, clause: &Clause) -> Result<Vec<ResultRow>> {
        let query = self.translator.translate(clause)?;

        let searcher = self.index.acquire_searcher()?;
        let outcome = IndexQueryExecutor::new(searcher.as_ref()).execute(&query, filter.max_rows())?;

        let mut scanner = RowScanner::new(self.store.as_ref(), &self.guard, outcome.hits);
        let rows = filter.filter_rows(scanner.by_ref(), self.schema(), Some(position))?;
        drop(searcher);

        debug!(
            "index {} resolved {} rows, skipped {} stale entries",
            self.index_ref.name,
            rows.len(),
            scanner.skipped()
        );
        query.function().process(rows, self.schema(), &self.index_ref)
    }
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;

    use super::*;
    use crate::data::DataValue;
    use crate::error::RowlensError;
    use crate::index::config::FieldType;
    use crate::index::{IndexEntry, MemoryIndex};
    use crate::maintenance::consistency::RepairTask;
    use crate::schema::ColumnType;
    use crate::storage::{MemoryRowStore, PartitionKey};

    #[derive(Debug, Default)]
    struct Recorder(Mutex<Vec<RepairTask>>);

    impl IndexMaintenance for Recorder {
        fn submit(&self, task: RepairTask) -> Result<()> {
            self.0.lock().push(task);
            Ok(())
        }
    }

    fn key(i: i32) -> PartitionKey {
        PartitionKey::new(i.to_be_bytes().to_vec())
    }

    fn searcher(meta_column: bool) -> (RowIndexSearcher, Arc<MemoryIndex>) {
        let schema = TableSchema::new("ks", "t", "key", ColumnType::Int)
            .with_column("state", ColumnType::Text)
            .with_column("magic", ColumnType::Text);
        let config = Arc::new(
            IndexConfig::builder()
                .add_field("state", FieldType::String)
                .meta_column(meta_column)
                .build(),
        );
        let store = Arc::new(MemoryRowStore::new(schema.clone()));
        let index = Arc::new(MemoryIndex::new(Arc::clone(&config)).unwrap());
        for (i, state) in [(1, "CA"), (2, "NY"), (3, "CA")] {
            store.write_value(&key(i), "state", state, 10).unwrap();
            index
                .add_entry(IndexEntry::new(key(i), i.to_string(), 10), [("state", DataValue::from(state))])
                .unwrap();
        }
        let searcher = RowIndexSearcher::new(
            IndexRef::new("state_idx", "magic"),
            config,
            store,
            index.clone(),
            Arc::new(Recorder::default()),
        );
        (searcher, index)
    }

    fn request(payload: &str) -> ExtendedFilter {
        ExtendedFilter::new(vec![Clause::eq("magic", payload.as_bytes().to_vec())], 10)
    }

    #[test]
    fn test_rows_pass_through() {
        let (searcher, _) = searcher(false);
        let rows = searcher
            .search(&request(r#"{"query":{"type":"match","field":"state","value":"CA"}}"#))
            .unwrap();
        let keys: Vec<_> = rows.iter().map(|r| r.row().key.clone()).collect();
        assert_eq!(keys, vec![key(1), key(3)]);
        assert!(rows.iter().all(|r| !r.is_synthetic()));
    }

    #[test]
    fn test_no_indexed_clause() {
        let (searcher, _) = searcher(false);
        let filter = ExtendedFilter::new(vec![Clause::eq("key", 1i32.to_be_bytes().to_vec())], 10);
        assert!(!searcher.is_indexing(filter.clauses()));
        assert!(searcher.search(&filter).unwrap().is_empty());
    }

    #[test]
    fn test_errors_without_meta_column() {
        let (searcher, index) = searcher(false);
        let err = searcher.search(&request("not json")).unwrap_err();
        assert!(matches!(err, RowlensError::Translation(_)));

        let err = searcher
            .search(&request(r#"{"query":{"type":"match","field":"nope","value":"x"}}"#))
            .unwrap_err();
        assert!(matches!(err, RowlensError::Execution(_)));
        assert_eq!(index.open_searchers(), 0);
    }

    #[test]
    fn test_errors_with_meta_column() {
        let (searcher, _) = searcher(true);
        let rows = searcher.search(&request("not json")).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].is_synthetic());
        let payload = &rows[0].row().columns.get("magic").unwrap().value;
        assert!(payload.starts_with(br#"{"error":"Translation error: malformed query"#));
    }
}
