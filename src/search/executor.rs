use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::index::IndexSearcher;
use crate::index::collector::{Collector, DocumentHit, ResultCollector};
use crate::query::StructuredQuery;
use crate::util::timer::SimpleTimer;

/// Hits of one index search.
#[derive(Debug)]
pub struct ExecutionOutcome {
    /// Best first, at most the effective limit.
    pub hits: Vec<DocumentHit>,
    /// Every matching document, kept or not.
    pub total_hits: u64,
    pub elapsed: Duration,
}

/// Runs a structured query against one searcher.
#[derive(Debug)]
pub struct IndexQueryExecutor<'a> {
    searcher: &'a dyn IndexSearcher,
}

impl<'a> IndexQueryExecutor<'a> {
    pub fn new(searcher: &'a dyn IndexSearcher) -> Self {
        Self { searcher }
    }

    /// Row limit for a request asking for `requested` rows: never more than
    /// the index holds, and never zero for the index.
    pub fn effective_limit(&self, requested: usize) -> usize {
        let limit = self.searcher.max_doc().max(1);
        requested.min(limit)
    }

    pub fn execute(&self, query: &StructuredQuery, requested: usize) -> Result<ExecutionOutcome> {
        let timer = SimpleTimer::start();
        let limit = self.effective_limit(requested);

        let native = query.native_query()?;
        let mut collector = if query.has_sort() {
            ResultCollector::with_sort(limit, query.sort_fields()?)
        } else {
            ResultCollector::new(limit)
        };

        self.searcher.search(&native, &mut collector)?;

        let total_hits = collector.total_hits();
        let hits = collector.into_hits();
        let elapsed = timer.elapsed();
        debug!(
            "query {native} matched {total_hits} documents, kept {} (limit {limit}) in {} ms",
            hits.len(),
            elapsed.as_millis()
        );
        Ok(ExecutionOutcome {
            hits,
            total_hits,
            elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::data::DataValue;
    use crate::error::RowlensError;
    use crate::index::config::{FieldType, IndexConfig};
    use crate::index::{IndexEntry, MemoryIndex, SearchableIndex};
    use crate::storage::PartitionKey;

    fn setup(docs: i32) -> (Arc<IndexConfig>, MemoryIndex) {
        let config = Arc::new(
            IndexConfig::builder()
                .add_field("state", FieldType::String)
                .add_field("segment", FieldType::Integer)
                .build(),
        );
        let index = MemoryIndex::new(Arc::clone(&config)).unwrap();
        for i in 0..docs {
            let key = PartitionKey::new(i.to_be_bytes().to_vec());
            let state = if i % 2 == 0 { "CA" } else { "NY" };
            index
                .add_entry(
                    IndexEntry::new(key, i.to_string(), 1),
                    [("state", DataValue::from(state)), ("segment", DataValue::Int(i))],
                )
                .unwrap();
        }
        (config, index)
    }

    #[test]
    fn test_limit_is_bounded_by_index_size() {
        let (config, index) = setup(6);
        let searcher = index.acquire_searcher().unwrap();
        let executor = IndexQueryExecutor::new(searcher.as_ref());
        let query = StructuredQuery::parse("{}", config).unwrap();

        let outcome = executor.execute(&query, 100).unwrap();
        assert_eq!(outcome.hits.len(), 6);
        assert_eq!(outcome.total_hits, 6);

        let outcome = executor.execute(&query, 4).unwrap();
        assert_eq!(outcome.hits.len(), 4);
        assert_eq!(outcome.total_hits, 6);
    }

    #[test]
    fn test_empty_index() {
        let (config, index) = setup(0);
        let searcher = index.acquire_searcher().unwrap();
        let executor = IndexQueryExecutor::new(searcher.as_ref());
        assert_eq!(executor.effective_limit(10), 1);
        assert_eq!(executor.effective_limit(0), 0);

        let query = StructuredQuery::parse("{}", config).unwrap();
        assert!(executor.execute(&query, 10).unwrap().hits.is_empty());
    }

    #[test]
    fn test_sorted_execution() {
        let (config, index) = setup(6);
        let searcher = index.acquire_searcher().unwrap();
        let query = StructuredQuery::parse(
            r#"{"query":{"type":"match","field":"state","value":"CA"},
                "sort":[{"field":"segment","reverse":true}]}"#,
            config,
        )
        .unwrap();
        let outcome = IndexQueryExecutor::new(searcher.as_ref()).execute(&query, 2).unwrap();
        let keys: Vec<_> = outcome.hits.iter().map(|h| h.entry.key_string.as_str()).collect();
        assert_eq!(keys, vec!["4", "2"]);
        assert_eq!(outcome.total_hits, 3);
    }

    #[test]
    fn test_construction_failures() {
        let (config, index) = setup(2);
        let searcher = index.acquire_searcher().unwrap();
        let executor = IndexQueryExecutor::new(searcher.as_ref());
        let unknown_field = StructuredQuery::parse(
            r#"{"query":{"type":"prefix","field":"magic","value":"x"}}"#,
            Arc::clone(&config),
        )
        .unwrap();
        assert!(matches!(executor.execute(&unknown_field, 10), Err(RowlensError::Execution(_))));

        let bad_sort = StructuredQuery::parse(r#"{"sort":[{"field":"nope"}]}"#, config).unwrap();
        assert!(matches!(executor.execute(&bad_sort, 10), Err(RowlensError::Execution(_))));
    }
}
