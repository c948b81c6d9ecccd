//! Structured queries embedded in filter clauses.
//!
//! The value of the clause that targets the index is a JSON document:
//!
//! ```json
//! {"query":  {"type": "lucene", "query": "tags:hello* AND state:CA"},
//!  "filter": {"type": "match", "field": "state", "value": "CA"},
//!  "sort":   [{"field": "segment", "reverse": true}],
//!  "function": {"function": "sum", "field": "segment", "alias": "total"}}
//! ```
//!
//! Every entry is optional. `query` scores, `filter` only restricts.

pub mod clause;
pub mod condition;
pub mod lucene;
pub mod sort;
pub mod translator;

use std::sync::Arc;

use serde::Deserialize;

use crate::error::{Result, RowlensError};
use crate::function::{Function, FunctionSpec};
use crate::index::config::IndexConfig;
use crate::index::query::{BooleanClause, NativeQuery, SortField};

pub use clause::{Clause, Operator};
pub use condition::Condition;
pub use sort::{SortFieldSpec, SortSpec};
pub use translator::QueryTranslator;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct QueryPayload {
    #[serde(default)]
    query: Option<Condition>,
    #[serde(default)]
    filter: Option<Condition>,
    #[serde(default)]
    sort: Option<SortSpec>,
    #[serde(default)]
    function: Option<FunctionSpec>,
}

/// A parsed query, bound to the configuration of the index it runs on.
#[derive(Debug, Clone)]
pub struct StructuredQuery {
    query: Option<Condition>,
    filter: Option<Condition>,
    sort: Option<SortSpec>,
    function: Function,
    config: Arc<IndexConfig>,
}

impl StructuredQuery {
    /// Parse the JSON payload and resolve its function.
    pub fn parse(json: &str, config: Arc<IndexConfig>) -> Result<Self> {
        let payload: QueryPayload = serde_json::from_str(json)
            .map_err(|e| RowlensError::translation(format!("malformed query '{json}': {e}")))?;
        let function = match payload.function {
            Some(spec) => Function::from_spec(spec)?,
            None => Function::Rows,
        };
        Ok(Self {
            query: payload.query,
            filter: payload.filter,
            sort: payload.sort,
            function,
            config,
        })
    }

    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    pub fn function(&self) -> &Function {
        &self.function
    }

    pub fn has_sort(&self) -> bool {
        self.sort.as_ref().is_some_and(|sort| !sort.fields().is_empty())
    }

    /// Build the index query. No condition at all matches every document.
    pub fn native_query(&self) -> Result<NativeQuery> {
        let query = self
            .query
            .as_ref()
            .map(|condition| condition.to_native(&self.config))
            .transpose()?;
        let filter = self
            .filter
            .as_ref()
            .map(|condition| condition.to_native(&self.config))
            .transpose()?;

        Ok(match (query, filter) {
            (None, None) => NativeQuery::All,
            (Some(query), None) => query,
            (None, Some(filter)) => NativeQuery::Boolean(vec![BooleanClause::filter(filter)]),
            (Some(query), Some(filter)) => NativeQuery::Boolean(vec![
                BooleanClause::must(query),
                BooleanClause::filter(filter),
            ]),
        })
    }

    /// Sort keys of the query; empty when it declares none.
    pub fn sort_fields(&self) -> Result<Vec<SortField>> {
        match &self.sort {
            Some(sort) => sort.to_sort_fields(&self.config),
            None => Ok(Vec::new()),
        }
    }
}
