//! The read request's filter: clauses, row limit and column selection.

use std::collections::BTreeSet;

use log::debug;

use crate::error::{Result, RowlensError};
use crate::query::clause::Clause;
use crate::schema::TableSchema;
use crate::storage::StorageRow;

/// The filter of a read request.
///
/// Besides carrying the clauses the index picks its query from, it is the
/// terminal step of the pipeline: resolved rows are checked against the
/// remaining clauses, projected to the selected columns and capped at
/// `max_rows`.
#[derive(Debug, Clone)]
pub struct ExtendedFilter {
    clauses: Vec<Clause>,
    max_rows: usize,
    columns: Option<BTreeSet<String>>,
}

impl ExtendedFilter {
    pub fn new(clauses: Vec<Clause>, max_rows: usize) -> Self {
        Self {
            clauses,
            max_rows,
            columns: None,
        }
    }

    /// Restrict returned rows to the given columns.
    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn clauses(&self) -> &[Clause] {
        &self.clauses
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Drain `rows`, keeping those that satisfy every clause except the one at
    /// `index_clause` (which the index already answered).
    ///
    /// Stops pulling from `rows` once `max_rows` rows were accepted.
    pub fn filter_rows<I>(
        &self,
        rows: I,
        schema: &TableSchema,
        index_clause: Option<usize>,
    ) -> Result<Vec<StorageRow>>
    where
        I: IntoIterator<Item = Result<StorageRow>>,
    {
        let mut accepted = Vec::new();
        if self.max_rows == 0 {
            return Ok(accepted);
        }

        for row in rows {
            let mut row = row?;
            if !self.is_satisfied_by(&row, schema, index_clause)? {
                continue;
            }
            if let Some(columns) = &self.columns {
                row.columns.retain(|name| columns.contains(name));
            }
            accepted.push(row);
            if accepted.len() >= self.max_rows {
                break;
            }
        }

        debug!("filter accepted {} rows", accepted.len());
        Ok(accepted)
    }

    fn is_satisfied_by(
        &self,
        row: &StorageRow,
        schema: &TableSchema,
        index_clause: Option<usize>,
    ) -> Result<bool> {
        for (position, clause) in self.clauses.iter().enumerate() {
            if Some(position) == index_clause {
                continue;
            }
            let definition = schema.column(&clause.column).ok_or_else(|| {
                RowlensError::invalid_argument(format!(
                    "unknown column '{}' in filter on {}",
                    clause.column,
                    schema.qualified_name()
                ))
            })?;
            let expected = definition.column_type.decode(&clause.value)?;

            let actual = if schema.is_key_column(&clause.column) {
                Some(definition.column_type.decode(row.key.as_bytes())?)
            } else {
                row.value(schema, &clause.column)?
            };

            match actual {
                Some(actual) if clause.operator.matches(actual.cmp(&expected)) => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::clause::Operator;
    use crate::schema::ColumnType;
    use crate::storage::{Cell, ColumnFamily, PartitionKey};

    fn schema() -> TableSchema {
        TableSchema::new("ks", "t", "key", ColumnType::Int)
            .with_column("segment", ColumnType::Int)
            .with_column("state", ColumnType::Text)
            .with_column("magic", ColumnType::Text)
    }

    fn row(key: i32, segment: i32, state: &str) -> StorageRow {
        StorageRow::new(
            PartitionKey::new(key.to_be_bytes().to_vec()),
            ColumnFamily::new()
                .with_cell("segment", Cell::new(segment.to_be_bytes().to_vec(), 1))
                .with_cell("state", Cell::new(state.as_bytes().to_vec(), 1)),
        )
    }

    #[test]
    fn test_remaining_clauses_are_applied() {
        let filter = ExtendedFilter::new(
            vec![
                Clause::eq("segment", 30i32.to_be_bytes().to_vec()),
                Clause::eq("key", 36i32.to_be_bytes().to_vec()),
                Clause::eq("magic", b"{}".to_vec()),
            ],
            10,
        );
        let rows = vec![Ok(row(36, 30, "CA")), Ok(row(36, 20, "CA")), Ok(row(35, 30, "CA"))];

        let kept = filter.filter_rows(rows, &schema(), Some(2)).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].key.as_bytes(), &36i32.to_be_bytes());
    }

    #[test]
    fn test_range_operator_and_limit() {
        let filter = ExtendedFilter::new(
            vec![Clause::new("segment", Operator::Gte, 10i32.to_be_bytes().to_vec())],
            2,
        );
        let rows = (0..5).map(|i| Ok(row(i, i * 5, "TX")));

        let kept = filter.filter_rows(rows, &schema(), None).unwrap();
        let keys: Vec<_> = kept.iter().map(|r| r.key.as_bytes()[3]).collect();
        assert_eq!(keys, vec![2, 3]);
    }

    #[test]
    fn test_projection() {
        let filter = ExtendedFilter::new(Vec::new(), 10).with_columns(["state"]);
        let kept = filter
            .filter_rows(vec![Ok(row(1, 1, "NY"))], &schema(), None)
            .unwrap();
        assert_eq!(kept[0].columns.column_names().collect::<Vec<_>>(), vec!["state"]);
    }

    #[test]
    fn test_errors_propagate() {
        let filter = ExtendedFilter::new(Vec::new(), 10);
        let rows = vec![Ok(row(1, 1, "NY")), Err(RowlensError::storage("boom"))];
        assert!(filter.filter_rows(rows, &schema(), None).is_err());
    }
}
