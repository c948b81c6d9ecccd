//! Aggregates over resolved rows.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::data::DataValue;
use crate::error::{Result, RowlensError};
use crate::schema::{ColumnType, TableSchema};
use crate::storage::StorageRow;

/// The `function` entry of a query payload, before the name is resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub function: String,
    pub field: String,
    #[serde(default, alias = "name")]
    pub alias: Option<String>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default, rename = "groupBy", alias = "group_by")]
    pub group_by: Option<String>,
}

/// A resolved aggregate declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSpec {
    /// Column the aggregate reads, matched case-insensitively.
    pub field: String,
    /// Key of the result in the output payload.
    pub alias: String,
    pub distinct: bool,
    /// Accepted and kept, but results are never grouped.
    pub group_by: Option<String>,
}

impl AggregateSpec {
    pub fn new(field: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            alias: alias.into(),
            distinct: false,
            group_by: None,
        }
    }

    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Decoded values of the target column across `rows`.
    ///
    /// Distinct values come back in natural order, otherwise in encounter
    /// order with duplicates.
    pub fn values(&self, rows: &[StorageRow], schema: &TableSchema) -> Result<Vec<DataValue>> {
        self.extract(rows, schema, |_| Ok(()))
    }

    /// Sum of the target column as a double.
    ///
    /// Fails on the first matching column if its type is not numeric, before
    /// anything is accumulated.
    pub fn sum(&self, rows: &[StorageRow], schema: &TableSchema) -> Result<f64> {
        let mut checked = false;
        let values = self.extract(rows, schema, |column_type| {
            if !checked && !column_type.is_numeric() {
                return Err(RowlensError::type_mismatch(
                    "Sum function is available only on numeric types",
                ));
            }
            checked = true;
            Ok(())
        })?;
        Ok(values
            .iter()
            .filter_map(DataValue::as_f64)
            .fold(0.0, |total, v| total + v))
    }

    /// Number of non-null values.
    pub fn count(&self, rows: &[StorageRow], schema: &TableSchema) -> Result<u64> {
        let values = self.values(rows, schema)?;
        Ok(values.iter().filter(|v| !v.is_null()).count() as u64)
    }

    pub fn min(&self, rows: &[StorageRow], schema: &TableSchema) -> Result<Option<DataValue>> {
        let values = self.values(rows, schema)?;
        Ok(values.into_iter().filter(|v| !v.is_null()).min())
    }

    pub fn max(&self, rows: &[StorageRow], schema: &TableSchema) -> Result<Option<DataValue>> {
        let values = self.values(rows, schema)?;
        Ok(values.into_iter().filter(|v| !v.is_null()).max())
    }

    /// The single-entry JSON object `{"<alias>": value}`.
    pub fn payload(&self, value: Value) -> Result<Vec<u8>> {
        let mut object = Map::with_capacity(1);
        object.insert(self.alias.clone(), value);
        Ok(serde_json::to_vec(&Value::Object(object))?)
    }

    fn extract<F>(&self, rows: &[StorageRow], schema: &TableSchema, mut check: F) -> Result<Vec<DataValue>>
    where
        F: FnMut(ColumnType) -> Result<()>,
    {
        let mut ordered = Vec::new();
        let mut distinct = BTreeSet::new();
        for row in rows {
            for (name, cell) in row.columns.iter() {
                if !name.eq_ignore_ascii_case(&self.field) {
                    continue;
                }
                let Some(column_type) = schema.value_type(name) else {
                    continue;
                };
                check(column_type)?;
                let value = column_type.decode(&cell.value)?;
                if self.distinct {
                    distinct.insert(value);
                } else {
                    ordered.push(value);
                }
            }
        }
        Ok(if self.distinct {
            distinct.into_iter().collect()
        } else {
            ordered
        })
    }
}
