//! Functions applied to the resolved rows of a query.
//!
//! Without a declared function rows pass through unchanged. Aggregates
//! collapse their whole input into one synthetic row whose index column
//! carries `{"<alias>": <value>}`.

pub mod aggregate;

use serde_json::Value;

use crate::data::DataValue;
use crate::error::{Result, RowlensError};
use crate::index::IndexRef;
use crate::schema::TableSchema;
use crate::search::ResultRow;
use crate::search::meta::make_synthetic_row;
use crate::storage::StorageRow;

pub use aggregate::{AggregateSpec, FunctionSpec};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Function {
    /// Rows are returned as resolved.
    #[default]
    Rows,
    Sum(AggregateSpec),
    Values(AggregateSpec),
    Count(AggregateSpec),
    Min(AggregateSpec),
    Max(AggregateSpec),
}

impl Function {
    /// Resolve a declared function by name, ignoring case.
    pub fn from_spec(spec: FunctionSpec) -> Result<Self> {
        let name = spec.function.to_ascii_lowercase();
        let aggregate = AggregateSpec {
            field: spec.field,
            alias: spec.alias.unwrap_or_else(|| name.clone()),
            distinct: spec.distinct,
            group_by: spec.group_by,
        };
        match name.as_str() {
            "sum" => Ok(Function::Sum(aggregate)),
            "values" => Ok(Function::Values(aggregate)),
            "count" => Ok(Function::Count(aggregate)),
            "min" => Ok(Function::Min(aggregate)),
            "max" => Ok(Function::Max(aggregate)),
            _ => Err(RowlensError::translation(format!(
                "unknown function '{}'",
                spec.function
            ))),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Function::Rows => "rows",
            Function::Sum(_) => "sum",
            Function::Values(_) => "values",
            Function::Count(_) => "count",
            Function::Min(_) => "min",
            Function::Max(_) => "max",
        }
    }

    pub fn is_aggregate(&self) -> bool {
        !matches!(self, Function::Rows)
    }

    /// Apply the function to the resolved rows.
    pub fn process(
        &self,
        rows: Vec<StorageRow>,
        schema: &TableSchema,
        index: &IndexRef,
    ) -> Result<Vec<ResultRow>> {
        let (spec, value) = match self {
            Function::Rows => return Ok(rows.into_iter().map(ResultRow::Stored).collect()),
            Function::Sum(spec) => (spec, Value::from(spec.sum(&rows, schema)?)),
            Function::Values(spec) => {
                let values = spec.values(&rows, schema)?;
                (spec, Value::Array(values.iter().map(|v| v.to_json()).collect()))
            }
            Function::Count(spec) => (spec, Value::from(spec.count(&rows, schema)?)),
            Function::Min(spec) => (spec, optional_json(spec.min(&rows, schema)?)),
            Function::Max(spec) => (spec, optional_json(spec.max(&rows, schema)?)),
        };

        let payload = spec.payload(value)?;
        let row = make_synthetic_row(schema, index, payload).ok_or_else(|| {
            RowlensError::execution(format!(
                "table {} has no column '{}' to carry the {} result",
                schema.qualified_name(),
                index.column,
                self.name()
            ))
        })?;
        Ok(vec![ResultRow::Synthetic(row)])
    }
}

fn optional_json(value: Option<DataValue>) -> Value {
    value.map(|v| v.to_json()).unwrap_or(Value::Null)
}
