//! Sort declarations of structured queries.

use serde::{Deserialize, Serialize};

use crate::error::{Result, RowlensError};
use crate::index::config::IndexConfig;
use crate::index::query::SortField;

/// One declared sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortFieldSpec {
    pub field: String,
    /// Sort descending.
    #[serde(default)]
    pub reverse: bool,
}

/// The `sort` entry of a query payload, either a bare list of fields or an
/// object wrapping one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SortSpec {
    Fields(Vec<SortFieldSpec>),
    Wrapped { fields: Vec<SortFieldSpec> },
}

impl SortSpec {
    pub fn fields(&self) -> &[SortFieldSpec] {
        match self {
            SortSpec::Fields(fields) | SortSpec::Wrapped { fields } => fields,
        }
    }

    /// Resolve the declared keys against the index configuration.
    ///
    /// Every key must name an indexed field with a single sortable value.
    pub fn to_sort_fields(&self, config: &IndexConfig) -> Result<Vec<SortField>> {
        self.fields()
            .iter()
            .map(|spec| match config.field_type(&spec.field) {
                Some(field_type) if field_type.is_sortable() => {
                    Ok(SortField::new(spec.field.clone(), spec.reverse))
                }
                Some(field_type) => Err(RowlensError::execution(format!(
                    "field '{}' of type {field_type:?} cannot be sorted on",
                    spec.field
                ))),
                None => Err(RowlensError::execution(format!(
                    "sort field '{}' is not indexed",
                    spec.field
                ))),
            })
            .collect()
    }
}
