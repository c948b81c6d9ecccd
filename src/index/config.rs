use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, RowlensError};

/// How an indexed field is stored and matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// Analyzed full text, matched token by token.
    #[default]
    Text,
    /// Un-analyzed keyword, matched verbatim.
    String,
    Integer,
    Long,
    Float,
    Double,
    Boolean,
    Date,
}

impl FieldType {
    pub fn is_analyzed(&self) -> bool {
        matches!(self, FieldType::Text)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            FieldType::Integer | FieldType::Long | FieldType::Float | FieldType::Double
        )
    }

    /// Analyzed text has no single value to sort on.
    pub fn is_sortable(&self) -> bool {
        !self.is_analyzed()
    }
}

/// Per-field index properties.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldProperties {
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
}

impl From<FieldType> for FieldProperties {
    fn from(field_type: FieldType) -> Self {
        Self { field_type }
    }
}

/// Configuration of one row index.
///
/// Read from the JSON options document attached to the index definition,
/// for example:
///
/// ```json
/// {"numShards": 16, "metaColumn": true,
///  "fields": {"tags": {"type": "text"}, "state": {}}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexConfig {
    /// Indexed fields by column name.
    #[serde(default)]
    pub fields: BTreeMap<String, FieldProperties>,
    /// Whether failures and aggregates are reported through the meta column.
    #[serde(default, alias = "meta_column")]
    pub meta_column: bool,
    /// Number of index shards.
    #[serde(default = "default_shards", alias = "numShards")]
    pub shards: usize,
}

fn default_shards() -> usize {
    1
}

impl IndexConfig {
    pub fn new() -> Self {
        Self {
            fields: BTreeMap::new(),
            meta_column: false,
            shards: default_shards(),
        }
    }

    pub fn builder() -> IndexConfigBuilder {
        IndexConfigBuilder::default()
    }

    /// Parse and validate a JSON options document.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: IndexConfig = serde_json::from_str(json)
            .map_err(|e| RowlensError::invalid_config(format!("malformed index options: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load the options document from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(RowlensError::invalid_config("shard count must be at least 1"));
        }
        Ok(())
    }

    pub fn field_type(&self, name: &str) -> Option<FieldType> {
        self.fields.get(name).map(|p| p.field_type)
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct IndexConfigBuilder {
    fields: BTreeMap<String, FieldProperties>,
    meta_column: bool,
    shards: Option<usize>,
}

impl IndexConfigBuilder {
    pub fn add_field(mut self, name: impl Into<String>, properties: impl Into<FieldProperties>) -> Self {
        self.fields.insert(name.into(), properties.into());
        self
    }

    pub fn meta_column(mut self, enabled: bool) -> Self {
        self.meta_column = enabled;
        self
    }

    pub fn shards(mut self, shards: usize) -> Self {
        self.shards = Some(shards);
        self
    }

    pub fn build(self) -> IndexConfig {
        IndexConfig {
            fields: self.fields,
            meta_column: self.meta_column,
            shards: self.shards.unwrap_or_else(default_shards),
        }
    }
}
