use serde::{Deserialize, Serialize};

use crate::data::DataValue;
use crate::error::{Result, RowlensError};
use crate::schema::column::ColumnType;
use crate::storage::PartitionKey;

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
}

impl ColumnDefinition {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// Schema of the base table an index is declared on.
///
/// The partition key is a single column; every other column is a regular
/// column whose cells carry their own write timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub keyspace: String,
    pub name: String,
    pub key: ColumnDefinition,
    #[serde(default)]
    pub columns: Vec<ColumnDefinition>,
}

impl TableSchema {
    pub fn new(
        keyspace: impl Into<String>,
        name: impl Into<String>,
        key_name: impl Into<String>,
        key_type: ColumnType,
    ) -> Self {
        Self {
            keyspace: keyspace.into(),
            name: name.into(),
            key: ColumnDefinition::new(key_name, key_type),
            columns: Vec::new(),
        }
    }

    /// Add a regular column.
    pub fn with_column(mut self, name: impl Into<String>, column_type: ColumnType) -> Self {
        self.columns.push(ColumnDefinition::new(name, column_type));
        self
    }

    /// `keyspace.table`
    pub fn qualified_name(&self) -> String {
        format!("{}.{}", self.keyspace, self.name)
    }

    /// Look up a column by name, the partition key included.
    pub fn column(&self, name: &str) -> Option<&ColumnDefinition> {
        if self.key.name == name {
            return Some(&self.key);
        }
        self.columns.iter().find(|c| c.name == name)
    }

    /// The registered type of a regular column.
    pub fn value_type(&self, name: &str) -> Option<ColumnType> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .map(|c| c.column_type)
    }

    pub fn is_key_column(&self, name: &str) -> bool {
        self.key.name == name
    }

    /// Whether the table still declares any regular column.
    pub fn has_regular_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Render a partition key in the key type's textual form.
    pub fn key_string(&self, key: &PartitionKey) -> Result<String> {
        self.key.column_type.get_string(key.as_bytes())
    }

    /// Build a partition key from a textual representation.
    pub fn parse_key(&self, text: &str) -> Result<PartitionKey> {
        let value = match self.key.column_type {
            ColumnType::Text | ColumnType::Ascii => DataValue::Text(text.to_string()),
            ColumnType::Int => text
                .parse::<i32>()
                .map(DataValue::Int)
                .map_err(|e| RowlensError::invalid_argument(format!("bad int key '{text}': {e}")))?,
            ColumnType::BigInt => text
                .parse::<i64>()
                .map(DataValue::BigInt)
                .map_err(|e| {
                    RowlensError::invalid_argument(format!("bad bigint key '{text}': {e}"))
                })?,
            other => {
                return Err(RowlensError::invalid_argument(format!(
                    "cannot parse a {other} partition key from text"
                )));
            }
        };
        Ok(PartitionKey::new(self.key.column_type.encode(&value)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> TableSchema {
        TableSchema::new("ks", "tag2", "key", ColumnType::Int)
            .with_column("tags", ColumnType::Text)
            .with_column("segment", ColumnType::Int)
    }

    #[test]
    fn test_column_lookup() {
        let schema = schema();
        assert_eq!(schema.column("key").unwrap().column_type, ColumnType::Int);
        assert_eq!(schema.value_type("tags"), Some(ColumnType::Text));
        assert_eq!(schema.value_type("key"), None);
        assert!(schema.column("missing").is_none());
        assert_eq!(schema.qualified_name(), "ks.tag2");
    }

    #[test]
    fn test_key_round_trip() {
        let schema = schema();
        let key = schema.parse_key("36").unwrap();
        assert_eq!(key.as_bytes(), &[0, 0, 0, 36]);
        assert_eq!(schema.key_string(&key).unwrap(), "36");
        assert!(schema.parse_key("x").is_err());
    }
}
