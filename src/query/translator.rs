//! Picks the filter clause an index answers and parses its value.

use std::sync::Arc;

use log::debug;

use crate::error::{Result, RowlensError};
use crate::index::IndexRef;
use crate::index::config::IndexConfig;
use crate::query::StructuredQuery;
use crate::query::clause::{Clause, Operator};
use crate::schema::TableSchema;

#[derive(Debug, Clone)]
pub struct QueryTranslator {
    schema: TableSchema,
    index: IndexRef,
    config: Arc<IndexConfig>,
}

impl QueryTranslator {
    pub fn new(schema: TableSchema, index: IndexRef, config: Arc<IndexConfig>) -> Self {
        Self {
            schema,
            index,
            config,
        }
    }

    /// The first clause this index answers, with its position.
    ///
    /// A clause qualifies if it is an equality on an indexed field, or if it
    /// targets the index's own column (compared ignoring case) with any
    /// operator.
    pub fn select_clause<'c>(&self, clauses: &'c [Clause]) -> Option<(usize, &'c Clause)> {
        let selected = clauses.iter().enumerate().find(|(_, clause)| {
            (clause.operator == Operator::Eq && self.config.is_indexed(&clause.column))
                || clause.column.eq_ignore_ascii_case(&self.index.column)
        });
        match selected {
            Some((_, clause)) => debug!("index {} answers clause {clause}", self.index.name),
            None => debug!("index {} answers none of {} clauses", self.index.name, clauses.len()),
        }
        selected
    }

    pub fn is_indexing(&self, clauses: &[Clause]) -> bool {
        self.select_clause(clauses).is_some()
    }

    /// Decode the clause value with its column's type and parse it.
    ///
    /// A clause on the index column is decoded with that column's type
    /// however the clause spells its name.
    pub fn translate(&self, clause: &Clause) -> Result<StructuredQuery> {
        let column = if clause.column.eq_ignore_ascii_case(&self.index.column) {
            self.index.column.as_str()
        } else {
            clause.column.as_str()
        };
        let definition = self.schema.column(column).ok_or_else(|| {
            RowlensError::translation(format!(
                "column '{}' is not declared by {}",
                clause.column,
                self.schema.qualified_name()
            ))
        })?;
        let text = definition
            .column_type
            .get_string(&clause.value)
            .map_err(|e| RowlensError::translation(format!("cannot decode '{}': {e}", clause.column)))?;
        StructuredQuery::parse(&text, Arc::clone(&self.config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::function::Function;
    use crate::index::config::FieldType;
    use crate::schema::ColumnType;

    fn translator() -> QueryTranslator {
        let schema = TableSchema::new("ks", "tag2", "key", ColumnType::Int)
            .with_column("tags", ColumnType::Text)
            .with_column("state", ColumnType::Text)
            .with_column("segment", ColumnType::Int)
            .with_column("magic", ColumnType::Text);
        let config = IndexConfig::builder()
            .add_field("tags", FieldType::Text)
            .add_field("state", FieldType::String)
            .build();
        QueryTranslator::new(schema, IndexRef::new("tag_idx", "magic"), Arc::new(config))
    }

    #[test]
    fn test_first_qualifying_clause_wins() {
        let clauses = vec![
            Clause::new("segment", Operator::Neq, 1i32.to_be_bytes().to_vec()),
            Clause::eq("state", b"CA".to_vec()),
            Clause::new("MAGIC", Operator::Gt, b"{}".to_vec()),
        ];
        let (position, clause) = translator().select_clause(&clauses).unwrap();
        assert_eq!(position, 1);
        assert_eq!(clause.column, "state");
    }

    #[test]
    fn test_index_column_with_any_operator() {
        let clauses = vec![
            Clause::new("state", Operator::Gt, b"CA".to_vec()),
            Clause::new("Magic", Operator::Lt, b"{}".to_vec()),
        ];
        assert_eq!(translator().select_clause(&clauses).map(|(i, _)| i), Some(1));
    }

    #[test]
    fn test_no_clause() {
        let clauses = vec![Clause::eq("segment", 1i32.to_be_bytes().to_vec())];
        assert!(translator().select_clause(&clauses).is_none());
        assert!(!translator().is_indexing(&clauses));
        assert!(!translator().is_indexing(&[]));
    }

    #[test]
    fn test_translate() {
        let clause = Clause::eq(
            "magic",
            br#"{"query":{"type":"match","field":"tags","value":"tag2"},"function":{"function":"count","field":"state"}}"#.to_vec(),
        );
        let query = translator().translate(&clause).unwrap();
        assert_eq!(query.native_query().unwrap().to_string(), "tags:tag2");
        assert!(matches!(query.function(), Function::Count(_)));
    }

    #[test]
    fn test_translate_index_column_in_any_case() {
        let clause = Clause::new(
            "MAGIC",
            Operator::Gte,
            br#"{"query":{"type":"match","field":"state","value":"CA"}}"#.to_vec(),
        );
        let translator = translator();
        assert!(translator.is_indexing(std::slice::from_ref(&clause)));
        let query = translator.translate(&clause).unwrap();
        assert_eq!(query.native_query().unwrap().to_string(), "state:CA");

        let other = Clause::eq("STATE", br#"{}"#.to_vec());
        assert!(matches!(translator.translate(&other), Err(RowlensError::Translation(_))));
    }

    #[test]
    fn test_translate_errors() {
        let translator = translator();
        let unknown = Clause::eq("nope", b"{}".to_vec());
        assert!(matches!(translator.translate(&unknown), Err(RowlensError::Translation(_))));

        let not_json = Clause::eq("state", b"CA".to_vec());
        assert!(matches!(translator.translate(&not_json), Err(RowlensError::Translation(_))));

        let bad_utf8 = Clause::eq("magic", vec![0xff, 0xfe]);
        assert!(matches!(translator.translate(&bad_utf8), Err(RowlensError::Translation(_))));
    }
}
