//! The JSON condition language of structured queries.
//!
//! A condition names indexed fields and raw values; turning it into a
//! [`NativeQuery`] checks the fields against the index configuration and
//! converts every value the way the field was indexed.

use std::ops::Bound;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::data::DataValue;
use crate::error::{Result, RowlensError};
use crate::index::analysis::{analyze, normalize_term};
use crate::index::config::{FieldType, IndexConfig};
use crate::index::query::{BooleanClause, NativeQuery};
use crate::query::lucene::LuceneQueryParser;

/// Largest edit distance a fuzzy condition accepts.
pub const MAX_EDITS: u32 = 2;

fn default_max_edits() -> u32 {
    MAX_EDITS
}

/// A search condition, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Condition {
    /// Every document.
    All,
    /// Analyzed value; a multi-term value matches any of its terms.
    Match { field: String, value: Value },
    /// Analyzed values in order.
    Phrase {
        field: String,
        values: Vec<String>,
        #[serde(default)]
        slop: u32,
    },
    Prefix { field: String, value: String },
    Wildcard { field: String, value: String },
    Regexp { field: String, value: String },
    Fuzzy {
        field: String,
        value: String,
        #[serde(default = "default_max_edits", alias = "maxEdits")]
        max_edits: u32,
    },
    Range {
        field: String,
        #[serde(default)]
        lower: Option<Value>,
        #[serde(default)]
        upper: Option<Value>,
        #[serde(default, alias = "includeLower")]
        include_lower: bool,
        #[serde(default, alias = "includeUpper")]
        include_upper: bool,
    },
    Boolean {
        #[serde(default)]
        must: Vec<Condition>,
        #[serde(default)]
        should: Vec<Condition>,
        #[serde(default)]
        not: Vec<Condition>,
    },
    /// A classic query string.
    Lucene {
        query: String,
        #[serde(default, alias = "defaultField")]
        default_field: Option<String>,
    },
}

impl Condition {
    pub fn to_native(&self, config: &IndexConfig) -> Result<NativeQuery> {
        match self {
            Condition::All => Ok(NativeQuery::All),
            Condition::Match { field, value } => term_query(config, field, &json_text(value)),
            Condition::Phrase {
                field,
                values,
                slop,
            } => phrase_query(config, field, &values.join(" "), *slop),
            Condition::Prefix { field, value } => {
                let field_type = indexed_type(config, field)?;
                Ok(NativeQuery::Prefix {
                    field: field.clone(),
                    prefix: normalize_for(field_type, value),
                })
            }
            Condition::Wildcard { field, value } => {
                let field_type = indexed_type(config, field)?;
                NativeQuery::wildcard(field.clone(), &normalize_for(field_type, value))
            }
            Condition::Regexp { field, value } => {
                indexed_type(config, field)?;
                NativeQuery::regexp(field.clone(), value)
            }
            Condition::Fuzzy {
                field,
                value,
                max_edits,
            } => fuzzy_query(config, field, value, *max_edits),
            Condition::Range {
                field,
                lower,
                upper,
                include_lower,
                include_upper,
            } => range_query(
                config,
                field,
                lower.as_ref().map(json_text).as_deref(),
                upper.as_ref().map(json_text).as_deref(),
                *include_lower,
                *include_upper,
            ),
            Condition::Boolean { must, should, not } => {
                if must.is_empty() && should.is_empty() && not.is_empty() {
                    return Ok(NativeQuery::All);
                }
                let mut clauses = Vec::with_capacity(must.len() + should.len() + not.len());
                for condition in must {
                    clauses.push(BooleanClause::must(condition.to_native(config)?));
                }
                for condition in should {
                    clauses.push(BooleanClause::should(condition.to_native(config)?));
                }
                for condition in not {
                    clauses.push(BooleanClause::must_not(condition.to_native(config)?));
                }
                Ok(NativeQuery::Boolean(clauses))
            }
            Condition::Lucene {
                query,
                default_field,
            } => LuceneQueryParser::new(config)
                .with_default_field(default_field.as_deref())
                .parse(query),
        }
    }
}

fn json_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// The type of an indexed field, or an error naming the field.
pub(crate) fn indexed_type(config: &IndexConfig, field: &str) -> Result<FieldType> {
    config
        .field_type(field)
        .ok_or_else(|| RowlensError::execution(format!("field '{field}' is not indexed")))
}

/// Analyzed fields are case-folded; keyword fields match verbatim.
pub(crate) fn normalize_for(field_type: FieldType, text: &str) -> String {
    if field_type.is_analyzed() {
        normalize_term(text)
    } else {
        text.to_string()
    }
}

/// Query for a single value as the field would index it.
pub(crate) fn term_query(config: &IndexConfig, field: &str, text: &str) -> Result<NativeQuery> {
    let field_type = indexed_type(config, field)?;
    match field_type {
        FieldType::Text => {
            let mut terms = analyze(text);
            if terms.len() == 1 {
                return Ok(NativeQuery::term(field, terms.remove(0)));
            }
            Ok(NativeQuery::Boolean(
                terms
                    .into_iter()
                    .map(|term| BooleanClause::should(NativeQuery::term(field, term)))
                    .collect(),
            ))
        }
        FieldType::String => Ok(NativeQuery::term(field, text)),
        _ => Ok(NativeQuery::exact(field, typed_value(field, field_type, text)?)),
    }
}

pub(crate) fn phrase_query(
    config: &IndexConfig,
    field: &str,
    text: &str,
    slop: u32,
) -> Result<NativeQuery> {
    match indexed_type(config, field)? {
        FieldType::Text => Ok(NativeQuery::Phrase {
            field: field.to_string(),
            terms: analyze(text),
            slop,
        }),
        _ => term_query(config, field, text),
    }
}

pub(crate) fn fuzzy_query(
    config: &IndexConfig,
    field: &str,
    text: &str,
    max_edits: u32,
) -> Result<NativeQuery> {
    let field_type = indexed_type(config, field)?;
    if max_edits > MAX_EDITS {
        return Err(RowlensError::execution(format!(
            "max edits must be between 0 and {MAX_EDITS}, got {max_edits}"
        )));
    }
    Ok(NativeQuery::Fuzzy {
        field: field.to_string(),
        term: normalize_for(field_type, text),
        max_edits,
    })
}

/// Range over a field; `None` leaves that end open.
pub(crate) fn range_query(
    config: &IndexConfig,
    field: &str,
    lower: Option<&str>,
    upper: Option<&str>,
    include_lower: bool,
    include_upper: bool,
) -> Result<NativeQuery> {
    let field_type = indexed_type(config, field)?;
    let bound = |text: Option<&str>, inclusive: bool| -> Result<Bound<DataValue>> {
        let Some(text) = text else {
            return Ok(Bound::Unbounded);
        };
        let value = match field_type {
            FieldType::Text => DataValue::Text(normalize_term(text)),
            _ => typed_value(field, field_type, text)?,
        };
        Ok(if inclusive {
            Bound::Included(value)
        } else {
            Bound::Excluded(value)
        })
    };
    Ok(NativeQuery::Range {
        field: field.to_string(),
        lower: bound(lower, include_lower)?,
        upper: bound(upper, include_upper)?,
    })
}

/// Convert query text into a value of the field's type.
pub(crate) fn typed_value(field: &str, field_type: FieldType, text: &str) -> Result<DataValue> {
    let invalid = || {
        RowlensError::execution(format!(
            "'{text}' is not a valid {field_type:?} value for field '{field}'"
        ))
    };
    let text = text.trim();
    match field_type {
        FieldType::Text | FieldType::String => Ok(DataValue::Text(text.to_string())),
        FieldType::Integer | FieldType::Long => match text.parse::<i64>() {
            Ok(v) => Ok(DataValue::BigInt(v)),
            Err(_) => text.parse::<f64>().map(DataValue::Double).map_err(|_| invalid()),
        },
        FieldType::Float | FieldType::Double => {
            text.parse::<f64>().map(DataValue::Double).map_err(|_| invalid())
        }
        FieldType::Boolean => match text.to_ascii_lowercase().as_str() {
            "true" => Ok(DataValue::Boolean(true)),
            "false" => Ok(DataValue::Boolean(false)),
            _ => Err(invalid()),
        },
        FieldType::Date => {
            if let Ok(millis) = text.parse::<i64>() {
                return DateTime::from_timestamp_millis(millis)
                    .map(DataValue::Timestamp)
                    .ok_or_else(invalid);
            }
            DateTime::parse_from_rfc3339(text)
                .map(|ts| DataValue::Timestamp(ts.with_timezone(&Utc)))
                .map_err(|_| invalid())
        }
    }
}
