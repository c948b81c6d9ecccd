//! Native index queries.
//!
//! A [`NativeQuery`] is the executable form of a structured query: every
//! field has been checked against the index configuration and every value
//! has been analyzed or converted to the field's type.

use std::fmt;
use std::ops::Bound;

use regex::Regex;

use crate::data::DataValue;
use crate::error::{Result, RowlensError};

/// How a clause of a boolean query participates in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Occur {
    /// Must match and contributes to the score.
    Must,
    /// May match; at least one should clause must match when there are no
    /// required clauses.
    Should,
    /// Must not match.
    MustNot,
    /// Must match but does not contribute to the score.
    Filter,
}

#[derive(Debug, Clone)]
pub struct BooleanClause {
    pub occur: Occur,
    pub query: NativeQuery,
}

impl BooleanClause {
    pub fn new(occur: Occur, query: NativeQuery) -> Self {
        Self { occur, query }
    }

    pub fn must(query: NativeQuery) -> Self {
        Self::new(Occur::Must, query)
    }

    pub fn should(query: NativeQuery) -> Self {
        Self::new(Occur::Should, query)
    }

    pub fn must_not(query: NativeQuery) -> Self {
        Self::new(Occur::MustNot, query)
    }

    pub fn filter(query: NativeQuery) -> Self {
        Self::new(Occur::Filter, query)
    }
}

/// An executable index query.
#[derive(Debug, Clone)]
pub enum NativeQuery {
    /// Matches every document.
    All,
    /// A single indexed term.
    Term { field: String, term: String },
    /// Terms appearing in order, with up to `slop` positions between them.
    Phrase {
        field: String,
        terms: Vec<String>,
        slop: u32,
    },
    Prefix { field: String, prefix: String },
    /// Terms matching an anchored regular expression. Wildcard patterns are
    /// compiled into this form.
    Pattern { field: String, regex: Regex },
    /// Terms within `max_edits` edits of `term`.
    Fuzzy {
        field: String,
        term: String,
        max_edits: u32,
    },
    /// Field values between two bounds, compared in the field's type.
    Range {
        field: String,
        lower: Bound<DataValue>,
        upper: Bound<DataValue>,
    },
    Boolean(Vec<BooleanClause>),
}

impl NativeQuery {
    pub fn term(field: impl Into<String>, term: impl Into<String>) -> Self {
        NativeQuery::Term {
            field: field.into(),
            term: term.into(),
        }
    }

    /// Compile a wildcard pattern (`*` any run, `?` one character, `\`
    /// escapes the next character).
    pub fn wildcard(field: impl Into<String>, pattern: &str) -> Result<Self> {
        let regex = Regex::new(&wildcard_to_regex(pattern)).map_err(|e| {
            RowlensError::execution(format!("invalid wildcard pattern '{pattern}': {e}"))
        })?;
        Ok(NativeQuery::Pattern {
            field: field.into(),
            regex,
        })
    }

    /// Compile a regular expression that must match a whole term.
    pub fn regexp(field: impl Into<String>, pattern: &str) -> Result<Self> {
        let regex = Regex::new(&format!("^(?:{pattern})$")).map_err(|e| {
            RowlensError::execution(format!("invalid regular expression '{pattern}': {e}"))
        })?;
        Ok(NativeQuery::Pattern {
            field: field.into(),
            regex,
        })
    }

    /// Range with both ends inclusive on the same value.
    pub fn exact(field: impl Into<String>, value: DataValue) -> Self {
        NativeQuery::Range {
            field: field.into(),
            lower: Bound::Included(value.clone()),
            upper: Bound::Included(value),
        }
    }

    /// Whether `value` lies within the given bounds.
    ///
    /// Numbers compare by magnitude regardless of their width.
    pub fn in_range(value: &DataValue, lower: &Bound<DataValue>, upper: &Bound<DataValue>) -> bool {
        let above = match lower {
            Bound::Unbounded => true,
            Bound::Included(bound) => compare(value, bound).is_ge(),
            Bound::Excluded(bound) => compare(value, bound).is_gt(),
        };
        let below = match upper {
            Bound::Unbounded => true,
            Bound::Included(bound) => compare(value, bound).is_le(),
            Bound::Excluded(bound) => compare(value, bound).is_lt(),
        };
        above && below
    }
}

fn compare(a: &DataValue, b: &DataValue) -> std::cmp::Ordering {
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => a.cmp(b),
    }
}

fn wildcard_to_regex(pattern: &str) -> String {
    let mut regex = String::from("^");
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => regex.push_str(".*"),
            '?' => regex.push('.'),
            '\\' => match chars.next() {
                Some(escaped) => regex.push_str(&regex::escape(&escaped.to_string())),
                None => regex.push_str("\\\\"),
            },
            other => regex.push_str(&regex::escape(&other.to_string())),
        }
    }
    regex.push('$');
    regex
}

impl fmt::Display for NativeQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeQuery::All => f.write_str("*:*"),
            NativeQuery::Term { field, term } => write!(f, "{field}:{term}"),
            NativeQuery::Phrase { field, terms, slop } => {
                write!(f, "{field}:\"{}\"", terms.join(" "))?;
                if *slop > 0 {
                    write!(f, "~{slop}")?;
                }
                Ok(())
            }
            NativeQuery::Prefix { field, prefix } => write!(f, "{field}:{prefix}*"),
            NativeQuery::Pattern { field, regex } => write!(f, "{field}:/{}/", regex.as_str()),
            NativeQuery::Fuzzy {
                field,
                term,
                max_edits,
            } => write!(f, "{field}:{term}~{max_edits}"),
            NativeQuery::Range {
                field,
                lower,
                upper,
            } => {
                let (open, low) = match lower {
                    Bound::Included(v) => ('[', v.to_string()),
                    Bound::Excluded(v) => ('{', v.to_string()),
                    Bound::Unbounded => ('{', "*".to_string()),
                };
                let (high, close) = match upper {
                    Bound::Included(v) => (v.to_string(), ']'),
                    Bound::Excluded(v) => (v.to_string(), '}'),
                    Bound::Unbounded => ("*".to_string(), '}'),
                };
                write!(f, "{field}:{open}{low} TO {high}{close}")
            }
            NativeQuery::Boolean(clauses) => {
                f.write_str("(")?;
                for (i, clause) in clauses.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    let prefix = match clause.occur {
                        Occur::Must => "+",
                        Occur::Should => "",
                        Occur::MustNot => "-",
                        Occur::Filter => "#",
                    };
                    write!(f, "{prefix}{}", clause.query)?;
                }
                f.write_str(")")
            }
        }
    }
}

/// One sort key of a native search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub field: String,
    pub reverse: bool,
}

impl SortField {
    pub fn new(field: impl Into<String>, reverse: bool) -> Self {
        Self {
            field: field.into(),
            reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(query: &NativeQuery) -> &Regex {
        match query {
            NativeQuery::Pattern { regex, .. } => regex,
            other => panic!("unexpected query {other}"),
        }
    }

    #[test]
    fn test_wildcard() {
        let query = NativeQuery::wildcard("tags", "hel?o*").unwrap();
        let regex = pattern(&query);
        assert!(regex.is_match("hello"));
        assert!(regex.is_match("helpo1"));
        assert!(!regex.is_match("hell"));
        assert!(!regex.is_match("xhello"));

        let escaped = NativeQuery::wildcard("tags", r"a\*b.c").unwrap();
        assert!(pattern(&escaped).is_match("a*b.c"));
        assert!(!pattern(&escaped).is_match("axb.c"));
        assert!(!pattern(&escaped).is_match("a*bxc"));
    }

    #[test]
    fn test_regexp_is_anchored() {
        let query = NativeQuery::regexp("tags", "lol[0-9]").unwrap();
        assert!(pattern(&query).is_match("lol1"));
        assert!(!pattern(&query).is_match("lol12"));
        assert!(NativeQuery::regexp("tags", "(unclosed").is_err());
    }

    #[test]
    fn test_in_range_mixes_widths() {
        let lower = Bound::Included(DataValue::Double(10.0));
        let upper = Bound::Excluded(DataValue::BigInt(30));
        assert!(NativeQuery::in_range(&DataValue::Int(10), &lower, &upper));
        assert!(NativeQuery::in_range(&DataValue::Float(29.5), &lower, &upper));
        assert!(!NativeQuery::in_range(&DataValue::Int(30), &lower, &upper));
        assert!(NativeQuery::in_range(
            &DataValue::from("m"),
            &Bound::Included(DataValue::from("a")),
            &Bound::Unbounded
        ));
    }

    #[test]
    fn test_display() {
        let query = NativeQuery::Boolean(vec![
            BooleanClause::must(NativeQuery::term("tags", "hello")),
            BooleanClause::must_not(NativeQuery::exact("segment", DataValue::Int(3))),
        ]);
        assert_eq!(query.to_string(), "(+tags:hello -segment:[3 TO 3])");
    }
}
