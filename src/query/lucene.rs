//! Classic query-string parser.
//!
//! Supports `field:term`, `term*`, `te?m`, `"a phrase"~2`, `[a TO b]`,
//! `{a TO b}`, `term~1`, `AND`/`OR`/`NOT`, `+`/`-`, parentheses and `*:*`.
//! Boosts are rejected.
//!
//! Operators combine the way the classic parser does: clauses default to
//! optional, `AND` makes both of its sides required, and `NOT` or `-` makes
//! the following clause prohibited.

use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::{Result, RowlensError};
use crate::index::config::IndexConfig;
use crate::index::query::{BooleanClause, NativeQuery, Occur};
use crate::query::condition::{
    fuzzy_query, indexed_type, normalize_for, phrase_query, range_query, term_query, MAX_EDITS,
};

#[derive(Parser)]
#[grammar = "query/lucene.pest"]
struct LuceneGrammar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Conjunction {
    None,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modifier {
    None,
    Required,
    Prohibited,
}

/// Parses query strings against an index configuration.
pub struct LuceneQueryParser<'a> {
    config: &'a IndexConfig,
    default_field: Option<&'a str>,
}

impl<'a> LuceneQueryParser<'a> {
    pub fn new(config: &'a IndexConfig) -> Self {
        Self {
            config,
            default_field: None,
        }
    }

    /// Field used by terms written without a `field:` prefix.
    pub fn with_default_field(mut self, field: Option<&'a str>) -> Self {
        self.default_field = field;
        self
    }

    pub fn parse(&self, query: &str) -> Result<NativeQuery> {
        let mut pairs = LuceneGrammar::parse(Rule::query, query).map_err(|e| {
            RowlensError::execution(format!("cannot parse query '{query}': {e}"))
        })?;
        let root = pairs
            .next()
            .ok_or_else(|| RowlensError::execution(format!("empty parse of query '{query}'")))?;

        match root.into_inner().find(|p| p.as_rule() == Rule::expression) {
            Some(expression) => self.expression(expression, self.default_field),
            None => Ok(NativeQuery::Boolean(Vec::new())),
        }
    }

    fn expression(&self, pair: Pair<'_, Rule>, field: Option<&str>) -> Result<NativeQuery> {
        let mut clauses: Vec<BooleanClause> = Vec::new();
        let mut conjunction = Conjunction::None;

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::conjunction => {
                    conjunction = match inner.into_inner().next().map(|p| p.as_rule()) {
                        Some(Rule::and_op) => Conjunction::And,
                        _ => Conjunction::Or,
                    };
                }
                Rule::clause => {
                    let (modifier, query) = self.clause(inner, field)?;
                    add_clause(&mut clauses, conjunction, modifier, query);
                    conjunction = Conjunction::None;
                }
                _ => {}
            }
        }

        if clauses.len() == 1
            && clauses[0].occur != Occur::MustNot
            && let Some(only) = clauses.pop()
        {
            return Ok(only.query);
        }
        Ok(NativeQuery::Boolean(clauses))
    }

    fn clause(&self, pair: Pair<'_, Rule>, inherited: Option<&str>) -> Result<(Modifier, NativeQuery)> {
        let mut modifier = Modifier::None;
        let mut field = inherited.map(str::to_string);

        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::modifier => {
                    modifier = match inner.into_inner().next().map(|p| p.as_rule()) {
                        Some(Rule::required) => Modifier::Required,
                        _ => Modifier::Prohibited,
                    };
                }
                Rule::field_prefix => {
                    field = inner
                        .into_inner()
                        .find(|p| p.as_rule() == Rule::field_name)
                        .map(|p| p.as_str().to_string());
                }
                Rule::group => {
                    let expression = inner
                        .into_inner()
                        .next()
                        .ok_or_else(|| RowlensError::execution("empty group"))?;
                    return Ok((modifier, self.expression(expression, field.as_deref())?));
                }
                Rule::range => return Ok((modifier, self.range(inner, field.as_deref())?)),
                Rule::phrase => return Ok((modifier, self.phrase(inner, field.as_deref())?)),
                Rule::term => return Ok((modifier, self.term(inner, field.as_deref())?)),
                _ => {}
            }
        }
        Err(RowlensError::execution("clause without a query"))
    }

    fn require_field<'f>(&self, field: Option<&'f str>) -> Result<&'f str> {
        field.ok_or_else(|| RowlensError::execution("term without a field and no default field"))
    }

    fn term(&self, pair: Pair<'_, Rule>, field: Option<&str>) -> Result<NativeQuery> {
        let mut text = "";
        let mut fuzzy: Option<u32> = None;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::term_text => text = inner.as_str(),
                Rule::fuzzy => {
                    fuzzy = Some(match inner.into_inner().next() {
                        Some(number) => parse_number(number.as_str())?,
                        None => MAX_EDITS,
                    });
                }
                _ => {}
            }
        }

        if field == Some("*") && text == "*" {
            return Ok(NativeQuery::All);
        }
        let field = self.require_field(field)?;

        if let Some(max_edits) = fuzzy {
            return fuzzy_query(self.config, field, &unescape(text), max_edits);
        }

        if !has_wildcard(text) {
            return term_query(self.config, field, &unescape(text));
        }

        let field_type = indexed_type(self.config, field)?;
        let pattern = normalize_for(field_type, text);
        match pattern.strip_suffix('*') {
            Some(prefix) if !prefix.is_empty() && !has_wildcard(prefix) => Ok(NativeQuery::Prefix {
                field: field.to_string(),
                prefix: unescape(prefix),
            }),
            _ => NativeQuery::wildcard(field, &pattern),
        }
    }

    fn phrase(&self, pair: Pair<'_, Rule>, field: Option<&str>) -> Result<NativeQuery> {
        let field = self.require_field(field)?;
        let mut text = "";
        let mut slop = 0;
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::phrase_text => text = inner.as_str(),
                Rule::slop => {
                    if let Some(number) = inner.into_inner().next() {
                        slop = parse_number(number.as_str())?;
                    }
                }
                _ => {}
            }
        }
        phrase_query(self.config, field, &unescape(text), slop)
    }

    fn range(&self, pair: Pair<'_, Rule>, field: Option<&str>) -> Result<NativeQuery> {
        let field = self.require_field(field)?;
        let mut include_lower = true;
        let mut include_upper = true;
        let mut bounds = Vec::with_capacity(2);
        for inner in pair.into_inner() {
            match inner.as_rule() {
                Rule::range_open => include_lower = inner.as_str() == "[",
                Rule::range_close => include_upper = inner.as_str() == "]",
                Rule::range_bound => bounds.push(range_bound(inner.as_str())),
                _ => {}
            }
        }
        let [lower, upper] = bounds.as_slice() else {
            return Err(RowlensError::execution("range needs two bounds"));
        };
        range_query(
            self.config,
            field,
            lower.as_deref(),
            upper.as_deref(),
            include_lower,
            include_upper,
        )
    }
}

/// Classic parser clause rules with `OR` as the default operator.
fn add_clause(
    clauses: &mut Vec<BooleanClause>,
    conjunction: Conjunction,
    modifier: Modifier,
    query: NativeQuery,
) {
    if conjunction == Conjunction::And {
        if let Some(previous) = clauses.last_mut() {
            if previous.occur != Occur::MustNot {
                previous.occur = Occur::Must;
            }
        }
    }

    let prohibited = modifier == Modifier::Prohibited;
    let required = modifier == Modifier::Required || (conjunction == Conjunction::And && !prohibited);
    let occur = match (required, prohibited) {
        (_, true) => Occur::MustNot,
        (true, false) => Occur::Must,
        (false, false) => Occur::Should,
    };
    clauses.push(BooleanClause::new(occur, query));
}

fn range_bound(text: &str) -> Option<String> {
    if text == "*" {
        return None;
    }
    let unquoted = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .unwrap_or(text);
    Some(unescape(unquoted))
}

fn parse_number(text: &str) -> Result<u32> {
    text.parse::<u32>()
        .map_err(|e| RowlensError::execution(format!("invalid number '{text}': {e}")))
}

/// Whether `text` has an unescaped `*` or `?`.
fn has_wildcard(text: &str) -> bool {
    let mut escaped = false;
    for c in text.chars() {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '*' | '?' => return true,
            _ => {}
        }
    }
    false
}

fn unescape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::config::FieldType;

    fn config() -> IndexConfig {
        IndexConfig::builder()
            .add_field("tags", FieldType::Text)
            .add_field("state", FieldType::String)
            .add_field("segment", FieldType::Integer)
            .build()
    }

    fn parse(query: &str) -> Result<String> {
        let config = config();
        LuceneQueryParser::new(&config)
            .with_default_field(Some("tags"))
            .parse(query)
            .map(|q| q.to_string())
    }

    #[test]
    fn test_terms_and_wildcards() {
        assert_eq!(parse("hello1").unwrap(), "tags:hello1");
        assert_eq!(parse("tags:Hello*").unwrap(), "tags:hello*");
        assert_eq!(parse("h*").unwrap(), "tags:h*");
        assert_eq!(parse("hello?").unwrap(), "tags:/^hello.$/");
        assert_eq!(parse("*:*").unwrap(), "*:*");
        assert_eq!(parse("state:CA").unwrap(), "state:CA");
        assert_eq!(parse("hello~1").unwrap(), "tags:hello~1");
        assert_eq!(parse("hello~").unwrap(), "tags:hello~2");
    }

    #[test]
    fn test_and_makes_both_sides_required() {
        assert_eq!(parse("tags:hello* AND state:CA").unwrap(), "(+tags:hello* +state:CA)");
        assert_eq!(parse("a b").unwrap(), "(tags:a tags:b)");
        assert_eq!(parse("a OR b AND c").unwrap(), "(tags:a +tags:b +tags:c)");
        assert_eq!(parse("a AND NOT b").unwrap(), "(+tags:a -tags:b)");
        assert_eq!(parse("+a -state:NY c").unwrap(), "(+tags:a -state:NY tags:c)");
    }

    #[test]
    fn test_groups_inherit_field() {
        assert_eq!(
            parse("state:(CA OR NY) AND hello1").unwrap(),
            "(+(state:CA state:NY) +tags:hello1)"
        );
    }

    #[test]
    fn test_phrases_and_ranges() {
        assert_eq!(parse("\"Hello1 Tag1\"~1").unwrap(), "tags:\"hello1 tag1\"~1");
        assert_eq!(parse("segment:[10 TO 20}").unwrap(), "segment:[10 TO 20}");
        assert_eq!(parse("segment:{* TO 5]").unwrap(), "segment:{* TO 5]");
    }

    #[test]
    fn test_errors() {
        assert!(parse("tags:(unclosed").is_err());
        assert!(parse("hello^2").is_err());
        assert!(parse("magic:x").is_err());
        assert!(parse("segment:[a TO 5]").is_err());

        let config = config();
        assert!(LuceneQueryParser::new(&config).parse("hello").is_err());
    }

    #[test]
    fn test_escapes() {
        assert!(!has_wildcard(r"a\*"));
        assert_eq!(unescape(r"a\:b"), "a:b");
        assert_eq!(parse(r"state:a\:b").unwrap(), "state:a:b");
    }
}
