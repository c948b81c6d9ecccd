//! Filter clauses handed to the index by the read path.

use std::cmp::Ordering;
use std::fmt;

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    /// Whether `row_value.cmp(clause_value)` satisfies the operator.
    pub fn matches(&self, ordering: Ordering) -> bool {
        match self {
            Operator::Eq => ordering == Ordering::Equal,
            Operator::Neq => ordering != Ordering::Equal,
            Operator::Gt => ordering == Ordering::Greater,
            Operator::Gte => ordering != Ordering::Less,
            Operator::Lt => ordering == Ordering::Less,
            Operator::Lte => ordering != Ordering::Greater,
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            Operator::Eq => "=",
            Operator::Neq => "!=",
            Operator::Gt => ">",
            Operator::Gte => ">=",
            Operator::Lt => "<",
            Operator::Lte => "<=",
        };
        f.write_str(symbol)
    }
}

/// One `column <op> value` restriction; the value is still encoded with the
/// column's registered type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clause {
    pub column: String,
    pub operator: Operator,
    pub value: Vec<u8>,
}

impl Clause {
    pub fn new(column: impl Into<String>, operator: Operator, value: impl Into<Vec<u8>>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }

    /// Shorthand for an equality clause.
    pub fn eq(column: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self::new(column, Operator::Eq, value)
    }
}

impl fmt::Display for Clause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} <{} bytes>", self.column, self.operator, self.value.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_matches() {
        assert!(Operator::Eq.matches(Ordering::Equal));
        assert!(!Operator::Eq.matches(Ordering::Less));
        assert!(Operator::Neq.matches(Ordering::Greater));
        assert!(Operator::Gte.matches(Ordering::Equal));
        assert!(Operator::Gte.matches(Ordering::Greater));
        assert!(!Operator::Gt.matches(Ordering::Equal));
        assert!(Operator::Lte.matches(Ordering::Less));
        assert!(!Operator::Lt.matches(Ordering::Equal));
    }
}
