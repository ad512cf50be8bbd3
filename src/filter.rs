//! Filter expressions over JSON objects.
//!
//! Filters use an LDAP-like syntax, for example `(&(/foo/ping=pong)(|(/bam=mab)(/**/watts>10)))`.
//! A comparison addresses values with a slash-delimited [Path] that may contain `*` (any child)
//! and `**` (any depth) segments. See [parser] for the grammar and [evaluator] for how a filter
//! is matched against an object.

pub mod evaluator;
pub mod parser;
pub mod path;

pub use evaluator::FilterEvaluator;
pub use parser::parse_filter;
pub use path::{Path, PathSegment};

use crate::error::AggregationError;

use regex::Regex;
use std::fmt;
use strum_macros::Display;

/// Operator joining the children of a filter group
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum LogicOp {
    /// Every child must match
    #[strum(serialize = "&")]
    And,
    /// At least one child must match
    #[strum(serialize = "|")]
    Or,
}

/// Comparison operator of a filter leaf
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
pub enum CompareOp {
    #[strum(serialize = "=")]
    Equal,
    /// Unanchored regular expression search
    #[strum(serialize = "~=")]
    Matches,
    #[strum(serialize = "<")]
    LessThan,
    #[strum(serialize = "<=")]
    LessThanOrEqual,
    #[strum(serialize = ">")]
    GreaterThan,
    #[strum(serialize = ">=")]
    GreaterThanOrEqual,
}

/// A filter leaf: a path, an operator and a literal value
#[derive(Clone, Debug)]
pub struct Comparison {
    pub path: Path,
    pub op: CompareOp,
    pub value: String,
    pattern: Option<Regex>,
}

impl Comparison {
    /// Return a new Comparison.
    ///
    /// The value of a [CompareOp::Matches] comparison is compiled as a regular expression.
    ///
    /// # Arguments
    ///
    /// * `path`: Path of the values to compare
    /// * `op`: Comparison operator
    /// * `value`: Literal right hand side
    pub fn new(path: Path, op: CompareOp, value: &str) -> Result<Self, AggregationError> {
        let pattern = match op {
            CompareOp::Matches => Some(Regex::new(value)?),
            _ => None,
        };
        Ok(Comparison {
            path,
            op,
            value: value.to_string(),
            pattern,
        })
    }

    /// Compiled pattern of a [CompareOp::Matches] comparison.
    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

impl PartialEq for Comparison {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path && self.op == other.op && self.value == other.value
    }
}

/// A parsed filter expression
#[derive(Clone, Debug, PartialEq)]
pub enum Filter {
    /// Logical group of one or more child filters
    Group { op: LogicOp, children: Vec<Filter> },
    /// Negation of a child filter
    Not(Box<Filter>),
    /// Leaf comparison
    Compare(Comparison),
}

/// Write a filter value, escaping characters that are significant to the parser.
fn write_escaped(f: &mut fmt::Formatter<'_>, value: &str) -> fmt::Result {
    for c in value.chars() {
        if matches!(c, '(' | ')' | '\\') {
            write!(f, "\\")?;
        }
        write!(f, "{}", c)?;
    }
    Ok(())
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Group { op, children } => {
                write!(f, "({}", op)?;
                for child in children {
                    write!(f, "{}", child)?;
                }
                write!(f, ")")
            }
            Filter::Not(child) => write!(f, "(!{})", child),
            Filter::Compare(comparison) => {
                write!(f, "({}{}", comparison.path, comparison.op)?;
                write_escaped(f, &comparison.value)?;
                write!(f, ")")
            }
        }
    }
}
