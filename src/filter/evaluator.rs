//! Filter evaluation against a bound JSON object.

use super::{parse_filter, CompareOp, Comparison, Filter, LogicOp};
use crate::error::AggregationError;

use serde_json::Value;
use std::cmp::Ordering;

/// Evaluates filters against one JSON object
///
/// The object is only read, so an evaluator can be reused for any number of filters.
#[derive(Clone, Copy, Debug)]
pub struct FilterEvaluator<'a> {
    target: &'a Value,
}

impl<'a> FilterEvaluator<'a> {
    /// Return a new FilterEvaluator bound to `target`.
    pub fn new(target: &'a Value) -> Self {
        FilterEvaluator { target }
    }

    /// Parse `filter` and evaluate it.
    pub fn matches(&self, filter: &str) -> Result<bool, AggregationError> {
        let filter = parse_filter(filter)?;
        Ok(self.matches_parsed(&filter))
    }

    /// Evaluate a parsed filter.
    ///
    /// Groups stop at the first child that decides their result: the first failing child of an
    /// `&` group and the first matching child of an `|` group.
    pub fn matches_parsed(&self, filter: &Filter) -> bool {
        match filter {
            Filter::Group {
                op: LogicOp::And,
                children,
            } => children.iter().all(|child| self.matches_parsed(child)),
            Filter::Group {
                op: LogicOp::Or,
                children,
            } => children.iter().any(|child| self.matches_parsed(child)),
            Filter::Not(child) => !self.matches_parsed(child),
            Filter::Compare(comparison) => self.matches_comparison(comparison),
        }
    }

    /// A comparison matches if any resolved value satisfies it.
    fn matches_comparison(&self, comparison: &Comparison) -> bool {
        comparison
            .path
            .resolve(self.target)
            .into_iter()
            .any(|candidate| compare(candidate, comparison))
    }
}

fn compare(candidate: &Value, comparison: &Comparison) -> bool {
    let literal = comparison.value.as_str();
    match comparison.op {
        CompareOp::Equal => loose_eq(candidate, literal),
        CompareOp::Matches => match (comparison.pattern(), scalar_text(candidate)) {
            (Some(pattern), Some(text)) => pattern.is_match(&text),
            _ => false,
        },
        CompareOp::LessThan => ordering(candidate, literal) == Some(Ordering::Less),
        CompareOp::LessThanOrEqual => matches!(
            ordering(candidate, literal),
            Some(Ordering::Less | Ordering::Equal)
        ),
        CompareOp::GreaterThan => ordering(candidate, literal) == Some(Ordering::Greater),
        CompareOp::GreaterThanOrEqual => matches!(
            ordering(candidate, literal),
            Some(Ordering::Greater | Ordering::Equal)
        ),
    }
}

fn parse_number(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|number| !number.is_nan())
}

/// Equality with numeric coercion.
///
/// Unlike JavaScript `==`, booleans only equal the literals `true` and `false`, and an empty
/// literal never equals a number.
fn loose_eq(candidate: &Value, literal: &str) -> bool {
    match candidate {
        Value::Number(number) => number
            .as_f64()
            .zip(parse_number(literal))
            .is_some_and(|(lhs, rhs)| lhs == rhs),
        Value::Bool(flag) => literal == if *flag { "true" } else { "false" },
        Value::String(text) => {
            text == literal
                || parse_number(text)
                    .zip(parse_number(literal))
                    .is_some_and(|(lhs, rhs)| lhs == rhs)
        }
        _ => false,
    }
}

/// Numeric ordering when both sides are numbers, otherwise lexicographic ordering of text.
fn ordering(candidate: &Value, literal: &str) -> Option<Ordering> {
    match candidate {
        Value::Number(number) => number.as_f64()?.partial_cmp(&parse_number(literal)?),
        Value::String(text) => match (parse_number(text), parse_number(literal)) {
            (Some(lhs), Some(rhs)) => lhs.partial_cmp(&rhs),
            _ => Some(text.as_str().cmp(literal)),
        },
        _ => None,
    }
}

/// Text form of a scalar, for pattern matching.
fn scalar_text(candidate: &Value) -> Option<String> {
    match candidate {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    fn get_test_object() -> Value {
        json!({
            "foo": {"ping": "pong", "a": 1, "b": "X", "c": 3},
            "bam": "mab",
            "data": {
                "instantaneous": {"watts": 13.5, "volts": 230},
                "static": {"model": "X100", "enabled": true, "serial": "0042"},
                "tags": ["solar", "roof"]
            }
        })
    }

    #[test]
    fn test_and_group() {
        let object = json!({"foo": {"ping": "pong"}, "bam": "mab"});
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(&(/foo/ping=pong)(/bam=mab))").unwrap());
        assert!(!evaluator.matches("(&(/foo/ping=pang)(/bam=mab))").unwrap());
        assert!(!evaluator.matches("(&(/foo/ping=pong)(/bam=bam))").unwrap());
    }

    #[test]
    fn test_or_group() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(|(/bam=nope)(/foo/ping=pong))").unwrap());
        assert!(!evaluator.matches("(|(/bam=nope)(/foo/ping=nope))").unwrap());
    }

    #[test]
    fn test_nested_groups() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator
            .matches("(&(|(/bam=nope)(&(/foo/a=1)(/foo/c=3)))(/bam=mab))")
            .unwrap());
        assert!(!evaluator
            .matches("(&(|(/bam=nope)(&(/foo/a=1)(/foo/c=4)))(/bam=mab))")
            .unwrap());
        assert!(evaluator
            .matches("(|(&(/bam=nope)(/foo/a=1))(|(/foo/c=4)(/foo/b=X)))")
            .unwrap());
        assert!(!evaluator
            .matches("(&(|(/foo/a=1)(/foo/c=4))(&(/bam=mab)(/foo/b=Y)))")
            .unwrap());
    }

    #[test]
    fn test_not() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(!(/bam=nope))").unwrap());
        assert!(!evaluator.matches("(!(/bam=mab))").unwrap());
    }

    #[test]
    fn test_single_leaf() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(/bam=mab)").unwrap());
        assert!(evaluator.matches("bam=mab").unwrap());
        assert!(!evaluator.matches("(/missing=mab)").unwrap());
    }

    #[test]
    fn test_any_child() {
        let object = json!({"foo": {"a": 1, "b": "X", "c": 3}});
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(/foo/*=X)").unwrap());
        assert!(!evaluator.matches("(/foo/*=Y)").unwrap());
        assert!(!evaluator.matches("(/foo/a/*=1)").unwrap());
        assert!(!evaluator.matches("(/nothing/*=X)").unwrap());
    }

    #[test]
    fn test_any_descendant() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(/**/watts>13)").unwrap());
        assert!(evaluator.matches("(/**/model=X100)").unwrap());
        assert!(evaluator.matches("(/data/**=roof)").unwrap());
        assert!(!evaluator.matches("(/data/**=mab)").unwrap());
        assert!(!evaluator.matches("(/**/amps>0)").unwrap());
    }

    #[test]
    fn test_array_index() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(/data/tags/1=roof)").unwrap());
        assert!(evaluator.matches("(/data/tags/*=solar)").unwrap());
        assert!(!evaluator.matches("(/data/tags/0=roof)").unwrap());
    }

    #[test]
    fn test_loose_equality() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(/data/instantaneous/volts=230)").unwrap());
        assert!(evaluator.matches("(/data/instantaneous/volts=230.0)").unwrap());
        assert!(evaluator.matches("(/data/instantaneous/watts=13.5)").unwrap());
        assert!(evaluator.matches("(/data/static/enabled=true)").unwrap());
        assert!(!evaluator.matches("(/data/static/enabled=false)").unwrap());
        assert!(evaluator.matches("(/data/static/serial=42)").unwrap());
        assert!(evaluator.matches("(/data/static/serial=0042)").unwrap());
        assert!(!evaluator.matches("(/data/instantaneous/volts=abc)").unwrap());
        assert!(!evaluator.matches("(/data=x)").unwrap());
    }

    #[test]
    fn test_loose_equality_without_truthiness() {
        let object = json!({"flag": true, "zero": 0});
        let evaluator = FilterEvaluator::new(&object);
        assert!(!evaluator.matches("(/flag=1)").unwrap());
        assert!(!evaluator.matches("(/zero=)").unwrap());
        assert!(evaluator.matches("(/zero=0)").unwrap());
    }

    #[test]
    fn test_ordering() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(/data/instantaneous/watts<14)").unwrap());
        assert!(evaluator.matches("(/data/instantaneous/watts<=13.5)").unwrap());
        assert!(evaluator.matches("(/data/instantaneous/watts>=13.5)").unwrap());
        assert!(!evaluator.matches("(/data/instantaneous/watts>13.5)").unwrap());
        assert!(!evaluator.matches("(/data/instantaneous/watts<x)").unwrap());
        assert!(evaluator.matches("(/bam>lab)").unwrap());
        assert!(evaluator.matches("(/data/static/serial<100)").unwrap());
        assert!(!evaluator.matches("(/data/static/enabled>0)").unwrap());
    }

    #[test]
    fn test_pattern() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(evaluator.matches("(/data/static/model~=^X[0-9]+$)").unwrap());
        assert!(evaluator.matches("(/bam~=a)").unwrap());
        assert!(evaluator.matches("(/data/instantaneous/volts~=^23)").unwrap());
        assert!(evaluator.matches("(/data/static/enabled~=tr)").unwrap());
        assert!(!evaluator.matches("(/data/static/model~=^Y)").unwrap());
        assert!(!evaluator.matches("(/data/tags~=solar)").unwrap());
    }

    #[test]
    fn test_parse_error_propagates() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        assert!(matches!(
            evaluator.matches("(&(/bam=mab)"),
            Err(AggregationError::FilterParse { .. })
        ));
    }

    #[test]
    fn test_parsed_filter_idempotent() {
        let object = get_test_object();
        let evaluator = FilterEvaluator::new(&object);
        let filter = parse_filter("(&(/foo/*=X)(!(/bam=nope)))").unwrap();
        assert!(evaluator.matches_parsed(&filter));
        assert!(evaluator.matches_parsed(&filter));
    }
}
