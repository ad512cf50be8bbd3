//! Filter text parser.
//!
//! ```text
//! filter     = "(" body ")"
//! body       = "&" filter+ | "|" filter+ | "!" filter | comparison
//! comparison = path op value
//! op         = "=" | "~=" | "<" | "<=" | ">" | ">="
//! ```
//!
//! Whitespace between tokens is ignored and values are trimmed. Within a value `\` escapes the
//! next character, so `\)` is a literal parenthesis. A single comparison may be given without
//! the surrounding parentheses.

use super::{CompareOp, Comparison, Filter, LogicOp, Path};
use crate::error::AggregationError;

use tracing::trace;

/// Parse filter text into a [Filter].
pub fn parse_filter(text: &str) -> Result<Filter, AggregationError> {
    let mut parser = Parser {
        chars: text.chars().collect(),
        pos: 0,
    };
    parser.skip_whitespace();
    let filter = match parser.peek() {
        None => return Err(parser.error("filter is empty")),
        Some('(') => parser.parse_filter()?,
        Some(_) => parser.parse_comparison()?,
    };
    parser.skip_whitespace();
    if parser.peek().is_some() {
        return Err(parser.error("unexpected input after filter"));
    }
    trace!(%filter, "Parsed filter");
    Ok(filter)
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn next(&mut self) -> Option<char> {
        let c = self.peek();
        if c.is_some() {
            self.pos += 1;
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> AggregationError {
        AggregationError::filter_parse(self.pos, reason)
    }

    fn expect(&mut self, expected: char) -> Result<(), AggregationError> {
        self.skip_whitespace();
        match self.peek() {
            Some(c) if c == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(c) => Err(self.error(&format!("expected '{}', found '{}'", expected, c))),
            None => Err(self.error(&format!("expected '{}', found end of input", expected))),
        }
    }

    /// `"(" body ")"`
    fn parse_filter(&mut self) -> Result<Filter, AggregationError> {
        self.expect('(')?;
        self.skip_whitespace();
        let filter = match self.peek() {
            Some('&') => {
                self.pos += 1;
                self.parse_group(LogicOp::And)?
            }
            Some('|') => {
                self.pos += 1;
                self.parse_group(LogicOp::Or)?
            }
            Some('!') => {
                self.pos += 1;
                Filter::Not(Box::new(self.parse_filter()?))
            }
            _ => self.parse_comparison()?,
        };
        self.expect(')')?;
        Ok(filter)
    }

    fn parse_group(&mut self, op: LogicOp) -> Result<Filter, AggregationError> {
        let mut children = Vec::new();
        loop {
            self.skip_whitespace();
            if self.peek() != Some('(') {
                break;
            }
            children.push(self.parse_filter()?);
        }
        if children.is_empty() {
            return Err(self.error(&format!("'{}' group needs at least one filter", op)));
        }
        Ok(Filter::Group { op, children })
    }

    /// `path op value`
    fn parse_comparison(&mut self) -> Result<Filter, AggregationError> {
        self.skip_whitespace();
        let start = self.pos;
        while let Some(c) = self.peek() {
            if matches!(c, '=' | '~' | '<' | '>' | '(' | ')') {
                break;
            }
            self.pos += 1;
        }
        let path: String = self.chars[start..self.pos].iter().collect();
        let path = path.trim();
        if path.is_empty() {
            return Err(self.error("expected a path"));
        }
        let op = self.parse_operator()?;
        let value = self.parse_value()?;
        let comparison = Comparison::new(Path::parse(path), op, &value)?;
        Ok(Filter::Compare(comparison))
    }

    fn parse_operator(&mut self) -> Result<CompareOp, AggregationError> {
        let op = match self.next() {
            Some('=') => CompareOp::Equal,
            Some('~') if self.peek() == Some('=') => {
                self.pos += 1;
                CompareOp::Matches
            }
            Some('<') if self.peek() == Some('=') => {
                self.pos += 1;
                CompareOp::LessThanOrEqual
            }
            Some('<') => CompareOp::LessThan,
            Some('>') if self.peek() == Some('=') => {
                self.pos += 1;
                CompareOp::GreaterThanOrEqual
            }
            Some('>') => CompareOp::GreaterThan,
            Some(_) => {
                self.pos -= 1;
                return Err(self.error("expected a comparison operator"));
            }
            None => return Err(self.error("expected a comparison operator")),
        };
        Ok(op)
    }

    /// Read up to the closing parenthesis, resolving escapes.
    fn parse_value(&mut self) -> Result<String, AggregationError> {
        let mut value = String::new();
        while let Some(c) = self.peek() {
            match c {
                ')' => break,
                '(' => return Err(self.error("unescaped '(' in value")),
                '\\' => {
                    self.pos += 1;
                    match self.next() {
                        Some(escaped) => value.push(escaped),
                        None => return Err(self.error("escape at end of input")),
                    }
                }
                c => {
                    self.pos += 1;
                    value.push(c);
                }
            }
        }
        Ok(value.trim().to_string())
    }
}
