//! Slash-delimited paths into JSON objects

use serde_json::Value;
use std::fmt;

/// One step of a [Path]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum PathSegment {
    /// A property name, or an index when applied to an array
    Key(String),
    /// `*`: every direct child
    AnyChild,
    /// `**`: any depth, including none
    AnyDescendant,
}

/// A parsed path such as `/foo/*/bar` or `/**/watts`
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Path {
    segments: Vec<PathSegment>,
}

impl Path {
    /// Parse a path. The leading slash is optional and empty segments are ignored.
    pub fn parse(text: &str) -> Self {
        let segments = text
            .split('/')
            .filter(|segment| !segment.is_empty())
            .map(|segment| match segment {
                "*" => PathSegment::AnyChild,
                "**" => PathSegment::AnyDescendant,
                key => PathSegment::Key(key.to_string()),
            })
            .collect();
        Path { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Resolve the path against `target`, returning every matching value.
    ///
    /// A path without wildcards resolves to at most one value. A trailing `**` resolves to every
    /// leaf below the addressed value. Recursion is bounded by the depth of `target`.
    pub fn resolve<'a>(&self, target: &'a Value) -> Vec<&'a Value> {
        let mut found = Vec::new();
        walk(&self.segments, target, &mut found);
        found
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, "/{}", key)?,
                PathSegment::AnyChild => write!(f, "/*")?,
                PathSegment::AnyDescendant => write!(f, "/**")?,
            }
        }
        Ok(())
    }
}

/// Direct children of an object or array.
fn children(value: &Value) -> Box<dyn Iterator<Item = &Value> + '_> {
    match value {
        Value::Object(map) => Box::new(map.values()),
        Value::Array(items) => Box::new(items.iter()),
        _ => Box::new(std::iter::empty()),
    }
}

fn child<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(key),
        Value::Array(items) => key.parse::<usize>().ok().and_then(|index| items.get(index)),
        _ => None,
    }
}

fn walk<'a>(segments: &[PathSegment], value: &'a Value, found: &mut Vec<&'a Value>) {
    let Some((segment, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };
    match segment {
        PathSegment::Key(key) => {
            if let Some(next) = child(value, key) {
                walk(rest, next, found);
            }
        }
        PathSegment::AnyChild => {
            for next in children(value) {
                walk(rest, next, found);
            }
        }
        PathSegment::AnyDescendant if rest.is_empty() => collect_leaves(value, found),
        PathSegment::AnyDescendant => walk_descendants(rest, value, found),
    }
}

/// Apply `rest` at `value` and at every value below it.
fn walk_descendants<'a>(rest: &[PathSegment], value: &'a Value, found: &mut Vec<&'a Value>) {
    walk(rest, value, found);
    for next in children(value) {
        walk_descendants(rest, next, found);
    }
}

fn collect_leaves<'a>(value: &'a Value, found: &mut Vec<&'a Value>) {
    match value {
        Value::Object(_) | Value::Array(_) => {
            for next in children(value) {
                collect_leaves(next, found);
            }
        }
        leaf => found.push(leaf),
    }
}
