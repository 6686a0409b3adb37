//! Path resolution over nested JSON rows.
//!
//! Paths are dot-separated. A purely numeric segment indexes an array, any
//! other segment is an object key, and a single `[*]` marker fans out over an
//! array:
//!
//! ```text
//! a.b.0.c                 → value at data["a"]["b"][0]["c"]
//! records[*].PriceArea    → "A, B" (each element's PriceArea, joined)
//! records.[*]             → every element of data["records"], joined
//! ```
//!
//! Resolution never fails: anything that cannot be walked resolves to `""`.
//! [`JsonPath::lookup`] reports the reason as a [`PathError`] instead.

use serde_json::Value;
use std::fmt;

use crate::error::{PathError, PathResult};

const WILDCARD: &str = "[*]";

/// One step of a parsed path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathSegment {
    Key(String),
    Index(usize),
    Wildcard,
}

impl PathSegment {
    fn parse(raw: &str) -> Self {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(index) = raw.parse::<usize>() {
                return PathSegment::Index(index);
            }
        }
        PathSegment::Key(raw.to_string())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathSegment::Key(key) => write!(f, "{}", key),
            PathSegment::Index(index) => write!(f, "{}", index),
            PathSegment::Wildcard => write!(f, "{}", WILDCARD),
        }
    }
}

/// A path parsed once and reused for every row.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JsonPath {
    segments: Vec<PathSegment>,
}

impl JsonPath {
    /// Parse a path expression. Only the first `[*]` is a wildcard; any later
    /// marker stays part of a literal key.
    pub fn parse(path: &str) -> Self {
        let mut segments = Vec::new();

        match path.split_once(WILDCARD) {
            Some((base, remainder)) => {
                push_segments(&mut segments, base.trim_end_matches('.'));
                segments.push(PathSegment::Wildcard);
                push_segments(&mut segments, remainder.trim_start_matches('.'));
            }
            None => push_segments(&mut segments, path),
        }

        Self { segments }
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn has_wildcard(&self) -> bool {
        self.wildcard_position().is_some()
    }

    fn wildcard_position(&self) -> Option<usize> {
        self.segments.iter().position(|s| *s == PathSegment::Wildcard)
    }

    /// Walk the path and return the value it points at.
    ///
    /// A wildcard segment only checks that the current value is an array and
    /// passes it through; use [`JsonPath::resolve`] to fan out.
    pub fn lookup<'a>(&self, value: &'a Value) -> PathResult<&'a Value> {
        walk(value, &self.segments)
    }

    /// Resolve against a row. Failures yield `""`; null yields `""`.
    pub fn resolve(&self, value: &Value) -> Value {
        let Some(pos) = self.wildcard_position() else {
            return match self.lookup(value) {
                Ok(Value::Null) | Err(_) => empty(),
                Ok(found) => found.clone(),
            };
        };

        let items = match walk(value, &self.segments[..pos]) {
            Ok(Value::Array(items)) => items,
            _ => return empty(),
        };

        let remainder = &self.segments[pos + 1..];
        let parts: Vec<String> = items
            .iter()
            .map(|item| {
                if remainder.is_empty() {
                    display_value(item)
                } else {
                    walk(item, remainder)
                        .map(display_value)
                        .unwrap_or_default()
                }
            })
            .collect();

        Value::String(parts.join(", "))
    }
}

impl From<&str> for JsonPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.segments.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("."))
    }
}

fn push_segments(segments: &mut Vec<PathSegment>, path: &str) {
    if path.is_empty() {
        return;
    }
    segments.extend(path.split('.').map(PathSegment::parse));
}

fn walk<'a>(value: &'a Value, segments: &[PathSegment]) -> PathResult<&'a Value> {
    let mut current = value;

    for segment in segments {
        current = match (segment, current) {
            (PathSegment::Key(key), Value::Object(map)) => map
                .get(key)
                .ok_or_else(|| PathError::MissingKey(key.clone()))?,
            (PathSegment::Index(index), Value::Array(items)) => {
                items.get(*index).ok_or(PathError::IndexOutOfRange {
                    index: *index,
                    len: items.len(),
                })?
            }
            (PathSegment::Wildcard, Value::Array(_)) => current,
            (PathSegment::Wildcard, other) => return Err(PathError::NotAnArray(kind(other))),
            (segment, other) => {
                return Err(PathError::TypeMismatch {
                    segment: segment.to_string(),
                    found: kind(other),
                })
            }
        };
    }

    Ok(current)
}

fn empty() -> Value {
    Value::String(String::new())
}

/// Resolve a path expression against a row.
pub fn resolve(value: &Value, path: &str) -> Value {
    JsonPath::parse(path).resolve(value)
}

/// String form of a resolved value: strings verbatim, null as `""`,
/// everything else as compact JSON.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

/// Human name of a JSON value's type, for error messages.
pub fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
