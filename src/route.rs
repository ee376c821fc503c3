//! Resolved routes: path patterns, parameter bindings and hook attachments.

use crate::descriptor::{Direction, MethodDescriptor, PreHookSpec, Shape};
use crate::types::{Value, Verb};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Characters escaped inside a single path segment
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// One segment of a path pattern
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    Literal(String),
    /// `:name` wildcard
    Capture(String),
}

/// Literal segments interleaved with named captures
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathPattern {
    segments: Vec<Segment>,
}

impl PathPattern {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse `a/:b/c`; empty segments are skipped
    pub fn parse(raw: &str) -> Self {
        let segments = raw
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| match s.strip_prefix(':') {
                Some(name) if !name.is_empty() => Segment::Capture(name.to_string()),
                _ => Segment::Literal(s.to_string()),
            })
            .collect();
        Self { segments }
    }

    /// This pattern followed by `other`
    pub fn join(&self, other: &PathPattern) -> PathPattern {
        let mut segments = self.segments.clone();
        segments.extend(other.segments.iter().cloned());
        Self { segments }
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn captures(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Capture(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    pub fn has_capture(&self, name: &str) -> bool {
        self.captures().any(|c| c == name)
    }

    /// Render a concrete, percent-encoded path from capture values
    pub fn render(&self, values: &HashMap<String, String>) -> Option<String> {
        if self.segments.is_empty() {
            return Some("/".to_string());
        }
        let mut path = String::new();
        for segment in &self.segments {
            path.push('/');
            match segment {
                Segment::Literal(text) => path.push_str(&encode_segment(text)),
                Segment::Capture(name) => path.push_str(&encode_segment(values.get(name)?)),
            }
        }
        Some(path)
    }
}

impl fmt::Display for PathPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.segments.is_empty() {
            return f.write_str("/");
        }
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => write!(f, "/{}", text)?,
                Segment::Capture(name) => write!(f, "/:{}", name)?,
            }
        }
        Ok(())
    }
}

impl Serialize for PathPattern {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn encode_segment(raw: &str) -> String {
    utf8_percent_encode(raw, SEGMENT).to_string()
}

/// Split an encoded request path into decoded segments; `None` marks a
/// segment whose bytes are not valid UTF-8
pub fn decode_path(path: &str) -> Vec<Option<String>> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| {
            percent_decode_str(s)
                .decode_utf8()
                .ok()
                .map(|decoded| decoded.into_owned())
        })
        .collect()
}

/// Wire location a parameter is bound to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "in", rename_all = "snake_case")]
pub enum Location {
    Path { capture: String },
    Query { key: String },
    Header { name: String },
    BodyField { key: String },
    WholeBody,
}

impl Location {
    /// Location family, used in diagnostics
    pub fn family(&self) -> &'static str {
        match self {
            Location::Path { .. } => "path",
            Location::Query { .. } => "query",
            Location::Header { .. } => "header",
            Location::BodyField { .. } => "body field",
            Location::WholeBody => "body",
        }
    }

    /// Key compared for duplicates; header names compare case-insensitively
    pub(crate) fn wire_key(&self) -> String {
        match self {
            Location::Path { capture } => capture.clone(),
            Location::Query { key } | Location::BodyField { key } => key.clone(),
            Location::Header { name } => name.to_ascii_lowercase(),
            Location::WholeBody => String::new(),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Path { capture } => write!(f, "path `:{}`", capture),
            Location::Query { key } => write!(f, "query `{}`", key),
            Location::Header { name } => write!(f, "header `{}`", name),
            Location::BodyField { key } => write!(f, "body field `{}`", key),
            Location::WholeBody => f.write_str("body"),
        }
    }
}

/// One parameter paired with exactly one wire location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binding {
    pub parameter: String,
    #[serde(skip)]
    pub shape: Shape,
    #[serde(flatten)]
    pub location: Location,
    #[serde(skip_serializing_if = "is_in")]
    pub direction: Direction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl Binding {
    /// Whether BIND fails when the value is absent
    pub fn is_required(&self) -> bool {
        self.default.is_none() && !self.shape.is_optional() && self.direction != Direction::Out
    }

    /// Value used when the wire carries nothing
    pub fn fallback(&self) -> Option<Value> {
        if let Some(default) = &self.default {
            Some(default.clone())
        } else if self.shape.is_optional() || self.direction == Direction::Out {
            Some(Value::Null)
        } else {
            None
        }
    }
}

fn is_in(direction: &Direction) -> bool {
    *direction == Direction::In
}

/// Parameter filled by a pre-call hook instead of the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Injection {
    pub parameter: String,
    pub hook: String,
}

/// A resolved dispatch target
#[derive(Debug, Clone)]
pub struct Route {
    /// Position in the owning table
    pub id: usize,
    pub verb: Verb,
    pub pattern: PathPattern,
    /// Method name, prefixed by the accessor chain (`nestedModule.getData`)
    pub qualified_name: String,
    pub method: MethodDescriptor,
    /// Wire bindings in declaration order
    pub bindings: Vec<Binding>,
    pub injections: Vec<Injection>,
    pub pre_hooks: Vec<PreHookSpec>,
    pub post_hooks: Vec<String>,
}

impl Route {
    pub fn returns(&self) -> &Shape {
        &self.method.returns
    }

    pub fn binding(&self, parameter: &str) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.parameter == parameter)
    }

    pub fn is_injected(&self, parameter: &str) -> bool {
        self.injections.iter().any(|i| i.parameter == parameter)
    }

    /// Parameters the caller supplies, in declaration order
    pub fn visible_parameters(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| b.direction.is_sent())
    }

    /// Parameters written back onto the response
    pub fn returned_parameters(&self) -> impl Iterator<Item = &Binding> {
        self.bindings.iter().filter(|b| b.direction.is_returned())
    }
}
