//! Naming-convention inference: method name to HTTP verb and path segment.
//!
//! Resolution order:
//! 1. Explicit verb / path overrides are used verbatim.
//! 2. Property accessors map to GET (getter) or PUT (setter) on the whole name.
//! 3. The longest recognized verb prefix that ends on a word boundary wins;
//!    the remainder becomes the segment.
//! 4. Anything else is a POST on the whole name.

use crate::descriptor::{Accessor, MethodDescriptor};
use crate::error::BuildError;
use crate::types::Verb;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Recognized verb prefixes, longest first
const VERB_PREFIXES: &[(&str, Verb)] = &[
    ("delete", Verb::Delete),
    ("patch", Verb::Patch),
    ("query", Verb::Get),
    ("post", Verb::Post),
    ("head", Verb::Head),
    ("get", Verb::Get),
    ("put", Verb::Put),
];

/// Custom segment mapping, applied to the raw remainder of the method name
pub type SegmentMapper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// How method-name remainders become path segments
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum NamingStyle {
    /// `someInfo` → `some_info`
    #[default]
    LowerSnake,
    /// `someInfo` → `SOME_INFO`
    UpperUnderscore,
    /// User-supplied mapping; cannot be loaded from configuration files
    Custom(SegmentMapper),
}

impl NamingStyle {
    pub fn custom<F>(mapper: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        NamingStyle::Custom(Arc::new(mapper))
    }

    /// Convert a camelCase or snake_case identifier into a segment
    pub fn apply(&self, raw: &str) -> String {
        match self {
            NamingStyle::LowerSnake => split_words(raw)
                .iter()
                .map(|w| w.to_lowercase())
                .collect::<Vec<_>>()
                .join("_"),
            NamingStyle::UpperUnderscore => split_words(raw)
                .iter()
                .map(|w| w.to_uppercase())
                .collect::<Vec<_>>()
                .join("_"),
            NamingStyle::Custom(mapper) => mapper(raw),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NamingStyle::LowerSnake => "lower_snake",
            NamingStyle::UpperUnderscore => "upper_underscore",
            NamingStyle::Custom(_) => "custom",
        }
    }
}

impl fmt::Debug for NamingStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NamingStyle({})", self.name())
    }
}

impl PartialEq for NamingStyle {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (NamingStyle::LowerSnake, NamingStyle::LowerSnake) => true,
            (NamingStyle::UpperUnderscore, NamingStyle::UpperUnderscore) => true,
            (NamingStyle::Custom(a), NamingStyle::Custom(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl FromStr for NamingStyle {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "lower_snake" | "snake" | "lower" => Ok(NamingStyle::LowerSnake),
            "upper_underscore" | "upper_snake" | "upper" => Ok(NamingStyle::UpperUnderscore),
            _ => Err(BuildError::UnknownNamingStyle(s.to_string())),
        }
    }
}

impl TryFrom<String> for NamingStyle {
    type Error = BuildError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<NamingStyle> for String {
    fn from(style: NamingStyle) -> Self {
        style.name().to_string()
    }
}

/// Verb and path segment resolved for one method
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolved {
    pub verb: Verb,
    /// Relative path; empty means the interface root itself
    pub segment: String,
    /// Whether the segment came from an explicit path override
    pub explicit_path: bool,
}

/// Resolve the verb and segment of `method` under `style`
pub fn resolve(method: &MethodDescriptor, style: &NamingStyle) -> Resolved {
    let (inferred_verb, inferred_segment) = match method.accessor {
        Some(Accessor::Getter) => (Verb::Get, style.apply(&method.name)),
        Some(Accessor::Setter) => (Verb::Put, style.apply(&method.name)),
        None => infer(&method.name, style),
    };

    let explicit_path = method.path.as_ref().map(|p| p.trim_matches('/').to_string());

    Resolved {
        verb: method.verb.unwrap_or(inferred_verb),
        explicit_path: explicit_path.is_some(),
        segment: explicit_path.unwrap_or(inferred_segment),
    }
}

/// Prefix-based inference on a bare method name
pub fn infer(name: &str, style: &NamingStyle) -> (Verb, String) {
    match split_prefix(name) {
        Some((verb, rest)) => (verb, style.apply(rest)),
        None => (Verb::Post, style.apply(name)),
    }
}

/// Longest recognized verb prefix ending on a word boundary
fn split_prefix(name: &str) -> Option<(Verb, &str)> {
    VERB_PREFIXES.iter().find_map(|(prefix, verb)| {
        if name.len() < prefix.len() || !name.is_char_boundary(prefix.len()) {
            return None;
        }
        let (head, rest) = name.split_at(prefix.len());
        if !head.eq_ignore_ascii_case(prefix) {
            return None;
        }
        match rest.chars().next() {
            None => Some((*verb, rest)),
            Some(c) if c.is_ascii_uppercase() || c.is_ascii_digit() => Some((*verb, rest)),
            Some('_') => Some((*verb, rest.trim_start_matches('_'))),
            Some(_) => None,
        }
    })
}

/// Split an identifier on underscores and camel-case boundaries.
///
/// Acronyms stay together: `HTTPServer` → `HTTP`, `Server`.
pub fn split_words(raw: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let chars: Vec<char> = raw.chars().collect();

    for (i, &c) in chars.iter().enumerate() {
        if c == '_' || c == '-' || c.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
            continue;
        }

        if c.is_uppercase() && !current.is_empty() {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            if prev.is_lowercase() || prev.is_ascii_digit() || (prev.is_uppercase() && next_is_lower)
            {
                words.push(std::mem::take(&mut current));
            }
        }
        current.push(c);
    }

    if !current.is_empty() {
        words.push(current);
    }
    words
}
