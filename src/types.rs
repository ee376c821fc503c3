//! Wire-level types shared by the dispatcher, the proxy and the transports.

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Structured value crossing the wire
pub type Value = serde_json::Value;

/// HTTP verbs understood by the binding engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verb {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
}

impl Verb {
    /// All verbs, in a stable order
    pub const ALL: [Verb; 6] = [
        Verb::Get,
        Verb::Head,
        Verb::Post,
        Verb::Put,
        Verb::Patch,
        Verb::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Head => "HEAD",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Patch => "PATCH",
            Verb::Delete => "DELETE",
        }
    }

    /// Verbs whose simple parameters default to the query string.
    ///
    /// Everything else defaults to named body fields.
    pub fn binds_query_by_default(&self) -> bool {
        matches!(self, Verb::Get | Verb::Head | Verb::Put)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Verb {
    type Err = UnknownVerb;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Verb::ALL
            .into_iter()
            .find(|verb| verb.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownVerb(s.to_string()))
    }
}

/// Returned when a verb string is not one of [`Verb::ALL`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown HTTP verb `{0}`")]
pub struct UnknownVerb(pub String);

/// Ordered header list with case-insensitive lookup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headers(Vec<(String, String)>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// First value stored under `name`, ignoring ASCII case
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Replace every value stored under `name` with a single one
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        self.remove(&name);
        self.0.push((name, value.into()));
    }

    /// Add a value without touching existing ones
    pub fn append(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.0.push((name.into(), value.into()));
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let position = self
            .0
            .iter()
            .position(|(key, _)| key.eq_ignore_ascii_case(name))?;
        let (_, value) = self.0.remove(position);
        self.0.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
        Some(value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// An HTTP request as seen by the binding engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireRequest {
    pub verb: Verb,
    /// Percent-encoded path, always starting with `/`
    pub path: String,
    /// Decoded query pairs in wire order
    pub query: Vec<(String, String)>,
    /// Query string exactly as received, when parsed from the wire
    pub raw_query: Option<String>,
    pub headers: Headers,
    pub body: Vec<u8>,
    /// Keys whose values were not valid UTF-8 once decoded
    malformed_query: Vec<String>,
}

impl WireRequest {
    /// Create a request for `path`; anything after `?` is parsed as the query
    pub fn new(verb: Verb, target: impl AsRef<str>) -> Self {
        let target = target.as_ref();
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        let mut request = Self {
            verb,
            path: normalize_path(path),
            query: Vec::new(),
            raw_query: None,
            headers: Headers::new(),
            body: Vec::new(),
            malformed_query: Vec::new(),
        };
        if let Some(query) = query {
            request.set_raw_query(query);
        }
        request
    }

    /// Replace the query with the pairs parsed from a raw `a=1&b=2` string
    pub fn set_raw_query(&mut self, raw: &str) {
        self.query.clear();
        self.malformed_query.clear();
        for pair in raw.split('&').filter(|pair| !pair.is_empty()) {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            // a key that is not UTF-8 cannot name a parameter
            let Ok(key) = form_decode(key) else {
                continue;
            };
            match form_decode(value) {
                Ok(value) => self.query.push((key, value)),
                Err(_) => self.malformed_query.push(key),
            }
        }
        self.raw_query = Some(raw.to_string());
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First query value stored under `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Whether a value sent under `key` did not decode to UTF-8
    pub fn query_is_malformed(&self, key: &str) -> bool {
        self.malformed_query.iter().any(|k| k == key)
    }

    /// Query re-encoded as `application/x-www-form-urlencoded`
    pub fn encoded_query(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.query.iter())
            .finish()
    }

    /// Path plus encoded query, ready to append to a base URL
    pub fn target(&self) -> String {
        if self.query.is_empty() {
            self.path.clone()
        } else {
            format!("{}?{}", self.path, self.encoded_query())
        }
    }
}

/// An HTTP response as seen by the binding engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireResponse {
    pub status: u16,
    pub headers: Headers,
    pub body: Vec<u8>,
}

impl WireResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Body returned with every failed dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    /// Failure class, e.g. `not_found` or `application`
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
}

impl ErrorBody {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            code: None,
            payload: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }
}

/// HTTP status codes produced by the dispatcher.
pub mod status_codes {
    pub const OK: u16 = 200;

    /// Successful call of a method returning nothing
    pub const NO_CONTENT: u16 = 204;

    /// Missing or undecodable parameter, or a failed pre-call hook
    pub const BAD_REQUEST: u16 = 400;

    /// No route matches the verb and path
    pub const NOT_FOUND: u16 = 404;

    pub const PAYLOAD_TOO_LARGE: u16 = 413;

    /// Undeclared handler failure, post-call hook failure or encode failure
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
}

/// Header names with a fixed meaning
pub mod header_names {
    pub const CONTENT_TYPE: &str = "content-type";
    pub const CORRELATION_ID: &str = "x-correlation-id";
}

/// Decode one `application/x-www-form-urlencoded` component
fn form_decode(text: &str) -> Result<String, std::str::Utf8Error> {
    let spaced = text.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
}

fn normalize_path(path: &str) -> String {
    let trimmed = path.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verb_round_trip_through_str() {
        for verb in Verb::ALL {
            assert_eq!(verb.as_str().parse::<Verb>().unwrap(), verb);
        }
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert!("TRACE".parse::<Verb>().is_err());
    }

    #[test]
    fn test_verb_query_defaults() {
        assert!(Verb::Get.binds_query_by_default());
        assert!(Verb::Head.binds_query_by_default());
        assert!(Verb::Put.binds_query_by_default());
        assert!(!Verb::Post.binds_query_by_default());
        assert!(!Verb::Patch.binds_query_by_default());
        assert!(!Verb::Delete.binds_query_by_default());
    }

    #[test]
    fn test_headers_case_insensitive() {
        let mut headers = Headers::new();
        headers.insert("WWW-Authenticate", "Basic");
        assert_eq!(headers.get("www-authenticate"), Some("Basic"));

        headers.insert("www-authenticate", "Bearer");
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get("WWW-AUTHENTICATE"), Some("Bearer"));

        assert_eq!(headers.remove("Www-Authenticate"), Some("Bearer".to_string()));
        assert!(headers.is_empty());
    }

    #[test]
    fn test_request_parses_target() {
        let request = WireRequest::new(Verb::Get, "/svc/items/?input=%5B1%2C2%5D&flag=true");
        assert_eq!(request.path, "/svc/items");
        assert_eq!(request.query_value("input"), Some("[1,2]"));
        assert_eq!(request.query_value("flag"), Some("true"));
        assert_eq!(request.query_value("missing"), None);
    }

    #[test]
    fn test_request_target_round_trip() {
        let request = WireRequest::new(Verb::Get, "/svc").with_query("q", "a b&c");
        let target = request.target();
        let parsed = WireRequest::new(Verb::Get, &target);
        assert_eq!(parsed.query_value("q"), Some("a b&c"));
    }

    #[test]
    fn test_query_keeps_raw_text_and_flags_bad_utf8() {
        let request = WireRequest::new(Verb::Get, "/svc?name=caf%C3%A9&bad=%FF&plus=a+b%2B");
        assert_eq!(request.raw_query.as_deref(), Some("name=caf%C3%A9&bad=%FF&plus=a+b%2B"));
        assert_eq!(request.query_value("name"), Some("café"));
        assert_eq!(request.query_value("plus"), Some("a b+"));
        assert_eq!(request.query_value("bad"), None);
        assert!(request.query_is_malformed("bad"));
        assert!(!request.query_is_malformed("name"));
    }

    #[test]
    fn test_root_path_normalized() {
        assert_eq!(WireRequest::new(Verb::Get, "").path, "/");
        assert_eq!(WireRequest::new(Verb::Get, "//").path, "/");
    }

    #[test]
    fn test_response_success_range() {
        assert!(WireResponse::new(200).is_success());
        assert!(WireResponse::new(204).is_success());
        assert!(!WireResponse::new(404).is_success());
    }

    #[test]
    fn test_error_body_serialization_skips_empty() {
        let body = ErrorBody::new("not_found", "no route");
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({"kind": "not_found", "message": "no route"}));
    }
}
