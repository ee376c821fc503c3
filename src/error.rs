//! Error taxonomy for table construction, dispatch and proxy calls.

use crate::types::{ErrorBody, Value, Verb, status_codes};

/// Configuration error detected while building a route table or dispatcher.
///
/// Fatal: a server must not start with a table that failed to build.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuildError {
    #[error("unknown naming style `{0}` (expected `lower_snake` or `upper_underscore`)")]
    UnknownNamingStyle(String),

    #[error("route collision: {verb} {pattern} is declared by both `{first}` and `{second}`")]
    RouteCollision {
        verb: Verb,
        pattern: String,
        first: String,
        second: String,
    },

    #[error("path `{pattern}` of `{method}` captures `:{capture}` but no `_{capture}` parameter binds it")]
    MissingCapture {
        method: String,
        pattern: String,
        capture: String,
    },

    #[error("path `{pattern}` of `{method}` declares `:{capture}` more than once")]
    DuplicateCapture {
        method: String,
        pattern: String,
        capture: String,
    },

    #[error("parameter `{parameter}` of `{method}` is bound to path capture `:{capture}` which `{pattern}` does not declare")]
    UnknownCapture {
        method: String,
        parameter: String,
        capture: String,
        pattern: String,
    },

    #[error("parameter `{parameter}` of `{method}` is `{direction}` but only header bindings may be output-only or bidirectional")]
    IllegalDirectionality {
        method: String,
        parameter: String,
        direction: String,
    },

    #[error("`{method}` binds both `{first}` and `{second}` to the whole body")]
    MultipleWholeBody {
        method: String,
        first: String,
        second: String,
    },

    #[error("`{method}` binds `{whole_body}` to the whole body and `{field}` to a body field")]
    AmbiguousBody {
        method: String,
        whole_body: String,
        field: String,
    },

    #[error("`{method}` binds `{first}` and `{second}` to the same {location} key `{key}`")]
    DuplicateWireKey {
        method: String,
        location: String,
        key: String,
        first: String,
        second: String,
    },

    #[error("pre-call hook `{hook}` of `{method}` injects `{parameter}` which is not an available parameter")]
    UnknownHookParameter {
        method: String,
        hook: String,
        parameter: String,
    },

    #[error("nested accessor `{method}` is invalid: {reason}")]
    InvalidAccessor { method: String, reason: String },

    #[error("route `{route}` references unregistered hook `{hook}`")]
    UnknownHook { route: String, hook: String },

    #[error("no handler registered for `{method}`")]
    MissingHandler { method: String },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Failure of the marshaller to encode or decode a value
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MarshalError {
    #[error("malformed input: {0}")]
    Syntax(String),

    #[error("shape mismatch at `{path}`: expected {expected}, found {found}")]
    ShapeMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("encode failed: {0}")]
    Encode(String),
}

/// Request parameter could not be extracted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BindError {
    #[error("missing required parameter `{parameter}` ({location})")]
    Missing { parameter: String, location: String },

    #[error("parameter `{parameter}` could not be decoded: {source}")]
    Decode {
        parameter: String,
        #[source]
        source: MarshalError,
    },

    #[error("request body could not be decoded: {0}")]
    MalformedBody(#[source] MarshalError),
}

/// Failure raised by a pre-call or post-call hook
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct HookError {
    /// Status for a pre-call failure; ignored after the handler ran.
    /// Values outside 400..=599 are sent as 500.
    pub status: Option<u16>,
    pub message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }
}

/// Failure raised by a method implementation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HandlerError {
    /// Application-level failure the interface declares; sent as-is, except
    /// that a status outside 400..=599 is sent as 500
    #[error("{message}")]
    Declared {
        status: u16,
        code: Option<String>,
        message: String,
        payload: Option<Value>,
    },

    /// Anything else; details stay on the server
    #[error("{0}")]
    Unexpected(String),
}

impl HandlerError {
    pub fn declared(status: u16, message: impl Into<String>) -> Self {
        HandlerError::Declared {
            status,
            code: None,
            message: message.into(),
            payload: None,
        }
    }

    pub fn unexpected(error: impl std::fmt::Display) -> Self {
        HandlerError::Unexpected(error.to_string())
    }

    /// Attach a machine-readable code to a declared error
    pub fn with_code(self, new_code: impl Into<String>) -> Self {
        match self {
            HandlerError::Declared {
                status,
                message,
                payload,
                ..
            } => HandlerError::Declared {
                status,
                code: Some(new_code.into()),
                message,
                payload,
            },
            other => other,
        }
    }

    /// Attach a structured payload to a declared error
    pub fn with_payload(self, new_payload: Value) -> Self {
        match self {
            HandlerError::Declared {
                status,
                code,
                message,
                ..
            } => HandlerError::Declared {
                status,
                code,
                message,
                payload: Some(new_payload),
            },
            other => other,
        }
    }
}

/// Per-request dispatch failure
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    #[error("no route for {verb} {path}")]
    NotFound { verb: Verb, path: String },

    #[error("request body of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error(transparent)]
    Bind(#[from] BindError),

    #[error("pre-call hook `{hook}` failed: {source}")]
    PreHook {
        hook: String,
        #[source]
        source: HookError,
    },

    #[error(transparent)]
    Handler(#[from] HandlerError),

    #[error("post-call hook `{hook}` failed: {source}")]
    PostHook {
        hook: String,
        #[source]
        source: HookError,
    },

    #[error("response could not be encoded: {0}")]
    Encode(#[source] MarshalError),
}

impl DispatchError {
    /// Status code sent to the client
    pub fn status(&self) -> u16 {
        match self {
            DispatchError::NotFound { .. } => status_codes::NOT_FOUND,
            DispatchError::PayloadTooLarge { .. } => status_codes::PAYLOAD_TOO_LARGE,
            DispatchError::Bind(_) => status_codes::BAD_REQUEST,
            DispatchError::PreHook { source, .. } => {
                failure_status(source.status.unwrap_or(status_codes::BAD_REQUEST))
            }
            DispatchError::Handler(HandlerError::Declared { status, .. }) => failure_status(*status),
            DispatchError::Handler(HandlerError::Unexpected(_))
            | DispatchError::PostHook { .. }
            | DispatchError::Encode(_) => status_codes::INTERNAL_SERVER_ERROR,
        }
    }

    /// Whether the client caused the failure
    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.status())
    }

    /// Body sent to the client; server-side details are elided unless `expose_internal`
    pub fn to_body(&self, expose_internal: bool) -> ErrorBody {
        match self {
            DispatchError::NotFound { .. } => ErrorBody::new("not_found", self.to_string()),
            DispatchError::PayloadTooLarge { .. } => {
                ErrorBody::new("payload_too_large", self.to_string())
            }
            DispatchError::Bind(_) => ErrorBody::new("bad_request", self.to_string()),
            DispatchError::PreHook { source, .. } => {
                ErrorBody::new("hook_rejected", source.message.clone())
            }
            DispatchError::Handler(HandlerError::Declared {
                code,
                message,
                payload,
                ..
            }) => ErrorBody {
                kind: "application".to_string(),
                message: message.clone(),
                code: code.clone(),
                payload: payload.clone(),
            },
            DispatchError::Handler(HandlerError::Unexpected(_))
            | DispatchError::PostHook { .. }
            | DispatchError::Encode(_) => {
                if expose_internal {
                    ErrorBody::new("internal", self.to_string())
                } else {
                    ErrorBody::new("internal", "Internal server error")
                }
            }
        }
    }
}

/// Failures are always sent as 4xx or 5xx; anything else becomes 500
fn failure_status(status: u16) -> u16 {
    if (400..600).contains(&status) {
        status
    } else {
        status_codes::INTERNAL_SERVER_ERROR
    }
}

/// Failure reported by a transport collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("i/o failure: {0}")]
    Io(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// Failure of a proxy call, as surfaced to the caller
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CallError {
    #[error("interface has no method `{0}`")]
    UnknownMethod(String),

    #[error("interface has no nested accessor `{0}`")]
    UnknownInterface(String),

    #[error("missing argument `{parameter}` for `{method}`")]
    MissingArgument { method: String, parameter: String },

    #[error("`{method}` does not accept argument `{parameter}`")]
    UnexpectedArgument { method: String, parameter: String },

    #[error("argument `{parameter}` could not be encoded: {source}")]
    Encode {
        parameter: String,
        #[source]
        source: MarshalError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("server responded with status {status}")]
    Status {
        status: u16,
        body: Option<ErrorBody>,
    },

    #[error("response could not be decoded: {0}")]
    Decode(#[source] MarshalError),
}

impl CallError {
    /// Status code of a non-success response, if that is what failed
    pub fn status(&self) -> Option<u16> {
        match self {
            CallError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Decoded error body of a non-success response
    pub fn body(&self) -> Option<&ErrorBody> {
        match self {
            CallError::Status { body, .. } => body.as_ref(),
            _ => None,
        }
    }
}
