//! Configuration for table construction and dispatch

use crate::convention::NamingStyle;
use crate::error::BuildError;
use crate::types::header_names;
use serde::{Deserialize, Serialize};

/// Route table construction settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Style applied where the interface does not set its own
    pub naming_style: NamingStyle,
    /// Root segment; overrides the descriptor's root path and name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub root: Option<String>,
}

impl BindingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn naming_style(mut self, style: NamingStyle) -> Self {
        self.naming_style = style;
        self
    }

    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = Some(root.into());
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::InvalidConfig(e.to_string()))
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Maximum request body size in bytes (0 = unlimited)
    pub max_body_size: usize,
    /// Send undeclared failure messages to clients instead of a generic one
    pub expose_internal_errors: bool,
    /// Header carrying the correlation id in both directions
    pub correlation_header: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_body_size: 1024 * 1024, // 1 MB
            expose_internal_errors: false,
            correlation_header: header_names::CORRELATION_ID.to_string(),
        }
    }
}

impl ServerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    pub fn expose_internal_errors(mut self, expose: bool) -> Self {
        self.expose_internal_errors = expose;
        self
    }

    pub fn correlation_header(mut self, name: impl Into<String>) -> Self {
        self.correlation_header = name.into();
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::InvalidConfig(e.to_string()))
    }

    /// Whether a body of `size` bytes exceeds the limit
    pub fn exceeds_limit(&self, size: usize) -> bool {
        self.max_body_size != 0 && size > self.max_body_size
    }
}
