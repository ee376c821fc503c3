//! Interface descriptors: the schema the route table is derived from.
//!
//! Descriptors are supplied once at startup, either through the fluent
//! builders in [`crate::builders`] or deserialized from JSON:
//!
//! ```rust
//! use restbind::InterfaceDescriptor;
//!
//! let descriptor = InterfaceDescriptor::from_json(r#"{
//!     "name": "SomeService",
//!     "methods": [
//!         { "name": "getSomeInfo", "returns": "string" },
//!         { "name": "postEvent", "parameters": [{ "name": "event", "shape": "any" }] }
//!     ]
//! }"#).unwrap();
//!
//! assert_eq!(descriptor.methods.len(), 2);
//! ```

use crate::convention::NamingStyle;
use crate::error::BuildError;
use crate::types::{Value, Verb};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Shape of a value crossing the wire
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    /// No value; a method returning `Void` answers 204
    Void,
    /// Any structured value, unchecked
    Any,
    Bool,
    Integer,
    Number,
    String,
    Optional(Box<Shape>),
    List(Box<Shape>),
    /// Aggregate with named fields
    Object {
        name: String,
        #[serde(default)]
        fields: Vec<FieldShape>,
    },
    /// Reference to a routable sub-interface
    Interface(Box<InterfaceDescriptor>),
}

impl Shape {
    pub fn optional(inner: Shape) -> Self {
        Shape::Optional(Box::new(inner))
    }

    pub fn list(inner: Shape) -> Self {
        Shape::List(Box::new(inner))
    }

    pub fn object(name: impl Into<String>, fields: Vec<FieldShape>) -> Self {
        Shape::Object {
            name: name.into(),
            fields,
        }
    }

    pub fn interface(descriptor: InterfaceDescriptor) -> Self {
        Shape::Interface(Box::new(descriptor))
    }

    /// Scalars travel as plain text in paths, query strings and headers
    pub fn is_scalar(&self) -> bool {
        match self {
            Shape::Bool | Shape::Integer | Shape::Number | Shape::String => true,
            Shape::Optional(inner) => inner.is_scalar(),
            _ => false,
        }
    }

    /// `String`, possibly wrapped in `Optional`; encoded without quoting
    pub fn is_textual(&self) -> bool {
        match self {
            Shape::String => true,
            Shape::Optional(inner) => inner.is_textual(),
            _ => false,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, Shape::Optional(_))
    }

    /// Whether null is an ordinary value of this shape rather than absence
    pub fn admits_null(&self) -> bool {
        matches!(self, Shape::Any)
    }

    pub fn as_interface(&self) -> Option<&InterfaceDescriptor> {
        match self {
            Shape::Interface(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Void => f.write_str("void"),
            Shape::Any => f.write_str("any"),
            Shape::Bool => f.write_str("bool"),
            Shape::Integer => f.write_str("integer"),
            Shape::Number => f.write_str("number"),
            Shape::String => f.write_str("string"),
            Shape::Optional(inner) => write!(f, "{}?", inner),
            Shape::List(inner) => write!(f, "{}[]", inner),
            Shape::Object { name, .. } => f.write_str(name),
            Shape::Interface(descriptor) => write!(f, "interface {}", descriptor.name),
        }
    }
}

/// Named field of an aggregate shape
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldShape {
    pub name: String,
    pub shape: Shape,
}

impl FieldShape {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// Explicit binding source attached to a parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindingOverride {
    /// Path capture named after the parameter, without its leading underscore
    Path,
    Query {
        #[serde(default)]
        key: Option<String>,
    },
    /// Header with a literal name, independent of the parameter name
    Header { name: String },
    BodyField {
        #[serde(default)]
        key: Option<String>,
    },
    WholeBody,
}

/// Direction of a header-bound parameter relative to the request/response pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Read from the request
    #[default]
    In,
    /// Never read; written back on the response
    Out,
    /// Read from the request and written back on the response
    InOut,
}

impl Direction {
    /// Whether the server writes the value back onto the response
    pub fn is_returned(&self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }

    /// Whether the caller supplies the value
    pub fn is_sent(&self) -> bool {
        matches!(self, Direction::In | Direction::InOut)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::In => f.write_str("input-only"),
            Direction::Out => f.write_str("output-only"),
            Direction::InOut => f.write_str("bidirectional"),
        }
    }
}

/// Property accessor flag; short-circuits prefix inference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Accessor {
    Getter,
    Setter,
}

/// Pre-call hook attachment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreHookSpec {
    /// Name the hook is registered under
    pub hook: String,
    /// Parameter that receives the hook's output
    pub inject: String,
}

impl PreHookSpec {
    pub fn new(hook: impl Into<String>, inject: impl Into<String>) -> Self {
        Self {
            hook: hook.into(),
            inject: inject.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    #[serde(default = "any_shape")]
    pub shape: Shape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub binding: Option<BindingOverride>,
    #[serde(default)]
    pub direction: Direction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            binding: None,
            direction: Direction::In,
            default: None,
        }
    }

    /// Name with the path-capture underscore removed
    pub fn capture_name(&self) -> Option<&str> {
        self.name.strip_prefix('_').filter(|rest| !rest.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDescriptor {
    pub name: String,
    #[serde(default)]
    pub parameters: Vec<ParameterDescriptor>,
    #[serde(default = "void_shape")]
    pub returns: Shape,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verb: Option<Verb>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessor: Option<Accessor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pre_hooks: Vec<PreHookSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_hooks: Vec<String>,
}

impl MethodDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            returns: Shape::Void,
            verb: None,
            path: None,
            accessor: None,
            pre_hooks: Vec::new(),
            post_hooks: Vec::new(),
        }
    }

    /// Zero-parameter method returning an interface; mounted, never routed
    pub fn nested_interface(&self) -> Option<&InterfaceDescriptor> {
        if self.parameters.is_empty() {
            self.returns.as_interface()
        } else {
            None
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&ParameterDescriptor> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceDescriptor {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<MethodDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub naming_style: Option<NamingStyle>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
            root_path: None,
            naming_style: None,
        }
    }

    /// Start a fluent builder
    pub fn builder(name: impl Into<String>) -> crate::builders::InterfaceBuilder {
        crate::builders::InterfaceBuilder::new(name)
    }

    /// Load a descriptor from its JSON form
    pub fn from_json(json: &str) -> Result<Self, BuildError> {
        serde_json::from_str(json).map_err(|e| BuildError::InvalidDescriptor(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn method(&self, name: &str) -> Option<&MethodDescriptor> {
        self.methods.iter().find(|m| m.name == name)
    }
}

fn any_shape() -> Shape {
    Shape::Any
}

fn void_shape() -> Shape {
    Shape::Void
}
