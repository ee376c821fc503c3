//! Method registry for handler implementations.
//!
//! ## Usage
//!
//! Implement [`ServiceMethod`] for each leaf method, or register closures:
//!
//! ```rust
//! use restbind::*;
//!
//! struct SomeInfo;
//!
//! #[async_trait::async_trait]
//! impl ServiceMethod for SomeInfo {
//!     fn method_name(&self) -> &str { "getSomeInfo" }
//!
//!     async fn call(&self, _args: &mut Arguments) -> Result<Value, HandlerError> {
//!         Ok(Value::String("info".into()))
//!     }
//! }
//!
//! let registry = MethodRegistry::new(register_methods![SomeInfo])
//!     .register_fn("nestedModule.getData", |_args| Ok(Value::from(42)));
//!
//! assert!(registry.has_method("getSomeInfo"));
//! assert_eq!(registry.method_count(), 2);
//! ```

use crate::error::HandlerError;
use crate::types::Value;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Implementation of one leaf method, keyed by its qualified name
#[async_trait::async_trait]
pub trait ServiceMethod: Send + Sync {
    /// Qualified name this implementation handles (`accessor.method`)
    fn method_name(&self) -> &str;

    /// Execute the method.
    ///
    /// Output-only and bidirectional parameters are read back from `args`
    /// after the call returns.
    async fn call(&self, args: &mut Arguments) -> Result<Value, HandlerError>;
}

/// Macro to box a list of [`ServiceMethod`] implementations
#[macro_export]
macro_rules! register_methods {
    ($($method:expr),* $(,)?) => {
        vec![
            $(
                Box::new($method) as Box<dyn $crate::ServiceMethod>
            ),*
        ]
    };
}

/// Bound parameter values in declaration order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    values: Vec<(String, Value)>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Deserialize a parameter into `T`
    pub fn get_as<T: DeserializeOwned>(&self, name: &str) -> Result<T, HandlerError> {
        let value = self
            .get(name)
            .ok_or_else(|| HandlerError::unexpected(format!("no argument named `{}`", name)))?;
        serde_json::from_value(value.clone()).map_err(|e| {
            HandlerError::unexpected(format!("argument `{}` has the wrong type: {}", name, e))
        })
    }

    /// Set a value, replacing an existing one; used for output parameters
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.values.push((name, value)),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Function signature for closure handlers
pub type MethodHandler = Arc<dyn Fn(&mut Arguments) -> Result<Value, HandlerError> + Send + Sync>;

struct FnMethod {
    name: String,
    handler: MethodHandler,
}

#[async_trait::async_trait]
impl ServiceMethod for FnMethod {
    fn method_name(&self) -> &str {
        &self.name
    }

    async fn call(&self, args: &mut Arguments) -> Result<Value, HandlerError> {
        (self.handler)(args)
    }
}

/// Registry of method implementations
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn ServiceMethod>>,
}

impl MethodRegistry {
    /// Create a new method registry with the given method implementations
    pub fn new(methods: Vec<Box<dyn ServiceMethod>>) -> Self {
        tracing::debug!(method_count = methods.len(), "registry created");
        Self {
            methods: methods
                .into_iter()
                .map(|m| (m.method_name().to_string(), Arc::from(m)))
                .collect(),
        }
    }

    /// Create an empty registry
    pub fn empty() -> Self {
        Self {
            methods: HashMap::new(),
        }
    }

    /// Add a method implementation to the registry
    pub fn add_method(mut self, method: Box<dyn ServiceMethod>) -> Self {
        tracing::trace!(method = %method.method_name(), "adding method to registry");
        self.methods
            .insert(method.method_name().to_string(), Arc::from(method));
        self
    }

    /// Register a synchronous closure under `name`
    pub fn register_fn<F>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Arguments) -> Result<Value, HandlerError> + Send + Sync + 'static,
    {
        self.add_method(Box::new(FnMethod {
            name: name.into(),
            handler: Arc::new(handler),
        }))
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ServiceMethod>> {
        self.methods.get(name).cloned()
    }

    /// Check if a method is registered
    pub fn has_method(&self, method_name: &str) -> bool {
        self.methods.contains_key(method_name)
    }

    /// Get list of all registered methods
    pub fn get_methods(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }

    /// Get the number of registered methods
    pub fn method_count(&self) -> usize {
        self.methods.len()
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::empty()
    }
}
