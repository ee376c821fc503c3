//! Builder patterns for interface descriptors.

use crate::convention::NamingStyle;
use crate::descriptor::*;
use crate::types::{Value, Verb};

/// Builder for interface descriptors
pub struct InterfaceBuilder {
    descriptor: InterfaceDescriptor,
}

impl InterfaceBuilder {
    /// Create a new interface builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            descriptor: InterfaceDescriptor::new(name),
        }
    }

    /// Set the root segment the interface is mounted under
    pub fn root_path(mut self, root: impl Into<String>) -> Self {
        self.descriptor.root_path = Some(root.into());
        self
    }

    /// Set the naming style used inside this interface
    pub fn naming_style(mut self, style: NamingStyle) -> Self {
        self.descriptor.naming_style = Some(style);
        self
    }

    /// Add a method
    pub fn method(mut self, method: MethodBuilder) -> Self {
        self.descriptor.methods.push(method.build());
        self
    }

    /// Add a nested-interface accessor named `name`
    pub fn nested(mut self, name: impl Into<String>, interface: InterfaceBuilder) -> Self {
        let mut accessor = MethodDescriptor::new(name);
        accessor.returns = Shape::interface(interface.build());
        self.descriptor.methods.push(accessor);
        self
    }

    /// Build the descriptor
    pub fn build(self) -> InterfaceDescriptor {
        self.descriptor
    }
}

/// Builder for method descriptors
pub struct MethodBuilder {
    method: MethodDescriptor,
}

impl MethodBuilder {
    /// Create a new method builder
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            method: MethodDescriptor::new(name),
        }
    }

    /// Add a parameter
    pub fn param(mut self, parameter: ParameterBuilder) -> Self {
        self.method.parameters.push(parameter.build());
        self
    }

    /// Set the return shape
    pub fn returns(mut self, shape: Shape) -> Self {
        self.method.returns = shape;
        self
    }

    /// Override the inferred verb
    pub fn verb(mut self, verb: Verb) -> Self {
        self.method.verb = Some(verb);
        self
    }

    /// Override the inferred path segment
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.method.path = Some(path.into());
        self
    }

    /// Mark the method as a property getter
    pub fn getter(mut self) -> Self {
        self.method.accessor = Some(Accessor::Getter);
        self
    }

    /// Mark the method as a property setter
    pub fn setter(mut self) -> Self {
        self.method.accessor = Some(Accessor::Setter);
        self
    }

    /// Run `hook` before the handler and inject its output into `parameter`
    pub fn pre_hook(mut self, hook: impl Into<String>, parameter: impl Into<String>) -> Self {
        self.method.pre_hooks.push(PreHookSpec::new(hook, parameter));
        self
    }

    /// Run `hook` on the handler's return value
    pub fn post_hook(mut self, hook: impl Into<String>) -> Self {
        self.method.post_hooks.push(hook.into());
        self
    }

    /// Build the method descriptor
    pub fn build(self) -> MethodDescriptor {
        self.method
    }
}

/// Builder for parameter descriptors
pub struct ParameterBuilder {
    parameter: ParameterDescriptor,
}

impl ParameterBuilder {
    /// Create a new parameter builder
    pub fn new(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            parameter: ParameterDescriptor::new(name, shape),
        }
    }

    /// Bind to the path capture named after the parameter
    pub fn path(mut self) -> Self {
        self.parameter.binding = Some(BindingOverride::Path);
        self
    }

    pub fn query(mut self) -> Self {
        self.parameter.binding = Some(BindingOverride::Query { key: None });
        self
    }

    pub fn query_key(mut self, key: impl Into<String>) -> Self {
        self.parameter.binding = Some(BindingOverride::Query {
            key: Some(key.into()),
        });
        self
    }

    /// Bind to the header with this literal name
    pub fn header(mut self, name: impl Into<String>) -> Self {
        self.parameter.binding = Some(BindingOverride::Header { name: name.into() });
        self
    }

    pub fn body_field(mut self) -> Self {
        self.parameter.binding = Some(BindingOverride::BodyField { key: None });
        self
    }

    pub fn body_field_key(mut self, key: impl Into<String>) -> Self {
        self.parameter.binding = Some(BindingOverride::BodyField {
            key: Some(key.into()),
        });
        self
    }

    /// Bind to the entire request body
    pub fn whole_body(mut self) -> Self {
        self.parameter.binding = Some(BindingOverride::WholeBody);
        self
    }

    /// Never read from the request; written back on the response
    pub fn output(mut self) -> Self {
        self.parameter.direction = Direction::Out;
        self
    }

    /// Read from the request and written back on the response
    pub fn in_out(mut self) -> Self {
        self.parameter.direction = Direction::InOut;
        self
    }

    /// Value used when the request carries nothing
    pub fn default_value(mut self, value: Value) -> Self {
        self.parameter.default = Some(value);
        self
    }

    /// Build the parameter descriptor
    pub fn build(self) -> ParameterDescriptor {
        self.parameter
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_interface_builder() {
        let descriptor = InterfaceDescriptor::builder("SomeService")
            .root_path("svc")
            .naming_style(NamingStyle::UpperUnderscore)
            .method(MethodBuilder::new("getSomeInfo").returns(Shape::String))
            .nested(
                "nestedModule",
                InterfaceBuilder::new("NestedIface")
                    .method(MethodBuilder::new("getData").returns(Shape::Integer)),
            )
            .build();

        assert_eq!(descriptor.root_path.as_deref(), Some("svc"));
        assert_eq!(descriptor.naming_style, Some(NamingStyle::UpperUnderscore));
        assert_eq!(descriptor.methods.len(), 2);
        let nested = descriptor.method("nestedModule").unwrap();
        assert_eq!(nested.nested_interface().unwrap().name, "NestedIface");
    }

    #[test]
    fn test_method_builder_overrides() {
        let method = MethodBuilder::new("login")
            .verb(Verb::Post)
            .path(":tenant/login")
            .param(ParameterBuilder::new("_tenant", Shape::String))
            .param(
                ParameterBuilder::new("challenge", Shape::String)
                    .header("WWW-Authenticate")
                    .output(),
            )
            .param(ParameterBuilder::new("page", Shape::Integer).default_value(json!(1)))
            .pre_hook("auth", "user")
            .post_hook("wrap")
            .build();

        assert_eq!(method.verb, Some(Verb::Post));
        assert_eq!(method.path.as_deref(), Some(":tenant/login"));
        assert_eq!(method.parameters.len(), 3);
        assert_eq!(method.parameters[1].direction, Direction::Out);
        assert_eq!(method.parameters[2].default, Some(json!(1)));
        assert_eq!(method.pre_hooks, vec![PreHookSpec::new("auth", "user")]);
        assert_eq!(method.post_hooks, vec!["wrap".to_string()]);
    }

    #[test]
    fn test_parameter_binding_overrides() {
        let query = ParameterBuilder::new("q", Shape::String).query_key("search").build();
        assert_eq!(
            query.binding,
            Some(BindingOverride::Query {
                key: Some("search".to_string())
            })
        );

        let body = ParameterBuilder::new("doc", Shape::Any).whole_body().build();
        assert_eq!(body.binding, Some(BindingOverride::WholeBody));
    }
}
