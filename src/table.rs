//! Route table: the trie built once from an interface descriptor and shared,
//! read-only, by the dispatcher and the proxy.

use crate::binder;
use crate::config::BindingConfig;
use crate::convention::{self, NamingStyle};
use crate::descriptor::{InterfaceDescriptor, MethodDescriptor};
use crate::error::BuildError;
use crate::openapi::OpenApiSpec;
use crate::route::{Binding, Injection, PathPattern, Route, Segment, decode_path};
use crate::types::Verb;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default)]
struct Node {
    literals: HashMap<String, Node>,
    /// Single wildcard edge; capture names do not affect the pattern shape
    capture: Option<Box<Node>>,
    endpoints: HashMap<Verb, usize>,
}

impl Node {
    fn find(&self, segments: &[Option<String>], verb: Verb) -> Option<usize> {
        let Some((head, rest)) = segments.split_first() else {
            return self.endpoints.get(&verb).copied();
        };
        if let Some(head) = head
            && let Some(child) = self.literals.get(head)
            && let Some(found) = child.find(rest, verb)
        {
            return Some(found);
        }
        self.capture.as_ref()?.find(rest, verb)
    }
}

/// Result of a successful lookup
#[derive(Debug, Clone)]
pub struct RouteMatch<'a> {
    pub route: &'a Route,
    /// Decoded capture values keyed by capture name
    pub captures: HashMap<String, String>,
    /// Captures whose segment did not decode to UTF-8
    pub malformed: Vec<String>,
}

/// Serializable view of one route
#[derive(Debug, Clone, Serialize)]
pub struct RouteSummary {
    pub verb: Verb,
    pub pattern: PathPattern,
    pub method: String,
    pub returns: String,
    pub bindings: Vec<Binding>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub injections: Vec<Injection>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_hooks: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_hooks: Vec<String>,
}

/// Immutable verb + path trie over every leaf method of an interface tree
#[derive(Debug)]
pub struct RouteTable {
    interface: String,
    routes: Vec<Route>,
    by_name: HashMap<String, usize>,
    root: Node,
}

impl RouteTable {
    /// Build the table for `descriptor`; fails as a whole on the first error
    pub fn build(descriptor: &InterfaceDescriptor, config: &BindingConfig) -> Result<Self, BuildError> {
        let style = descriptor
            .naming_style
            .clone()
            .unwrap_or_else(|| config.naming_style.clone());
        let root = match (&config.root, &descriptor.root_path) {
            (Some(root), _) | (None, Some(root)) => root.clone(),
            (None, None) => style.apply(&descriptor.name),
        };

        let mut table = Self {
            interface: descriptor.name.clone(),
            routes: Vec::new(),
            by_name: HashMap::new(),
            root: Node::default(),
        };
        table.mount(descriptor, &PathPattern::parse(&root), &style, "")?;

        tracing::debug!(
            interface = %descriptor.name,
            route_count = table.routes.len(),
            "route table built"
        );
        Ok(table)
    }

    /// Start a builder with the default configuration
    pub fn builder(descriptor: &InterfaceDescriptor) -> RouteTableBuilder<'_> {
        RouteTableBuilder {
            descriptor,
            config: BindingConfig::default(),
        }
    }

    fn mount(
        &mut self,
        interface: &InterfaceDescriptor,
        mount: &PathPattern,
        style: &NamingStyle,
        prefix: &str,
    ) -> Result<(), BuildError> {
        for method in &interface.methods {
            let qualified_name = format!("{}{}", prefix, method.name);
            match method.nested_interface() {
                Some(nested) => {
                    let segment = accessor_segment(&qualified_name, method, style)?;
                    let nested_style = nested.naming_style.as_ref().unwrap_or(style);
                    tracing::trace!(accessor = %qualified_name, interface = %nested.name, "mounting nested interface");
                    self.mount(
                        nested,
                        &mount.join(&segment),
                        nested_style,
                        &format!("{}.", qualified_name),
                    )?;
                }
                None => self.insert(method, mount, style, qualified_name)?,
            }
        }
        Ok(())
    }

    fn insert(
        &mut self,
        method: &MethodDescriptor,
        mount: &PathPattern,
        style: &NamingStyle,
        qualified_name: String,
    ) -> Result<(), BuildError> {
        if self.by_name.contains_key(&qualified_name) {
            return Err(BuildError::InvalidDescriptor(format!(
                "method `{}` is declared more than once",
                qualified_name
            )));
        }

        let resolved = convention::resolve(method, style);
        let pattern = mount.join(&PathPattern::parse(&resolved.segment));
        let bound = binder::bind(&qualified_name, method, resolved.verb, &pattern)?;

        let mut node = &mut self.root;
        for segment in pattern.segments() {
            node = match segment {
                Segment::Literal(text) => node.literals.entry(text.clone()).or_default(),
                Segment::Capture(_) => &mut **node.capture.get_or_insert_with(Box::default),
            };
        }
        if let Some(&existing) = node.endpoints.get(&resolved.verb) {
            return Err(BuildError::RouteCollision {
                verb: resolved.verb,
                pattern: pattern.to_string(),
                first: self.routes[existing].qualified_name.clone(),
                second: qualified_name,
            });
        }

        let id = self.routes.len();
        node.endpoints.insert(resolved.verb, id);
        tracing::trace!(verb = %resolved.verb, pattern = %pattern, method = %qualified_name, "route added");
        self.by_name.insert(qualified_name.clone(), id);
        self.routes.push(Route {
            id,
            verb: resolved.verb,
            pattern,
            qualified_name,
            method: method.clone(),
            bindings: bound.bindings,
            injections: bound.injections,
            pre_hooks: method.pre_hooks.clone(),
            post_hooks: method.post_hooks.clone(),
        });
        Ok(())
    }

    /// Find the route for `verb` on an encoded request path
    pub fn lookup(&self, verb: Verb, path: &str) -> Option<RouteMatch<'_>> {
        let segments = decode_path(path);
        let id = self.root.find(&segments, verb)?;
        let route = &self.routes[id];
        let mut captures = HashMap::new();
        let mut malformed = Vec::new();
        for (segment, value) in route.pattern.segments().iter().zip(segments) {
            let Segment::Capture(name) = segment else {
                continue;
            };
            match value {
                Some(value) => {
                    captures.insert(name.clone(), value);
                }
                None => malformed.push(name.clone()),
            }
        }
        Some(RouteMatch {
            route,
            captures,
            malformed,
        })
    }

    /// Route of a method by qualified name (`accessor.method`)
    pub fn route(&self, qualified_name: &str) -> Option<&Route> {
        self.by_name.get(qualified_name).map(|&id| &self.routes[id])
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// Name of the interface the table was built from
    pub fn interface(&self) -> &str {
        &self.interface
    }

    /// Whether any route is mounted under the accessor chain `prefix`
    pub fn has_prefix(&self, prefix: &str) -> bool {
        let dotted = format!("{}.", prefix);
        self.by_name.keys().any(|name| name.starts_with(&dotted))
    }

    /// Summaries of every route, in declaration order
    pub fn describe(&self) -> Vec<RouteSummary> {
        self.routes
            .iter()
            .map(|route| RouteSummary {
                verb: route.verb,
                pattern: route.pattern.clone(),
                method: route.qualified_name.clone(),
                returns: route.returns().to_string(),
                bindings: route.bindings.clone(),
                injections: route.injections.clone(),
                pre_hooks: route.pre_hooks.iter().map(|h| h.hook.clone()).collect(),
                post_hooks: route.post_hooks.clone(),
            })
            .collect()
    }

    /// Minimal OpenAPI 3 document describing every route
    pub fn openapi(&self, title: &str, version: &str) -> OpenApiSpec {
        OpenApiSpec::from_table(self, title, version)
    }
}

/// Fluent construction of a [`RouteTable`]
pub struct RouteTableBuilder<'a> {
    descriptor: &'a InterfaceDescriptor,
    config: BindingConfig,
}

impl RouteTableBuilder<'_> {
    /// Set the root segment
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.config.root = Some(root.into());
        self
    }

    /// Set the fallback naming style
    pub fn style(mut self, style: NamingStyle) -> Self {
        self.config.naming_style = style;
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: BindingConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<RouteTable, BuildError> {
        RouteTable::build(self.descriptor, &self.config)
    }
}

fn accessor_segment(
    qualified_name: &str,
    accessor: &MethodDescriptor,
    style: &NamingStyle,
) -> Result<PathPattern, BuildError> {
    if !accessor.pre_hooks.is_empty() || !accessor.post_hooks.is_empty() {
        return Err(BuildError::InvalidAccessor {
            method: qualified_name.to_string(),
            reason: "accessors cannot carry hooks".to_string(),
        });
    }
    let segment = PathPattern::parse(&convention::resolve(accessor, style).segment);
    if let Some(capture) = segment.captures().next() {
        return Err(BuildError::InvalidAccessor {
            method: qualified_name.to_string(),
            reason: format!("accessor path cannot capture `:{}`", capture),
        });
    }
    Ok(segment)
}
