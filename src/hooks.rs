//! Pre-call and post-call hooks.
//!
//! Pre-call hooks run after BIND and before the handler; each one produces
//! the value of the parameter it injects. Post-call hooks compose left to
//! right over the handler's return value and may touch response headers.
//!
//! ```rust
//! use restbind::{HookError, HookRegistry, Value};
//!
//! let hooks = HookRegistry::new()
//!     .pre_fn("auth", |ctx| match ctx.headers.get("authorization") {
//!         Some(token) => Ok(Value::String(token.trim_start_matches("Bearer ").to_string())),
//!         None => Err(HookError::new("missing credentials").with_status(401)),
//!     })
//!     .post_fn("trim", |value, _ctx, _headers| match value {
//!         Value::String(s) => Ok(Value::String(s.trim().to_string())),
//!         other => Ok(other),
//!     });
//!
//! assert!(hooks.has_pre("auth"));
//! assert!(hooks.has_post("trim"));
//! ```

use crate::error::{BuildError, DispatchError, HookError};
use crate::route::Route;
use crate::types::{Headers, Value, Verb};
use std::collections::HashMap;
use std::sync::Arc;

/// Request data visible to hooks
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub verb: Verb,
    /// Encoded request path
    pub path: String,
    /// Query string as received, without `?`
    pub query: String,
    pub headers: Headers,
    pub correlation_id: String,
    /// Qualified name of the matched route
    pub route: String,
}

/// Runs before the handler and produces the value of one parameter
#[async_trait::async_trait]
pub trait PreHook: Send + Sync {
    async fn run(&self, ctx: &RequestContext) -> Result<Value, HookError>;
}

/// Runs after the handler and transforms its return value
#[async_trait::async_trait]
pub trait PostHook: Send + Sync {
    async fn run(
        &self,
        output: Value,
        ctx: &RequestContext,
        headers: &mut Headers,
    ) -> Result<Value, HookError>;
}

/// Pre-call hook backed by a synchronous closure
pub struct FnPreHook<F>(pub F);

#[async_trait::async_trait]
impl<F> PreHook for FnPreHook<F>
where
    F: Fn(&RequestContext) -> Result<Value, HookError> + Send + Sync,
{
    async fn run(&self, ctx: &RequestContext) -> Result<Value, HookError> {
        (self.0)(ctx)
    }
}

/// Post-call hook backed by a synchronous closure
pub struct FnPostHook<F>(pub F);

#[async_trait::async_trait]
impl<F> PostHook for FnPostHook<F>
where
    F: Fn(Value, &RequestContext, &mut Headers) -> Result<Value, HookError> + Send + Sync,
{
    async fn run(
        &self,
        output: Value,
        ctx: &RequestContext,
        headers: &mut Headers,
    ) -> Result<Value, HookError> {
        (self.0)(output, ctx, headers)
    }
}

/// Hooks by registration name
#[derive(Default, Clone)]
pub struct HookRegistry {
    pre: HashMap<String, Arc<dyn PreHook>>,
    post: HashMap<String, Arc<dyn PostHook>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-call hook
    pub fn pre<H: PreHook + 'static>(mut self, name: impl Into<String>, hook: H) -> Self {
        self.pre.insert(name.into(), Arc::new(hook));
        self
    }

    /// Register a post-call hook
    pub fn post<H: PostHook + 'static>(mut self, name: impl Into<String>, hook: H) -> Self {
        self.post.insert(name.into(), Arc::new(hook));
        self
    }

    /// Register a closure as a pre-call hook
    pub fn pre_fn<F>(self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&RequestContext) -> Result<Value, HookError> + Send + Sync + 'static,
    {
        self.pre(name, FnPreHook(hook))
    }

    /// Register a closure as a post-call hook
    pub fn post_fn<F>(self, name: impl Into<String>, hook: F) -> Self
    where
        F: Fn(Value, &RequestContext, &mut Headers) -> Result<Value, HookError>
            + Send
            + Sync
            + 'static,
    {
        self.post(name, FnPostHook(hook))
    }

    pub fn has_pre(&self, name: &str) -> bool {
        self.pre.contains_key(name)
    }

    pub fn has_post(&self, name: &str) -> bool {
        self.post.contains_key(name)
    }
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookRegistry")
            .field("pre", &self.pre.keys().collect::<Vec<_>>())
            .field("post", &self.post.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Hooks of one route, resolved against a registry
#[derive(Clone, Default)]
pub struct HookChain {
    /// (hook name, injected parameter, hook)
    pre: Vec<(String, String, Arc<dyn PreHook>)>,
    post: Vec<(String, Arc<dyn PostHook>)>,
}

impl HookChain {
    /// Resolve every hook `route` names; unknown names fail
    pub fn resolve(route: &Route, registry: &HookRegistry) -> Result<Self, BuildError> {
        let unknown = |hook: &str| BuildError::UnknownHook {
            route: route.qualified_name.clone(),
            hook: hook.to_string(),
        };

        let pre = route
            .pre_hooks
            .iter()
            .map(|spec| {
                registry
                    .pre
                    .get(&spec.hook)
                    .map(|hook| (spec.hook.clone(), spec.inject.clone(), hook.clone()))
                    .ok_or_else(|| unknown(&spec.hook))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let post = route
            .post_hooks
            .iter()
            .map(|name| {
                registry
                    .post
                    .get(name)
                    .map(|hook| (name.clone(), hook.clone()))
                    .ok_or_else(|| unknown(name))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { pre, post })
    }

    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }

    /// Run pre-call hooks in order; returns (parameter, value) injections
    pub async fn run_pre(&self, ctx: &RequestContext) -> Result<Vec<(String, Value)>, DispatchError> {
        let mut injected = Vec::with_capacity(self.pre.len());
        for (name, parameter, hook) in &self.pre {
            tracing::trace!(hook = %name, parameter = %parameter, "running pre-call hook");
            let value = hook.run(ctx).await.map_err(|source| DispatchError::PreHook {
                hook: name.clone(),
                source,
            })?;
            injected.push((parameter.clone(), value));
        }
        Ok(injected)
    }

    /// Fold post-call hooks over `output`
    pub async fn run_post(
        &self,
        mut output: Value,
        ctx: &RequestContext,
        headers: &mut Headers,
    ) -> Result<Value, DispatchError> {
        for (name, hook) in &self.post {
            tracing::trace!(hook = %name, "running post-call hook");
            output = hook
                .run(output, ctx, headers)
                .await
                .map_err(|source| DispatchError::PostHook {
                    hook: name.clone(),
                    source,
                })?;
        }
        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{InterfaceBuilder, MethodBuilder, ParameterBuilder};
    use crate::descriptor::Shape;
    use crate::table::RouteTable;
    use serde_json::json;

    fn ctx() -> RequestContext {
        RequestContext {
            verb: Verb::Get,
            path: "/svc/me".to_string(),
            query: String::new(),
            headers: [("Authorization", "Bearer alice")].into_iter().collect(),
            correlation_id: "c-1".to_string(),
            route: "getMe".to_string(),
        }
    }

    fn table() -> RouteTable {
        let descriptor = InterfaceBuilder::new("Svc")
            .method(
                MethodBuilder::new("getMe")
                    .param(ParameterBuilder::new("user", Shape::String))
                    .pre_hook("auth", "user")
                    .post_hook("upper")
                    .post_hook("suffix")
                    .returns(Shape::String),
            )
            .build();
        RouteTable::builder(&descriptor).root("svc").build().unwrap()
    }

    fn registry() -> HookRegistry {
        HookRegistry::new()
            .pre_fn("auth", |ctx| {
                ctx.headers
                    .get("authorization")
                    .map(|t| json!(t.trim_start_matches("Bearer ")))
                    .ok_or_else(|| HookError::new("no token").with_status(401))
            })
            .post_fn("upper", |v, _, _| Ok(json!(v.as_str().unwrap_or_default().to_uppercase())))
            .post_fn("suffix", |v, ctx, headers| {
                headers.insert("X-Route", ctx.route.clone());
                Ok(json!(format!("{}!", v.as_str().unwrap_or_default())))
            })
    }

    #[tokio::test]
    async fn test_pre_hooks_inject_values() {
        let table = table();
        let chain = HookChain::resolve(table.route("getMe").unwrap(), &registry()).unwrap();
        let injected = chain.run_pre(&ctx()).await.unwrap();
        assert_eq!(injected, vec![("user".to_string(), json!("alice"))]);
    }

    #[tokio::test]
    async fn test_pre_hook_failure_carries_status() {
        let table = table();
        let chain = HookChain::resolve(table.route("getMe").unwrap(), &registry()).unwrap();
        let mut anonymous = ctx();
        anonymous.headers = Headers::new();

        let error = chain.run_pre(&anonymous).await.unwrap_err();
        assert_eq!(error.status(), 401);
        assert!(matches!(error, DispatchError::PreHook { hook, .. } if hook == "auth"));
    }

    #[tokio::test]
    async fn test_post_hooks_compose_left_to_right() {
        let table = table();
        let chain = HookChain::resolve(table.route("getMe").unwrap(), &registry()).unwrap();
        let mut headers = Headers::new();
        let output = chain.run_post(json!("hi"), &ctx(), &mut headers).await.unwrap();
        assert_eq!(output, json!("HI!"));
        assert_eq!(headers.get("x-route"), Some("getMe"));
    }

    #[tokio::test]
    async fn test_post_hook_failure_is_server_error() {
        let table = table();
        let registry = registry().post_fn("upper", |_, _, _| Err(HookError::new("boom")));
        let chain = HookChain::resolve(table.route("getMe").unwrap(), &registry).unwrap();
        let error = chain
            .run_post(json!("hi"), &ctx(), &mut Headers::new())
            .await
            .unwrap_err();
        assert_eq!(error.status(), 500);
    }

    #[test]
    fn test_unknown_hook_fails_resolution() {
        let table = table();
        let registry = HookRegistry::new().pre_fn("auth", |_| Ok(Value::Null));
        let error = HookChain::resolve(table.route("getMe").unwrap(), &registry)
            .err()
            .unwrap();
        assert_eq!(
            error,
            BuildError::UnknownHook {
                route: "getMe".to_string(),
                hook: "upper".to_string(),
            }
        );
    }
}
