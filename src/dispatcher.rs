//! Server-side dispatch.
//!
//! Every request moves through MATCH → BIND → PRE-HOOKS → INVOKE →
//! POST-HOOKS → SERIALIZE → RESPOND; any stage may end in an error response.
//! The dispatcher holds no mutable state, so requests are fully independent.

use crate::config::ServerConfig;
use crate::descriptor::{Direction, Shape};
use crate::error::{BindError, BuildError, DispatchError, MarshalError, TransportError};
use crate::hooks::{HookChain, HookRegistry, RequestContext};
use crate::marshal::{JsonMarshaller, Marshaller, conform, decode_text, encode_text};
use crate::registry::{Arguments, MethodRegistry, ServiceMethod};
use crate::route::{Binding, Location, Route};
use crate::table::{RouteMatch, RouteTable};
use crate::transports::Transport;
use crate::types::{Headers, Value, WireRequest, WireResponse, header_names, status_codes};
use std::sync::Arc;

struct Endpoint {
    method: Arc<dyn ServiceMethod>,
    hooks: HookChain,
}

/// Builder for [`Dispatcher`]
pub struct DispatcherBuilder {
    table: Arc<RouteTable>,
    registry: MethodRegistry,
    hooks: HookRegistry,
    marshaller: Arc<dyn Marshaller>,
    config: ServerConfig,
}

impl DispatcherBuilder {
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self {
            table,
            registry: MethodRegistry::empty(),
            hooks: HookRegistry::new(),
            marshaller: Arc::new(JsonMarshaller),
            config: ServerConfig::default(),
        }
    }

    /// Set the handler implementations
    pub fn registry(mut self, registry: MethodRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn hooks(mut self, hooks: HookRegistry) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn marshaller<M: Marshaller + 'static>(mut self, marshaller: M) -> Self {
        self.marshaller = Arc::new(marshaller);
        self
    }

    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Resolve a handler and the hooks of every route
    pub fn build(self) -> Result<Dispatcher, BuildError> {
        let endpoints = self
            .table
            .routes()
            .iter()
            .map(|route| {
                let method =
                    self.registry
                        .get(&route.qualified_name)
                        .ok_or_else(|| BuildError::MissingHandler {
                            method: route.qualified_name.clone(),
                        })?;
                let hooks = HookChain::resolve(route, &self.hooks)?;
                Ok(Endpoint { method, hooks })
            })
            .collect::<Result<Vec<_>, BuildError>>()?;

        tracing::debug!(
            interface = %self.table.interface(),
            route_count = endpoints.len(),
            "dispatcher ready"
        );
        Ok(Dispatcher {
            table: self.table,
            endpoints,
            marshaller: self.marshaller,
            config: self.config,
        })
    }
}

/// Matches requests against a route table and invokes handlers
pub struct Dispatcher {
    table: Arc<RouteTable>,
    /// Indexed by route id
    endpoints: Vec<Endpoint>,
    marshaller: Arc<dyn Marshaller>,
    config: ServerConfig,
}

impl Dispatcher {
    pub fn builder(table: Arc<RouteTable>) -> DispatcherBuilder {
        DispatcherBuilder::new(table)
    }

    pub fn table(&self) -> &Arc<RouteTable> {
        &self.table
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Handle one request; failures become error responses
    pub async fn dispatch(&self, request: WireRequest) -> WireResponse {
        let correlation_id = request
            .headers
            .get(&self.config.correlation_header)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

        tracing::debug!(
            verb = %request.verb,
            path = %request.path,
            correlation_id = %correlation_id,
            "dispatching request"
        );

        let mut outputs = Headers::new();
        let mut response = match self.process(&request, &correlation_id, &mut outputs).await {
            Ok(response) => response,
            Err(error) => self.error_response(&error, &correlation_id),
        };

        for (name, value) in outputs.iter() {
            response.headers.insert(name, value);
        }
        response
            .headers
            .insert(self.config.correlation_header.clone(), correlation_id);
        response
    }

    async fn process(
        &self,
        request: &WireRequest,
        correlation_id: &str,
        outputs: &mut Headers,
    ) -> Result<WireResponse, DispatchError> {
        if self.config.exceeds_limit(request.body.len()) {
            return Err(DispatchError::PayloadTooLarge {
                size: request.body.len(),
                limit: self.config.max_body_size,
            });
        }

        let matched = self
            .table
            .lookup(request.verb, &request.path)
            .ok_or_else(|| DispatchError::NotFound {
                verb: request.verb,
                path: request.path.clone(),
            })?;
        let route = matched.route;
        let endpoint = &self.endpoints[route.id];

        let mut args = self.bind(&matched, request)?;

        let ctx = RequestContext {
            verb: request.verb,
            path: request.path.clone(),
            query: request
                .raw_query
                .clone()
                .unwrap_or_else(|| request.encoded_query()),
            headers: request.headers.clone(),
            correlation_id: correlation_id.to_string(),
            route: route.qualified_name.clone(),
        };
        let result = self.invoke(route, endpoint, &mut args, &ctx, outputs).await;

        // Header outputs reflect the handler's writes even when a later stage failed
        let written = self.write_outputs(route, &args, outputs);
        let response = result?;
        written?;
        Ok(response)
    }

    async fn invoke(
        &self,
        route: &Route,
        endpoint: &Endpoint,
        args: &mut Arguments,
        ctx: &RequestContext,
        outputs: &mut Headers,
    ) -> Result<WireResponse, DispatchError> {
        for (parameter, value) in endpoint.hooks.run_pre(ctx).await? {
            args.set(parameter, value);
        }

        tracing::debug!(method = %route.qualified_name, "calling method");
        let value = endpoint.method.call(args).await?;
        let value = endpoint.hooks.run_post(value, ctx, outputs).await?;

        if matches!(route.returns(), Shape::Void) {
            return Ok(WireResponse::new(status_codes::NO_CONTENT));
        }
        let body = self
            .marshaller
            .encode(&value, route.returns())
            .map_err(DispatchError::Encode)?;
        Ok(WireResponse::new(status_codes::OK)
            .with_header(header_names::CONTENT_TYPE, self.marshaller.content_type())
            .with_body(body))
    }

    /// Extract every parameter, in declaration order
    fn bind(&self, matched: &RouteMatch<'_>, request: &WireRequest) -> Result<Arguments, BindError> {
        let route = matched.route;
        let mut args = Arguments::new();
        let mut fields: Option<serde_json::Map<String, Value>> = None;

        for parameter in &route.method.parameters {
            let Some(binding) = route.binding(&parameter.name) else {
                // filled by a pre-call hook
                args.set(parameter.name.clone(), Value::Null);
                continue;
            };
            if binding.direction == Direction::Out {
                args.set(parameter.name.clone(), Value::Null);
                continue;
            }

            let text = |raw: Option<&str>| {
                raw.map(|raw| decode_text(self.marshaller.as_ref(), raw, &binding.shape))
                    .transpose()
            };
            let found = match &binding.location {
                Location::Path { capture } if matched.malformed.contains(capture) => {
                    Err(not_utf8("path capture", capture))
                }
                Location::Path { capture } => {
                    text(matched.captures.get(capture).map(String::as_str))
                }
                Location::Query { key } if request.query_is_malformed(key) => {
                    Err(not_utf8("query value", key))
                }
                Location::Query { key } => text(request.query_value(key)),
                Location::Header { name } => text(request.headers.get(name)),
                Location::BodyField { key } => {
                    if fields.is_none() {
                        fields = Some(self.body_fields(&request.body)?);
                    }
                    // null counts as absent, except where the shape admits it
                    let value = fields
                        .as_ref()
                        .and_then(|f| f.get(key))
                        .filter(|v| !v.is_null() || binding.shape.admits_null())
                        .cloned();
                    match value {
                        Some(value) => conform(&value, &binding.shape, &format!("/{}", key))
                            .map(|_| Some(value)),
                        None => Ok(None),
                    }
                }
                Location::WholeBody if request.body.is_empty() => Ok(None),
                Location::WholeBody => self
                    .marshaller
                    .decode(&request.body, &binding.shape)
                    .map(Some),
            }
            .map_err(|source| BindError::Decode {
                parameter: parameter.name.clone(),
                source,
            })?;

            let value = match found {
                Some(value) => value,
                None => missing(binding)?,
            };
            args.set(parameter.name.clone(), value);
        }
        Ok(args)
    }

    fn body_fields(&self, body: &[u8]) -> Result<serde_json::Map<String, Value>, BindError> {
        if body.is_empty() {
            return Ok(serde_json::Map::new());
        }
        match self.marshaller.decode(body, &Shape::Any) {
            Ok(Value::Object(fields)) => Ok(fields),
            Ok(other) => Err(BindError::MalformedBody(MarshalError::ShapeMismatch {
                path: "/".to_string(),
                expected: "object".to_string(),
                found: if other.is_array() { "list" } else { "scalar" }.to_string(),
            })),
            Err(error) => Err(BindError::MalformedBody(error)),
        }
    }

    fn write_outputs(
        &self,
        route: &Route,
        args: &Arguments,
        outputs: &mut Headers,
    ) -> Result<(), DispatchError> {
        for binding in route.returned_parameters() {
            let Location::Header { name } = &binding.location else {
                continue;
            };
            match args.get(&binding.parameter) {
                None | Some(Value::Null) => {}
                Some(value) => {
                    let text = encode_text(self.marshaller.as_ref(), value, &binding.shape)
                        .map_err(DispatchError::Encode)?;
                    if !is_header_text(&text) {
                        return Err(DispatchError::Encode(MarshalError::Encode(format!(
                            "value of output header `{}` is not visible ASCII",
                            name
                        ))));
                    }
                    outputs.insert(name.clone(), text);
                }
            }
        }
        Ok(())
    }

    fn error_response(&self, error: &DispatchError, correlation_id: &str) -> WireResponse {
        let status = error.status();
        if error.is_client_error() {
            tracing::warn!(status, correlation_id = %correlation_id, error = %error, "request rejected");
        } else {
            tracing::error!(status, correlation_id = %correlation_id, error = %error, "request failed");
        }

        let body = error.to_body(self.config.expose_internal_errors);
        WireResponse::new(status)
            .with_header(header_names::CONTENT_TYPE, "application/json")
            .with_body(serde_json::to_vec(&body).unwrap_or_default())
    }
}

fn not_utf8(what: &str, name: &str) -> MarshalError {
    MarshalError::Syntax(format!("{} `{}` is not valid UTF-8", what, name))
}

/// Visible ASCII, spaces and tabs: what every transport can carry in a header
fn is_header_text(text: &str) -> bool {
    text.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b))
}

fn missing(binding: &Binding) -> Result<Value, BindError> {
    binding.fallback().ok_or_else(|| BindError::Missing {
        parameter: binding.parameter.clone(),
        location: binding.location.to_string(),
    })
}

/// In-process loopback: the proxy talks to the dispatcher without a network
#[async_trait::async_trait]
impl Transport for Dispatcher {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        Ok(self.dispatch(request).await)
    }
}
