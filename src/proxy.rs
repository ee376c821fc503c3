//! Client-side proxy.
//!
//! A [`Proxy`] reads the same [`RouteTable`] the dispatcher serves, so every
//! call produces exactly the request the server expects: same verb, same
//! rendered path, same parameter locations.
//!
//! ```rust
//! use restbind::*;
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let descriptor = InterfaceDescriptor::builder("Greeter")
//!     .method(
//!         MethodBuilder::new("getGreeting")
//!             .param(ParameterBuilder::new("name", Shape::String))
//!             .returns(Shape::String),
//!     )
//!     .build();
//! let table = Arc::new(RouteTable::build(&descriptor, &BindingConfig::default()).unwrap());
//!
//! let dispatcher = Dispatcher::builder(table.clone())
//!     .registry(MethodRegistry::empty().register_fn("getGreeting", |args| {
//!         Ok(Value::String(format!("hello {}", args.get_as::<String>("name")?)))
//!     }))
//!     .build()
//!     .unwrap();
//!
//! let proxy = Proxy::new(table, Arc::new(dispatcher));
//! let outcome = proxy.call("getGreeting", call_args! { "name" => "bob" }).await.unwrap();
//! assert_eq!(outcome.value, Value::String("hello bob".into()));
//! # }
//! ```

use crate::descriptor::Shape;
use crate::error::{CallError, MarshalError};
use crate::marshal::{JsonMarshaller, Marshaller, conform, decode_text, encode_text};
use crate::route::{Location, Route};
use crate::table::RouteTable;
use crate::transports::Transport;
use crate::types::{ErrorBody, Headers, Value, Verb, WireRequest, WireResponse, header_names};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::Arc;

/// Named call arguments; order does not matter
#[derive(Debug, Clone, Default)]
pub struct CallArgs {
    values: Vec<(String, Value)>,
    headers: Headers,
    invalid: Option<(String, String)>,
}

impl CallArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an argument; anything serializable is accepted
    pub fn arg(mut self, name: impl Into<String>, value: impl Serialize) -> Self {
        let name = name.into();
        match serde_json::to_value(value) {
            Ok(value) => self.values.push((name, value)),
            Err(error) => {
                self.invalid.get_or_insert((name, error.to_string()));
            }
        }
        self
    }

    /// Add an already structured argument
    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.push((name.into(), value));
        self
    }

    /// Extra request header outside the method signature, e.g. credentials
    /// read by a pre-call hook
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }
}

/// Result of a successful call
#[derive(Debug, Clone, PartialEq)]
pub struct CallOutcome {
    pub status: u16,
    /// Decoded return value; null for methods returning nothing
    pub value: Value,
    /// Output-only and bidirectional header values sent back by the server
    pub outputs: HashMap<String, Value>,
}

impl CallOutcome {
    pub fn value_as<T: DeserializeOwned>(&self) -> Result<T, CallError> {
        serde_json::from_value(self.value.clone())
            .map_err(|e| CallError::Decode(MarshalError::Syntax(e.to_string())))
    }

    pub fn output(&self, parameter: &str) -> Option<&Value> {
        self.outputs.get(parameter)
    }

    pub fn output_as<T: DeserializeOwned>(&self, parameter: &str) -> Option<T> {
        self.output(parameter)
            .and_then(|value| serde_json::from_value(value.clone()).ok())
    }
}

/// Client for one interface of a route table
#[derive(Clone)]
pub struct Proxy {
    table: Arc<RouteTable>,
    transport: Arc<dyn Transport>,
    marshaller: Arc<dyn Marshaller>,
    /// Accessor chain, each name followed by `.`
    prefix: String,
    headers: Headers,
}

impl Proxy {
    pub fn new(table: Arc<RouteTable>, transport: Arc<dyn Transport>) -> Self {
        Self {
            table,
            transport,
            marshaller: Arc::new(JsonMarshaller),
            prefix: String::new(),
            headers: Headers::new(),
        }
    }

    pub fn with_marshaller<M: Marshaller + 'static>(mut self, marshaller: M) -> Self {
        self.marshaller = Arc::new(marshaller);
        self
    }

    /// Header sent with every call of this proxy and its nested proxies
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Proxy scoped onto the interface behind a nested accessor
    pub fn nested(&self, accessor: &str) -> Result<Proxy, CallError> {
        let prefix = format!("{}{}", self.prefix, accessor);
        if !self.table.has_prefix(&prefix) {
            return Err(CallError::UnknownInterface(prefix));
        }
        Ok(Proxy {
            prefix: format!("{}.", prefix),
            ..self.clone()
        })
    }

    /// Route a method of this interface resolves to
    pub fn route(&self, method: &str) -> Option<&Route> {
        self.table.route(&format!("{}{}", self.prefix, method))
    }

    /// Call `method` and decode its result
    pub async fn call(&self, method: &str, args: CallArgs) -> Result<CallOutcome, CallError> {
        let route = self
            .route(method)
            .ok_or_else(|| CallError::UnknownMethod(format!("{}{}", self.prefix, method)))?;
        let request = self.encode_request(route, &args)?;

        tracing::debug!(
            method = %route.qualified_name,
            verb = %request.verb,
            path = %request.path,
            "sending call"
        );
        let response = self.transport.send(request).await?;
        self.decode_response(route, response)
    }

    /// Build the wire request for a call without sending it
    pub fn request(&self, method: &str, args: &CallArgs) -> Result<WireRequest, CallError> {
        let route = self
            .route(method)
            .ok_or_else(|| CallError::UnknownMethod(format!("{}{}", self.prefix, method)))?;
        self.encode_request(route, args)
    }

    fn encode_request(&self, route: &Route, args: &CallArgs) -> Result<WireRequest, CallError> {
        if let Some((parameter, message)) = &args.invalid {
            return Err(CallError::Encode {
                parameter: parameter.clone(),
                source: MarshalError::Encode(message.clone()),
            });
        }
        for (name, _) in &args.values {
            let accepted = route
                .binding(name)
                .is_some_and(|binding| binding.direction.is_sent());
            if !accepted {
                return Err(CallError::UnexpectedArgument {
                    method: route.qualified_name.clone(),
                    parameter: name.clone(),
                });
            }
        }

        let marshaller = self.marshaller.as_ref();
        let mut captures = HashMap::new();
        let mut query = Vec::new();
        let mut headers = self.headers.clone();
        let mut fields = serde_json::Map::new();
        let mut body = None;

        for binding in route.visible_parameters() {
            let value = match args.get(&binding.parameter) {
                Some(value) if !value.is_null() || binding.shape.admits_null() => value,
                _ => {
                    let capture = matches!(binding.location, Location::Path { .. });
                    if binding.is_required() || capture {
                        return Err(CallError::MissingArgument {
                            method: route.qualified_name.clone(),
                            parameter: binding.parameter.clone(),
                        });
                    }
                    continue;
                }
            };
            let encode_error = |source| CallError::Encode {
                parameter: binding.parameter.clone(),
                source,
            };

            match &binding.location {
                Location::Path { capture } => {
                    let text = encode_text(marshaller, value, &binding.shape).map_err(encode_error)?;
                    // an empty segment would collapse out of the path
                    if text.is_empty() {
                        return Err(encode_error(MarshalError::Encode(format!(
                            "path capture `:{}` cannot be empty",
                            capture
                        ))));
                    }
                    captures.insert(capture.clone(), text);
                }
                Location::Query { key } => {
                    let text = encode_text(marshaller, value, &binding.shape).map_err(encode_error)?;
                    query.push((key.clone(), text));
                }
                Location::Header { name } => {
                    let text = encode_text(marshaller, value, &binding.shape).map_err(encode_error)?;
                    headers.insert(name.clone(), text);
                }
                Location::BodyField { key } => {
                    conform(value, &binding.shape, &format!("/{}", key)).map_err(encode_error)?;
                    fields.insert(key.clone(), value.clone());
                }
                Location::WholeBody => {
                    body = Some(marshaller.encode(value, &binding.shape).map_err(encode_error)?);
                }
            }
        }

        if !fields.is_empty() {
            body = Some(
                marshaller
                    .encode(&Value::Object(fields), &Shape::Any)
                    .map_err(|source| CallError::Encode {
                        parameter: "body".to_string(),
                        source,
                    })?,
            );
        }

        let path = route.pattern.render(&captures).ok_or_else(|| {
            let capture = route
                .pattern
                .captures()
                .find(|c| !captures.contains_key(*c))
                .unwrap_or_default();
            CallError::MissingArgument {
                method: route.qualified_name.clone(),
                parameter: format!("_{}", capture),
            }
        })?;

        for (name, value) in args.headers.iter() {
            headers.insert(name, value);
        }
        let mut request = WireRequest::new(route.verb, path);
        request.query = query;
        request.headers = headers;
        if let Some(body) = body {
            request
                .headers
                .insert(header_names::CONTENT_TYPE, marshaller.content_type());
            request.body = body;
        }
        Ok(request)
    }

    fn decode_response(&self, route: &Route, response: WireResponse) -> Result<CallOutcome, CallError> {
        if !response.is_success() {
            tracing::debug!(method = %route.qualified_name, status = response.status, "call failed");
            return Err(CallError::Status {
                status: response.status,
                body: serde_json::from_slice::<ErrorBody>(&response.body).ok(),
            });
        }

        let marshaller = self.marshaller.as_ref();
        let value = match route.returns() {
            Shape::Void => Value::Null,
            // HEAD responses never carry a body
            _ if route.verb == Verb::Head && response.body.is_empty() => Value::Null,
            Shape::Optional(_) if response.body.is_empty() => Value::Null,
            returns => marshaller
                .decode(&response.body, returns)
                .map_err(CallError::Decode)?,
        };

        let mut outputs = HashMap::new();
        for binding in route.returned_parameters() {
            let Location::Header { name } = &binding.location else {
                continue;
            };
            if let Some(text) = response.headers.get(name) {
                let value = decode_text(marshaller, text, &binding.shape).map_err(CallError::Decode)?;
                outputs.insert(binding.parameter.clone(), value);
            }
        }

        Ok(CallOutcome {
            status: response.status,
            value,
            outputs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builders::{InterfaceBuilder, MethodBuilder, ParameterBuilder};
    use crate::error::TransportError;
    use serde_json::json;
    use std::sync::Mutex;

    /// Records requests and answers with a canned response
    struct Recorder {
        seen: Mutex<Vec<WireRequest>>,
        reply: WireResponse,
    }

    #[async_trait::async_trait]
    impl Transport for Recorder {
        async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
            if let Ok(mut seen) = self.seen.lock() {
                seen.push(request);
            }
            Ok(self.reply.clone())
        }
    }

    struct Unreachable;

    #[async_trait::async_trait]
    impl Transport for Unreachable {
        async fn send(&self, _request: WireRequest) -> Result<WireResponse, TransportError> {
            Err(TransportError::Connect("connection refused".to_string()))
        }
    }

    fn table() -> Arc<RouteTable> {
        let descriptor = InterfaceBuilder::new("Svc")
            .method(
                MethodBuilder::new("getItem")
                    .path("items/:id")
                    .param(ParameterBuilder::new("_id", Shape::String))
                    .param(ParameterBuilder::new("filter", Shape::list(Shape::Integer)))
                    .param(ParameterBuilder::new("limit", Shape::optional(Shape::Integer)))
                    .param(
                        ParameterBuilder::new("etag", Shape::String)
                            .header("ETag")
                            .output(),
                    )
                    .returns(Shape::Any),
            )
            .method(
                MethodBuilder::new("postItem")
                    .param(ParameterBuilder::new("name", Shape::String))
                    .param(ParameterBuilder::new("user", Shape::String))
                    .pre_hook("auth", "user"),
            )
            .method(
                MethodBuilder::new("postDoc")
                    .param(ParameterBuilder::new("doc", Shape::Any))
                    .returns(Shape::optional(Shape::String)),
            )
            .nested(
                "admin",
                InterfaceBuilder::new("Admin").method(MethodBuilder::new("deleteAll")),
            )
            .build();
        Arc::new(RouteTable::builder(&descriptor).root("svc").build().unwrap())
    }

    fn recorder(reply: WireResponse) -> Arc<Recorder> {
        Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
            reply,
        })
    }

    #[test]
    fn test_request_encodes_every_location() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));
        let args = CallArgs::new()
            .arg("_id", "a/b")
            .arg("filter", vec![1, 2])
            .header("Authorization", "Bearer t");
        let request = proxy.request("getItem", &args).unwrap();

        assert_eq!(request.verb, Verb::Get);
        assert_eq!(request.path, "/svc/items/a%2Fb");
        assert_eq!(request.query, vec![("filter".to_string(), "[1,2]".to_string())]);
        assert_eq!(request.headers.get("authorization"), Some("Bearer t"));
        assert!(request.body.is_empty());
    }

    #[test]
    fn test_body_fields_are_collected() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));
        let request = proxy
            .request("postItem", &CallArgs::new().arg("name", "widget"))
            .unwrap();
        assert_eq!(request.verb, Verb::Post);
        assert_eq!(request.path, "/svc/item");
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body, json!({"name": "widget"}));
        assert_eq!(request.headers.get("content-type"), Some("application/json"));
    }

    #[test]
    fn test_client_side_argument_checks() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));

        let missing = proxy.request("getItem", &CallArgs::new().arg("_id", "1"));
        assert!(matches!(missing, Err(CallError::MissingArgument { parameter, .. }) if parameter == "filter"));

        let injected = proxy.request("postItem", &CallArgs::new().arg("name", "x").arg("user", "eve"));
        assert!(matches!(injected, Err(CallError::UnexpectedArgument { parameter, .. }) if parameter == "user"));

        let output = proxy.request(
            "getItem",
            &CallArgs::new().arg("_id", "1").arg("filter", [1]).arg("etag", "x"),
        );
        assert!(matches!(output, Err(CallError::UnexpectedArgument { parameter, .. }) if parameter == "etag"));

        let undeclared = proxy.request("postItem", &CallArgs::new().arg("name", "x").arg("color", "red"));
        assert!(matches!(undeclared, Err(CallError::UnexpectedArgument { .. })));

        assert!(matches!(
            proxy.request("getNothing", &CallArgs::new()),
            Err(CallError::UnknownMethod(name)) if name == "getNothing"
        ));
    }

    #[test]
    fn test_shape_checked_before_sending() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));
        let error = proxy
            .request("postItem", &CallArgs::new().arg("name", 5))
            .unwrap_err();
        assert!(matches!(error, CallError::Encode { parameter, .. } if parameter == "name"));
    }

    #[test]
    fn test_empty_capture_rejected_before_sending() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));
        let error = proxy
            .request("getItem", &CallArgs::new().arg("_id", "").arg("filter", [1]))
            .unwrap_err();
        assert!(matches!(
            error,
            CallError::Encode { parameter, source: MarshalError::Encode(_) } if parameter == "_id"
        ));
    }

    #[test]
    fn test_null_is_a_value_for_any() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));
        let request = proxy
            .request("postDoc", &CallArgs::new().value("doc", Value::Null))
            .unwrap();
        let body: Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(body, json!({"doc": null}));

        let missing = proxy.request("postDoc", &CallArgs::new());
        assert!(matches!(missing, Err(CallError::MissingArgument { parameter, .. }) if parameter == "doc"));
    }

    #[tokio::test]
    async fn test_empty_body_only_null_for_optional_returns() {
        let proxy = Proxy::new(table(), recorder(WireResponse::new(200)));
        let error = proxy
            .call("getItem", CallArgs::new().arg("_id", "1").arg("filter", [3]))
            .await
            .unwrap_err();
        assert!(matches!(error, CallError::Decode(MarshalError::Syntax(_))));

        let outcome = proxy
            .call("postDoc", CallArgs::new().arg("doc", 1))
            .await
            .unwrap();
        assert_eq!(outcome.value, Value::Null);
    }

    #[test]
    fn test_nested_proxy() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));
        let admin = proxy.nested("admin").unwrap();
        let request = admin.request("deleteAll", &CallArgs::new()).unwrap();
        assert_eq!((request.verb, request.path.as_str()), (Verb::Delete, "/svc/admin/all"));

        assert!(matches!(proxy.nested("missing"), Err(CallError::UnknownInterface(_))));
    }

    #[tokio::test]
    async fn test_outputs_and_value_decoded() {
        let transport = recorder(
            WireResponse::new(200)
                .with_header("etag", "v7")
                .with_body(r#"{"ok": true}"#),
        );
        let proxy = Proxy::new(table(), transport.clone());
        let outcome = proxy
            .call("getItem", CallArgs::new().arg("_id", "1").arg("filter", [3]))
            .await
            .unwrap();

        assert_eq!(outcome.value, json!({"ok": true}));
        assert_eq!(outcome.output("etag"), Some(&json!("v7")));
        assert_eq!(transport.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_error_status_surfaces_body() {
        let body = serde_json::to_vec(&ErrorBody::new("not_found", "gone")).unwrap();
        let proxy = Proxy::new(table(), recorder(WireResponse::new(404).with_body(body)));
        let error = proxy
            .call("getItem", CallArgs::new().arg("_id", "1").arg("filter", [3]))
            .await
            .unwrap_err();
        assert_eq!(error.status(), Some(404));
        assert_eq!(error.body().unwrap().message, "gone");
    }

    #[tokio::test]
    async fn test_transport_failure_is_not_retried() {
        let proxy = Proxy::new(table(), Arc::new(Unreachable));
        let error = proxy
            .call("getItem", CallArgs::new().arg("_id", "1").arg("filter", [3]))
            .await
            .unwrap_err();
        assert!(matches!(error, CallError::Transport(TransportError::Connect(_))));
    }

    #[tokio::test]
    async fn test_void_return_is_null() {
        let proxy = Proxy::new(table(), recorder(WireResponse::new(204)));
        let outcome = proxy
            .call("postItem", CallArgs::new().arg("name", "widget"))
            .await
            .unwrap();
        assert_eq!(outcome.status, 204);
        assert_eq!(outcome.value, Value::Null);
    }
}
