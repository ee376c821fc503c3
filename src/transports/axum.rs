//! Axum HTTP transport for REST dispatchers.
//!
//! The dispatcher owns routing, so it is mounted as the router's fallback:
//! every request Axum does not route itself goes through the route table.

use crate::dispatcher::Dispatcher;
use crate::error::DispatchError;
use crate::types::{Verb, WireRequest, WireResponse, header_names, status_codes};
use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use std::sync::Arc;

pub struct AxumRestBuilder {
    dispatcher: Option<Arc<Dispatcher>>,
}

impl AxumRestBuilder {
    pub fn new() -> Self {
        Self { dispatcher: None }
    }

    pub fn dispatcher(mut self, dispatcher: impl Into<Arc<Dispatcher>>) -> Self {
        self.dispatcher = Some(dispatcher.into());
        self
    }

    pub fn build(self) -> Result<AxumRestLayer, std::io::Error> {
        let dispatcher = self.dispatcher.ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "Dispatcher not set")
        })?;

        Ok(AxumRestLayer { dispatcher })
    }
}

pub struct AxumRestLayer {
    dispatcher: Arc<Dispatcher>,
}

impl AxumRestLayer {
    pub fn builder() -> AxumRestBuilder {
        AxumRestBuilder::new()
    }

    pub fn into_router(self) -> Router {
        create_rest_router(self.dispatcher)
    }
}

pub fn create_rest_router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .fallback(handle_request)
        .with_state(dispatcher)
}

async fn handle_request(State(dispatcher): State<Arc<Dispatcher>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let Ok(verb) = parts.method.as_str().parse::<Verb>() else {
        tracing::warn!(method = %parts.method, "unsupported http method");
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    };

    let limit = dispatcher.config().max_body_size;
    let body = match axum::body::to_bytes(body, if limit == 0 { usize::MAX } else { limit }).await {
        Ok(bytes) => bytes,
        Err(error) => {
            tracing::warn!(error = %error, limit, "request body rejected");
            let body = DispatchError::PayloadTooLarge {
                size: limit.saturating_add(1),
                limit,
            }
            .to_body(false);
            return to_axum(
                WireResponse::new(status_codes::PAYLOAD_TOO_LARGE)
                    .with_header(header_names::CONTENT_TYPE, "application/json")
                    .with_body(serde_json::to_vec(&body).unwrap_or_default()),
            );
        }
    };

    let mut wire = WireRequest::new(verb, parts.uri.path()).with_body(body.to_vec());
    if let Some(query) = parts.uri.query() {
        wire.set_raw_query(query);
    }
    for (name, value) in parts.headers.iter() {
        if let Ok(value) = value.to_str() {
            wire.headers.append(name.as_str(), value);
        }
    }

    to_axum(dispatcher.dispatch(wire).await)
}

fn to_axum(wire: WireResponse) -> Response {
    let status = StatusCode::from_u16(wire.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Body::from(wire.body)).into_response();
    for (name, value) in wire.headers.iter() {
        match (HeaderName::from_bytes(name.as_bytes()), HeaderValue::from_str(value)) {
            (Ok(name), Ok(value)) => {
                response.headers_mut().append(name, value);
            }
            _ => tracing::warn!(header = %name, "dropping invalid response header"),
        }
    }
    response
}

impl Default for AxumRestBuilder {
    fn default() -> Self {
        Self::new()
    }
}
