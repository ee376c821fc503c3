//! Transport layer: how wire requests reach a dispatcher.
//!
//! The binding engine only ever talks to a [`Transport`]; sockets, TLS and
//! pooling live behind it:
//! - **Loopback**: [`crate::Dispatcher`] itself, in process
//! - **HTTP client**: hyper-based client (`client` feature)
//! - **Axum**: mount a dispatcher on an Axum router (`axum` feature)

use crate::error::TransportError;
use crate::types::{WireRequest, WireResponse};
use std::sync::Arc;

#[cfg(feature = "axum")]
pub mod axum;

#[cfg(feature = "client")]
pub mod http;

/// Sends one request and yields its response.
///
/// Failures are reported as they happen; nothing is retried.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError>;
}

#[async_trait::async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        (**self).send(request).await
    }
}

// Re-export Axum transport
#[cfg(feature = "axum")]
pub use self::axum::*;

// Re-export HTTP client transport
#[cfg(feature = "client")]
pub use self::http::{HttpTransport, HttpTransportBuilder};
