//! HTTP client transport built on hyper.

use super::Transport;
use crate::error::TransportError;
use crate::types::{Headers, WireRequest, WireResponse};
use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper_util::client::legacy::{Client, connect::HttpConnector};
use hyper_util::rt::TokioExecutor;
use std::time::Duration;

/// Builder for [`HttpTransport`]
pub struct HttpTransportBuilder {
    base_url: String,
    timeout: Duration,
    default_headers: Headers,
}

impl HttpTransportBuilder {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            default_headers: Headers::new(),
        }
    }

    /// Deadline for the whole exchange, body included
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Header sent with every request unless the request sets it itself
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name, value);
        self
    }

    pub fn build(self) -> Result<HttpTransport, TransportError> {
        let base = url::Url::parse(&self.base_url)
            .map_err(|e| TransportError::Connect(format!("invalid base url `{}`: {}", self.base_url, e)))?;
        if base.scheme() != "http" {
            return Err(TransportError::Connect(format!(
                "unsupported scheme `{}`",
                base.scheme()
            )));
        }

        Ok(HttpTransport {
            client: Client::builder(TokioExecutor::new()).build_http(),
            base: base.as_str().trim_end_matches('/').to_string(),
            timeout: self.timeout,
            default_headers: self.default_headers,
        })
    }
}

/// Sends wire requests to a remote dispatcher over plain HTTP/1.1
pub struct HttpTransport {
    client: Client<HttpConnector, Full<Bytes>>,
    /// Base URL without a trailing slash
    base: String,
    timeout: Duration,
    default_headers: Headers,
}

impl HttpTransport {
    pub fn builder(base_url: impl Into<String>) -> HttpTransportBuilder {
        HttpTransportBuilder::new(base_url)
    }

    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        Self::builder(base_url).build()
    }

    async fn exchange(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        let uri = format!("{}{}", self.base, request.target());
        let mut builder = hyper::Request::builder()
            .method(request.verb.as_str())
            .uri(&uri);
        for (name, value) in self.default_headers.iter() {
            if !request.headers.contains(name) {
                builder = builder.header(name, value);
            }
        }
        for (name, value) in request.headers.iter() {
            builder = builder.header(name, value);
        }
        let http_request = builder
            .body(Full::new(Bytes::from(request.body)))
            .map_err(|e| TransportError::Io(e.to_string()))?;

        tracing::trace!(uri = %uri, "sending http request");
        let response = self.client.request(http_request).await.map_err(|e| {
            if e.is_connect() {
                TransportError::Connect(e.to_string())
            } else {
                TransportError::Io(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect::<Headers>();
        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| TransportError::Io(e.to_string()))?
            .to_bytes();

        Ok(WireResponse {
            status,
            headers,
            body: body.to_vec(),
        })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send(&self, request: WireRequest) -> Result<WireResponse, TransportError> {
        tokio::time::timeout(self.timeout, self.exchange(request))
            .await
            .map_err(|_| TransportError::Timeout)?
    }
}
