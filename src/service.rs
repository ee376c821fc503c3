//! Tower service over a dispatcher
//!
//! Lets a dispatcher sit behind tower middleware (timeouts, concurrency
//! limits, tracing layers) with [`WireRequest`] in and [`WireResponse`] out.

use crate::dispatcher::Dispatcher;
use crate::types::{WireRequest, WireResponse};
use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::Service;

/// Tower service dispatching wire requests; failures are responses, never errors
#[derive(Clone)]
pub struct RestService {
    dispatcher: Arc<Dispatcher>,
}

impl RestService {
    pub fn new(dispatcher: impl Into<Arc<Dispatcher>>) -> Self {
        Self {
            dispatcher: dispatcher.into(),
        }
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }
}

impl Service<WireRequest> for RestService {
    type Response = WireResponse;
    type Error = Infallible;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: WireRequest) -> Self::Future {
        let dispatcher = self.dispatcher.clone();
        Box::pin(async move { Ok(dispatcher.dispatch(request).await) })
    }
}
