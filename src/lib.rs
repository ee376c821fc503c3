//! # restbind
//!
//! Declarative binding of typed service interfaces onto HTTP routes.
//!
//! One [`InterfaceDescriptor`] drives both sides of the wire: the server
//! mounts it as a [`RouteTable`] behind a [`Dispatcher`], and clients call
//! it through a [`Proxy`] built from the very same table.
//!
//! ## Features
//!
//! - **Naming conventions** - `getProfile` becomes `GET /profile`, `putName` becomes `PUT /name`
//! - **Parameter binding** - path captures, query, headers, body fields or the whole body
//! - **Route table** - literal-first path matching with per-verb endpoints
//! - **Hook chain** - pre-call hooks inject parameters, post-call hooks transform results
//! - **Nested interfaces** - accessors mount sub-interfaces under their own segment
//! - **Transports** - in-process loopback, HTTP via Axum, hyper client, and Tower service
//! - **Auto-documentation** - OpenAPI specs from the route table
//!
//! ## Quick Start
//!
//! ```rust
//! use restbind::*;
//! use std::sync::Arc;
//!
//! let descriptor = InterfaceDescriptor::builder("Counter")
//!     .method(MethodBuilder::new("getCount").returns(Shape::Integer))
//!     .build();
//! let table = Arc::new(RouteTable::build(&descriptor, &BindingConfig::default()).unwrap());
//!
//! let dispatcher = Dispatcher::builder(table)
//!     .registry(MethodRegistry::empty().register_fn("getCount", |_args| Ok(Value::from(3))))
//!     .build()
//!     .unwrap();
//! assert_eq!(dispatcher.table().len(), 1);
//! ```

// Core module declarations
pub mod binder;
pub mod builders;
pub mod config;
pub mod convention;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod hooks;
pub mod macros;
pub mod marshal;
pub mod openapi;
pub mod proxy;
pub mod registry;
pub mod route;
pub mod table;
pub mod transports;
pub mod types;

#[cfg(feature = "tower")]
pub mod service;

// Re-export async_trait for users implementing traits
pub use async_trait::async_trait;

// Re-export all core types
pub use types::*;

pub use builders::*;
pub use config::{BindingConfig, ServerConfig};
pub use convention::NamingStyle;
pub use descriptor::*;
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::*;
pub use hooks::{HookRegistry, PostHook, PreHook, RequestContext};
pub use marshal::{JsonMarshaller, Marshaller};
pub use openapi::{OpenApiServer, OpenApiSpec};
pub use proxy::{CallArgs, CallOutcome, Proxy};
pub use registry::*;
pub use route::{Binding, Location, PathPattern, Route};
pub use table::{RouteMatch, RouteSummary, RouteTable};
pub use transports::Transport;

#[cfg(feature = "client")]
pub use transports::{HttpTransport, HttpTransportBuilder};

#[cfg(feature = "axum")]
pub use transports::axum;

#[cfg(feature = "tower")]
pub use service::RestService;

// Re-export tower when feature is enabled
#[cfg(feature = "tower")]
pub use tower;
