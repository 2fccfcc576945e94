//! # Hermes Test
//!
//! In-memory testing for Hermes services. Requests go through the full
//! [`ApiService`](hermes_server::ApiService) pipeline (transport decoding,
//! authenticators, dispatch, shaping and encoding) without binding a port.
//!
//! ## Example
//!
//! ```rust
//! use hermes_core::{handler_fn, Endpoint, Request};
//! use hermes_dispatch::Dispatcher;
//! use hermes_test::TestClient;
//! use http::StatusCode;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let dispatcher = Dispatcher::new();
//! dispatcher
//!     .register(
//!         "demo/v1",
//!         "/ping",
//!         Endpoint::new("GET").handler(handler_fn(|_req: &Request| Ok(json!("pong").into()))),
//!         false,
//!     )
//!     .unwrap();
//!
//! let client = TestClient::from_dispatcher(dispatcher);
//! let response = client.get("/wp-json/demo/v1/ping").send().await;
//! response.assert_status(StatusCode::OK).assert_json_eq(&json!("pong"));
//! # });
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{TestClient, TestClientRequest};
pub use error::TestError;
pub use request::TestRequestBuilder;
pub use response::TestResponse;
