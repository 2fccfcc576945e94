//! Ordered regex route table for Hermes.
//!
//! Routes are keyed by their full, namespace-qualified pattern and kept in
//! registration order. Matching walks that order and returns the first
//! endpoint whose pattern matches the whole path and whose method set
//! includes the request method, so registration order is precedence.
//!
//! # Example
//!
//! ```rust
//! use hermes_core::{handler_fn, Endpoint, Request};
//! use hermes_router::RouteTable;
//! use http::Method;
//! use serde_json::json;
//!
//! let mut table = RouteTable::new();
//! table
//!     .register(
//!         "wp/v2",
//!         "/posts/(?P<id>[\\d]+)",
//!         Endpoint::new("GET").handler(handler_fn(|_req: &Request| Ok(json!({}).into()))),
//!         false,
//!     )
//!     .unwrap();
//!
//! let matched = table.match_request(&Method::GET, "/wp/v2/posts/42").unwrap();
//! assert_eq!(matched.route, "/wp/v2/posts/(?P<id>[\\d]+)");
//! assert_eq!(matched.params.get("id"), Some("42"));
//! ```
//!
//! # Layout
//!
//! ```text
//! RouteTable
//!  ├── "/wp/v2"                  -> [GET index]              options{namespace}
//!  ├── "/wp/v2/posts"            -> [GET list, POST create]  options{namespace, schema}
//!  └── "/wp/v2/posts/(?P<id>..)" -> [GET, EDITABLE, DELETE]  options{namespace, schema}
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod matcher;
mod params;
mod pattern;
mod table;

pub use error::{RouteError, RouteResult};
pub use matcher::{MatchPolicy, RouteMatch};
pub use params::PathParams;
pub use pattern::RoutePattern;
pub use table::{IndexFactory, Route, RouteOptions, RouteRegistration, RouteTable, SchemaProvider};
