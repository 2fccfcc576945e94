//! # Hermes Core
//!
//! Core types shared by every layer of the Hermes REST dispatcher.
//!
//! - [`Failure`] - Structured, returnable error carrying one or more codes
//! - [`Request`] - Per-call request value with layered parameter sources
//! - [`Response`] - Handler output with status, headers and relation links
//! - [`Endpoint`] - A method-scoped handler descriptor attached to a route
//! - [`Handler`] / [`PermissionCheck`] - Capability traits stored on endpoints
//! - [`MethodSet`] - Bitmask of HTTP verbs an endpoint serves
//! - [`Identity`] - Caller identity resolved by the serving layer
//!
//! ## Parameter precedence
//!
//! ```text
//! path > json > body > query > defaults
//! ```
//!
//! A handler reading `request.param("id")` sees the first source that
//! defines `id`, in the order above.

#![doc(html_root_url = "https://docs.rs/hermes-core/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod args;
mod endpoint;
mod failure;
mod handler;
mod identity;
mod methods;
mod request;
mod response;

pub use args::{ArgSpec, Sanitizer, Validator};
pub use endpoint::Endpoint;
pub use failure::{codes, Failure, FailureRecord};
pub use handler::{
    async_handler_fn, handler_fn, permission_fn, AsyncFnHandler, Authenticated, BoxFuture,
    FnHandler, FnPermission, Handler, HandlerResult, PermissionCheck, Reply, RequireRole,
};
pub use identity::Identity;
pub use methods::MethodSet;
pub use request::{params_from_pairs, ParamMap, ParamSource, Request, RequestId};
pub use response::{Link, LinkMap, Response};
