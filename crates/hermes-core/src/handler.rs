//! Handler and permission capabilities.
//!
//! Endpoints store implementations of [`Handler`] and [`PermissionCheck`]
//! behind `Arc<dyn ...>`. Both return a [`BoxFuture`] so that sync closures
//! and async functions share one object-safe interface.
//!
//! ```rust
//! use hermes_core::{handler_fn, Request, Reply};
//! use serde_json::json;
//!
//! let handler = handler_fn(|req: &Request| {
//!     Ok(Reply::from(json!({ "route": req.route() })))
//! });
//! ```

use crate::failure::Failure;
use crate::request::Request;
use crate::response::Response;
use serde_json::Value;
use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// A boxed future that is `Send`.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produced on success.
#[derive(Debug, Clone)]
pub enum Reply {
    /// A fully formed response.
    Response(Response),
    /// Bare data, normalized into a `200 OK` response.
    Data(Value),
}

impl Reply {
    /// Normalizes into a response.
    #[must_use]
    pub fn into_response(self) -> Response {
        match self {
            Self::Response(response) => response,
            Self::Data(data) => Response::new(data),
        }
    }
}

impl From<Response> for Reply {
    fn from(response: Response) -> Self {
        Self::Response(response)
    }
}

impl From<Value> for Reply {
    fn from(data: Value) -> Self {
        Self::Data(data)
    }
}

/// Result of invoking a handler.
pub type HandlerResult = Result<Reply, Failure>;

/// The callback attached to an endpoint.
pub trait Handler: Send + Sync + 'static {
    /// Handles the request.
    fn invoke<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, HandlerResult>;
}

/// A permission check attached to an endpoint.
///
/// `Ok(false)` becomes a generic `rest_forbidden`; `Err` propagates as-is.
pub trait PermissionCheck: Send + Sync + 'static {
    /// Decides whether the request may proceed.
    fn allowed<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<bool, Failure>>;
}

/// Handler wrapping a synchronous closure.
pub struct FnHandler<F> {
    f: F,
}

impl<F> Handler for FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
{
    fn invoke<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, HandlerResult> {
        Box::pin(std::future::ready((self.f)(request)))
    }
}

impl<F> fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnHandler").finish_non_exhaustive()
    }
}

/// Wraps a synchronous closure as a [`Handler`].
pub fn handler_fn<F>(f: F) -> FnHandler<F>
where
    F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
{
    FnHandler { f }
}

/// Handler wrapping an async function that takes an owned request.
pub struct AsyncFnHandler<F> {
    f: F,
}

impl<F, Fut> Handler for AsyncFnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn invoke<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, HandlerResult> {
        Box::pin((self.f)(request.clone()))
    }
}

impl<F> fmt::Debug for AsyncFnHandler<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnHandler").finish_non_exhaustive()
    }
}

/// Wraps an async function as a [`Handler`].
///
/// The function receives a clone of the request.
pub fn async_handler_fn<F, Fut>(f: F) -> AsyncFnHandler<F>
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    AsyncFnHandler { f }
}

/// Permission check wrapping a synchronous closure.
pub struct FnPermission<F> {
    f: F,
}

impl<F> PermissionCheck for FnPermission<F>
where
    F: Fn(&Request) -> Result<bool, Failure> + Send + Sync + 'static,
{
    fn allowed<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<bool, Failure>> {
        Box::pin(std::future::ready((self.f)(request)))
    }
}

impl<F> fmt::Debug for FnPermission<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnPermission").finish_non_exhaustive()
    }
}

/// Wraps a synchronous closure as a [`PermissionCheck`].
pub fn permission_fn<F>(f: F) -> FnPermission<F>
where
    F: Fn(&Request) -> Result<bool, Failure> + Send + Sync + 'static,
{
    FnPermission { f }
}

/// Allows callers holding a role.
#[derive(Debug, Clone)]
pub struct RequireRole(pub String);

impl RequireRole {
    /// Creates the check.
    #[must_use]
    pub fn new(role: impl Into<String>) -> Self {
        Self(role.into())
    }
}

impl PermissionCheck for RequireRole {
    fn allowed<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<bool, Failure>> {
        Box::pin(std::future::ready(Ok(request.identity().has_role(&self.0))))
    }
}

/// Allows any authenticated caller.
#[derive(Debug, Clone, Copy, Default)]
pub struct Authenticated;

impl PermissionCheck for Authenticated {
    fn allowed<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, Result<bool, Failure>> {
        Box::pin(std::future::ready(Ok(request.identity().is_authenticated())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use http::Method;
    use serde_json::json;

    #[tokio::test]
    async fn test_sync_handler() {
        let handler = handler_fn(|req: &Request| Ok(json!({ "route": req.route() }).into()));
        let request = Request::new(Method::GET, "/hello");

        let reply = handler.invoke(&request).await.unwrap();
        assert_eq!(reply.into_response().data(), &json!({ "route": "/hello" }));
    }

    #[tokio::test]
    async fn test_async_handler() {
        let handler = async_handler_fn(|req: Request| async move {
            tokio::task::yield_now().await;
            Ok(Reply::Data(json!(req.method().as_str())))
        });
        let request = Request::new(Method::DELETE, "/x");

        let reply = handler.invoke(&request).await.unwrap();
        assert_eq!(reply.into_response().data(), &json!("DELETE"));
    }

    #[tokio::test]
    async fn test_require_role() {
        let check = RequireRole::new("editor");
        let anonymous = Request::new(Method::GET, "/");
        let editor = Request::new(Method::GET, "/").with_identity(Identity::user("1", ["editor"]));

        assert!(!check.allowed(&anonymous).await.unwrap());
        assert!(check.allowed(&editor).await.unwrap());
    }

    #[tokio::test]
    async fn test_authenticated() {
        let anonymous = Request::new(Method::GET, "/");
        let key = Request::new(Method::GET, "/").with_identity(Identity::api_key("k", ["read"]));

        assert!(!Authenticated.allowed(&anonymous).await.unwrap());
        assert!(Authenticated.allowed(&key).await.unwrap());
    }

    #[test]
    fn test_reply_data_normalizes_to_ok() {
        let response = Reply::Data(json!([1, 2])).into_response();
        assert_eq!(response.status(), http::StatusCode::OK);
    }
}
