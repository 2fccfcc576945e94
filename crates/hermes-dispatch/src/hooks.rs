//! Dispatch hooks.
//!
//! Hooks are handed to the [`DispatcherBuilder`](crate::DispatcherBuilder)
//! as an ordered list and run at three fixed points:
//!
//! | Point | When | May |
//! |-------|------|-----|
//! | `pre_dispatch` | before matching | replace the whole result |
//! | `post_match` | after the permission check passes | replace the handler's result |
//! | `post_dispatch` | after normalization | rewrite the response |
//!
//! For the two override points the first hook returning
//! [`Flow::Replace`] wins and later hooks are not consulted.
//!
//! # Example
//!
//! ```ignore
//! use hermes_dispatch::{DispatchHook, Flow};
//!
//! struct Maintenance;
//!
//! impl DispatchHook for Maintenance {
//!     fn name(&self) -> &'static str {
//!         "maintenance"
//!     }
//!
//!     fn pre_dispatch<'a>(&'a self, _request: &'a Request) -> BoxFuture<'a, Flow> {
//!         Box::pin(async { Flow::Replace(Err(Failure::with_status("down", "Back soon", StatusCode::SERVICE_UNAVAILABLE))) })
//!     }
//! }
//! ```

use hermes_core::{BoxFuture, HandlerResult, Request, Response};
use hermes_router::RouteMatch;
use std::fmt;
use std::sync::Arc;

/// Outcome of an override hook.
#[derive(Debug)]
pub enum Flow {
    /// Keep dispatching normally.
    Continue,
    /// Use this result instead.
    Replace(HandlerResult),
}

/// An extension point run by the dispatcher.
///
/// Every method has a pass-through default, so a hook implements only the
/// points it cares about.
pub trait DispatchHook: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str {
        "hook"
    }

    /// Runs before the route table is consulted.
    fn pre_dispatch<'a>(&'a self, _request: &'a Request) -> BoxFuture<'a, Flow> {
        Box::pin(std::future::ready(Flow::Continue))
    }

    /// Runs once the request has passed validation and its permission check.
    fn post_match<'a>(&'a self, _request: &'a Request, _matched: &'a RouteMatch) -> BoxFuture<'a, Flow> {
        Box::pin(std::future::ready(Flow::Continue))
    }

    /// Filters the normalized response.
    fn post_dispatch<'a>(&'a self, response: Response, _request: &'a Request) -> BoxFuture<'a, Response> {
        Box::pin(std::future::ready(response))
    }
}

/// Hook that only filters responses, wrapping a closure.
pub struct ResponseFilter<F> {
    name: &'static str,
    f: F,
}

impl<F> DispatchHook for ResponseFilter<F>
where
    F: Fn(Response, &Request) -> Response + Send + Sync + 'static,
{
    fn name(&self) -> &'static str {
        self.name
    }

    fn post_dispatch<'a>(&'a self, response: Response, request: &'a Request) -> BoxFuture<'a, Response> {
        Box::pin(std::future::ready((self.f)(response, request)))
    }
}

impl<F> fmt::Debug for ResponseFilter<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseFilter")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Wraps a closure as a response-filtering hook.
pub fn response_filter<F>(name: &'static str, f: F) -> ResponseFilter<F>
where
    F: Fn(Response, &Request) -> Response + Send + Sync + 'static,
{
    ResponseFilter { name, f }
}

/// The ordered hook list owned by a dispatcher.
#[derive(Clone, Default)]
pub(crate) struct HookChain {
    hooks: Vec<Arc<dyn DispatchHook>>,
}

impl HookChain {
    pub(crate) fn new(hooks: Vec<Arc<dyn DispatchHook>>) -> Self {
        Self { hooks }
    }

    pub(crate) fn len(&self) -> usize {
        self.hooks.len()
    }

    pub(crate) async fn pre_dispatch(&self, request: &Request) -> Option<HandlerResult> {
        for hook in &self.hooks {
            if let Flow::Replace(result) = hook.pre_dispatch(request).await {
                tracing::debug!(hook = hook.name(), "pre-dispatch hook replaced result");
                return Some(result);
            }
        }
        None
    }

    pub(crate) async fn post_match(&self, request: &Request, matched: &RouteMatch) -> Option<HandlerResult> {
        for hook in &self.hooks {
            if let Flow::Replace(result) = hook.post_match(request, matched).await {
                tracing::debug!(hook = hook.name(), route = %matched.route, "post-match hook replaced result");
                return Some(result);
            }
        }
        None
    }

    pub(crate) async fn post_dispatch(&self, mut response: Response, request: &Request) -> Response {
        for hook in &self.hooks {
            response = hook.post_dispatch(response, request).await;
        }
        response
    }
}

impl fmt::Debug for HookChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.hooks.iter().map(|h| h.name()))
            .finish()
    }
}
