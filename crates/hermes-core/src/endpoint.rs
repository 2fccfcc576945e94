//! Endpoint descriptors.

use crate::args::ArgSpec;
use crate::handler::{Handler, PermissionCheck};
use crate::methods::MethodSet;
use indexmap::IndexMap;
use std::fmt;
use std::sync::Arc;

/// A method-scoped handler attached to a route.
///
/// Built once at registration and never mutated afterwards. Routes hold
/// endpoints behind `Arc` so a matched endpoint can be bound to the request
/// and the response without copying.
///
/// # Example
///
/// ```rust
/// use hermes_core::{handler_fn, ArgSpec, Endpoint, MethodSet, Request};
/// use serde_json::json;
///
/// let endpoint = Endpoint::new("GET")
///     .handler(handler_fn(|_req: &Request| Ok(json!([]).into())))
///     .arg("page", ArgSpec::new().with_default(json!(1)));
///
/// assert_eq!(endpoint.methods(), MethodSet::READABLE);
/// assert!(endpoint.show_in_index());
/// ```
#[derive(Clone)]
pub struct Endpoint {
    methods: MethodSet,
    handler: Option<Arc<dyn Handler>>,
    permission: Option<Arc<dyn PermissionCheck>>,
    args: IndexMap<String, ArgSpec>,
    show_in_index: bool,
    accept_raw: bool,
    accept_json: bool,
}

impl Endpoint {
    /// Creates an endpoint for `methods` with no handler yet.
    ///
    /// `methods` accepts a comma-separated string or a sequence of verbs.
    #[must_use]
    pub fn new(methods: impl Into<MethodSet>) -> Self {
        Self {
            methods: methods.into(),
            handler: None,
            permission: None,
            args: IndexMap::new(),
            show_in_index: true,
            accept_raw: false,
            accept_json: true,
        }
    }

    /// Sets the handler.
    #[must_use]
    pub fn handler(mut self, handler: impl Handler) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Sets a shared handler.
    #[must_use]
    pub fn shared_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = Some(handler);
        self
    }

    /// Sets the permission check.
    #[must_use]
    pub fn permission(mut self, check: impl PermissionCheck) -> Self {
        self.permission = Some(Arc::new(check));
        self
    }

    /// Declares an argument.
    #[must_use]
    pub fn arg(mut self, name: impl Into<String>, spec: ArgSpec) -> Self {
        self.args.insert(name.into(), spec);
        self
    }

    /// Hides the endpoint from discovery listings.
    #[must_use]
    pub fn hidden(mut self) -> Self {
        self.show_in_index = false;
        self
    }

    /// Sets whether the handler reads the raw body.
    ///
    /// A raw endpoint gets no body parameters: neither form fields nor a
    /// parsed JSON body, and a malformed JSON body is not an error. The
    /// bytes stay available through [`Request::body`](crate::Request::body).
    #[must_use]
    pub fn accept_raw(mut self, accept: bool) -> Self {
        self.accept_raw = accept;
        self
    }

    /// Sets whether JSON bodies are parsed into parameters.
    #[must_use]
    pub fn accept_json(mut self, accept: bool) -> Self {
        self.accept_json = accept;
        self
    }

    /// Returns the served methods.
    #[must_use]
    pub fn methods(&self) -> MethodSet {
        self.methods
    }

    /// Returns the handler, if one is attached.
    #[must_use]
    pub fn callback(&self) -> Option<&Arc<dyn Handler>> {
        self.handler.as_ref()
    }

    /// Returns the permission check, if one is attached.
    #[must_use]
    pub fn permission_check(&self) -> Option<&Arc<dyn PermissionCheck>> {
        self.permission.as_ref()
    }

    /// Returns the declared arguments in declaration order.
    #[must_use]
    pub fn args(&self) -> &IndexMap<String, ArgSpec> {
        &self.args
    }

    /// Returns true if the endpoint appears in discovery listings.
    #[must_use]
    pub fn show_in_index(&self) -> bool {
        self.show_in_index
    }

    /// Returns true if the handler reads the raw body.
    #[must_use]
    pub fn accepts_raw(&self) -> bool {
        self.accept_raw
    }

    /// Returns true if JSON bodies are parsed into parameters.
    #[must_use]
    pub fn accepts_json(&self) -> bool {
        self.accept_json
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("methods", &self.methods)
            .field("handler", &self.handler.is_some())
            .field("permission", &self.permission.is_some())
            .field("args", &self.args.keys().collect::<Vec<_>>())
            .field("show_in_index", &self.show_in_index)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{handler_fn, RequireRole};
    use crate::request::Request;
    use http::Method;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let endpoint = Endpoint::new("GET, POST");
        assert!(endpoint.show_in_index());
        assert!(endpoint.args().is_empty());
        assert!(endpoint.callback().is_none());
        assert!(endpoint.permission_check().is_none());
        assert!(endpoint.accepts_json());
        assert!(!endpoint.accepts_raw());
        assert!(endpoint.methods().contains(&Method::POST));
    }

    #[test]
    fn test_builder() {
        let endpoint = Endpoint::new([Method::DELETE])
            .handler(handler_fn(|_req: &Request| Ok(json!(true).into())))
            .permission(RequireRole::new("administrator"))
            .arg("force", ArgSpec::new().with_default(json!(false)))
            .hidden();

        assert!(endpoint.callback().is_some());
        assert!(endpoint.permission_check().is_some());
        assert!(!endpoint.show_in_index());
        assert_eq!(endpoint.args().len(), 1);
        assert_eq!(endpoint.methods(), MethodSet::DELETABLE);
    }
}
