//! The dispatcher: route table owner and request orchestrator.

use crate::discovery;
use crate::hooks::{DispatchHook, HookChain};
use crate::pipeline;
use crate::shaper::ResponseShaper;
use hermes_core::{codes, Endpoint, Failure, HandlerResult, ParamMap, Request, Response};
use hermes_router::{IndexFactory, MatchPolicy, RouteOptions, RouteRegistration, RouteResult, RouteTable};
use http::header::ALLOW;
use http::{HeaderValue, Method};
use indexmap::IndexMap;
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

/// Site-level settings used by discovery, link building and headers.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Site name shown by the root index.
    pub name: String,
    /// Site description shown by the root index.
    pub description: String,
    /// Absolute URL of the API root, e.g. `https://example.com/wp-json`.
    pub base_url: String,
    /// Target of the root index `help` link.
    pub help_url: Option<String>,
    /// Authentication schemes advertised by the root index.
    pub authentication: ParamMap,
    /// How a path served for other methods only is reported.
    pub match_policy: MatchPolicy,
    /// Whether post-dispatch sets the `Allow` header.
    pub allow_header: bool,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            name: "Hermes".to_string(),
            description: String::new(),
            base_url: "http://localhost/wp-json".to_string(),
            help_url: None,
            authentication: ParamMap::new(),
            match_policy: MatchPolicy::Lenient,
            allow_header: true,
        }
    }
}

impl DispatcherConfig {
    /// Joins `path` onto the API root.
    #[must_use]
    pub fn url_for(&self, path: &str) -> String {
        let base = self.base_url.trim_end_matches('/');
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }
}

pub(crate) struct Inner {
    pub(crate) routes: RwLock<RouteTable>,
    pub(crate) hooks: HookChain,
    pub(crate) config: DispatcherConfig,
}

/// Owns the route table and runs requests through match, pipeline and
/// normalization.
///
/// Cloning is cheap; clones share the same table.
///
/// # Example
///
/// ```rust
/// use hermes_core::{handler_fn, Endpoint, Request};
/// use hermes_dispatch::Dispatcher;
/// use http::Method;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let dispatcher = Dispatcher::builder().name("Example").build();
/// dispatcher
///     .register(
///         "demo/v1",
///         "/ping",
///         Endpoint::new("GET").handler(handler_fn(|_req: &Request| Ok(json!("pong").into()))),
///         false,
///     )
///     .unwrap();
///
/// let mut request = Request::new(Method::GET, "/demo/v1/ping");
/// let response = dispatcher.dispatch(&mut request).await;
/// assert_eq!(response.data(), &json!("pong"));
/// # });
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

impl Dispatcher {
    /// Creates a builder.
    #[must_use]
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    /// Creates a dispatcher with default settings and no hooks.
    #[must_use]
    pub fn new() -> Self {
        DispatcherBuilder::new().build()
    }

    pub(crate) fn from_inner(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    pub(crate) fn inner_routes(&self) -> parking_lot::RwLockReadGuard<'_, RouteTable> {
        self.inner.routes.read()
    }

    /// Returns the dispatcher settings.
    #[must_use]
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    /// Returns the number of configured hooks.
    #[must_use]
    pub fn hook_count(&self) -> usize {
        self.inner.hooks.len()
    }

    /// Registers endpoints at `/{namespace}/{pattern}`.
    ///
    /// # Errors
    ///
    /// Returns a [`RouteError`](hermes_router::RouteError) for an empty
    /// namespace, an empty pattern or a registration without endpoints.
    pub fn register(
        &self,
        namespace: &str,
        pattern: &str,
        registration: impl Into<RouteRegistration>,
        override_existing: bool,
    ) -> RouteResult<()> {
        self.inner
            .routes
            .write()
            .register(namespace, pattern, registration, override_existing)
    }

    /// Returns a snapshot of the route table.
    #[must_use]
    pub fn routes(&self) -> RouteTable {
        self.inner.routes.read().clone()
    }

    /// Returns the options stored for a route.
    #[must_use]
    pub fn route_options(&self, pattern: &str) -> Option<RouteOptions> {
        self.inner.routes.read().route_options(pattern).cloned()
    }

    /// Returns the registered namespaces in first-registration order.
    #[must_use]
    pub fn namespaces(&self) -> Vec<String> {
        self.inner
            .routes
            .read()
            .namespaces()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    /// Matches, runs the pipeline and normalizes the outcome.
    ///
    /// Never fails: every failure is converted with [`failure_to_response`].
    /// The response records which route and endpoint matched.
    pub async fn dispatch(&self, request: &mut Request) -> Response {
        let (result, matched) = match self.inner.hooks.pre_dispatch(request).await {
            Some(result) => (result, None),
            None => {
                let found = {
                    let table = self.inner.routes.read();
                    table.match_with_policy(
                        request.method(),
                        request.route(),
                        self.inner.config.match_policy,
                    )
                };
                match found {
                    Ok(matched) => {
                        let result = pipeline::run(request, &matched, &self.inner.hooks).await;
                        (result, Some(matched))
                    }
                    Err(failure) => (Err(failure), None),
                }
            }
        };

        let mut response = normalize(result);
        if let Some(matched) = matched {
            response.set_matched(matched.route, Some(matched.endpoint));
        }

        tracing::debug!(
            request_id = %request.id(),
            method = %request.method(),
            route = response.matched_route().unwrap_or(hermes_telemetry::metrics::UNMATCHED_ROUTE),
            status = response.status().as_u16(),
            "request dispatched"
        );
        response
    }

    /// Applies the `Allow` header and the post-dispatch hooks.
    pub async fn post_dispatch(&self, mut response: Response, request: &Request) -> Response {
        if self.inner.config.allow_header {
            if let Some(route) = response.matched_route().map(str::to_string) {
                let allowed = self.allowed_for(&route, request).await;
                match HeaderValue::from_str(&allowed.join(", ")) {
                    Ok(value) => {
                        response.headers_mut().insert(ALLOW, value);
                    }
                    Err(e) => tracing::warn!(route = %route, error = %e, "unusable Allow header"),
                }
            }
        }
        self.inner.hooks.post_dispatch(response, request).await
    }

    /// Dispatches and post-processes a request.
    pub async fn respond(&self, request: &mut Request) -> Response {
        let response = self.dispatch(request).await;
        self.post_dispatch(response, request).await
    }

    /// Returns a shaper that embeds on behalf of `request`'s caller.
    #[must_use]
    pub fn shaper(&self, request: &Request) -> ResponseShaper<'_> {
        ResponseShaper::new(self, request)
    }

    /// Methods of `route` the caller passes every permission check for.
    ///
    /// When several endpoints serve the same method, the later endpoint's
    /// check decides.
    async fn allowed_for(&self, route: &str, request: &Request) -> Vec<&'static str> {
        let endpoints: Vec<Arc<Endpoint>> = {
            let table = self.inner.routes.read();
            match table.route(route) {
                Some(route) => route.endpoints().to_vec(),
                None => return Vec::new(),
            }
        };

        let mut allowed: IndexMap<Method, bool> = IndexMap::new();
        for endpoint in &endpoints {
            for method in endpoint.methods().iter() {
                allowed.entry(method).or_insert(true);
            }
        }
        for endpoint in &endpoints {
            if let Some(check) = endpoint.permission_check() {
                let pass = matches!(check.allowed(request).await, Ok(true));
                for method in endpoint.methods().iter() {
                    allowed.insert(method, pass);
                }
            }
        }

        let mut names: Vec<&'static str> = Vec::new();
        for name in endpoints
            .iter()
            .fold(hermes_core::MethodSet::empty(), |set, e| set.union(e.methods()))
            .names()
        {
            let pass = hermes_core::MethodSet::parse_method(name)
                .and_then(|m| allowed.get(&m).copied())
                .unwrap_or(false);
            if pass {
                names.push(name);
            }
        }
        names
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("hooks", &self.inner.hooks)
            .field("routes", &*self.inner.routes.read())
            .finish()
    }
}

fn normalize(result: HandlerResult) -> Response {
    match result {
        Ok(reply) => reply.into_response(),
        Err(failure) => failure_to_response(&failure),
    }
}

/// Converts a failure into its response.
///
/// The body is one `{code, message, data}` record per message, in order.
/// The status comes from the first code's `data.status`, else 500. A
/// `rest_method_not_allowed` failure also sets `Allow`.
#[must_use]
pub fn failure_to_response(failure: &Failure) -> Response {
    let records: Vec<Value> = failure
        .records()
        .into_iter()
        .map(|r| json!({ "code": r.code, "message": r.message, "data": r.data }))
        .collect();
    let mut response = Response::new(Value::Array(records)).with_status(failure.status());

    if let Some(allow) = failure
        .data(codes::METHOD_NOT_ALLOWED)
        .and_then(|d| d.get("allow"))
        .and_then(Value::as_array)
    {
        let names: Vec<&str> = allow.iter().filter_map(Value::as_str).collect();
        if let Ok(value) = HeaderValue::from_str(&names.join(", ")) {
            response.headers_mut().insert(ALLOW, value);
        }
    }
    response
}

/// Builder for [`Dispatcher`].
#[derive(Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    hooks: Vec<Arc<dyn DispatchHook>>,
}

impl DispatcherBuilder {
    /// Creates a builder with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces every setting.
    #[must_use]
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the site name.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.config.name = name.into();
        self
    }

    /// Sets the site description.
    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.config.description = description.into();
        self
    }

    /// Sets the API root URL.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Sets the help link target.
    #[must_use]
    pub fn help_url(mut self, url: impl Into<String>) -> Self {
        self.config.help_url = Some(url.into());
        self
    }

    /// Advertises an authentication scheme in the root index.
    #[must_use]
    pub fn authentication(mut self, scheme: impl Into<String>, details: Value) -> Self {
        self.config.authentication.insert(scheme.into(), details);
        self
    }

    /// Sets the match policy.
    #[must_use]
    pub fn match_policy(mut self, policy: MatchPolicy) -> Self {
        self.config.match_policy = policy;
        self
    }

    /// Enables or disables the `Allow` header.
    #[must_use]
    pub fn allow_header(mut self, enabled: bool) -> Self {
        self.config.allow_header = enabled;
        self
    }

    /// Appends a hook.
    #[must_use]
    pub fn hook(mut self, hook: impl DispatchHook) -> Self {
        self.hooks.push(Arc::new(hook));
        self
    }

    /// Appends a shared hook.
    #[must_use]
    pub fn shared_hook(mut self, hook: Arc<dyn DispatchHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Builds the dispatcher with the root index registered at `/`.
    #[must_use]
    pub fn build(self) -> Dispatcher {
        let Self { config, hooks } = self;
        let inner = Arc::new_cyclic(|weak: &Weak<Inner>| {
            let namespaces = weak.clone();
            let factory: IndexFactory =
                Arc::new(move |namespace: &str| discovery::namespace_endpoint(namespaces.clone(), namespace));
            let mut table = RouteTable::with_index_factory(factory);
            table.insert("/", discovery::root_endpoint(weak.clone()), false);
            Inner {
                routes: RwLock::new(table),
                hooks: HookChain::new(hooks),
                config,
            }
        });
        tracing::debug!(hooks = inner.hooks.len(), "dispatcher built");
        Dispatcher { inner }
    }
}

impl std::fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("hooks", &self.hooks.len())
            .finish()
    }
}
