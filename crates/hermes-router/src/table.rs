//! The route table.

use crate::error::{RouteError, RouteResult};
use crate::pattern::RoutePattern;
use hermes_core::{Endpoint, MethodSet, ParamMap};
use indexmap::IndexMap;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;

/// Produces a route's JSON schema for `context=help` discovery.
pub type SchemaProvider = Arc<dyn Fn() -> Value + Send + Sync>;

/// Builds the discovery endpoint for a namespace seen for the first time.
pub type IndexFactory = Arc<dyn Fn(&str) -> Endpoint + Send + Sync>;

/// Options stored alongside a route, never matched against methods.
#[derive(Clone, Default)]
pub struct RouteOptions {
    namespace: Option<String>,
    schema: Option<SchemaProvider>,
    extra: ParamMap,
}

impl RouteOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the schema provider.
    #[must_use]
    pub fn schema<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.schema = Some(Arc::new(provider));
        self
    }

    /// Sets an arbitrary option.
    #[must_use]
    pub fn option(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }

    /// Returns the namespace the route was registered under.
    #[must_use]
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the schema provider.
    #[must_use]
    pub fn schema_provider(&self) -> Option<&SchemaProvider> {
        self.schema.as_ref()
    }

    /// Returns an arbitrary option.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.extra.get(name)
    }

    /// Overlays `other` onto `self`; fields set in `other` win.
    fn merge(&mut self, other: RouteOptions) {
        if other.namespace.is_some() {
            self.namespace = other.namespace;
        }
        if other.schema.is_some() {
            self.schema = other.schema;
        }
        self.extra.extend(other.extra);
    }
}

impl fmt::Debug for RouteOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteOptions")
            .field("namespace", &self.namespace)
            .field("schema", &self.schema.is_some())
            .field("extra", &self.extra)
            .finish()
    }
}

/// A raw registration: endpoints plus route-level options.
#[derive(Debug, Clone, Default)]
pub struct RouteRegistration {
    endpoints: Vec<Endpoint>,
    options: RouteOptions,
}

impl RouteRegistration {
    /// Creates an empty registration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an endpoint.
    #[must_use]
    pub fn endpoint(mut self, endpoint: Endpoint) -> Self {
        self.endpoints.push(endpoint);
        self
    }

    /// Sets the route options.
    #[must_use]
    pub fn options(mut self, options: RouteOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the schema provider.
    #[must_use]
    pub fn schema<F>(mut self, provider: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.options = self.options.schema(provider);
        self
    }
}

impl From<Endpoint> for RouteRegistration {
    fn from(endpoint: Endpoint) -> Self {
        Self::new().endpoint(endpoint)
    }
}

impl From<Vec<Endpoint>> for RouteRegistration {
    fn from(endpoints: Vec<Endpoint>) -> Self {
        Self {
            endpoints,
            options: RouteOptions::default(),
        }
    }
}

/// A registered route: its pattern, endpoints and options.
#[derive(Debug, Clone)]
pub struct Route {
    pattern: RoutePattern,
    endpoints: Vec<Arc<Endpoint>>,
    options: RouteOptions,
}

impl Route {
    /// Returns the compiled pattern.
    #[must_use]
    pub fn pattern(&self) -> &RoutePattern {
        &self.pattern
    }

    /// Returns the endpoints in registration order.
    #[must_use]
    pub fn endpoints(&self) -> &[Arc<Endpoint>] {
        &self.endpoints
    }

    /// Returns the route options.
    #[must_use]
    pub fn options(&self) -> &RouteOptions {
        &self.options
    }

    /// Returns the union of every endpoint's methods.
    #[must_use]
    pub fn methods(&self) -> MethodSet {
        self.endpoints
            .iter()
            .fold(MethodSet::empty(), |set, e| set.union(e.methods()))
    }
}

/// Path pattern to endpoints, in registration order.
///
/// When a namespace is registered for the first time the table asks its
/// [`IndexFactory`] for a discovery endpoint and registers it at
/// `/{namespace}` ahead of the new route.
#[derive(Clone, Default)]
pub struct RouteTable {
    routes: IndexMap<String, Route>,
    namespaces: IndexMap<String, Vec<String>>,
    index_factory: Option<IndexFactory>,
}

impl RouteTable {
    /// Creates a table that does not synthesize namespace index routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table that synthesizes namespace index routes with `factory`.
    #[must_use]
    pub fn with_index_factory(factory: IndexFactory) -> Self {
        Self {
            index_factory: Some(factory),
            ..Self::default()
        }
    }

    /// Registers endpoints at `/{namespace}/{pattern}`.
    ///
    /// Without `override_existing`, endpoints for an existing key are
    /// appended after the ones already there and options are overlaid.
    /// With it, the route's endpoints and options are replaced in place.
    pub fn register(
        &mut self,
        namespace: &str,
        pattern: &str,
        registration: impl Into<RouteRegistration>,
        override_existing: bool,
    ) -> RouteResult<()> {
        let namespace = namespace.trim_matches('/');
        let pattern = pattern.trim_matches('/');
        if namespace.is_empty() {
            return Err(RouteError::EmptyNamespace {
                pattern: pattern.to_string(),
            });
        }
        if pattern.is_empty() {
            return Err(RouteError::EmptyPattern {
                namespace: namespace.to_string(),
            });
        }
        let mut registration = registration.into();
        let route = format!("/{namespace}/{pattern}");
        if registration.endpoints.is_empty() {
            return Err(RouteError::NoEndpoints { route });
        }

        if !self.namespaces.contains_key(namespace) {
            self.namespaces.insert(namespace.to_string(), Vec::new());
            if let Some(factory) = self.index_factory.clone() {
                let index_route = format!("/{namespace}");
                let mut index = RouteRegistration::from(factory(namespace));
                index.options.namespace = Some(namespace.to_string());
                self.track(namespace, &index_route);
                self.upsert(index_route, index, false);
            }
        }

        registration.options.namespace = Some(namespace.to_string());
        self.track(namespace, &route);
        self.upsert(route, registration, override_existing);
        Ok(())
    }

    /// Registers under a full route key, outside any namespace.
    ///
    /// Used for the root index at `/`.
    pub fn insert(
        &mut self,
        route: impl Into<String>,
        registration: impl Into<RouteRegistration>,
        override_existing: bool,
    ) {
        self.upsert(route.into(), registration.into(), override_existing);
    }

    fn track(&mut self, namespace: &str, route: &str) {
        if let Some(keys) = self.namespaces.get_mut(namespace) {
            if !keys.iter().any(|k| k == route) {
                keys.push(route.to_string());
            }
        }
    }

    fn upsert(&mut self, route: String, registration: RouteRegistration, override_existing: bool) {
        let endpoints: Vec<Arc<Endpoint>> =
            registration.endpoints.into_iter().map(Arc::new).collect();
        match self.routes.get_mut(&route) {
            Some(existing) if !override_existing => {
                tracing::debug!(route = %route, added = endpoints.len(), "merging endpoints into route");
                existing.endpoints.extend(endpoints);
                existing.options.merge(registration.options);
            }
            _ => {
                tracing::debug!(route = %route, endpoints = endpoints.len(), "registering route");
                let pattern = RoutePattern::new(route.clone());
                self.routes.insert(
                    route,
                    Route {
                        pattern,
                        endpoints,
                        options: registration.options,
                    },
                );
            }
        }
    }

    /// Iterates routes in registration order.
    pub fn routes(&self) -> impl Iterator<Item = (&str, &Route)> {
        self.routes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Returns the route registered under a full key.
    #[must_use]
    pub fn route(&self, pattern: &str) -> Option<&Route> {
        self.routes.get(pattern)
    }

    /// Returns the options stored for a route.
    #[must_use]
    pub fn route_options(&self, pattern: &str) -> Option<&RouteOptions> {
        self.routes.get(pattern).map(Route::options)
    }

    /// Returns the namespaces in first-registration order.
    #[must_use]
    pub fn namespaces(&self) -> Vec<&str> {
        self.namespaces.keys().map(String::as_str).collect()
    }

    /// Returns true if `namespace` has been registered.
    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.namespaces.contains_key(namespace)
    }

    /// Iterates the routes registered under `namespace`, in table order.
    pub fn namespace_routes<'a>(
        &'a self,
        namespace: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Route)> + 'a {
        let keys = self.namespaces.get(namespace);
        self.routes()
            .filter(move |(key, _)| keys.is_some_and(|ks| ks.iter().any(|k| k == key)))
    }

    /// Returns the number of routes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    /// Returns true if no route is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

impl fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTable")
            .field("routes", &self.routes.keys().collect::<Vec<_>>())
            .field("namespaces", &self.namespaces.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}
