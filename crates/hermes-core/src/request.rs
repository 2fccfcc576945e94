//! The per-call request value.
//!
//! A [`Request`] is built once by the serving layer (or by the dispatcher
//! itself for embedded sub-requests) and passed by reference through the
//! pipeline. Parameters live in separate sources and are merged by
//! precedence when read by name.

use crate::endpoint::Endpoint;
use crate::failure::Failure;
use crate::identity::Identity;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

/// A keyed parameter mapping.
pub type ParamMap = serde_json::Map<String, Value>;

/// A unique identifier for each request, using UUID v7.
///
/// UUID v7 is time-ordered, which keeps request logs sortable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(Uuid);

impl RequestId {
    /// Creates a new request ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a parameter came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    /// Named captures from the matched route pattern.
    Url,
    /// Keys of a JSON object body.
    Json,
    /// Form-encoded body fields.
    Body,
    /// Query string.
    Query,
    /// Defaults declared by the matched endpoint's arguments.
    Defaults,
}

impl ParamSource {
    /// Sources from highest to lowest precedence.
    pub const PRECEDENCE: [Self; 5] = [Self::Url, Self::Json, Self::Body, Self::Query, Self::Defaults];
}

/// A REST request.
#[derive(Debug, Clone)]
pub struct Request {
    id: RequestId,
    method: Method,
    route: String,
    url: ParamMap,
    json: ParamMap,
    body_params: ParamMap,
    query: ParamMap,
    defaults: ParamMap,
    files: ParamMap,
    json_parsed: bool,
    body: Bytes,
    headers: HeaderMap,
    attributes: Option<Arc<Endpoint>>,
    identity: Identity,
}

impl Request {
    /// Creates an empty request for `method` and `route`.
    #[must_use]
    pub fn new(method: Method, route: impl Into<String>) -> Self {
        Self {
            id: RequestId::new(),
            method,
            route: route.into(),
            url: ParamMap::new(),
            json: ParamMap::new(),
            body_params: ParamMap::new(),
            query: ParamMap::new(),
            defaults: ParamMap::new(),
            files: ParamMap::new(),
            json_parsed: false,
            body: Bytes::new(),
            headers: HeaderMap::new(),
            attributes: None,
            identity: Identity::Anonymous,
        }
    }

    /// Adds a query parameter.
    #[must_use]
    pub fn with_query(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    /// Sets a JSON body and the matching content type.
    #[must_use]
    pub fn with_json(mut self, body: &Value) -> Self {
        self.headers.insert(
            CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        self.set_body(Bytes::from(body.to_string()));
        self
    }

    /// Sets the caller identity.
    #[must_use]
    pub fn with_identity(mut self, identity: Identity) -> Self {
        self.identity = identity;
        self
    }

    /// Returns the request ID.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }

    /// Returns the method used for matching.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Replaces the method.
    pub fn set_method(&mut self, method: Method) {
        self.method = method;
    }

    /// Returns the route path, without the API base path.
    #[must_use]
    pub fn route(&self) -> &str {
        &self.route
    }

    /// Replaces the route path.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = route.into();
    }

    /// Returns the parameters of one source.
    #[must_use]
    pub fn params_from(&self, source: ParamSource) -> &ParamMap {
        match source {
            ParamSource::Url => &self.url,
            ParamSource::Json => &self.json,
            ParamSource::Body => &self.body_params,
            ParamSource::Query => &self.query,
            ParamSource::Defaults => &self.defaults,
        }
    }

    /// Returns the parameters of one source, mutably.
    pub fn params_from_mut(&mut self, source: ParamSource) -> &mut ParamMap {
        match source {
            ParamSource::Url => &mut self.url,
            ParamSource::Json => &mut self.json,
            ParamSource::Body => &mut self.body_params,
            ParamSource::Query => &mut self.query,
            ParamSource::Defaults => &mut self.defaults,
        }
    }

    /// Replaces the parameters of one source.
    pub fn set_params(&mut self, source: ParamSource, params: ParamMap) {
        *self.params_from_mut(source) = params;
    }

    /// Returns the uploaded file parameters.
    ///
    /// The built-in transport does not decode multipart bodies, so this is
    /// empty unless a custom transport calls [`Request::set_file_params`].
    /// Files never take part in [`Request::param`] lookups.
    #[must_use]
    pub fn file_params(&self) -> &ParamMap {
        &self.files
    }

    /// Replaces the uploaded file parameters.
    pub fn set_file_params(&mut self, files: ParamMap) {
        self.files = files;
    }

    /// Returns the highest-precedence value for `name`.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&Value> {
        ParamSource::PRECEDENCE
            .iter()
            .find_map(|source| self.params_from(*source).get(name))
    }

    /// Returns the value for `name` as a string slice, if it is a string.
    #[must_use]
    pub fn param_str(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }

    /// Returns true if any source supplies `name`.
    #[must_use]
    pub fn has_param(&self, name: &str) -> bool {
        self.param(name).is_some()
    }

    /// Returns the source that currently supplies `name`.
    #[must_use]
    pub fn param_source(&self, name: &str) -> Option<ParamSource> {
        ParamSource::PRECEDENCE
            .iter()
            .copied()
            .find(|source| self.params_from(*source).contains_key(name))
    }

    /// Sets `name`, overwriting it in whichever source supplies it.
    ///
    /// A parameter no source supplies is written to the query parameters.
    pub fn set_param(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let source = self.param_source(&name).unwrap_or(ParamSource::Query);
        self.params_from_mut(source).insert(name, value.into());
    }

    /// Returns every parameter merged by precedence.
    #[must_use]
    pub fn params(&self) -> ParamMap {
        let mut merged = ParamMap::new();
        for source in ParamSource::PRECEDENCE.iter().rev() {
            for (key, value) in self.params_from(*source) {
                merged.insert(key.clone(), value.clone());
            }
        }
        merged
    }

    /// Returns the `context` parameter.
    #[must_use]
    pub fn context(&self) -> Option<&str> {
        self.param_str("context")
    }

    /// Returns the raw body.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Replaces the raw body. JSON parameters are re-parsed on next hydration.
    pub fn set_body(&mut self, body: Bytes) {
        self.body = body;
        self.json.clear();
        self.json_parsed = false;
    }

    /// Returns the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Returns the headers, mutably.
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Replaces the headers.
    pub fn set_headers(&mut self, headers: HeaderMap) {
        self.headers = headers;
    }

    /// Returns a header value as a string.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the lowercased media type of the Content-Type header.
    #[must_use]
    pub fn content_type(&self) -> Option<String> {
        self.header(CONTENT_TYPE.as_str()).map(|raw| {
            raw.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase()
        })
    }

    /// Returns true if the body is declared as JSON.
    #[must_use]
    pub fn is_json_content_type(&self) -> bool {
        self.content_type()
            .is_some_and(|ct| ct == "application/json" || ct.ends_with("+json"))
    }

    /// Parses a JSON body into the JSON parameter source.
    ///
    /// Does nothing unless the content type is JSON and the body is non-empty.
    /// Bodies that are valid JSON but not an object contribute no parameters.
    pub fn parse_json_body(&mut self) -> Result<(), Failure> {
        if self.json_parsed || !self.is_json_content_type() || self.body.is_empty() {
            return Ok(());
        }
        self.json_parsed = true;
        match serde_json::from_slice::<Value>(&self.body) {
            Ok(Value::Object(map)) => {
                self.json = map;
                Ok(())
            }
            Ok(_) => Ok(()),
            Err(e) => Err(Failure::invalid_json(e)),
        }
    }

    /// Returns the matched endpoint, once bound by the dispatcher.
    #[must_use]
    pub fn attributes(&self) -> Option<&Arc<Endpoint>> {
        self.attributes.as_ref()
    }

    /// Binds the matched endpoint.
    pub fn set_attributes(&mut self, endpoint: Arc<Endpoint>) {
        self.attributes = Some(endpoint);
    }

    /// Returns the caller identity.
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Replaces the caller identity.
    pub fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }
}

/// Folds decoded `key=value` pairs into parameters.
///
/// `key[]=a&key[]=b` collects into an array and `key[sub]=v` into an
/// object. A repeated plain key keeps its last value.
pub fn params_from_pairs<I, K, V>(pairs: I) -> ParamMap
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    let mut params = ParamMap::new();
    for (key, value) in pairs {
        let key = key.as_ref();
        let value = Value::String(value.into());
        match key.split_once('[') {
            Some((base, rest)) if !base.is_empty() && rest.ends_with(']') => {
                let sub = &rest[..rest.len() - 1];
                if sub.is_empty() {
                    let slot = params
                        .entry(base.to_string())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    match slot {
                        Value::Array(items) => items.push(value),
                        other => *other = Value::Array(vec![value]),
                    }
                } else {
                    let slot = params
                        .entry(base.to_string())
                        .or_insert_with(|| Value::Object(ParamMap::new()));
                    if !slot.is_object() {
                        *slot = Value::Object(ParamMap::new());
                    }
                    if let Value::Object(map) = slot {
                        map.insert(sub.to_string(), value);
                    }
                }
            }
            _ => {
                params.insert(key.to_string(), value);
            }
        }
    }
    params
}
