//! Response shaping: public data, link embedding and envelopes.
//!
//! Embedding re-enters the dispatcher in-process with a synthesized GET per
//! embeddable link and stops there: embedded resources keep their `_links`
//! but never get an `_embedded` of their own.

use crate::dispatcher::Dispatcher;
use hermes_core::{params_from_pairs, Identity, ParamMap, ParamSource, Request, Response};
use http::{HeaderMap, Method};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Value};
use url::Url;

const QUERY_ROUTE: &str = "rest_route";

/// Shapes responses for one caller.
///
/// Sub-requests issued while embedding inherit the caller's identity, and
/// each distinct href is dispatched at most once per shaper.
pub struct ResponseShaper<'a> {
    dispatcher: &'a Dispatcher,
    identity: Identity,
    cache: Mutex<IndexMap<String, Value>>,
}

impl<'a> ResponseShaper<'a> {
    pub(crate) fn new(dispatcher: &'a Dispatcher, request: &Request) -> Self {
        Self {
            dispatcher,
            identity: request.identity().clone(),
            cache: Mutex::new(IndexMap::new()),
        }
    }

    /// Returns the serializable body of `response`.
    ///
    /// Links are merged into `_links`. With `embed`, embeddable links are
    /// resolved into `_embedded`, per element when the data is an array.
    pub async fn to_public_data(&self, response: &Response, embed: bool) -> Value {
        let data = response.data_with_links();
        if !embed {
            return data;
        }
        match data {
            Value::Array(items) => {
                let mut shaped = Vec::with_capacity(items.len());
                for item in items {
                    shaped.push(self.embed_links(item).await);
                }
                Value::Array(shaped)
            }
            other => self.embed_links(other).await,
        }
    }

    /// Resolves the embeddable links of one object into `_embedded`.
    ///
    /// `self` is never expanded. A link that is not embeddable, or points
    /// outside the API, yields `{}` at its position so each relation keeps
    /// the length and order of its `_links` entry. A relation made only of
    /// placeholders is left out.
    pub async fn embed_links(&self, data: Value) -> Value {
        let Value::Object(mut map) = data else {
            return data;
        };
        let Some(Value::Object(links)) = map.get("_links").cloned() else {
            return Value::Object(map);
        };

        let mut embedded = ParamMap::new();
        for (rel, items) in links {
            if rel == "self" {
                continue;
            }
            let Value::Array(items) = items else {
                continue;
            };
            let mut resolved = Vec::with_capacity(items.len());
            let mut any = false;
            for item in &items {
                match self.embed_item(item).await {
                    Some(value) => {
                        any = true;
                        resolved.push(value);
                    }
                    None => resolved.push(placeholder()),
                }
            }
            if any {
                embedded.insert(rel, Value::Array(resolved));
            }
        }

        if !embedded.is_empty() {
            map.insert("_embedded".to_string(), Value::Object(embedded));
        }
        Value::Object(map)
    }

    /// Wraps `response` as `{body, status, headers}` delivered with 200.
    pub async fn envelope(&self, response: &Response, embed: bool) -> Response {
        let body = self.to_public_data(response, embed).await;
        let mut enveloped = Response::new(json!({
            "body": body,
            "status": response.status().as_u16(),
            "headers": headers_to_value(response.headers()),
        }));
        if let Some(route) = response.matched_route() {
            enveloped.set_matched(route, response.matched_endpoint().cloned());
        }
        enveloped
    }

    async fn embed_item(&self, item: &Value) -> Option<Value> {
        let embeddable = item
            .get("embeddable")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        if !embeddable {
            return None;
        }
        let href = item.get("href").and_then(Value::as_str)?;

        if let Some(cached) = self.cache.lock().get(href) {
            return Some(cached.clone());
        }

        let Some(mut request) = self.request_for(href) else {
            tracing::debug!(href = %href, "link outside the API, not embedded");
            return None;
        };
        let response = self.dispatcher.respond(&mut request).await;
        hermes_telemetry::metrics::record_embedded_request();
        tracing::trace!(href = %href, status = response.status().as_u16(), "embedded link");

        let value = response.data_with_links();
        self.cache.lock().insert(href.to_string(), value.clone());
        Some(value)
    }

    /// Builds the GET sub-request for an href under the API root.
    fn request_for(&self, href: &str) -> Option<Request> {
        let base = Url::parse(&self.dispatcher.config().base_url).ok()?;
        let target = base.join(href).ok()?;
        if target.origin() != base.origin() {
            return None;
        }

        let base_path = base.path().trim_end_matches('/');
        let rest = target.path().strip_prefix(base_path)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }

        let mut query = params_from_pairs(target.query_pairs());
        let route = match query.remove(QUERY_ROUTE) {
            Some(Value::String(route)) => route,
            _ if rest.is_empty() => "/".to_string(),
            _ => String::from_utf8_lossy(&urlencoding::decode_binary(rest.as_bytes())).into_owned(),
        };

        let mut request = Request::new(Method::GET, route).with_identity(self.identity.clone());
        if !query.contains_key("context") {
            query.insert("context".to_string(), Value::String("embed".to_string()));
        }
        request.set_params(ParamSource::Query, query);
        Some(request)
    }
}

impl std::fmt::Debug for ResponseShaper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseShaper")
            .field("identity", &self.identity.log_id())
            .field("cached", &self.cache.lock().len())
            .finish_non_exhaustive()
    }
}

fn placeholder() -> Value {
    Value::Object(ParamMap::new())
}

/// Renders headers as an object; repeated headers become arrays.
pub fn headers_to_value(headers: &HeaderMap) -> Value {
    let mut out = ParamMap::new();
    for name in headers.keys() {
        let values: Vec<Value> = headers
            .get_all(name)
            .iter()
            .map(|v| Value::String(String::from_utf8_lossy(v.as_bytes()).into_owned()))
            .collect();
        let value = match <[Value; 1]>::try_from(values) {
            Ok([single]) => single,
            Err(values) => Value::Array(values),
        };
        out.insert(name.as_str().to_string(), value);
    }
    Value::Object(out)
}
