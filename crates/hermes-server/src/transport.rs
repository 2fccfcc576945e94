//! Turns transport requests into dispatcher [`Request`]s.
//!
//! The route comes from the `rest_route` query parameter when present,
//! otherwise from the path below the configured base path. Either way the
//! route is matched percent-decoded. Query strings and form bodies are
//! decoded with `serde_urlencoded`.

use bytes::Bytes;
use hermes_core::{params_from_pairs, MethodSet, ParamMap, ParamSource, Request};
use http::request::Parts;
use http::Method;
use serde_json::Value;

/// Query parameter that carries the route when pretty paths are unavailable.
pub const ROUTE_PARAM: &str = "rest_route";

/// Query parameter overriding the transport method.
pub const METHOD_PARAM: &str = "_method";

/// Header overriding the transport method.
pub const METHOD_OVERRIDE_HEADER: &str = "x-http-method-override";

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Decodes an urlencoded string into parameters.
///
/// Undecodable input yields no parameters.
pub fn decode_params(encoded: &str) -> ParamMap {
    match serde_urlencoded::from_str::<Vec<(String, String)>>(encoded) {
        Ok(pairs) => params_from_pairs(pairs),
        Err(e) => {
            tracing::debug!(error = %e, "undecodable urlencoded input ignored");
            ParamMap::new()
        }
    }
}

/// Extracts the decoded route from a transport path, or `None` when the
/// path is outside `base_path`.
///
/// The base path is stripped from the raw path before decoding.
pub fn route_from_path(path: &str, base_path: &str) -> Option<String> {
    let base = base_path.trim_end_matches('/');
    let rest = if base.is_empty() {
        path
    } else {
        let rest = path.strip_prefix(base)?;
        if !rest.is_empty() && !rest.starts_with('/') {
            return None;
        }
        rest
    };
    Some(normalize_route(&decode_segment(rest)))
}

/// Percent-decodes a path. `+` is kept literally and invalid UTF-8 is
/// replaced.
pub fn decode_segment(path: &str) -> String {
    String::from_utf8_lossy(&urlencoding::decode_binary(path.as_bytes())).into_owned()
}

fn normalize_route(route: &str) -> String {
    if route.is_empty() {
        "/".to_string()
    } else if route.starts_with('/') {
        route.to_string()
    } else {
        format!("/{route}")
    }
}

/// Resolves the effective method: `_method`, then the override header, then
/// the transport method. Unknown verbs are ignored.
pub fn effective_method(parts: &Parts, query: &ParamMap) -> Method {
    let requested = query
        .get(METHOD_PARAM)
        .and_then(Value::as_str)
        .or_else(|| {
            parts
                .headers
                .get(METHOD_OVERRIDE_HEADER)
                .and_then(|v| v.to_str().ok())
        });

    match requested {
        Some(name) => MethodSet::parse_method(name).unwrap_or_else(|| {
            tracing::debug!(requested = %name, "unknown method override ignored");
            parts.method.clone()
        }),
        None => parts.method.clone(),
    }
}

/// Builds a dispatcher request, or `None` when the target lies outside the
/// API.
pub fn build_request(parts: &Parts, body: Bytes, base_path: &str) -> Option<Request> {
    let mut query = parts.uri.query().map(decode_params).unwrap_or_default();

    let route = match query.remove(ROUTE_PARAM) {
        Some(Value::String(route)) => normalize_route(&route),
        Some(_) => return None,
        None => route_from_path(parts.uri.path(), base_path)?,
    };

    let method = effective_method(parts, &query);
    let mut request = Request::new(method, route);
    request.set_headers(parts.headers.clone());

    if request.content_type().as_deref() == Some(FORM_CONTENT_TYPE) {
        let form = std::str::from_utf8(&body).map(decode_params).unwrap_or_default();
        request.set_params(ParamSource::Body, form);
    }
    request.set_params(ParamSource::Query, query);
    request.set_body(body);
    Some(request)
}
