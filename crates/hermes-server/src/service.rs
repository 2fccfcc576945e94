//! The serving pipeline around the dispatcher.
//!
//! ```text
//! http::Request
//!   -> transport       (route, method override, query, form body)
//!   -> JSONP guard     (_jsonp)
//!   -> authenticators  (first non-abstaining one decides)
//!   -> Dispatcher::respond
//!   -> shaping         (_envelope, _embed)
//!   -> headers, encoding, JSONP wrapping
//! http::Response
//! ```

use std::sync::{Arc, OnceLock};
use std::time::Instant;

use bytes::Bytes;
use hermes_config::HermesConfig;
use hermes_core::{Failure, ParamSource, Request, Response};
use hermes_dispatch::{failure_to_response, Dispatcher};
use hermes_telemetry::metrics::{self, InFlightGuard};
use http::header::{
    HeaderName, HeaderValue, ACCESS_CONTROL_EXPOSE_HEADERS, CONTENT_TYPE, X_CONTENT_TYPE_OPTIONS,
};
use http::{HeaderMap, Method, StatusCode};
use http_body_util::Full;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::auth::{AuthChain, AuthOutcome, Authenticator};
use crate::config::ServiceOptions;
use crate::transport;

/// Body type of every response.
pub type ResponseBody = Full<Bytes>;

/// The HTTP response produced by [`ApiService::serve`].
pub type HttpResponse = http::Response<ResponseBody>;

/// Query parameter naming a JSONP callback.
pub const JSONP_PARAM: &str = "_jsonp";

/// Query parameter requesting an envelope.
pub const ENVELOPE_PARAM: &str = "_envelope";

/// Query parameter requesting embedded links.
pub const EMBED_PARAM: &str = "_embed";

const JSON_CONTENT_TYPE: &str = "application/json; charset=UTF-8";
const JSONP_CONTENT_TYPE: &str = "application/javascript; charset=UTF-8";
const FALLBACK_BODY: &[u8] =
    br#"[{"code":"rest_encode_error","message":"The response could not be encoded.","data":{"status":500}}]"#;

struct ServiceInner {
    dispatcher: Dispatcher,
    options: ServiceOptions,
    auth: AuthChain,
}

/// Serves HTTP requests through a [`Dispatcher`].
///
/// Cloning is cheap. The service holds no per-request state, so it can be
/// driven in-process (see `hermes-test`) or by [`Server`](crate::Server).
///
/// # Example
///
/// ```rust
/// use bytes::Bytes;
/// use hermes_core::{handler_fn, Endpoint, Request};
/// use hermes_dispatch::Dispatcher;
/// use hermes_server::ApiService;
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let dispatcher = Dispatcher::new();
/// dispatcher
///     .register(
///         "demo/v1",
///         "/ping",
///         Endpoint::new("GET").handler(handler_fn(|_req: &Request| Ok(json!("pong").into()))),
///         false,
///     )
///     .unwrap();
///
/// let service = ApiService::builder(dispatcher).build();
/// let request = http::Request::get("/wp-json/demo/v1/ping").body(Bytes::new()).unwrap();
/// let response = service.serve(request).await;
/// assert_eq!(response.status(), 200);
/// # });
/// ```
#[derive(Clone)]
pub struct ApiService {
    inner: Arc<ServiceInner>,
}

impl ApiService {
    /// Creates a builder around `dispatcher`.
    #[must_use]
    pub fn builder(dispatcher: Dispatcher) -> ApiServiceBuilder {
        ApiServiceBuilder::new(dispatcher)
    }

    /// The wrapped dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.inner.dispatcher
    }

    /// The response policy.
    #[must_use]
    pub fn options(&self) -> &ServiceOptions {
        &self.inner.options
    }

    /// Number of configured authenticators.
    #[must_use]
    pub fn authenticator_count(&self) -> usize {
        self.inner.auth.len()
    }

    /// Serves one request. Never fails; every failure becomes a response.
    pub async fn serve(&self, request: http::Request<Bytes>) -> HttpResponse {
        let started = Instant::now();
        let _in_flight = InFlightGuard::new();
        let (parts, body) = request.into_parts();

        let Some(mut request) = transport::build_request(&parts, body, &self.inner.options.base_path)
        else {
            tracing::debug!(path = %parts.uri.path(), "path outside the API");
            let response = failure_to_response(&Failure::no_route());
            let data = response.data().clone();
            return self.finish(&parts.method, None, &response, &data, None, started);
        };

        let callback = match self.jsonp_callback(&request) {
            Ok(callback) => callback,
            Err(failure) => {
                let response = failure_to_response(&failure);
                let data = response.data().clone();
                return self.finish(request.method(), Some(&request), &response, &data, None, started);
            }
        };

        let response = match self.inner.auth.authenticate(&request).await {
            AuthOutcome::Rejected(failure) => {
                tracing::debug!(request_id = %request.id(), code = failure.code().unwrap_or_default(), "authentication rejected");
                failure_to_response(&failure)
            }
            AuthOutcome::Authenticated(identity) => {
                request.set_identity(identity);
                self.inner.dispatcher.respond(&mut request).await
            }
            AuthOutcome::Abstain => self.inner.dispatcher.respond(&mut request).await,
        };

        let embed = has_query_flag(&request, EMBED_PARAM);
        let shaper = self.inner.dispatcher.shaper(&request);
        let (response, data) = if has_query_flag(&request, ENVELOPE_PARAM) {
            let enveloped = shaper.envelope(&response, embed).await;
            let data = enveloped.data().clone();
            (enveloped, data)
        } else {
            let data = shaper.to_public_data(&response, embed).await;
            (response, data)
        };

        self.finish(
            request.method(),
            Some(&request),
            &response,
            &data,
            callback.as_deref(),
            started,
        )
    }

    /// Renders `failure` with the standard headers, outside dispatch.
    #[must_use]
    pub fn failure_response(&self, method: &Method, failure: &Failure) -> HttpResponse {
        let response = failure_to_response(failure);
        self.render(method, &response, response.data(), None).0
    }

    fn jsonp_callback(&self, request: &Request) -> Result<Option<String>, Failure> {
        let Some(callback) = request.params_from(ParamSource::Query).get(JSONP_PARAM) else {
            return Ok(None);
        };
        if !self.inner.options.jsonp_enabled {
            return Err(Failure::callback_disabled());
        }
        match callback.as_str() {
            Some(name) if is_valid_callback(name) => Ok(Some(name.to_string())),
            _ => Err(Failure::callback_invalid()),
        }
    }

    fn finish(
        &self,
        method: &Method,
        request: Option<&Request>,
        response: &Response,
        data: &Value,
        callback: Option<&str>,
        started: Instant,
    ) -> HttpResponse {
        let (http, status) = self.render(method, response, data, callback);
        let route = response.matched_route().unwrap_or(metrics::UNMATCHED_ROUTE);
        let elapsed = started.elapsed();
        metrics::record_request(route, method.as_str(), status.as_u16(), elapsed);

        tracing::info!(
            request_id = %request.map(|r| r.id().to_string()).unwrap_or_default(),
            method = %method,
            route = route,
            status = status.as_u16(),
            duration_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            identity = %request.map(|r| r.identity().log_id()).unwrap_or_default(),
            "request served"
        );
        http
    }

    fn render(
        &self,
        method: &Method,
        response: &Response,
        data: &Value,
        callback: Option<&str>,
    ) -> (HttpResponse, StatusCode) {
        let mut status = response.status();
        let mut headers = self.core_headers(callback.is_some());
        for (name, value) in response.headers() {
            if is_core_header(name) {
                tracing::debug!(header = %name, "response header would replace a core header, dropped");
                continue;
            }
            headers.append(name.clone(), value.clone());
        }

        let body = if *method == Method::HEAD {
            Bytes::new()
        } else {
            let (encoded, downgraded) = encode_body(data);
            if let Some(downgraded) = downgraded {
                status = downgraded;
            }
            match callback {
                Some(callback) => {
                    let mut wrapped = Vec::with_capacity(encoded.len() + callback.len() + 6);
                    wrapped.extend_from_slice(b"/**/");
                    wrapped.extend_from_slice(callback.as_bytes());
                    wrapped.push(b'(');
                    wrapped.extend_from_slice(&encoded);
                    wrapped.push(b')');
                    Bytes::from(wrapped)
                }
                None => encoded,
            }
        };

        let mut http = http::Response::new(Full::new(body));
        *http.status_mut() = status;
        *http.headers_mut() = headers;
        (http, status)
    }

    fn core_headers(&self, jsonp: bool) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let content_type = if jsonp { JSONP_CONTENT_TYPE } else { JSON_CONTENT_TYPE };
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        headers.insert(X_CONTENT_TYPE_OPTIONS, HeaderValue::from_static("nosniff"));

        let expose = self.inner.options.expose_headers.join(", ");
        if !expose.is_empty() {
            match HeaderValue::from_str(&expose) {
                Ok(value) => {
                    headers.insert(ACCESS_CONTROL_EXPOSE_HEADERS, value);
                }
                Err(e) => tracing::warn!(error = %e, "unusable expose headers list"),
            }
        }
        headers
    }
}

fn is_core_header(name: &HeaderName) -> bool {
    name == CONTENT_TYPE || name == X_CONTENT_TYPE_OPTIONS || name == ACCESS_CONTROL_EXPOSE_HEADERS
}

fn has_query_flag(request: &Request, name: &str) -> bool {
    request.params_from(ParamSource::Query).contains_key(name)
}

fn is_valid_callback(callback: &str) -> bool {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[\w.]+$").ok())
        .as_ref()
        .is_some_and(|re| re.is_match(callback))
}

/// Serializes `data`; on failure returns the encoded `rest_encode_error`
/// body and its status instead.
fn encode_body<T: Serialize + ?Sized>(data: &T) -> (Bytes, Option<StatusCode>) {
    match serde_json::to_vec(data) {
        Ok(encoded) => (Bytes::from(encoded), None),
        Err(e) => {
            tracing::warn!(error = %e, "response could not be encoded");
            let failure = Failure::encode_error(e);
            let fallback = failure_to_response(&failure);
            let encoded = serde_json::to_vec(fallback.data())
                .map_or_else(|_| Bytes::from_static(FALLBACK_BODY), Bytes::from);
            (encoded, Some(failure.status()))
        }
    }
}

/// Builder for [`ApiService`].
#[must_use]
pub struct ApiServiceBuilder {
    dispatcher: Dispatcher,
    options: ServiceOptions,
    auth: AuthChain,
}

impl ApiServiceBuilder {
    /// Creates a builder with default options and no authenticators.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            dispatcher,
            options: ServiceOptions::default(),
            auth: AuthChain::default(),
        }
    }

    /// Replaces all options.
    pub fn options(mut self, options: ServiceOptions) -> Self {
        self.options = options;
        self
    }

    /// Takes options from the `api` section.
    pub fn config(self, config: &HermesConfig) -> Self {
        self.options(ServiceOptions::from(config))
    }

    /// Sets the path prefix the API is served under.
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.options.base_path = base_path.into();
        self
    }

    /// Enables or disables JSONP.
    pub fn jsonp_enabled(mut self, enabled: bool) -> Self {
        self.options.jsonp_enabled = enabled;
        self
    }

    /// Sets the `Access-Control-Expose-Headers` list.
    pub fn expose_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.expose_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    /// Appends an authenticator.
    pub fn authenticator(self, authenticator: impl Authenticator) -> Self {
        self.shared_authenticator(Arc::new(authenticator))
    }

    /// Appends a shared authenticator.
    pub fn shared_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.auth.push(authenticator);
        self
    }

    /// Builds the service.
    pub fn build(self) -> ApiService {
        ApiService {
            inner: Arc::new(ServiceInner {
                dispatcher: self.dispatcher,
                options: self.options,
                auth: self.auth,
            }),
        }
    }
}
