//! Fixed-order request pipeline.
//!
//! Every matched request runs the same stages in the same order. The first
//! stage to fail ends the pipeline with its [`Failure`]; nothing after it
//! runs.
//!
//! ## Stages
//!
//! 1. **Binding** - Bind the endpoint and captured path parameters, parse a JSON body
//! 2. **Sanitization** - Replace supplied values with their sanitized form
//! 3. **Defaults** - Inject defaults for absent arguments
//! 4. **Validation** - Required arguments first, then choices and validators
//! 5. **Permission** - Run the endpoint's permission check
//! 6. **Post-match hooks** - May replace the handler's result
//! 7. **Invocation** - Call the handler
//!
//! Normalization into a [`Response`](hermes_core::Response) happens in the
//! dispatcher, for replaced and computed results alike.

use crate::hooks::HookChain;
use hermes_core::{Failure, HandlerResult, ParamMap, ParamSource, Request};
use hermes_router::RouteMatch;
use indexmap::IndexMap;
use std::sync::Arc;

/// Sources a sanitizer rewrites in place.
const SANITIZED_SOURCES: [ParamSource; 4] = [
    ParamSource::Url,
    ParamSource::Json,
    ParamSource::Body,
    ParamSource::Query,
];

/// A pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Endpoint and parameter binding.
    Binding,
    /// Argument sanitization.
    Sanitization,
    /// Default injection.
    Defaults,
    /// Required-argument and validator checks.
    Validation,
    /// Permission check.
    Permission,
    /// Post-match override hooks.
    PostMatch,
    /// Handler invocation.
    Invocation,
}

impl Stage {
    /// Every stage in execution order.
    pub const ALL: [Self; 7] = [
        Self::Binding,
        Self::Sanitization,
        Self::Defaults,
        Self::Validation,
        Self::Permission,
        Self::PostMatch,
        Self::Invocation,
    ];

    /// Stage name used in logs.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Binding => "binding",
            Self::PostMatch => "post_match",
            Self::Sanitization => "sanitization",
            Self::Defaults => "defaults",
            Self::Validation => "validation",
            Self::Permission => "permission",
            Self::Invocation => "invocation",
        }
    }
}

/// Runs every stage for a matched request.
pub(crate) async fn run(request: &mut Request, matched: &RouteMatch, hooks: &HookChain) -> HandlerResult {
    bind(request, matched).map_err(|f| short_circuit(Stage::Binding, f))?;
    sanitize(request).map_err(|f| short_circuit(Stage::Sanitization, f))?;
    apply_defaults(request);
    validate(request).map_err(|f| short_circuit(Stage::Validation, f))?;
    check_permission(request)
        .await
        .map_err(|f| short_circuit(Stage::Permission, f))?;

    if let Some(result) = hooks.post_match(request, matched).await {
        return result;
    }

    let endpoint = Arc::clone(&matched.endpoint);
    let Some(handler) = endpoint.callback() else {
        return Err(short_circuit(Stage::Invocation, Failure::invalid_handler()));
    };
    tracing::trace!(route = %matched.route, "invoking handler");
    handler.invoke(request).await
}

fn short_circuit(stage: Stage, failure: Failure) -> Failure {
    tracing::debug!(
        stage = stage.name(),
        code = failure.code().unwrap_or_default(),
        status = failure.status().as_u16(),
        "pipeline short-circuited"
    );
    failure
}

fn bind(request: &mut Request, matched: &RouteMatch) -> Result<(), Failure> {
    request.set_params(ParamSource::Url, matched.params.to_param_map());
    request.set_attributes(Arc::clone(&matched.endpoint));
    if matched.endpoint.accepts_raw() {
        request.set_params(ParamSource::Body, ParamMap::new());
    } else if matched.endpoint.accepts_json() {
        request.parse_json_body()?;
    }
    Ok(())
}

fn sanitize(request: &mut Request) -> Result<(), Failure> {
    let Some(endpoint) = request.attributes().cloned() else {
        return Ok(());
    };
    let mut invalid: IndexMap<String, String> = IndexMap::new();

    for (name, spec) in endpoint.args() {
        if !spec.has_sanitizer() {
            continue;
        }
        for source in SANITIZED_SOURCES {
            let Some(raw) = request.params_from(source).get(name).cloned() else {
                continue;
            };
            match spec.apply_sanitizer(&raw, request, name) {
                Ok(clean) => {
                    request.params_from_mut(source).insert(name.clone(), clean);
                }
                Err(failure) => {
                    let reason = failure.message().unwrap_or("Invalid parameter.").to_string();
                    invalid.entry(name.clone()).or_insert(reason);
                }
            }
        }
    }

    if invalid.is_empty() {
        Ok(())
    } else {
        Err(Failure::invalid_params(&invalid))
    }
}

fn apply_defaults(request: &mut Request) {
    let Some(endpoint) = request.attributes().cloned() else {
        return;
    };
    for (name, spec) in endpoint.args() {
        if let Some(default) = spec.default_value() {
            if !request.has_param(name) {
                request
                    .params_from_mut(ParamSource::Defaults)
                    .insert(name.clone(), default.clone());
            }
        }
    }
}

fn validate(request: &Request) -> Result<(), Failure> {
    let Some(endpoint) = request.attributes() else {
        return Ok(());
    };

    let missing: Vec<String> = endpoint
        .args()
        .iter()
        .filter(|(name, spec)| spec.is_required() && !request.has_param(name))
        .map(|(name, _)| name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(Failure::missing_params(&missing));
    }

    let mut invalid: IndexMap<String, String> = IndexMap::new();
    for (name, spec) in endpoint.args() {
        if let Some(value) = request.param(name) {
            if let Err(reason) = spec.check(value, request, name) {
                invalid.insert(name.clone(), reason);
            }
        }
    }
    if invalid.is_empty() {
        Ok(())
    } else {
        Err(Failure::invalid_params(&invalid))
    }
}

async fn check_permission(request: &Request) -> Result<(), Failure> {
    let Some(check) = request.attributes().and_then(|e| e.permission_check()).cloned() else {
        return Ok(());
    };
    match check.allowed(request).await {
        Ok(true) => Ok(()),
        Ok(false) => Err(Failure::forbidden()),
        Err(failure) => Err(failure),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use hermes_core::args::sanitize;
    use crate::hooks::{DispatchHook, Flow};
    use hermes_core::{codes, handler_fn, permission_fn, ArgSpec, BoxFuture, Endpoint, Reply};
    use hermes_router::PathParams;
    use http::{Method, StatusCode};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn matched(endpoint: Endpoint, params: PathParams) -> RouteMatch {
        RouteMatch {
            route: "/t/v1/things".to_string(),
            endpoint: Arc::new(endpoint),
            params,
        }
    }

    fn echo() -> Endpoint {
        Endpoint::new("GET, POST").handler(handler_fn(|req: &Request| {
            Ok(Reply::Data(Value::Object(req.params())))
        }))
    }

    /// Replaces every handler result, recording the `page` it saw.
    struct Cached {
        seen: Arc<parking_lot::Mutex<Option<Value>>>,
    }

    impl DispatchHook for Cached {
        fn post_match<'a>(&'a self, request: &'a Request, _matched: &'a RouteMatch) -> BoxFuture<'a, Flow> {
            *self.seen.lock() = request.param("page").cloned();
            Box::pin(std::future::ready(Flow::Replace(Ok(json!("cached").into()))))
        }
    }

    fn cached() -> (HookChain, Arc<parking_lot::Mutex<Option<Value>>>) {
        let seen = Arc::new(parking_lot::Mutex::new(None));
        let hook: Arc<dyn DispatchHook> = Arc::new(Cached { seen: Arc::clone(&seen) });
        (HookChain::new(vec![hook]), seen)
    }

    fn data(result: HandlerResult) -> Value {
        result.unwrap().into_response().data().clone()
    }

    #[test]
    fn test_stage_order() {
        let names: Vec<&str> = Stage::ALL.iter().map(Stage::name).collect();
        assert_eq!(
            names,
            vec!["binding", "sanitization", "defaults", "validation", "permission", "post_match", "invocation"]
        );
    }

    #[tokio::test]
    async fn test_binds_path_params_and_attributes() {
        let mut params = PathParams::new();
        params.push("id", "7");
        let m = matched(echo(), params);
        let mut request = Request::new(Method::GET, "/t/v1/things/7");

        let out = data(run(&mut request, &m, &HookChain::default()).await);
        assert_eq!(out["id"], json!("7"));
        assert!(request.attributes().is_some());
    }

    #[tokio::test]
    async fn test_sanitizer_rewrites_value() {
        let endpoint = echo().arg("page", ArgSpec::new().sanitize(sanitize::integer));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/").with_query("page", "3");

        let out = data(run(&mut request, &m, &HookChain::default()).await);
        assert_eq!(out["page"], json!(3));
    }

    #[tokio::test]
    async fn test_sanitizer_failure_is_400() {
        let endpoint = echo().arg("page", ArgSpec::new().sanitize(sanitize::integer));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/").with_query("page", "three");

        let failure = run(&mut request, &m, &HookChain::default()).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::INVALID_PARAM));
        assert_eq!(failure.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            failure.data(codes::INVALID_PARAM).unwrap()["params"]["page"],
            json!("page is not of type integer.")
        );
    }

    #[tokio::test]
    async fn test_defaults_fill_absent_only() {
        let endpoint = echo()
            .arg("context", ArgSpec::new().with_default(json!("view")))
            .arg("per_page", ArgSpec::new().with_default(json!(10)));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/").with_query("per_page", 5);

        let out = data(run(&mut request, &m, &HookChain::default()).await);
        assert_eq!(out["context"], json!("view"));
        assert_eq!(out["per_page"], json!(5));
    }

    #[tokio::test]
    async fn test_required_missing_never_invokes_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = Arc::clone(&calls);
        let endpoint = Endpoint::new("POST")
            .handler(handler_fn(move |_req: &Request| {
                spy.fetch_add(1, Ordering::SeqCst);
                Ok(json!(null).into())
            }))
            .arg("title", ArgSpec::new().required())
            .arg("status", ArgSpec::new().required());
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::POST, "/");

        let failure = run(&mut request, &m, &HookChain::default()).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::MISSING_PARAM));
        assert_eq!(failure.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            failure.data(codes::MISSING_PARAM).unwrap()["params"],
            json!(["title", "status"])
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_required_satisfied_by_default() {
        let endpoint = echo().arg("context", ArgSpec::new().required().with_default(json!("view")));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/");
        assert!(run(&mut request, &m, &HookChain::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_choices_reject() {
        let endpoint = echo().arg("context", ArgSpec::new().choices(["view", "edit"]));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/").with_query("context", "nope");

        let failure = run(&mut request, &m, &HookChain::default()).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::INVALID_PARAM));
    }

    #[tokio::test]
    async fn test_permission_false_is_403_and_skips_handler() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = Arc::clone(&calls);
        let endpoint = Endpoint::new("GET")
            .handler(handler_fn(move |_req: &Request| {
                spy.fetch_add(1, Ordering::SeqCst);
                Ok(json!(null).into())
            }))
            .permission(permission_fn(|_req: &Request| Ok(false)));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/");

        let failure = run(&mut request, &m, &HookChain::default()).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::FORBIDDEN));
        assert_eq!(failure.status(), StatusCode::FORBIDDEN);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_permission_failure_propagates_status() {
        let endpoint = echo().permission(permission_fn(|_req: &Request| {
            Err(Failure::with_status("rest_cannot_edit", "Nope", StatusCode::UNAUTHORIZED))
        }));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/");

        let failure = run(&mut request, &m, &HookChain::default()).await.unwrap_err();
        assert_eq!(failure.code(), Some("rest_cannot_edit"));
        assert_eq!(failure.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_permission_true_invokes() {
        let endpoint = echo().permission(permission_fn(|_req: &Request| Ok(true)));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/");
        assert!(run(&mut request, &m, &HookChain::default()).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_handler_is_invalid_handler() {
        let m = matched(Endpoint::new("GET"), PathParams::new());
        let mut request = Request::new(Method::GET, "/");

        let failure = run(&mut request, &m, &HookChain::default()).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::INVALID_HANDLER));
        assert_eq!(failure.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_invalid_json_body() {
        let m = matched(echo(), PathParams::new());
        let mut request = Request::new(Method::POST, "/");
        request.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        request.set_body(Bytes::from_static(b"{"));

        let failure = run(&mut request, &m, &HookChain::default()).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::INVALID_JSON));
    }

    #[tokio::test]
    async fn test_raw_endpoint_keeps_body_out_of_params() {
        let endpoint = Endpoint::new("POST")
            .accept_raw(true)
            .handler(handler_fn(|req: &Request| {
                Ok(json!({
                    "raw": String::from_utf8_lossy(req.body()),
                    "params": Value::Object(req.params()),
                })
                .into())
            }));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::POST, "/").with_query("q", "1");
        request.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        request.set_body(Bytes::from_static(b"{not json"));
        let mut form = ParamMap::new();
        form.insert("title".to_string(), json!("ignored"));
        request.set_params(ParamSource::Body, form);

        let out = data(run(&mut request, &m, &HookChain::default()).await);
        assert_eq!(out["raw"], json!("{not json"));
        assert_eq!(out["params"], json!({ "q": "1" }));
    }

    #[tokio::test]
    async fn test_json_ignored_when_endpoint_declines() {
        let m = matched(echo().accept_json(false), PathParams::new());
        let mut request = Request::new(Method::POST, "/").with_json(&json!({ "a": 1 }));

        let out = data(run(&mut request, &m, &HookChain::default()).await);
        assert!(out.get("a").is_none());
    }

    #[tokio::test]
    async fn test_post_match_replacement_cannot_bypass_permission() {
        let (hooks, seen) = cached();
        let endpoint = echo().permission(permission_fn(|_req: &Request| Ok(false)));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/");

        let failure = run(&mut request, &m, &hooks).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::FORBIDDEN));
        assert_eq!(failure.status(), StatusCode::FORBIDDEN);
        assert!(seen.lock().is_none());
    }

    #[tokio::test]
    async fn test_post_match_replacement_cannot_bypass_validation() {
        let (hooks, _seen) = cached();
        let endpoint = echo().arg("title", ArgSpec::new().required());
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::POST, "/");

        let failure = run(&mut request, &m, &hooks).await.unwrap_err();
        assert_eq!(failure.code(), Some(codes::MISSING_PARAM));
    }

    #[tokio::test]
    async fn test_post_match_replaces_handler_after_checks() {
        let calls = Arc::new(AtomicUsize::new(0));
        let spy = Arc::clone(&calls);
        let (hooks, seen) = cached();
        let endpoint = Endpoint::new("GET")
            .handler(handler_fn(move |_req: &Request| {
                spy.fetch_add(1, Ordering::SeqCst);
                Ok(json!("fresh").into())
            }))
            .arg("page", ArgSpec::new().with_default(json!(1)).sanitize(sanitize::integer))
            .permission(permission_fn(|_req: &Request| Ok(true)));
        let m = matched(endpoint, PathParams::new());
        let mut request = Request::new(Method::GET, "/").with_query("page", "4");

        let out = data(run(&mut request, &m, &hooks).await);
        assert_eq!(out, json!("cached"));
        assert_eq!(*seen.lock(), Some(json!(4)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
