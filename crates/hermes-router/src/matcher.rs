//! Request matching.
//!
//! ```text
//! for route in table (registration order):
//!     for endpoint in route (registration order):
//!         skip unless endpoint serves method
//!         test pattern once per route             (whole path, case-insensitive)
//!         first hit wins -> (route, endpoint, captures)
//! nothing and method is HEAD -> repeat the scan for GET
//! nothing -> rest_no_route 404
//! ```

use crate::params::PathParams;
use crate::table::RouteTable;
use hermes_core::{Endpoint, Failure, MethodSet};
use http::Method;
use std::sync::Arc;

/// The winning route, endpoint and captured parameters.
#[derive(Debug, Clone)]
pub struct RouteMatch {
    /// Full pattern of the matched route.
    pub route: String,
    /// The matched endpoint.
    pub endpoint: Arc<Endpoint>,
    /// Named groups captured from the path.
    pub params: PathParams,
}

/// How a path that matches with no endpoint for the method is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Report `rest_no_route` (404), as for an unknown path.
    #[default]
    Lenient,
    /// Report `rest_method_not_allowed` (405) with the allowed methods.
    Strict,
}

impl RouteTable {
    /// Finds the first endpoint serving `method` at `path`.
    pub fn match_request(&self, method: &Method, path: &str) -> Result<RouteMatch, Failure> {
        self.match_with_policy(method, path, MatchPolicy::Lenient)
    }

    /// Finds the first endpoint serving `method` at `path` under `policy`.
    ///
    /// HEAD is answered by a GET endpoint only when no endpoint anywhere in
    /// the table serves HEAD at that path.
    pub fn match_with_policy(
        &self,
        method: &Method,
        path: &str,
        policy: MatchPolicy,
    ) -> Result<RouteMatch, Failure> {
        if let Some(found) = self.find(method, path) {
            return Ok(found);
        }
        if *method == Method::HEAD {
            if let Some(found) = self.find(&Method::GET, path) {
                return Ok(found);
            }
        }

        let path_allows = match policy {
            MatchPolicy::Lenient => MethodSet::empty(),
            MatchPolicy::Strict => self
                .routes()
                .filter(|(_, route)| route.pattern().is_match(path))
                .fold(MethodSet::empty(), |acc, (_, route)| acc.union(route.methods())),
        };
        if path_allows.is_empty() {
            Err(Failure::no_route())
        } else {
            Err(Failure::method_not_allowed(&path_allows.names()))
        }
    }

    fn find(&self, method: &Method, path: &str) -> Option<RouteMatch> {
        for (key, route) in self.routes() {
            let mut captures: Option<Option<PathParams>> = None;
            for endpoint in route.endpoints() {
                if !endpoint.methods().contains(method) {
                    continue;
                }
                match captures.get_or_insert_with(|| route.pattern().captures(path)) {
                    Some(params) => {
                        tracing::trace!(route = key, method = %method, "route matched");
                        return Some(RouteMatch {
                            route: key.to_string(),
                            endpoint: Arc::clone(endpoint),
                            params: params.clone(),
                        });
                    }
                    None => break,
                }
            }
        }
        None
    }

    /// Returns the methods served at a route, empty for an unknown key.
    #[must_use]
    pub fn allowed_methods(&self, route: &str) -> MethodSet {
        self.route(route)
            .map(crate::table::Route::methods)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{RouteOptions, RouteRegistration};
    use crate::RouteError;
    use hermes_core::{codes, handler_fn, Request};
    use http::StatusCode;
    use proptest::prelude::*;
    use serde_json::json;

    fn tagged(methods: &str, tag: &'static str) -> Endpoint {
        Endpoint::new(methods).handler(handler_fn(move |_req: &Request| Ok(json!(tag).into())))
    }

    async fn invoke(matched: &RouteMatch) -> serde_json::Value {
        let request = Request::new(Method::GET, "/");
        let handler = matched.endpoint.callback().unwrap();
        handler.invoke(&request).await.unwrap().into_response().data().clone()
    }

    #[test]
    fn test_no_route() {
        let table = RouteTable::new();
        let failure = table.match_request(&Method::GET, "/nothing").unwrap_err();
        assert_eq!(failure.code(), Some(codes::NO_ROUTE));
        assert_eq!(failure.status(), StatusCode::NOT_FOUND);
        assert_eq!(failure.records().len(), 1);
    }

    #[tokio::test]
    async fn test_first_registration_wins() {
        let mut table = RouteTable::new();
        table.register("t/v1", r"/items/(?P<id>\d+)", tagged("GET", "specific"), false).unwrap();
        table.register("t/v1", r"/items/(?P<slug>[\w]+)", tagged("GET", "generic"), false).unwrap();

        let matched = table.match_request(&Method::GET, "/t/v1/items/5").unwrap();
        assert_eq!(invoke(&matched).await, json!("specific"));
        assert_eq!(matched.params.get("id"), Some("5"));

        let matched = table.match_request(&Method::GET, "/t/v1/items/abc").unwrap();
        assert_eq!(invoke(&matched).await, json!("generic"));
    }

    #[tokio::test]
    async fn test_merge_not_replace() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/things", tagged("GET", "list"), false).unwrap();
        table.register("t/v1", "/things", tagged("POST", "create"), false).unwrap();

        let get = table.match_request(&Method::GET, "/t/v1/things").unwrap();
        let post = table.match_request(&Method::POST, "/t/v1/things").unwrap();
        assert_eq!(invoke(&get).await, json!("list"));
        assert_eq!(invoke(&post).await, json!("create"));
        assert_eq!(table.route("/t/v1/things").unwrap().endpoints().len(), 2);
    }

    #[test]
    fn test_override_replaces() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/things", tagged("GET", "list"), false).unwrap();
        table.register("t/v1", "/things", tagged("POST", "create"), true).unwrap();

        assert!(table.match_request(&Method::GET, "/t/v1/things").is_err());
        assert!(table.match_request(&Method::POST, "/t/v1/things").is_ok());
    }

    #[test]
    fn test_override_keeps_position() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/a", tagged("GET", "a"), false).unwrap();
        table.register("t/v1", "/b", tagged("GET", "b"), false).unwrap();
        table.register("t/v1", "/a", tagged("GET", "a2"), true).unwrap();

        let keys: Vec<&str> = table.routes().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["/t/v1/a", "/t/v1/b"]);
    }

    #[tokio::test]
    async fn test_method_skips_to_later_endpoint() {
        let mut table = RouteTable::new();
        table
            .register(
                "t/v1",
                "/things",
                vec![tagged("GET", "list"), tagged("DELETE", "purge")],
                false,
            )
            .unwrap();

        let matched = table.match_request(&Method::DELETE, "/t/v1/things").unwrap();
        assert_eq!(invoke(&matched).await, json!("purge"));
    }

    #[test]
    fn test_method_mismatch_is_no_route_by_default() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/things", tagged("GET", "list"), false).unwrap();

        let failure = table.match_request(&Method::PUT, "/t/v1/things").unwrap_err();
        assert_eq!(failure.code(), Some(codes::NO_ROUTE));
    }

    #[test]
    fn test_strict_policy_reports_405() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/things", tagged("GET, POST", "x"), false).unwrap();

        let failure = table
            .match_with_policy(&Method::PUT, "/t/v1/things", MatchPolicy::Strict)
            .unwrap_err();
        assert_eq!(failure.code(), Some(codes::METHOD_NOT_ALLOWED));
        assert_eq!(failure.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(
            failure.data(codes::METHOD_NOT_ALLOWED).unwrap()["allow"],
            json!(["GET", "POST"])
        );

        let failure = table
            .match_with_policy(&Method::PUT, "/t/v1/other", MatchPolicy::Strict)
            .unwrap_err();
        assert_eq!(failure.code(), Some(codes::NO_ROUTE));
    }

    #[tokio::test]
    async fn test_head_falls_back_to_get() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/things", tagged("GET", "list"), false).unwrap();

        let matched = table.match_request(&Method::HEAD, "/t/v1/things").unwrap();
        assert_eq!(invoke(&matched).await, json!("list"));
    }

    #[tokio::test]
    async fn test_explicit_head_endpoint_wins() {
        let mut table = RouteTable::new();
        table
            .register("t/v1", "/x", vec![tagged("GET", "get"), tagged("HEAD", "head")], false)
            .unwrap();

        let matched = table.match_request(&Method::HEAD, "/t/v1/x").unwrap();
        assert_eq!(invoke(&matched).await, json!("head"));
        let matched = table.match_request(&Method::GET, "/t/v1/x").unwrap();
        assert_eq!(invoke(&matched).await, json!("get"));
    }

    #[tokio::test]
    async fn test_head_on_later_route_beats_earlier_get() {
        let mut table = RouteTable::new();
        table.register("t/v1", r"/files/(?P<id>\d+)", tagged("GET", "get"), false).unwrap();
        table.register("t/v1", r"/files/(?P<name>[\w]+)", tagged("HEAD", "head"), false).unwrap();

        let matched = table.match_request(&Method::HEAD, "/t/v1/files/7").unwrap();
        assert_eq!(invoke(&matched).await, json!("head"));
        assert_eq!(matched.params.get("name"), Some("7"));
    }

    #[test]
    fn test_head_without_get_is_no_route() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/x", tagged("POST", "create"), false).unwrap();

        let failure = table.match_request(&Method::HEAD, "/t/v1/x").unwrap_err();
        assert_eq!(failure.code(), Some(codes::NO_ROUTE));
    }

    #[test]
    fn test_malformed_pattern_is_skipped() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/bad/(?P<id>[\\d+", tagged("GET", "bad"), false).unwrap();
        table.register("t/v1", "/bad/(?P<id>\\d+)", tagged("GET", "good"), false).unwrap();

        let matched = table.match_request(&Method::GET, "/t/v1/bad/1").unwrap();
        assert_eq!(matched.route, "/t/v1/bad/(?P<id>\\d+)");
    }

    #[test]
    fn test_namespace_index_synthesized_once() {
        let factory: crate::IndexFactory = Arc::new(|ns: &str| tagged("GET", "index").arg(
            "namespace",
            hermes_core::ArgSpec::new().with_default(json!(ns)),
        ));
        let mut table = RouteTable::with_index_factory(factory);
        table.register("wp/v2", "/posts", tagged("GET", "posts"), false).unwrap();
        table.register("wp/v2", "/pages", tagged("GET", "pages"), false).unwrap();

        let keys: Vec<&str> = table.routes().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["/wp/v2", "/wp/v2/posts", "/wp/v2/pages"]);
        assert_eq!(table.namespaces(), vec!["wp/v2"]);
        assert_eq!(table.route("/wp/v2").unwrap().endpoints().len(), 1);
        assert_eq!(table.namespace_routes("wp/v2").count(), 3);
    }

    #[test]
    fn test_route_options_stored_separately() {
        let mut table = RouteTable::new();
        let registration = RouteRegistration::new()
            .endpoint(tagged("GET", "x"))
            .options(RouteOptions::new().option("tag", "docs"))
            .schema(|| json!({ "title": "thing" }));
        table.register("t/v1", "/things", registration, false).unwrap();

        let options = table.route_options("/t/v1/things").unwrap();
        assert_eq!(options.namespace(), Some("t/v1"));
        assert_eq!(options.get("tag"), Some(&json!("docs")));
        assert_eq!(options.schema_provider().map(|p| p()), Some(json!({ "title": "thing" })));
        assert_eq!(table.route("/t/v1/things").unwrap().endpoints().len(), 1);
    }

    #[test]
    fn test_registration_errors() {
        let mut table = RouteTable::new();
        assert_eq!(
            table.register("/", "/x", tagged("GET", "x"), false),
            Err(RouteError::EmptyNamespace { pattern: "x".into() })
        );
        assert_eq!(
            table.register("t/v1", "/", tagged("GET", "x"), false),
            Err(RouteError::EmptyPattern { namespace: "t/v1".into() })
        );
        assert_eq!(
            table.register("t/v1", "/x", RouteRegistration::new(), false),
            Err(RouteError::NoEndpoints { route: "/t/v1/x".into() })
        );
    }

    #[test]
    fn test_allowed_methods() {
        let mut table = RouteTable::new();
        table.register("t/v1", "/x", vec![tagged("GET", "a"), tagged("DELETE", "b")], false).unwrap();
        assert_eq!(table.allowed_methods("/t/v1/x").names(), vec!["GET", "DELETE"]);
        assert!(table.allowed_methods("/nope").is_empty());
    }

    proptest! {
        #[test]
        fn test_earliest_matching_route_wins(count in 1usize..8, target in 0usize..8, generic_first: bool) {
            let generic = r"/(?P<any>r\d+)/(?P<id>\d+)";
            let mut table = RouteTable::new();
            if generic_first {
                table.register("p/v1", generic, Endpoint::new("GET"), false).unwrap();
            }
            for i in 0..count {
                table.register("p/v1", &format!("/r{i}/(?P<id>\\d+)"), Endpoint::new("GET"), false).unwrap();
            }
            table.register("p/v1", generic, Endpoint::new("GET"), false).unwrap();

            let target = target % count;
            let matched = table.match_request(&Method::GET, &format!("/p/v1/r{target}/3")).unwrap();
            let expected = if generic_first {
                format!("/p/v1{generic}")
            } else {
                format!("/p/v1/r{target}/(?P<id>\\d+)")
            };
            prop_assert_eq!(matched.route, expected);
        }
    }
}
