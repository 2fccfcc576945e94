//! Discovery endpoints: the root index at `/` and one index per namespace.

use crate::dispatcher::{Dispatcher, DispatcherConfig, Inner};
use hermes_core::{ArgSpec, BoxFuture, Endpoint, Failure, Handler, HandlerResult, Link, ParamMap, Request, Response};
use hermes_router::Route;
use serde_json::{json, Value};
use std::sync::{Arc, Weak};

pub(crate) fn root_endpoint(inner: Weak<Inner>) -> Endpoint {
    Endpoint::new("GET")
        .handler(RootIndex { inner })
        .arg("context", ArgSpec::new().with_default(json!("view")))
}

pub(crate) fn namespace_endpoint(inner: Weak<Inner>, namespace: &str) -> Endpoint {
    Endpoint::new("GET")
        .handler(NamespaceIndex { inner })
        .arg("namespace", ArgSpec::new().with_default(json!(namespace)))
        .arg("context", ArgSpec::new().with_default(json!("view")))
}

/// Handlers hold a weak reference since they live inside the table they
/// describe.
fn upgrade(inner: &Weak<Inner>) -> Result<Dispatcher, Failure> {
    inner
        .upgrade()
        .map(Dispatcher::from_inner)
        .ok_or_else(Failure::invalid_handler)
}

struct RootIndex {
    inner: Weak<Inner>,
}

impl RootIndex {
    fn index(&self, request: &Request) -> HandlerResult {
        let dispatcher = upgrade(&self.inner)?;
        let config = dispatcher.config();
        let help = request.context() == Some("help");

        let (namespaces, routes) = {
            let table = dispatcher.inner_routes();
            let namespaces: Vec<String> = table.namespaces().into_iter().map(str::to_string).collect();
            (namespaces, route_data(config, table.routes(), help))
        };

        let mut response = Response::new(json!({
            "name": config.name,
            "description": config.description,
            "url": config.base_url,
            "namespaces": namespaces,
            "authentication": config.authentication,
            "routes": routes,
        }));
        if let Some(help_url) = &config.help_url {
            response.add_link("help", Link::new(help_url.clone()));
        }
        Ok(response.into())
    }
}

impl Handler for RootIndex {
    fn invoke<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, HandlerResult> {
        Box::pin(std::future::ready(self.index(request)))
    }
}

struct NamespaceIndex {
    inner: Weak<Inner>,
}

impl NamespaceIndex {
    fn index(&self, request: &Request) -> HandlerResult {
        let dispatcher = upgrade(&self.inner)?;
        let config = dispatcher.config();
        let help = request.context() == Some("help");
        let Some(namespace) = request.param_str("namespace").map(str::to_string) else {
            return Err(Failure::invalid_namespace());
        };

        let routes = {
            let table = dispatcher.inner_routes();
            if !table.has_namespace(&namespace) {
                return Err(Failure::invalid_namespace());
            }
            route_data(config, table.namespace_routes(&namespace), help)
        };

        let response = Response::new(json!({
            "namespace": namespace,
            "routes": routes,
        }))
        .with_link("up", Link::new(config.url_for("/")));
        Ok(response.into())
    }
}

impl Handler for NamespaceIndex {
    fn invoke<'a>(&'a self, request: &'a Request) -> BoxFuture<'a, HandlerResult> {
        Box::pin(std::future::ready(self.index(request)))
    }
}

/// Describes routes keyed by display pattern, skipping hidden endpoints.
fn route_data<'r>(
    config: &DispatcherConfig,
    routes: impl Iterator<Item = (&'r str, &'r Route)>,
    help: bool,
) -> ParamMap {
    let mut out = ParamMap::new();

    for (key, route) in routes {
        let visible: Vec<&Arc<Endpoint>> = route
            .endpoints()
            .iter()
            .filter(|e| e.show_in_index())
            .collect();
        if visible.is_empty() {
            continue;
        }

        let mut methods: Vec<&'static str> = Vec::new();
        let mut endpoints = Vec::with_capacity(visible.len());
        for endpoint in &visible {
            let names = endpoint.methods().names();
            for name in &names {
                if !methods.contains(name) {
                    methods.push(*name);
                }
            }
            let args: ParamMap = endpoint
                .args()
                .iter()
                .map(|(name, spec)| (name.clone(), spec.describe()))
                .collect();
            endpoints.push(json!({ "methods": names, "args": args }));
        }

        let display = route.pattern().display();
        let mut entry = ParamMap::new();
        entry.insert(
            "namespace".to_string(),
            json!(route.options().namespace().unwrap_or_default()),
        );
        entry.insert("methods".to_string(), json!(methods));
        entry.insert("endpoints".to_string(), Value::Array(endpoints));
        if help {
            if let Some(schema) = route.options().schema_provider() {
                entry.insert("schema".to_string(), schema());
            }
        }
        if !route.pattern().has_placeholders() {
            entry.insert(
                "_links".to_string(),
                json!({ "self": [{ "href": config.url_for(&display) }] }),
            );
        }

        let name = if out.contains_key(&display) {
            key.to_string()
        } else {
            display
        };
        out.insert(name, Value::Object(entry));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use hermes_core::{codes, handler_fn};
    use hermes_router::RouteRegistration;
    use http::{Method, StatusCode};

    fn dispatcher() -> Dispatcher {
        Dispatcher::builder()
            .name("Test Site")
            .description("Just testing")
            .base_url("http://example.test/wp-json")
            .help_url("https://example.test/help")
            .authentication("bearer", json!({ "header": "Authorization" }))
            .build()
    }

    fn list() -> Endpoint {
        Endpoint::new("GET")
            .handler(handler_fn(|_req: &Request| Ok(json!([]).into())))
            .arg("page", ArgSpec::new().with_default(json!(1)).description("Page."))
    }

    fn create() -> Endpoint {
        Endpoint::new("POST")
            .handler(handler_fn(|_req: &Request| Ok(json!({}).into())))
            .arg("title", ArgSpec::new().required())
    }

    async fn get(d: &Dispatcher, route: &str) -> Response {
        let mut request = Request::new(Method::GET, route);
        d.dispatch(&mut request).await
    }

    #[tokio::test]
    async fn test_namespace_index_created_once() {
        let d = dispatcher();
        d.register("wp/v2", "/posts", list(), false).unwrap();
        d.register("wp/v2", "/pages", list(), false).unwrap();

        let routes = d.routes();
        let index = routes.route("/wp/v2").unwrap();
        assert_eq!(index.endpoints().len(), 1);

        let response = get(&d, "/wp/v2").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.data()["namespace"], json!("wp/v2"));
        let keys: Vec<&String> = response.data()["routes"].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["/wp/v2", "/wp/v2/posts", "/wp/v2/pages"]);
        assert_eq!(
            response.links()["up"][0].href,
            "http://example.test/wp-json/".to_string()
        );
    }

    #[tokio::test]
    async fn test_root_index() {
        let d = dispatcher();
        d.register("wp/v2", "/posts", vec![list(), create()], false).unwrap();
        d.register("demo/v1", "/ping", list(), false).unwrap();

        let response = get(&d, "/").await;
        let data = response.data();
        assert_eq!(data["name"], json!("Test Site"));
        assert_eq!(data["description"], json!("Just testing"));
        assert_eq!(data["url"], json!("http://example.test/wp-json"));
        assert_eq!(data["namespaces"], json!(["wp/v2", "demo/v1"]));
        assert_eq!(data["authentication"]["bearer"]["header"], json!("Authorization"));

        let posts = &data["routes"]["/wp/v2/posts"];
        assert_eq!(posts["namespace"], json!("wp/v2"));
        assert_eq!(posts["methods"], json!(["GET", "POST"]));
        assert_eq!(
            posts["endpoints"][0]["args"]["page"],
            json!({ "required": false, "default": 1, "description": "Page." })
        );
        assert_eq!(posts["endpoints"][1]["args"]["title"], json!({ "required": true }));
        assert_eq!(
            posts["_links"]["self"][0]["href"],
            json!("http://example.test/wp-json/wp/v2/posts")
        );
        assert_eq!(data["routes"]["/"]["namespace"], json!(""));
        assert_eq!(response.links()["help"][0].href, "https://example.test/help");
    }

    #[tokio::test]
    async fn test_placeholder_routes_have_no_self_link() {
        let d = dispatcher();
        d.register("wp/v2", r"/posts/(?P<id>[\d]+)", list(), false).unwrap();

        let response = get(&d, "/wp/v2").await;
        let entry = &response.data()["routes"]["/wp/v2/posts/{id}"];
        assert!(entry.is_object());
        assert!(entry.get("_links").is_none());
    }

    #[tokio::test]
    async fn test_hidden_endpoints_skipped() {
        let d = dispatcher();
        d.register("wp/v2", "/secret", list().hidden(), false).unwrap();
        d.register("wp/v2", "/mixed", vec![list(), create().hidden()], false).unwrap();

        let response = get(&d, "/wp/v2").await;
        let routes = response.data()["routes"].as_object().unwrap();
        assert!(!routes.contains_key("/wp/v2/secret"));
        assert_eq!(routes["/wp/v2/mixed"]["methods"], json!(["GET"]));
    }

    #[tokio::test]
    async fn test_schema_only_with_help_context() {
        let d = dispatcher();
        d.register(
            "wp/v2",
            "/posts",
            RouteRegistration::from(list()).schema(|| json!({ "title": "post" })),
            false,
        )
        .unwrap();

        let plain = get(&d, "/wp/v2").await;
        assert!(plain.data()["routes"]["/wp/v2/posts"].get("schema").is_none());

        let mut request = Request::new(Method::GET, "/wp/v2").with_query("context", "help");
        let help = d.dispatch(&mut request).await;
        assert_eq!(
            help.data()["routes"]["/wp/v2/posts"]["schema"],
            json!({ "title": "post" })
        );
    }

    #[tokio::test]
    async fn test_unknown_namespace_argument() {
        let d = dispatcher();
        d.register("wp/v2", "/posts", list(), false).unwrap();

        let mut request = Request::new(Method::GET, "/wp/v2").with_query("namespace", "nope/v1");
        let response = d.dispatch(&mut request).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(response.data()[0]["code"], json!(codes::INVALID_NAMESPACE));
    }

    #[tokio::test]
    async fn test_display_collision_falls_back_to_raw_key() {
        let d = dispatcher();
        d.register("wp/v2", r"/items/(?P<id>\d+)", list(), false).unwrap();
        d.register("wp/v2", r"/items/(?P<id>[\w-]+)", list(), false).unwrap();

        let response = get(&d, "/wp/v2").await;
        let routes = response.data()["routes"].as_object().unwrap();
        assert!(routes.contains_key("/wp/v2/items/{id}"));
        assert!(routes.contains_key(r"/wp/v2/items/(?P<id>[\w-]+)"));
    }
}
