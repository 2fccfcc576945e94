//! # Hermes
//!
//! A hypermedia REST dispatcher: namespaced regex routes, a fixed request
//! pipeline, `_links`/`_embedded` shaping and self-describing discovery
//! indexes, served over hyper.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use hermes::prelude::*;
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConfigLoader::new().with_dotenv().with_optional_file("hermes.toml")?.load()?;
//!     let dispatcher = hermes::dispatcher(&config);
//!
//!     dispatcher.register(
//!         "demo/v1",
//!         r"/greetings/(?P<name>[\w-]+)",
//!         Endpoint::new("GET").handler(handler_fn(|req: &Request| {
//!             Ok(json!({ "hello": req.param_str("name") }).into())
//!         })),
//!         false,
//!     )?;
//!
//!     let service = ApiService::builder(dispatcher).config(&config).build();
//!     hermes::run(&config, service).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! http::Request -> ApiService (transport, JSONP guard, authenticators)
//!               -> Dispatcher (hooks, match, pipeline, post-dispatch)
//!               -> ResponseShaper (_links, _embed, _envelope)
//!               -> http::Response
//! ```

#![doc(html_root_url = "https://docs.rs/hermes/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub use hermes_config as config;
pub use hermes_core as core;
pub use hermes_dispatch as dispatch;
pub use hermes_router as router;
pub use hermes_server as server;
pub use hermes_telemetry as telemetry;

use hermes_config::HermesConfig;
use hermes_dispatch::Dispatcher;
use hermes_server::{dispatcher_config, ApiService, Server, ServerConfig, ServerError};

/// Creates a dispatcher with the site settings of `config`.
#[must_use]
pub fn dispatcher(config: &HermesConfig) -> Dispatcher {
    Dispatcher::builder().config(dispatcher_config(config)).build()
}

/// Initializes telemetry from `config`, then serves `service` until
/// SIGTERM or SIGINT.
///
/// Telemetry that is already initialized in this process is left as is.
pub async fn run(config: &HermesConfig, service: ApiService) -> Result<(), ServerError> {
    if let Err(e) = hermes_telemetry::init_telemetry(&config.telemetry_config()) {
        match e {
            hermes_telemetry::TelemetryError::LoggingInit(_) => {
                tracing::debug!(error = %e, "logging already initialized");
            }
            other => return Err(other.into()),
        }
    }
    tracing::info!(
        name = %config.api.name,
        base_path = %config.api.base_path,
        routes = service.dispatcher().routes().len(),
        "starting hermes"
    );
    Server::new(ServerConfig::from(config), service).run().await
}

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use hermes::prelude::*;
/// ```
pub mod prelude {
    pub use hermes_core::args::sanitize;
    pub use hermes_core::{
        async_handler_fn, codes, handler_fn, permission_fn, ArgSpec, Authenticated, Endpoint,
        Failure, Handler, HandlerResult, Identity, Link, MethodSet, ParamSource, PermissionCheck,
        Request, RequireRole, Response,
    };

    pub use hermes_router::{MatchPolicy, RouteOptions, RouteRegistration};

    pub use hermes_dispatch::{
        failure_to_response, response_filter, DispatchHook, Dispatcher, DispatcherConfig, Flow,
        ResponseShaper,
    };

    pub use hermes_server::{
        ApiService, AuthOutcome, Authenticator, BearerTokenAuthenticator, Server, ServerConfig,
        ShutdownSignal,
    };

    pub use hermes_config::{ConfigLoader, HermesConfig};
}
