//! # Hermes Server
//!
//! Serves a [`hermes_dispatch::Dispatcher`] over HTTP/1.
//!
//! [`ApiService`] translates between `http` requests and Hermes requests:
//! it resolves the route (from the path below the base path, or from the
//! `rest_route` query parameter), honors method overrides, decodes query
//! and form parameters, runs authenticators, then shapes and encodes the
//! dispatcher's response (`_embed`, `_envelope`, `_jsonp`).
//!
//! [`Server`] runs an [`ApiService`] behind a hyper accept loop with body
//! limits, timeouts and graceful shutdown.
//!
//! ```rust,ignore
//! use hermes_config::ConfigLoader;
//! use hermes_dispatch::Dispatcher;
//! use hermes_server::{dispatcher_config, ApiService, Server, ServerConfig};
//!
//! let config = ConfigLoader::new().with_dotenv().with_optional_file("hermes.toml")?.load()?;
//! let dispatcher = Dispatcher::builder().config(dispatcher_config(&config)).build();
//! // register routes...
//!
//! let service = ApiService::builder(dispatcher).config(&config).build();
//! Server::new(ServerConfig::from(&config), service).run().await?;
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod auth;
mod config;
mod error;
mod server;
mod service;
pub mod shutdown;
pub mod transport;

pub use auth::{AuthOutcome, Authenticator, BearerTokenAuthenticator, INVALID_TOKEN};
pub use config::{
    dispatcher_config, ServerConfig, ServerConfigBuilder, ServiceOptions, DEFAULT_HTTP_ADDR,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SHUTDOWN_TIMEOUT_SECS,
};
pub use error::ServerError;
pub use server::{Server, BODY_READ_ERROR, BODY_TOO_LARGE, REQUEST_TIMEOUT, RESPONSE_TIMEOUT};
pub use service::{
    ApiService, ApiServiceBuilder, HttpResponse, ResponseBody, EMBED_PARAM, ENVELOPE_PARAM,
    JSONP_PARAM,
};
pub use shutdown::{ConnectionTracker, ShutdownSignal};
