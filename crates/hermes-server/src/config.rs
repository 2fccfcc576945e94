//! Listener settings and their derivation from [`HermesConfig`].
//!
//! ```rust
//! use hermes_server::ServerConfig;
//! use std::time::Duration;
//!
//! let config = ServerConfig::builder()
//!     .http_addr("127.0.0.1:3000")
//!     .request_timeout(Duration::from_secs(5))
//!     .build();
//! assert_eq!(config.http_addr(), "127.0.0.1:3000");
//! ```

use std::net::SocketAddr;
use std::time::Duration;

use hermes_config::HermesConfig;
use hermes_dispatch::DispatcherConfig;
use hermes_router::MatchPolicy;

/// Default bind address.
pub const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";

/// Default per-request timeout, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Default drain timeout, in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default body size limit.
pub const DEFAULT_MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Listener settings.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    http_addr: String,
    request_timeout: Duration,
    shutdown_timeout: Duration,
    max_body_bytes: usize,
    max_connections: Option<usize>,
}

impl ServerConfig {
    /// Creates a builder with defaults.
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// The configured bind address.
    #[must_use]
    pub fn http_addr(&self) -> &str {
        &self.http_addr
    }

    /// Parses the bind address.
    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.http_addr.parse()
    }

    /// Deadline for reading the body and for producing the response, each.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// How long shutdown waits for open connections.
    #[must_use]
    pub fn shutdown_timeout(&self) -> Duration {
        self.shutdown_timeout
    }

    /// Largest accepted request body.
    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    /// Connection cap, if any.
    #[must_use]
    pub fn max_connections(&self) -> Option<usize> {
        self.max_connections
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl From<&HermesConfig> for ServerConfig {
    fn from(config: &HermesConfig) -> Self {
        let server = &config.server;
        Self::builder()
            .http_addr(server.http_addr.clone())
            .request_timeout(Duration::from_secs(server.request_timeout_secs))
            .shutdown_timeout(Duration::from_secs(server.shutdown_timeout_secs))
            .max_body_bytes(server.max_body_bytes)
            .max_connections(usize::try_from(server.max_connections).ok().filter(|n| *n > 0))
            .build()
    }
}

/// Builder for [`ServerConfig`].
#[derive(Debug, Clone)]
pub struct ServerConfigBuilder {
    http_addr: String,
    request_timeout: Duration,
    shutdown_timeout: Duration,
    max_body_bytes: usize,
    max_connections: Option<usize>,
}

impl ServerConfigBuilder {
    /// Creates a builder with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            http_addr: DEFAULT_HTTP_ADDR.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            shutdown_timeout: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            max_connections: None,
        }
    }

    /// Sets the bind address.
    #[must_use]
    pub fn http_addr(mut self, addr: impl Into<String>) -> Self {
        self.http_addr = addr.into();
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the drain timeout.
    #[must_use]
    pub fn shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }

    /// Sets the body size limit.
    #[must_use]
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Caps concurrent connections.
    #[must_use]
    pub fn max_connections(mut self, max: Option<usize>) -> Self {
        self.max_connections = max;
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> ServerConfig {
        ServerConfig {
            http_addr: self.http_addr,
            request_timeout: self.request_timeout,
            shutdown_timeout: self.shutdown_timeout,
            max_body_bytes: self.max_body_bytes,
            max_connections: self.max_connections,
        }
    }
}

impl Default for ServerConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Response policy applied by [`ApiService`](crate::ApiService).
#[derive(Debug, Clone)]
pub struct ServiceOptions {
    /// Path prefix under which the API is served.
    pub base_path: String,
    /// Whether `_jsonp` callbacks are honored.
    pub jsonp_enabled: bool,
    /// Value list of `Access-Control-Expose-Headers`.
    pub expose_headers: Vec<String>,
}

impl Default for ServiceOptions {
    fn default() -> Self {
        Self {
            base_path: "/wp-json".to_string(),
            jsonp_enabled: true,
            expose_headers: vec![
                "X-WP-Total".to_string(),
                "X-WP-TotalPages".to_string(),
                "Link".to_string(),
            ],
        }
    }
}

impl From<&HermesConfig> for ServiceOptions {
    fn from(config: &HermesConfig) -> Self {
        Self {
            base_path: config.api.base_path.clone(),
            jsonp_enabled: config.api.jsonp_enabled,
            expose_headers: config.api.expose_headers.clone(),
        }
    }
}

/// Site settings for the dispatcher taken from the `api` section.
#[must_use]
pub fn dispatcher_config(config: &HermesConfig) -> DispatcherConfig {
    let api = &config.api;
    DispatcherConfig {
        name: api.name.clone(),
        description: api.description.clone(),
        base_url: api.base_url.clone(),
        help_url: api.help_url.clone(),
        match_policy: if api.strict_methods {
            MatchPolicy::Strict
        } else {
            MatchPolicy::Lenient
        },
        allow_header: api.allow_header,
        ..DispatcherConfig::default()
    }
}
