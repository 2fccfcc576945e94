//! Configuration section types.

use serde::{Deserialize, Serialize};

/// HTTP server section.
///
/// # Example
///
/// ```
/// use hermes_config::ServerSection;
///
/// let server = ServerSection {
///     http_addr: "127.0.0.1:3000".to_string(),
///     ..Default::default()
/// };
/// assert_eq!(server.request_timeout_secs, 30);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSection {
    /// Bind address (e.g. "0.0.0.0:8080").
    #[serde(default = "default_http_addr")]
    pub http_addr: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Drain timeout for graceful shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,

    /// Largest accepted request body. Larger bodies get 413.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Maximum number of concurrent connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            http_addr: default_http_addr(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
            max_body_bytes: default_max_body_bytes(),
            max_connections: default_max_connections(),
        }
    }
}

fn default_http_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

fn default_shutdown_timeout() -> u64 {
    30
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_max_connections() -> u32 {
    10000
}

/// API surface section: site metadata and response policy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ApiSection {
    /// Site name shown by the root index.
    #[serde(default = "default_name")]
    pub name: String,

    /// Site description shown by the root index.
    #[serde(default)]
    pub description: String,

    /// Absolute URL of the API root, used for links.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path prefix stripped from incoming request paths.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Whether `_jsonp` callbacks are honored.
    #[serde(default = "default_true")]
    pub jsonp_enabled: bool,

    /// Value of `Access-Control-Expose-Headers`.
    #[serde(default = "default_expose_headers")]
    pub expose_headers: Vec<String>,

    /// Whether responses carry an `Allow` header for the matched route.
    #[serde(default = "default_true")]
    pub allow_header: bool,

    /// Report a path served only for other methods as 405 instead of 404.
    #[serde(default)]
    pub strict_methods: bool,

    /// Target of the root index `help` link.
    #[serde(default)]
    pub help_url: Option<String>,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            name: default_name(),
            description: String::new(),
            base_url: default_base_url(),
            base_path: default_base_path(),
            jsonp_enabled: true,
            expose_headers: default_expose_headers(),
            allow_header: true,
            strict_methods: false,
            help_url: None,
        }
    }
}

fn default_name() -> String {
    "Hermes".to_string()
}

fn default_base_url() -> String {
    "http://localhost:8080/wp-json".to_string()
}

fn default_base_path() -> String {
    "/wp-json".to_string()
}

fn default_expose_headers() -> Vec<String> {
    vec![
        "X-WP-Total".to_string(),
        "X-WP-TotalPages".to_string(),
        "Link".to_string(),
    ]
}

/// Log format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON lines (production).
    #[default]
    Json,
    /// Human-readable output (development).
    Pretty,
}

/// Logging section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Enable logging.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (trace, debug, info, warn, error or an env-filter string).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,

    /// Service name attached to log output.
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::default(),
            service_name: default_service_name(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_service_name() -> String {
    "hermes".to_string()
}

/// Prometheus metrics section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct MetricsSection {
    /// Enable the Prometheus exporter.
    #[serde(default)]
    pub enabled: bool,

    /// Scrape listener address.
    #[serde(default = "default_metrics_addr")]
    pub addr: String,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self {
            enabled: false,
            addr: default_metrics_addr(),
        }
    }
}

fn default_metrics_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_section_default() {
        let server = ServerSection::default();
        assert_eq!(server.http_addr, "0.0.0.0:8080");
        assert_eq!(server.request_timeout_secs, 30);
        assert_eq!(server.shutdown_timeout_secs, 30);
        assert_eq!(server.max_body_bytes, 2 * 1024 * 1024);
    }

    #[test]
    fn test_server_section_partial_toml() {
        let toml = r#"
            http_addr = "127.0.0.1:3000"
            max_body_bytes = 1024
        "#;
        let server: ServerSection = toml::from_str(toml).unwrap();
        assert_eq!(server.http_addr, "127.0.0.1:3000");
        assert_eq!(server.max_body_bytes, 1024);
        assert_eq!(server.max_connections, 10000);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let toml = r#"
            base_path = "/api"
            base_pth = "/typo"
        "#;
        let result: Result<ApiSection, _> = toml::from_str(toml);
        assert!(result.is_err());
    }

    #[test]
    fn test_api_section_default() {
        let api = ApiSection::default();
        assert_eq!(api.base_path, "/wp-json");
        assert!(api.jsonp_enabled);
        assert!(api.allow_header);
        assert!(!api.strict_methods);
        assert_eq!(api.expose_headers, vec!["X-WP-Total", "X-WP-TotalPages", "Link"]);
    }

    #[test]
    fn test_log_format_deserialize() {
        let format: LogFormat = serde_json::from_str(r#""pretty""#).unwrap();
        assert_eq!(format, LogFormat::Pretty);
        let format: LogFormat = serde_json::from_str(r#""json""#).unwrap();
        assert_eq!(format, LogFormat::Json);
    }

    #[test]
    fn test_metrics_disabled_by_default() {
        let metrics = MetricsSection::default();
        assert!(!metrics.enabled);
        assert_eq!(metrics.addr, "0.0.0.0:9090");
    }
}
