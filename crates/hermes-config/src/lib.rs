//! Layered configuration for Hermes.
//!
//! - TOML and JSON files, with unknown fields rejected
//! - `.env` support through `dotenvy`
//! - Environment overrides in the form `HERMES__SECTION__KEY`
//! - Presets for development and production
//!
//! # Example
//!
//! ```no_run
//! use hermes_config::ConfigLoader;
//!
//! # fn main() -> Result<(), hermes_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_file("hermes.toml")?
//!     .with_env_prefix("HERMES")
//!     .load()?;
//! println!("listening on {}", config.server.http_addr);
//! # Ok(())
//! # }
//! ```
//!
//! # File format
//!
//! ```toml
//! [server]
//! http_addr = "0.0.0.0:8080"
//! request_timeout_secs = 30
//! shutdown_timeout_secs = 30
//! max_body_bytes = 2097152
//!
//! [api]
//! name = "My Site"
//! base_url = "https://example.com/wp-json"
//! base_path = "/wp-json"
//! jsonp_enabled = true
//! strict_methods = false
//!
//! [logging]
//! level = "info"
//! format = "json"
//!
//! [metrics]
//! enabled = true
//! addr = "0.0.0.0:9090"
//! ```
//!
//! # Environment overrides
//!
//! - `HERMES__SERVER__HTTP_ADDR=0.0.0.0:9000`
//! - `HERMES__API__JSONP_ENABLED=false`
//! - `HERMES__API__EXPOSE_HEADERS=X-WP-Total,Link`
//! - `HERMES__LOGGING__LEVEL=debug`

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::HermesConfig;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::{ApiSection, LogFormat, LoggingSection, MetricsSection, ServerSection};
