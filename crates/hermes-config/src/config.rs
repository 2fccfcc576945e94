//! The root [`HermesConfig`] type, presets and validation.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

use crate::{ApiSection, ConfigError, LogFormat, LoggingSection, MetricsSection, ServerSection};
use hermes_telemetry::{LogConfig, MetricsConfig, TelemetryConfig};

/// Complete Hermes configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to assemble one from files and
/// the environment.
///
/// # Example
///
/// ```
/// use hermes_config::HermesConfig;
///
/// let config = HermesConfig::default();
/// assert_eq!(config.api.base_path, "/wp-json");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct HermesConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerSection,

    /// Site metadata and response policy.
    #[serde(default)]
    pub api: ApiSection,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingSection,

    /// Metrics settings.
    #[serde(default)]
    pub metrics: MetricsSection,
}

impl HermesConfig {
    /// Checks addresses, timeouts and the base path.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] naming the first offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.http_addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "server.http_addr",
                format!("invalid socket address: {}", self.server.http_addr),
            ));
        }

        if self.server.request_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.request_timeout_secs",
                "must be greater than zero",
            ));
        }

        if self.server.shutdown_timeout_secs == 0 {
            return Err(ConfigError::invalid_value(
                "server.shutdown_timeout_secs",
                "must be greater than zero",
            ));
        }

        if self.metrics.enabled && self.metrics.addr.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::invalid_value(
                "metrics.addr",
                format!("invalid socket address: {}", self.metrics.addr),
            ));
        }

        if !self.api.base_path.is_empty() && !self.api.base_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "api.base_path",
                "must start with '/'",
            ));
        }

        Ok(())
    }

    /// Local development preset: pretty debug logs.
    ///
    /// # Example
    ///
    /// ```
    /// use hermes_config::{HermesConfig, LogFormat};
    ///
    /// let config = HermesConfig::development();
    /// assert_eq!(config.logging.level, "debug");
    /// assert_eq!(config.logging.format, LogFormat::Pretty);
    /// ```
    #[must_use]
    pub fn development() -> Self {
        let mut config = Self::default();
        config.server.http_addr = "127.0.0.1:8080".to_string();
        config.logging.level = "debug".to_string();
        config.logging.format = LogFormat::Pretty;
        config
    }

    /// Production preset: JSON info logs and the metrics exporter.
    #[must_use]
    pub fn production() -> Self {
        let mut config = Self::default();
        config.logging.level = "info".to_string();
        config.logging.format = LogFormat::Json;
        config.metrics.enabled = true;
        config
    }

    /// Logging settings in the form the telemetry crate installs.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let base = match self.logging.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            enabled: self.logging.enabled,
            level: self.logging.level.clone(),
            service_name: self.logging.service_name.clone(),
            ..base
        }
    }

    /// Metrics settings in the form the telemetry crate installs.
    #[must_use]
    pub fn metrics_config(&self) -> MetricsConfig {
        MetricsConfig {
            enabled: self.metrics.enabled,
            addr: self.metrics.addr.clone(),
        }
    }

    /// Both telemetry halves together.
    #[must_use]
    pub fn telemetry_config(&self) -> TelemetryConfig {
        TelemetryConfig {
            logging: self.log_config(),
            metrics: self.metrics_config(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(HermesConfig::default().validate().is_ok());
        assert!(HermesConfig::development().validate().is_ok());
        assert!(HermesConfig::production().validate().is_ok());
    }

    #[test]
    fn test_invalid_http_addr() {
        let mut config = HermesConfig::default();
        config.server.http_addr = "localhost".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.http_addr"));
    }

    #[test]
    fn test_zero_timeouts_rejected() {
        let mut config = HermesConfig::default();
        config.server.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = HermesConfig::default();
        config.server.shutdown_timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_metrics_addr_checked_only_when_enabled() {
        let mut config = HermesConfig::default();
        config.metrics.addr = "nowhere".to_string();
        assert!(config.validate().is_ok());

        config.metrics.enabled = true;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("metrics.addr"));
    }

    #[test]
    fn test_base_path_needs_leading_slash() {
        let mut config = HermesConfig::default();
        config.api.base_path = "wp-json".to_string();
        assert!(config.validate().is_err());

        config.api.base_path = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_log_config_conversion() {
        let mut config = HermesConfig::development();
        config.logging.service_name = "shop".to_string();
        let log = config.log_config();
        assert!(!log.json_format);
        assert_eq!(log.level, "debug");
        assert_eq!(log.service_name, "shop");

        let log = HermesConfig::production().log_config();
        assert!(log.json_format);
        assert_eq!(log.level, "info");
    }

    #[test]
    fn test_telemetry_config_conversion() {
        let telemetry = HermesConfig::production().telemetry_config();
        assert!(telemetry.metrics.enabled);
        assert_eq!(telemetry.metrics.addr, "0.0.0.0:9090");
    }
}
