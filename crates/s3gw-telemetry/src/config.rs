//! Telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Configuration for all telemetry subsystems.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name (used in metrics and logs).
    pub service_name: String,

    /// Service version.
    pub service_version: String,

    /// Metrics configuration.
    pub metrics: MetricsConfig,

    /// Logging configuration.
    pub logging: LogConfig,
}

impl TelemetryConfig {
    /// Creates a new configuration builder.
    #[must_use]
    pub fn builder() -> TelemetryConfigBuilder {
        TelemetryConfigBuilder::new()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "s3gw".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            metrics: MetricsConfig::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Builder for [`TelemetryConfig`].
#[derive(Debug, Default)]
pub struct TelemetryConfigBuilder {
    service_name: Option<String>,
    service_version: Option<String>,
    log_level: Option<String>,
    json_logs: Option<bool>,
    metrics_enabled: Option<bool>,
}

impl TelemetryConfigBuilder {
    /// Creates a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the service name.
    #[must_use]
    pub fn service_name(mut self, name: &str) -> Self {
        self.service_name = Some(name.to_string());
        self
    }

    /// Sets the service version.
    #[must_use]
    pub fn service_version(mut self, version: &str) -> Self {
        self.service_version = Some(version.to_string());
        self
    }

    /// Sets the log filter directive.
    #[must_use]
    pub fn log_level(mut self, level: &str) -> Self {
        self.log_level = Some(level.to_string());
        self
    }

    /// Selects JSON or human-readable logs.
    #[must_use]
    pub fn json_logs(mut self, json: bool) -> Self {
        self.json_logs = Some(json);
        self
    }

    /// Enables or disables the Prometheus recorder.
    #[must_use]
    pub fn metrics_enabled(mut self, enabled: bool) -> Self {
        self.metrics_enabled = Some(enabled);
        self
    }

    /// Builds the configuration.
    #[must_use]
    pub fn build(self) -> TelemetryConfig {
        let defaults = TelemetryConfig::default();

        let service_name = self.service_name.unwrap_or(defaults.service_name);
        let service_version = self.service_version.unwrap_or(defaults.service_version);

        let mut metrics = defaults.metrics;
        metrics.service_name = service_name.clone();
        if let Some(enabled) = self.metrics_enabled {
            metrics.enabled = enabled;
        }

        let mut logging = defaults.logging;
        logging.service_name = service_name.clone();
        if let Some(level) = self.log_level {
            logging.level = level;
        }
        if let Some(json) = self.json_logs {
            logging.json_format = json;
        }

        TelemetryConfig {
            service_name,
            service_version,
            metrics,
            logging,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "s3gw");
        assert!(config.metrics.enabled);
        assert!(config.logging.json_format);
    }

    #[test]
    fn test_builder_propagates_service_name() {
        let config = TelemetryConfig::builder().service_name("edge-gw").build();

        assert_eq!(config.metrics.service_name, "edge-gw");
        assert_eq!(config.logging.service_name, "edge-gw");
    }

    #[test]
    fn test_builder_overrides() {
        let config = TelemetryConfig::builder()
            .service_version("2.0.0")
            .log_level("debug")
            .json_logs(false)
            .metrics_enabled(false)
            .build();

        assert_eq!(config.service_version, "2.0.0");
        assert_eq!(config.logging.level, "debug");
        assert!(!config.logging.json_format);
        assert!(!config.metrics.enabled);
    }
}
