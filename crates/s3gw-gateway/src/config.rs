//! Configuration for the s3gw gateway.

use std::path::{Path, PathBuf};
use std::time::Duration;

use s3gw_authz::PolicyClientConfig;
use serde::{Deserialize, Serialize};

use crate::error::{GatewayError, GatewayResult};

/// Configuration file used when none is given on the command line.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/s3gw/s3gw.toml";

/// Gateway configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener and backend settings.
    pub server: ServerSettings,
    /// Policy server settings.
    pub policy: PolicySettings,
    /// Storage admin API settings.
    pub identity: IdentitySettings,
    /// Bucket tag lookup settings.
    pub tags: TagSettings,
    /// Telemetry settings.
    pub telemetry: TelemetrySettings,
}

impl GatewayConfig {
    /// Create a new configuration builder.
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }

    /// Load configuration from a file.
    pub fn from_file(path: impl Into<PathBuf>) -> GatewayResult<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| GatewayError::config(format!("failed to read config file: {e}")))?;

        let extension = path.extension().and_then(|s| s.to_str()).unwrap_or("");
        match extension {
            "toml" => toml::from_str(&content)
                .map_err(|e| GatewayError::config(format!("invalid TOML: {e}"))),
            "json" => serde_json::from_str(&content)
                .map_err(|e| GatewayError::config(format!("invalid JSON: {e}"))),
            _ => Err(GatewayError::config(format!(
                "unsupported config format: {extension}"
            ))),
        }
    }

    /// Load from `path`, or from [`DEFAULT_CONFIG_PATH`] when it exists, or
    /// fall back to defaults. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> GatewayResult<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH)?,
            None => Self::default(),
        };
        Ok(config.with_env_overrides())
    }

    /// Apply environment variable overrides.
    ///
    /// Environment variables are prefixed with `S3GW_` and use uppercase
    /// `snake_case`.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    #[must_use]
    pub fn with_overrides_from(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(addr) = var("S3GW_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(port) = var("S3GW_LISTEN_PORT").and_then(|p| p.parse().ok()) {
            self.server.listen_port = port;
        }
        if let Some(url) = var("S3GW_BACKEND_URL") {
            self.server.backend_url = url;
        }
        if let Some(timeout) = var("S3GW_BACKEND_TIMEOUT").and_then(|t| parse_duration(&t).ok()) {
            self.server.backend_timeout = timeout;
        }
        if let Some(path) = var("S3GW_TLS_CERT") {
            self.server.tls_cert = Some(PathBuf::from(path));
        }
        if let Some(path) = var("S3GW_TLS_KEY") {
            self.server.tls_key = Some(PathBuf::from(path));
        }

        if let Some(endpoint) = var("S3GW_POLICY_ENDPOINT") {
            self.policy.endpoint = endpoint;
        }
        if let Some(name) = var("S3GW_POLICY_SERVICE") {
            self.policy.service_name = name;
        }
        if let Some(username) = var("S3GW_POLICY_USERNAME") {
            self.policy.username = Some(username);
        }
        if let Some(password) = var("S3GW_POLICY_PASSWORD") {
            self.policy.password = Some(password);
        }
        if let Some(interval) = var("S3GW_REFRESH_INTERVAL").and_then(|t| parse_duration(&t).ok()) {
            self.policy.refresh_interval = interval;
        }

        if let Some(endpoint) = var("S3GW_IDENTITY_ENDPOINT") {
            self.identity.endpoint = endpoint;
        }
        if let Some(key) = var("S3GW_IDENTITY_ACCESS_KEY") {
            self.identity.access_key = key;
        }
        if let Some(secret) = var("S3GW_IDENTITY_SECRET_KEY") {
            self.identity.secret_key = secret;
        }

        if let Some(level) = var("S3GW_LOG_LEVEL") {
            self.telemetry.log_level = level;
        }

        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> GatewayResult<()> {
        require_http_url("server.backend_url", &self.server.backend_url)?;
        require_http_url("policy.endpoint", &self.policy.endpoint)?;
        require_http_url("identity.endpoint", &self.identity.endpoint)?;
        if self.tags.enabled && !self.tags.endpoint.is_empty() {
            require_http_url("tags.endpoint", &self.tags.endpoint)?;
        }

        if self.policy.service_name.is_empty() {
            return Err(GatewayError::config("policy.service_name is required"));
        }
        if self.policy.username.is_some() != self.policy.password.is_some() {
            return Err(GatewayError::config(
                "policy.username and policy.password must be set together",
            ));
        }
        if self.identity.access_key.is_empty() != self.identity.secret_key.is_empty() {
            return Err(GatewayError::config(
                "identity.access_key and identity.secret_key must be set together",
            ));
        }
        if self.server.tls_cert.is_some() != self.server.tls_key.is_some() {
            return Err(GatewayError::config(
                "server.tls_cert and server.tls_key must be set together",
            ));
        }

        for (name, value) in [
            ("server.backend_timeout", self.server.backend_timeout),
            ("server.read_timeout", self.server.read_timeout),
            ("server.write_timeout", self.server.write_timeout),
            ("policy.timeout", self.policy.timeout),
            ("policy.refresh_interval", self.policy.refresh_interval),
            ("identity.timeout", self.identity.timeout),
            ("identity.owner_cache_ttl", self.identity.owner_cache_ttl),
        ] {
            if value.is_zero() {
                return Err(GatewayError::config(format!("{name} must be greater than zero")));
            }
        }

        Ok(())
    }

    /// Whether TLS is configured.
    pub fn tls_enabled(&self) -> bool {
        self.server.tls_cert.is_some() && self.server.tls_key.is_some()
    }
}

fn require_http_url(name: &str, value: &str) -> GatewayResult<()> {
    if value.is_empty() {
        return Err(GatewayError::config(format!("{name} is required")));
    }
    if !value.starts_with("http://") && !value.starts_with("https://") {
        return Err(GatewayError::config(format!(
            "{name} must start with http:// or https://"
        )));
    }
    Ok(())
}

/// Listener and backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Address to bind to.
    pub listen_addr: String,
    /// Port the gateway listens on.
    pub listen_port: u16,
    /// Object-storage backend URL.
    pub backend_url: String,
    /// Backend connect timeout, and the time a backend may take to answer a
    /// request without a body.
    #[serde(with = "humantime_serde")]
    pub backend_timeout: Duration,
    /// Time allowed for a client to send request headers.
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Time allowed to authorize a request.
    #[serde(with = "humantime_serde")]
    pub write_timeout: Duration,
    /// PEM certificate chain.
    pub tls_cert: Option<PathBuf>,
    /// PEM private key.
    pub tls_key: Option<PathBuf>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0".to_string(),
            listen_port: 8080,
            backend_url: "http://localhost:7480".to_string(),
            backend_timeout: Duration::from_secs(30),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(60),
            tls_cert: None,
            tls_key: None,
        }
    }
}

/// Policy server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    /// Service whose policies are enforced.
    pub service_name: String,
    /// Policy server URL.
    pub endpoint: String,
    /// Host part of the plugin identifier.
    pub plugin_host: String,
    /// Username for authenticated downloads.
    pub username: Option<String>,
    /// Password for authenticated downloads.
    pub password: Option<String>,
    /// Timeout for one download.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Interval between background refreshes.
    #[serde(with = "humantime_serde")]
    pub refresh_interval: Duration,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self {
            service_name: "s3".to_string(),
            endpoint: "http://localhost:6080".to_string(),
            plugin_host: "s3gw".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
            refresh_interval: Duration::from_secs(5),
        }
    }
}

impl PolicySettings {
    /// Client configuration for the policy download client.
    pub fn client_config(&self) -> PolicyClientConfig {
        let mut config = PolicyClientConfig::new(&self.endpoint, &self.service_name)
            .with_plugin_host(&self.plugin_host)
            .with_timeout(self.timeout);
        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            config = config.with_credentials(username, password);
        }
        config
    }
}

/// Where principal group memberships come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupSource {
    /// Local system user and group databases.
    #[default]
    System,
    /// No groups; decisions use user clauses only.
    None,
}

/// Storage admin API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentitySettings {
    /// Admin API base URL.
    pub endpoint: String,
    /// Admin access key.
    pub access_key: String,
    /// Admin secret key.
    pub secret_key: String,
    /// Path prefix of the admin API.
    pub admin_path: String,
    /// Timeout for admin requests.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// How long a bucket owner stays cached.
    #[serde(with = "humantime_serde")]
    pub owner_cache_ttl: Duration,
    /// Group membership source.
    pub group_source: GroupSource,
}

impl Default for IdentitySettings {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:7480".to_string(),
            access_key: String::new(),
            secret_key: String::new(),
            admin_path: "/admin".to_string(),
            timeout: Duration::from_secs(10),
            owner_cache_ttl: Duration::from_secs(3600),
            group_source: GroupSource::System,
        }
    }
}

/// Bucket tag lookup settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TagSettings {
    /// Log bucket tags with each decision.
    pub enabled: bool,
    /// S3 endpoint. Empty means the backend URL.
    pub endpoint: String,
    /// Access key for tag requests.
    pub access_key: String,
    /// Secret key for tag requests.
    pub secret_key: String,
    /// Timeout for tag requests.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for TagSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            access_key: String::new(),
            secret_key: String::new(),
            timeout: Duration::from_secs(5),
        }
    }
}

/// Telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    /// Service name for telemetry.
    pub service_name: String,
    /// Log level or filter directive.
    pub log_level: String,
    /// Emit JSON logs.
    pub json_logs: bool,
    /// Install the Prometheus recorder.
    pub metrics_enabled: bool,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: "s3gw".to_string(),
            log_level: "info".to_string(),
            json_logs: true,
            metrics_enabled: true,
        }
    }
}

/// Builder for `GatewayConfig`.
#[derive(Debug, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Set the listen address.
    #[must_use]
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.server.listen_addr = addr.into();
        self
    }

    /// Set the listen port.
    #[must_use]
    pub fn listen_port(mut self, port: u16) -> Self {
        self.config.server.listen_port = port;
        self
    }

    /// Set the backend URL.
    #[must_use]
    pub fn backend_url(mut self, url: impl Into<String>) -> Self {
        self.config.server.backend_url = url.into();
        self
    }

    /// Set the read and write timeouts.
    #[must_use]
    pub fn timeouts(mut self, read: Duration, write: Duration) -> Self {
        self.config.server.read_timeout = read;
        self.config.server.write_timeout = write;
        self
    }

    /// Serve TLS with the given PEM files.
    #[must_use]
    pub fn tls(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.config.server.tls_cert = Some(cert.into());
        self.config.server.tls_key = Some(key.into());
        self
    }

    /// Set the policy server URL.
    #[must_use]
    pub fn policy_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.config.policy.endpoint = endpoint.into();
        self
    }

    /// Set the policy service name.
    #[must_use]
    pub fn service_name(mut self, name: impl Into<String>) -> Self {
        self.config.policy.service_name = name.into();
        self
    }

    /// Set the background refresh interval.
    #[must_use]
    pub fn refresh_interval(mut self, interval: Duration) -> Self {
        self.config.policy.refresh_interval = interval;
        self
    }

    /// Set the admin API endpoint and credentials.
    #[must_use]
    pub fn identity(
        mut self,
        endpoint: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.config.identity.endpoint = endpoint.into();
        self.config.identity.access_key = access_key.into();
        self.config.identity.secret_key = secret_key.into();
        self
    }

    /// Set the bucket owner cache TTL.
    #[must_use]
    pub fn owner_cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.identity.owner_cache_ttl = ttl;
        self
    }

    /// Set the group membership source.
    #[must_use]
    pub fn group_source(mut self, source: GroupSource) -> Self {
        self.config.identity.group_source = source;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> GatewayResult<GatewayConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Parse a duration such as `500ms`, `5s`, `1m`, `1h` or bare seconds.
pub fn parse_duration(s: &str) -> Result<Duration, String> {
    let s = s.trim();
    let (number, scale): (&str, fn(u64) -> Duration) = if let Some(n) = s.strip_suffix("ms") {
        (n, Duration::from_millis)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, Duration::from_secs)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, |m| Duration::from_secs(m * 60))
    } else if let Some(n) = s.strip_suffix('h') {
        (n, |h| Duration::from_secs(h * 3600))
    } else {
        (s, Duration::from_secs)
    };
    number
        .trim()
        .parse::<u64>()
        .map(scale)
        .map_err(|_| format!("invalid duration: {s}"))
}

/// Serde adapter for durations in the format accepted by [`parse_duration`].
mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = if duration.subsec_millis() == 0 {
            format!("{}s", duration.as_secs())
        } else {
            format!("{}ms", duration.as_millis())
        };
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Seconds(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(s) => super::parse_duration(&s).map_err(serde::de::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.server.listen_port, 8080);
        assert_eq!(config.policy.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.identity.owner_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.identity.timeout, Duration::from_secs(10));
        assert!(config.validate().is_ok());
        assert!(!config.tls_enabled());
    }

    #[test]
    fn test_config_builder() {
        let config = GatewayConfig::builder()
            .listen_port(9000)
            .backend_url("http://rgw:7480")
            .service_name("s3-prod")
            .identity("http://rgw:7480", "admin", "secret")
            .group_source(GroupSource::None)
            .build()
            .unwrap();

        assert_eq!(config.server.listen_port, 9000);
        assert_eq!(config.policy.service_name, "s3-prod");
        assert_eq!(config.identity.group_source, GroupSource::None);
    }

    #[test]
    fn test_config_validation() {
        assert!(GatewayConfig::builder().backend_url("").build().is_err());
        assert!(GatewayConfig::builder().backend_url("rgw:7480").build().is_err());
        assert!(GatewayConfig::builder().service_name("").build().is_err());
        assert!(GatewayConfig::builder()
            .refresh_interval(Duration::ZERO)
            .build()
            .is_err());
        assert!(GatewayConfig::builder()
            .identity("http://rgw", "admin", "")
            .build()
            .is_err());

        let mut half_tls = GatewayConfig::default();
        half_tls.server.tls_cert = Some(PathBuf::from("/tmp/cert.pem"));
        assert!(half_tls.validate().is_err());
    }

    #[test]
    fn test_toml_config() {
        let toml = r#"
[server]
listen_port = 7000
backend_url = "http://rgw:7480"
read_timeout = "500ms"
write_timeout = 90

[policy]
service_name = "s3"
endpoint = "http://ranger:6080"
refresh_interval = "10s"

[identity]
endpoint = "http://rgw:7480"
access_key = "admin"
secret_key = "secret"
owner_cache_ttl = "1h"
group_source = "none"
"#;
        let config: GatewayConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.listen_port, 7000);
        assert_eq!(config.server.read_timeout, Duration::from_millis(500));
        assert_eq!(config.server.write_timeout, Duration::from_secs(90));
        assert_eq!(config.policy.refresh_interval, Duration::from_secs(10));
        assert_eq!(config.identity.owner_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.identity.group_source, GroupSource::None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s3gw.json");
        std::fs::write(&path, r#"{"server": {"listen_port": 7001}}"#).unwrap();
        let config = GatewayConfig::from_file(&path).unwrap();
        assert_eq!(config.server.listen_port, 7001);

        let bad = dir.path().join("s3gw.yaml");
        std::fs::write(&bad, "server: {}").unwrap();
        assert!(GatewayConfig::from_file(&bad).is_err());
    }

    #[test]
    fn test_overrides() {
        let vars: HashMap<&str, &str> = [
            ("S3GW_LISTEN_PORT", "9443"),
            ("S3GW_BACKEND_URL", "https://rgw.internal"),
            ("S3GW_REFRESH_INTERVAL", "30s"),
            ("S3GW_POLICY_USERNAME", "admin"),
            ("S3GW_POLICY_PASSWORD", "pw"),
            ("S3GW_LISTEN_ADDR", "127.0.0.1"),
        ]
        .into_iter()
        .collect();

        let config = GatewayConfig::default()
            .with_overrides_from(|key| vars.get(key).map(|v| (*v).to_string()));
        assert_eq!(config.server.listen_port, 9443);
        assert_eq!(config.server.listen_addr, "127.0.0.1");
        assert_eq!(config.server.backend_url, "https://rgw.internal");
        assert_eq!(config.policy.refresh_interval, Duration::from_secs(30));
        assert!(config.policy.client_config().is_secure());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration(" 7 ").unwrap(), Duration::from_secs(7));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_duration_serialization() {
        let settings = ServerSettings {
            read_timeout: Duration::from_millis(1500),
            ..ServerSettings::default()
        };
        let json = serde_json::to_value(&settings).unwrap();
        assert_eq!(json["read_timeout"], "1500ms");
        assert_eq!(json["write_timeout"], "60s");
    }
}
