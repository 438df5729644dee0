//! Configuration for the policy download client.

use std::time::Duration;

use crate::error::{AuthzError, AuthzResult};

/// Path of the anonymous download endpoint.
pub const POLICY_DOWNLOAD_PATH: &str = "/service/plugins/policies/download/";

/// Path of the authenticated download endpoint.
pub const SECURE_POLICY_DOWNLOAD_PATH: &str = "/service/plugins/secure/policies/download/";

/// Configuration for [`RangerPolicyClient`](crate::source::RangerPolicyClient).
#[derive(Debug, Clone)]
pub struct PolicyClientConfig {
    /// Base URL of the policy server, e.g. `http://ranger:6080`.
    pub endpoint: String,
    /// Service whose policies are downloaded.
    pub service_name: String,
    /// Host part of the plugin identifier sent with each download.
    pub plugin_host: String,
    /// Username for the authenticated endpoint.
    pub username: Option<String>,
    /// Password for the authenticated endpoint.
    pub password: Option<String>,
    /// Timeout for one download.
    pub timeout: Duration,
}

impl Default for PolicyClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:6080".to_string(),
            service_name: "s3".to_string(),
            plugin_host: "s3gw".to_string(),
            username: None,
            password: None,
            timeout: Duration::from_secs(10),
        }
    }
}

impl PolicyClientConfig {
    /// Create a configuration for `service_name` at `endpoint`.
    pub fn new(endpoint: impl Into<String>, service_name: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            service_name: service_name.into(),
            ..Self::default()
        }
    }

    /// Set the plugin host.
    pub fn with_plugin_host(mut self, host: impl Into<String>) -> Self {
        self.plugin_host = host.into();
        self
    }

    /// Use the authenticated endpoint with these credentials.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Set the download timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Whether downloads go through the authenticated endpoint.
    pub fn is_secure(&self) -> bool {
        self.username.is_some()
    }

    /// Plugin identifier query value, `service@host`.
    pub fn plugin_id(&self) -> String {
        format!("{}@{}", self.service_name, self.plugin_host)
    }

    /// Full download URL without the query string.
    pub fn download_url(&self) -> String {
        let path = if self.is_secure() {
            SECURE_POLICY_DOWNLOAD_PATH
        } else {
            POLICY_DOWNLOAD_PATH
        };
        format!(
            "{}{}{}",
            self.endpoint.trim_end_matches('/'),
            path,
            self.service_name
        )
    }

    /// Validate the configuration.
    pub fn validate(&self) -> AuthzResult<()> {
        if self.endpoint.is_empty() {
            return Err(AuthzError::Config("policy endpoint cannot be empty".into()));
        }
        if self.service_name.is_empty() {
            return Err(AuthzError::Config("policy service name cannot be empty".into()));
        }
        if self.timeout.is_zero() {
            return Err(AuthzError::Config("policy timeout cannot be zero".into()));
        }
        if self.username.is_some() != self.password.is_some() {
            return Err(AuthzError::Config(
                "policy username and password must be set together".into(),
            ));
        }
        Ok(())
    }
}
