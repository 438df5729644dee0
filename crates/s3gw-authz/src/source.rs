//! Policy sources.
//!
//! A [`PolicySource`] produces the full policy download for one service. The
//! gateway polls it to build fresh [`PolicyStore`](crate::PolicyStore)
//! snapshots.

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::config::PolicyClientConfig;
use crate::error::{AuthzError, AuthzResult};
use crate::model::ServicePolicies;

/// Query parameter carrying the plugin identifier.
const PLUGIN_ID_PARAM: &str = "pluginId";

/// Something that can download a service's policies.
#[async_trait]
pub trait PolicySource: Send + Sync {
    /// Fetch the current policy set.
    async fn fetch(&self) -> AuthzResult<ServicePolicies>;

    /// Service whose policies this source returns.
    fn service_name(&self) -> &str;
}

/// Downloads policies from the policy server's plugin endpoint.
#[derive(Debug, Clone)]
pub struct RangerPolicyClient {
    client: reqwest::Client,
    config: PolicyClientConfig,
}

impl RangerPolicyClient {
    /// Create a client. The timeout applies to each download.
    pub fn new(config: PolicyClientConfig) -> AuthzResult<Self> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthzError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    /// Client configuration.
    pub fn config(&self) -> &PolicyClientConfig {
        &self.config
    }
}

#[async_trait]
impl PolicySource for RangerPolicyClient {
    #[instrument(skip(self), fields(service = %self.config.service_name))]
    async fn fetch(&self) -> AuthzResult<ServicePolicies> {
        let url = self.config.download_url();
        let plugin_id = self.config.plugin_id();
        let service = &self.config.service_name;

        let mut request = self
            .client
            .get(&url)
            .query(&[(PLUGIN_ID_PARAM, plugin_id.as_str())]);
        if let Some(username) = &self.config.username {
            request = request.basic_auth(username, self.config.password.as_ref());
        }

        let response = request
            .send()
            .await
            .map_err(|e| AuthzError::policy_fetch(service, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthzError::policy_fetch(
                service,
                format!("policy server returned status {status}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| AuthzError::policy_fetch(service, format!("failed to read body: {e}")))?;

        let policies: ServicePolicies = serde_json::from_slice(&body)
            .map_err(|e| AuthzError::PolicyParse(e.to_string()))?;

        debug!(
            version = ?policies.policy_version,
            policies = policies.policies.len(),
            "Downloaded policies"
        );
        Ok(policies)
    }

    fn service_name(&self) -> &str {
        &self.config.service_name
    }
}

/// In-memory source returning a fixed document, or an error once failing.
#[derive(Debug)]
pub struct StaticPolicySource {
    service_name: String,
    policies: Mutex<Option<ServicePolicies>>,
}

impl StaticPolicySource {
    /// Create a source returning `policies`.
    pub fn new(policies: ServicePolicies) -> Self {
        Self {
            service_name: policies.service_name.clone(),
            policies: Mutex::new(Some(policies)),
        }
    }

    /// Replace the document returned by later fetches.
    pub fn set(&self, policies: ServicePolicies) {
        *self.policies.lock() = Some(policies);
    }

    /// Make later fetches fail.
    pub fn fail(&self) {
        *self.policies.lock() = None;
    }
}

#[async_trait]
impl PolicySource for StaticPolicySource {
    async fn fetch(&self) -> AuthzResult<ServicePolicies> {
        self.policies
            .lock()
            .clone()
            .ok_or_else(|| AuthzError::policy_fetch(&self.service_name, "source unavailable"))
    }

    fn service_name(&self) -> &str {
        &self.service_name
    }
}
