//! Periodic refresh of the policy and key snapshots.
//!
//! A failed refresh keeps the previously published snapshot in force. Only
//! the initial load is fatal.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use s3gw_authz::{KeySnapshot, KeyStore, PolicySnapshot, PolicySource, PolicyStore};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::admin::IdentitySource;
use crate::error::{GatewayError, GatewayResult};
use crate::shutdown::ShutdownSignal;

/// Label of the policy refresh in metrics and status.
pub const POLICIES: &str = "policies";

/// Label of the key refresh in metrics and status.
pub const KEYS: &str = "keys";

/// Outcome history of one refreshed source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RefreshStatus {
    /// Last successful refresh.
    pub last_success: Option<DateTime<Utc>>,
    /// Last failed refresh.
    pub last_failure: Option<DateTime<Utc>>,
    /// Error of the last failure.
    pub last_error: Option<String>,
    /// Failures since the last success.
    pub consecutive_failures: u32,
}

impl RefreshStatus {
    fn succeeded(&mut self) {
        self.last_success = Some(Utc::now());
        self.consecutive_failures = 0;
    }

    fn failed(&mut self, error: &GatewayError) {
        self.last_failure = Some(Utc::now());
        self.last_error = Some(error.to_string());
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
    }

    /// Whether at least one refresh ever succeeded.
    pub fn loaded(&self) -> bool {
        self.last_success.is_some()
    }
}

/// Refresh status of both sources, shared with the health endpoints.
#[derive(Debug, Default)]
pub struct RefreshState {
    policies: RwLock<RefreshStatus>,
    keys: RwLock<RefreshStatus>,
}

impl RefreshState {
    /// Status of the policy source.
    pub fn policies(&self) -> RefreshStatus {
        self.policies.read().clone()
    }

    /// Status of the key source.
    pub fn keys(&self) -> RefreshStatus {
        self.keys.read().clone()
    }

    fn record(&self, source: &'static str, result: &GatewayResult<()>) {
        let slot = if source == POLICIES { &self.policies } else { &self.keys };
        match result {
            Ok(()) => {
                slot.write().succeeded();
                s3gw_telemetry::record_refresh(source, "success");
            }
            Err(e) => {
                slot.write().failed(e);
                s3gw_telemetry::record_refresh(source, "failure");
            }
        }
    }
}

/// Fetches and publishes policy and key snapshots.
pub struct BackgroundRefresher {
    policy_source: Arc<dyn PolicySource>,
    identity: Arc<dyn IdentitySource>,
    policies: Arc<PolicySnapshot>,
    keys: Arc<KeySnapshot>,
    interval: Duration,
    state: Arc<RefreshState>,
}

impl std::fmt::Debug for BackgroundRefresher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRefresher")
            .field("service", &self.policy_source.service_name())
            .field("interval", &self.interval)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl BackgroundRefresher {
    /// Create a refresher publishing into the given snapshot holders.
    pub fn new(
        policy_source: Arc<dyn PolicySource>,
        identity: Arc<dyn IdentitySource>,
        policies: Arc<PolicySnapshot>,
        keys: Arc<KeySnapshot>,
        interval: Duration,
    ) -> Self {
        Self {
            policy_source,
            identity,
            policies,
            keys,
            interval,
            state: Arc::new(RefreshState::default()),
        }
    }

    /// Shared refresh status.
    pub fn state(&self) -> Arc<RefreshState> {
        Arc::clone(&self.state)
    }

    /// Load both snapshots once. Any failure is a startup error.
    pub async fn initial_load(&self) -> GatewayResult<()> {
        let result = self.refresh_policies().await;
        self.state.record(POLICIES, &result);
        result.map_err(|e| GatewayError::startup(format!("initial policy download failed: {e}")))?;

        let result = self.refresh_keys().await;
        self.state.record(KEYS, &result);
        result.map_err(|e| GatewayError::startup(format!("initial key download failed: {e}")))?;

        info!(
            service = self.policy_source.service_name(),
            policies = self.policies.snapshot().policy_count(),
            keys = self.keys.snapshot().len(),
            "Trust data loaded"
        );
        Ok(())
    }

    /// Fetch and publish the policy snapshot.
    pub async fn refresh_policies(&self) -> GatewayResult<()> {
        let download = self.policy_source.fetch().await?;
        let store = PolicyStore::from_service(download);
        debug!(
            version = ?store.policy_version(),
            policies = store.policy_count(),
            "Publishing policy snapshot"
        );
        s3gw_telemetry::record_snapshot_entries(POLICIES, store.policy_count());
        self.policies.publish(store);
        Ok(())
    }

    /// Fetch and publish the key snapshot.
    pub async fn refresh_keys(&self) -> GatewayResult<()> {
        let keys = KeyStore::new(self.identity.access_keys().await?);
        debug!(keys = keys.len(), "Publishing key snapshot");
        s3gw_telemetry::record_snapshot_entries(KEYS, keys.len());
        self.keys.publish(keys);
        Ok(())
    }

    /// Refresh both sources, logging failures.
    pub async fn refresh_once(&self) {
        let result = self.refresh_policies().await;
        if let Err(e) = &result {
            warn!(error = %e, "Policy refresh failed, keeping previous snapshot");
        }
        self.state.record(POLICIES, &result);

        let result = self.refresh_keys().await;
        if let Err(e) = &result {
            warn!(error = %e, "Key refresh failed, keeping previous snapshot");
        }
        self.state.record(KEYS, &result);
    }

    /// Refresh on every interval tick until `shutdown` triggers.
    pub async fn run(self, shutdown: ShutdownSignal) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial load already ran.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => self.refresh_once().await,
                () = shutdown.recv() => {
                    debug!("Refresher stopped");
                    return;
                }
            }
        }
    }

    /// Run in a background task.
    pub fn spawn(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }
}
