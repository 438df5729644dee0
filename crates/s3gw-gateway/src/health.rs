//! Liveness and readiness reporting.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use s3gw_authz::{KeySnapshot, PolicySnapshot};
use serde::{Deserialize, Serialize};

use crate::refresher::{RefreshState, RefreshStatus};

/// Health status of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All refreshes succeeding.
    Healthy,
    /// Serving from snapshots whose last refresh failed.
    Degraded,
    /// Not serving.
    Unhealthy,
}

impl HealthStatus {
    /// Check if the status indicates the service is operational.
    pub fn is_operational(&self) -> bool {
        matches!(self, Self::Healthy | Self::Degraded)
    }
}

/// Readiness status of the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    /// Ready to handle traffic.
    Ready,
    /// Not ready.
    NotReady,
}

impl ReadinessStatus {
    /// Check if the gateway is ready.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }
}

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Overall health status.
    pub status: HealthStatus,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
    /// Uptime in seconds.
    pub uptime_seconds: u64,
    /// Version information.
    pub version: String,
}

/// Readiness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Overall readiness status.
    pub status: ReadinessStatus,
    /// Individual check results.
    pub checks: Vec<CheckResult>,
}

/// Result of a single check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    /// Name of the check.
    pub name: String,
    /// Whether the check passed.
    pub passed: bool,
    /// Optional message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Time taken for the check in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl CheckResult {
    /// Create a passing check result.
    pub fn pass(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: true,
            message: None,
            duration_ms: None,
        }
    }

    /// Create a failing check result.
    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passed: false,
            message: Some(message.into()),
            duration_ms: None,
        }
    }

    /// Set the duration.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration_ms = Some(duration.as_millis() as u64);
        self
    }

    /// Set the message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Health checker backed by the published snapshots and refresh status.
#[derive(Debug)]
pub struct HealthChecker {
    start_time: Instant,
    ready: AtomicBool,
    policies: Arc<PolicySnapshot>,
    keys: Arc<KeySnapshot>,
    refresh: Arc<RefreshState>,
}

impl HealthChecker {
    /// Create a health checker.
    pub fn new(
        policies: Arc<PolicySnapshot>,
        keys: Arc<KeySnapshot>,
        refresh: Arc<RefreshState>,
    ) -> Self {
        Self {
            start_time: Instant::now(),
            ready: AtomicBool::new(false),
            policies,
            keys,
            refresh,
        }
    }

    /// Mark the listener as accepting traffic.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Whether the listener is accepting traffic.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Get the uptime.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Liveness: the process runs; degraded while refreshes fail.
    pub fn liveness(&self) -> HealthResponse {
        let checks = vec![
            CheckResult::pass("process").with_message("gateway is running"),
            refresh_check("policy_refresh", &self.refresh.policies()),
            refresh_check("key_refresh", &self.refresh.keys()),
        ];

        let status = if checks.iter().all(|c| c.passed) {
            HealthStatus::Healthy
        } else {
            HealthStatus::Degraded
        };

        HealthResponse {
            status,
            checks,
            uptime_seconds: self.uptime().as_secs(),
            version: crate::VERSION.to_string(),
        }
    }

    /// Readiness: both snapshots loaded and the listener bound.
    pub fn readiness(&self) -> ReadinessResponse {
        let policies = self.policies.snapshot();
        let keys = self.keys.snapshot();

        let mut checks = Vec::with_capacity(3);
        checks.push(if self.refresh.policies().loaded() {
            CheckResult::pass("policies").with_message(format!(
                "{} policies for service {}, version {}",
                policies.policy_count(),
                policies.service_name(),
                policies
                    .policy_version()
                    .map_or_else(|| "unknown".to_string(), |v| v.to_string()),
            ))
        } else {
            CheckResult::fail("policies", "policy snapshot not loaded")
        });
        checks.push(if self.refresh.keys().loaded() {
            CheckResult::pass("keys").with_message(format!("{} access keys", keys.len()))
        } else {
            CheckResult::fail("keys", "key snapshot not loaded")
        });
        checks.push(if self.is_ready() {
            CheckResult::pass("listener")
        } else {
            CheckResult::fail("listener", "not accepting connections")
        });

        let status = if checks.iter().all(|c| c.passed) {
            ReadinessStatus::Ready
        } else {
            ReadinessStatus::NotReady
        };

        ReadinessResponse { status, checks }
    }
}

fn refresh_check(name: &str, status: &RefreshStatus) -> CheckResult {
    if status.consecutive_failures == 0 {
        return CheckResult::pass(name);
    }
    let error = status.last_error.as_deref().unwrap_or("unknown error");
    CheckResult::fail(
        name,
        format!(
            "{} consecutive failures, last: {error}",
            status.consecutive_failures
        ),
    )
}
