//! Prometheus metrics for the gateway.
//!
//! The recorder is installed without its own listener; the gateway serves the
//! rendered text at its internal metrics endpoint.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `s3gw_requests_total` | Counter | `decision` | Requests by authorization outcome |
//! | `s3gw_request_duration_seconds` | Histogram | `decision` | End-to-end latency |
//! | `s3gw_refresh_total` | Counter | `source`, `outcome` | Snapshot refresh attempts |
//! | `s3gw_owner_cache_lookups_total` | Counter | `result` | Bucket owner cache lookups |
//! | `s3gw_snapshot_entries` | Gauge | `source` | Entries in the published snapshot |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global metrics handle for rendering.
static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Requests by decision.
pub const REQUESTS_TOTAL: &str = "s3gw_requests_total";
/// Request latency.
pub const REQUEST_DURATION: &str = "s3gw_request_duration_seconds";
/// Refresh attempts.
pub const REFRESH_TOTAL: &str = "s3gw_refresh_total";
/// Owner cache lookups.
pub const OWNER_LOOKUPS_TOTAL: &str = "s3gw_owner_cache_lookups_total";
/// Snapshot sizes.
pub const SNAPSHOT_ENTRIES: &str = "s3gw_snapshot_entries";

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether metrics are enabled.
    pub enabled: bool,

    /// Service name for metric labels.
    pub service_name: String,

    /// Histogram buckets for request duration.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            service_name: "s3gw".to_string(),
            // 1ms .. 30s; large object transfers dominate the tail
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
            ],
        }
    }
}

/// Installs the Prometheus recorder.
///
/// Calling this again after a successful install is a no-op.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the recorder cannot be built or
/// another global recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .add_global_label("service", config.service_name.clone())
        .set_buckets(&config.duration_buckets)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();

    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(REQUESTS_TOTAL, "Requests processed, by authorization decision");
    describe_histogram!(REQUEST_DURATION, "Request duration in seconds");
    describe_counter!(REFRESH_TOTAL, "Policy and key refresh attempts, by outcome");
    describe_counter!(OWNER_LOOKUPS_TOTAL, "Bucket owner cache lookups, by result");
    describe_gauge!(SNAPSHOT_ENTRIES, "Entries in the currently published snapshot");
}

/// Records the authorization outcome of a request.
///
/// `decision` is one of `allowed`, `denied` or `internal`.
pub fn record_decision(decision: &'static str) {
    counter!(REQUESTS_TOTAL, "decision" => decision).increment(1);
}

/// Records end-to-end request latency.
pub fn record_request_duration(decision: &'static str, duration: Duration) {
    histogram!(REQUEST_DURATION, "decision" => decision).record(duration.as_secs_f64());
}

/// Records a refresh attempt.
///
/// `source` is `policies` or `keys`; `outcome` is `success` or `failure`.
pub fn record_refresh(source: &'static str, outcome: &'static str) {
    counter!(REFRESH_TOTAL, "source" => source, "outcome" => outcome).increment(1);
}

/// Records the size of a freshly published snapshot.
#[allow(clippy::cast_precision_loss)]
pub fn record_snapshot_entries(source: &'static str, entries: usize) {
    gauge!(SNAPSHOT_ENTRIES, "source" => source).set(entries as f64);
}

/// Records an owner cache lookup: `hit`, `miss` or `error`.
pub fn record_owner_lookup(result: &'static str) {
    counter!(OWNER_LOOKUPS_TOTAL, "result" => result).increment(1);
}
