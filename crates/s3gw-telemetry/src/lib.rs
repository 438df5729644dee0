//! Observability for the s3gw authorization gateway.
//!
//! - **Logging**: structured JSON logs through `tracing-subscriber`
//! - **Metrics**: Prometheus text exposition through the `metrics` facade
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                    s3gw                       │
//! │  ┌────────────────────────────────────────┐  │
//! │  │             s3gw-telemetry              │  │
//! │  │   ┌─────────────┐   ┌─────────────┐    │  │
//! │  │   │   Metrics   │   │   Logging   │    │  │
//! │  │   │ (Prometheus)│   │   (JSON)    │    │  │
//! │  │   └──────┬──────┘   └──────┬──────┘    │  │
//! │  └──────────┼─────────────────┼───────────┘  │
//! └─────────────┼─────────────────┼──────────────┘
//!               ▼                 ▼
//!       /_s3gw/metrics         stdout
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use s3gw_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let config = TelemetryConfig::builder()
//!     .service_name("s3gw")
//!     .log_level("info")
//!     .build();
//! init_telemetry(&config)?;
//! ```

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::{TelemetryConfig, TelemetryConfigBuilder};
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_decision, record_owner_lookup, record_refresh, record_request_duration,
    record_snapshot_entries, render_metrics, MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}
