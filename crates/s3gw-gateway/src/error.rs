//! Error types for the s3gw gateway.

use s3gw_authz::AuthzError;
use thiserror::Error;

/// Gateway errors.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config {
        /// Error message.
        message: String,
    },

    /// Backend or collaborator returned an unusable response.
    #[error("Upstream error: {message}")]
    Upstream {
        /// Error message.
        message: String,
        /// Optional HTTP status code from upstream.
        status: Option<u16>,
    },

    /// Proxy error during request forwarding.
    #[error("Proxy error: {message}")]
    Proxy {
        /// Error message.
        message: String,
    },

    /// Request denied by the authorization pipeline.
    #[error("Access denied: {reason}")]
    AccessDenied {
        /// Internal reason. Logged, never sent to clients.
        reason: String,
    },

    /// Owner, group or tag lookup failed.
    #[error("Lookup failed for {what}: {message}")]
    Lookup {
        /// What was being looked up.
        what: String,
        /// Error message.
        message: String,
    },

    /// Trust data could not be loaded at startup.
    #[error("Startup error: {message}")]
    Startup {
        /// Error message.
        message: String,
    },

    /// Server error.
    #[error("Server error: {message}")]
    Server {
        /// Error message.
        message: String,
    },

    /// TLS setup error.
    #[error("TLS error: {message}")]
    Tls {
        /// Error message.
        message: String,
    },

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error.
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Request client error.
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    /// Policy engine error.
    #[error("Authorization error: {0}")]
    Authz(#[from] AuthzError),
}

impl GatewayError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an upstream error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
            status: None,
        }
    }

    /// Create an upstream error with status code.
    pub fn upstream_with_status(message: impl Into<String>, status: u16) -> Self {
        Self::Upstream {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Create a proxy error.
    pub fn proxy(message: impl Into<String>) -> Self {
        Self::Proxy {
            message: message.into(),
        }
    }

    /// Create an access denied error.
    pub fn access_denied(reason: impl Into<String>) -> Self {
        Self::AccessDenied {
            reason: reason.into(),
        }
    }

    /// Create a lookup error.
    pub fn lookup(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Lookup {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Create a startup error.
    pub fn startup(message: impl Into<String>) -> Self {
        Self::Startup {
            message: message.into(),
        }
    }

    /// Create a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::Server {
            message: message.into(),
        }
    }

    /// Create a TLS error.
    pub fn tls(message: impl Into<String>) -> Self {
        Self::Tls {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error.
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Config { .. } => 500,
            Self::Upstream { status, .. } => status.unwrap_or(502),
            Self::Proxy { .. } => 502,
            Self::AccessDenied { .. } => 403,
            Self::Lookup { .. } => 502,
            Self::Startup { .. } => 503,
            Self::Server { .. } => 500,
            Self::Tls { .. } => 500,
            Self::Io(_) => 500,
            Self::Http(_) => 400,
            Self::Json(_) => 400,
            Self::Request(_) => 502,
            Self::Authz(_) => 500,
        }
    }

    /// Check if this error is recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Upstream { .. } | Self::Proxy { .. } | Self::Lookup { .. } | Self::Request(_)
        ) || matches!(self, Self::Authz(e) if e.is_retryable())
    }

    /// Get the error category for metrics.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config { .. } => "config",
            Self::Upstream { .. } => "upstream",
            Self::Proxy { .. } => "proxy",
            Self::AccessDenied { .. } => "authorization",
            Self::Lookup { .. } => "lookup",
            Self::Startup { .. } => "startup",
            Self::Server { .. } => "server",
            Self::Tls { .. } => "tls",
            Self::Io(_) => "io",
            Self::Http(_) => "http",
            Self::Json(_) => "json",
            Self::Request(_) => "request",
            Self::Authz(_) => "authz",
        }
    }
}

/// Result type for gateway operations.
pub type GatewayResult<T> = Result<T, GatewayError>;
