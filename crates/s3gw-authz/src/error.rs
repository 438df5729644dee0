//! Error types for the authorization crate.

use thiserror::Error;

/// Result type for authorization operations.
pub type AuthzResult<T> = Result<T, AuthzError>;

/// Errors that can occur while loading or evaluating policies.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AuthzError {
    /// Downloading the policy set failed.
    #[error("failed to fetch policies for service {service}: {message}")]
    PolicyFetch {
        /// Service the policies belong to.
        service: String,
        /// Error message.
        message: String,
    },

    /// The downloaded policy document could not be decoded.
    #[error("failed to parse policy document: {0}")]
    PolicyParse(String),

    /// A policy item carries a condition kind the engine does not know.
    #[error("unsupported condition type: {0}")]
    UnsupportedCondition(String),

    /// An address in the request could not be parsed.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuthzError {
    /// Create a policy fetch error.
    pub fn policy_fetch(service: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PolicyFetch {
            service: service.into(),
            message: message.into(),
        }
    }

    /// Check if this error came from evaluating a condition.
    pub const fn is_condition_failure(&self) -> bool {
        matches!(self, Self::UnsupportedCondition(_) | Self::InvalidAddress(_))
    }

    /// Check if this is a retryable error.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::PolicyFetch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_fetch_error() {
        let err = AuthzError::policy_fetch("s3", "connection refused");
        assert!(err.to_string().contains("s3"));
        assert!(err.to_string().contains("connection refused"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_condition_failure() {
        assert!(AuthzError::UnsupportedCondition("time-range".into()).is_condition_failure());
        assert!(AuthzError::InvalidAddress("not-an-ip".into()).is_condition_failure());
        assert!(!AuthzError::PolicyParse("eof".into()).is_condition_failure());
    }

    #[test]
    fn test_error_display() {
        let err = AuthzError::UnsupportedCondition("time-range".to_string());
        assert_eq!(err.to_string(), "unsupported condition type: time-range");
    }
}
