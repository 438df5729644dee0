//! Signature v2 request signing for the storage cluster's admin and S3 APIs.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{GatewayError, GatewayResult};

type HmacSha1 = Hmac<Sha1>;

/// Static credentials used to sign outbound requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Access key id.
    pub access_key: String,
    /// Secret key.
    pub secret_key: String,
}

impl Credentials {
    /// Create credentials.
    pub fn new(access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self {
            access_key: access_key.into(),
            secret_key: secret_key.into(),
        }
    }

    /// `Date` header value for `time`.
    pub fn http_date(time: DateTime<Utc>) -> String {
        time.format("%a, %d %b %Y %H:%M:%S GMT").to_string()
    }

    /// `Authorization` header value for a request without body.
    ///
    /// `resource` is the canonical resource: the request path plus any
    /// sub-resource such as `?tagging`.
    pub fn authorization(&self, method: &str, date: &str, resource: &str) -> GatewayResult<String> {
        let string_to_sign = format!("{method}\n\n\n{date}\n{resource}");
        let mut mac = HmacSha1::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| GatewayError::config(format!("invalid signing key: {e}")))?;
        mac.update(string_to_sign.as_bytes());
        let signature = STANDARD.encode(mac.finalize().into_bytes());
        Ok(format!("AWS {}:{}", self.access_key, signature))
    }
}
