//! Identity lookups against the storage cluster admin API.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::config::IdentitySettings;
use crate::error::{GatewayError, GatewayResult};
use crate::signing::Credentials;

/// Source of access keys and bucket ownership.
#[async_trait]
pub trait IdentitySource: Send + Sync {
    /// Full access-key to principal mapping.
    async fn access_keys(&self) -> GatewayResult<HashMap<String, String>>;

    /// Owner of `bucket`.
    async fn bucket_owner(&self, bucket: &str) -> GatewayResult<String>;
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    #[serde(default)]
    keys: Vec<UserKey>,
}

#[derive(Debug, Deserialize)]
struct UserKey {
    #[serde(default)]
    user: String,
    access_key: String,
}

#[derive(Debug, Deserialize)]
struct BucketInfo {
    owner: String,
}

/// Admin API client.
#[derive(Debug, Clone)]
pub struct AdminClient {
    client: reqwest::Client,
    endpoint: String,
    admin_path: String,
    credentials: Credentials,
}

impl AdminClient {
    /// Create a client from identity settings.
    pub fn new(settings: &IdentitySettings) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("failed to create HTTP client: {e}")))?;

        let admin_path = format!("/{}", settings.admin_path.trim_matches('/'));
        Ok(Self {
            client,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            admin_path,
            credentials: Credentials::new(&settings.access_key, &settings.secret_key),
        })
    }

    /// Signed GET of `{admin_path}{path}` with `query`, decoded as JSON.
    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> GatewayResult<T> {
        let resource = format!("{}{}", self.admin_path, path);
        let date = Credentials::http_date(Utc::now());
        let authorization = self.credentials.authorization("GET", &date, &resource)?;

        let response = self
            .client
            .get(format!("{}{}", self.endpoint, resource))
            .query(&[("format", "json")])
            .query(query)
            .header(http::header::DATE, date)
            .header(http::header::AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::upstream_with_status(
                format!("admin API {resource} returned {status}"),
                status.as_u16(),
            ));
        }
        Ok(response.json().await?)
    }
}

#[async_trait]
impl IdentitySource for AdminClient {
    #[instrument(skip(self))]
    async fn access_keys(&self) -> GatewayResult<HashMap<String, String>> {
        let users: Vec<String> = self.get("/metadata/user", &[]).await?;

        let mut keys = HashMap::new();
        for uid in &users {
            match self.get::<UserInfo>("/user", &[("uid", uid)]).await {
                Ok(info) => {
                    for key in info.keys {
                        let principal = if key.user.is_empty() { uid.clone() } else { key.user };
                        keys.insert(key.access_key, principal);
                    }
                }
                Err(e) => warn!(user = %uid, error = %e, "Skipping user whose keys could not be read"),
            }
        }

        debug!(users = users.len(), keys = keys.len(), "Synchronized access keys");
        Ok(keys)
    }

    #[instrument(skip(self))]
    async fn bucket_owner(&self, bucket: &str) -> GatewayResult<String> {
        let info: BucketInfo = self
            .get("/bucket", &[("bucket", bucket)])
            .await
            .map_err(|e| GatewayError::lookup(format!("owner of bucket {bucket}"), e.to_string()))?;
        Ok(info.owner)
    }
}

/// In-memory identity source.
#[derive(Debug, Default)]
pub struct StaticIdentitySource {
    keys: parking_lot::RwLock<Option<HashMap<String, String>>>,
    owners: parking_lot::RwLock<HashMap<String, String>>,
    owner_lookups: std::sync::atomic::AtomicU64,
}

impl StaticIdentitySource {
    /// Create a source with the given keys and bucket owners.
    pub fn new(keys: HashMap<String, String>, owners: HashMap<String, String>) -> Self {
        Self {
            keys: parking_lot::RwLock::new(Some(keys)),
            owners: parking_lot::RwLock::new(owners),
            owner_lookups: std::sync::atomic::AtomicU64::new(0),
        }
    }

    /// Replace the key mapping returned by later calls.
    pub fn set_keys(&self, keys: HashMap<String, String>) {
        *self.keys.write() = Some(keys);
    }

    /// Make later key fetches fail.
    pub fn fail_keys(&self) {
        *self.keys.write() = None;
    }

    /// Set the owner of a bucket.
    pub fn set_owner(&self, bucket: impl Into<String>, owner: impl Into<String>) {
        self.owners.write().insert(bucket.into(), owner.into());
    }

    /// Number of owner lookups served.
    pub fn owner_lookups(&self) -> u64 {
        self.owner_lookups.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[async_trait]
impl IdentitySource for StaticIdentitySource {
    async fn access_keys(&self) -> GatewayResult<HashMap<String, String>> {
        self.keys
            .read()
            .clone()
            .ok_or_else(|| GatewayError::upstream("identity source unavailable"))
    }

    async fn bucket_owner(&self, bucket: &str) -> GatewayResult<String> {
        self.owner_lookups
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.owners
            .read()
            .get(bucket)
            .cloned()
            .ok_or_else(|| GatewayError::lookup(format!("owner of bucket {bucket}"), "no such bucket"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_path_normalized() {
        let settings = IdentitySettings {
            endpoint: "http://rgw:7480/".into(),
            admin_path: "admin/".into(),
            ..IdentitySettings::default()
        };
        let client = AdminClient::new(&settings).unwrap();
        assert_eq!(client.admin_path, "/admin");
        assert_eq!(client.endpoint, "http://rgw:7480");
    }

    #[test]
    fn test_decode_user_info() {
        let info: UserInfo = serde_json::from_str(
            r#"{"user_id": "alice", "keys": [{"user": "alice", "access_key": "AK1", "secret_key": "s"}]}"#,
        )
        .unwrap();
        assert_eq!(info.keys[0].access_key, "AK1");
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticIdentitySource::new(
            [("AK1".to_string(), "alice".to_string())].into_iter().collect(),
            [("data".to_string(), "alice".to_string())].into_iter().collect(),
        );
        assert_eq!(source.access_keys().await.unwrap()["AK1"], "alice");
        assert_eq!(source.bucket_owner("data").await.unwrap(), "alice");
        assert!(source.bucket_owner("missing").await.is_err());
        assert_eq!(source.owner_lookups(), 2);

        source.fail_keys();
        assert!(source.access_keys().await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_admin_api() {
        let settings = IdentitySettings {
            endpoint: "http://127.0.0.1:1".into(),
            timeout: std::time::Duration::from_millis(500),
            ..IdentitySettings::default()
        };
        let client = AdminClient::new(&settings).unwrap();
        assert!(client.access_keys().await.is_err());
        let err = client.bucket_owner("data").await.unwrap_err();
        assert_eq!(err.category(), "lookup");
    }
}
