//! Bucket tag lookup. Tags enrich log records only and never affect a decision.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::config::TagSettings;
use crate::error::{GatewayError, GatewayResult};
use crate::signing::Credentials;

/// One bucket tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Tag key.
    #[serde(rename = "Key")]
    pub key: String,
    /// Tag value.
    #[serde(rename = "Value", default)]
    pub value: String,
}

impl Tag {
    /// Create a tag.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Tagging {
    #[serde(rename = "TagSet", default)]
    tag_set: TagSet,
}

#[derive(Debug, Default, Deserialize)]
struct TagSet {
    #[serde(rename = "Tag", default)]
    tags: Vec<Tag>,
}

/// Parse a `GetBucketTagging` response body.
pub fn parse_tagging(xml: &str) -> GatewayResult<Vec<Tag>> {
    let tagging: Tagging = quick_xml::de::from_str(xml)
        .map_err(|e| GatewayError::upstream(format!("invalid tagging document: {e}")))?;
    Ok(tagging.tag_set.tags)
}

/// Source of bucket tags.
#[async_trait]
pub trait TagSource: Send + Sync {
    /// Tags set on `bucket`.
    async fn bucket_tags(&self, bucket: &str) -> GatewayResult<Vec<Tag>>;
}

/// Reads tags through the S3 `?tagging` sub-resource.
#[derive(Debug, Clone)]
pub struct S3TagClient {
    client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl S3TagClient {
    /// Create a client. An empty endpoint in `settings` falls back to `default_endpoint`.
    pub fn new(settings: &TagSettings, default_endpoint: &str) -> GatewayResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()
            .map_err(|e| GatewayError::config(format!("failed to create HTTP client: {e}")))?;

        let endpoint = if settings.endpoint.is_empty() {
            default_endpoint
        } else {
            &settings.endpoint
        };

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            credentials: Credentials::new(&settings.access_key, &settings.secret_key),
        })
    }
}

#[async_trait]
impl TagSource for S3TagClient {
    #[instrument(skip(self))]
    async fn bucket_tags(&self, bucket: &str) -> GatewayResult<Vec<Tag>> {
        let resource = format!("/{bucket}?tagging");
        let date = Credentials::http_date(Utc::now());
        let authorization = self.credentials.authorization("GET", &date, &resource)?;

        let response = self
            .client
            .get(format!("{}{}", self.endpoint, resource))
            .header(http::header::DATE, date)
            .header(http::header::AUTHORIZATION, authorization)
            .send()
            .await?;

        let status = response.status();
        // Buckets without tags answer NoSuchTagSet
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(GatewayError::upstream_with_status(
                format!("tagging request for {bucket} returned {status}"),
                status.as_u16(),
            ));
        }

        parse_tagging(&response.text().await?)
    }
}

/// Map-backed tag source.
#[derive(Debug, Default, Clone)]
pub struct StaticTagSource {
    tags: HashMap<String, Vec<Tag>>,
    lookups: Arc<AtomicUsize>,
}

impl StaticTagSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add tags for a bucket.
    #[must_use]
    pub fn with_tags(mut self, bucket: impl Into<String>, tags: Vec<Tag>) -> Self {
        self.tags.insert(bucket.into(), tags);
        self
    }

    /// Number of lookups served, shared between clones.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TagSource for StaticTagSource {
    async fn bucket_tags(&self, bucket: &str) -> GatewayResult<Vec<Tag>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.tags.get(bucket).cloned().unwrap_or_default())
    }
}

/// Render tags as `key=value` pairs for log fields.
pub fn format_tags(tags: &[Tag]) -> String {
    tags.iter()
        .map(|tag| format!("{}={}", tag.key, tag.value))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tagging() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<Tagging xmlns="http://s3.amazonaws.com/doc/2006-03-01/">
  <TagSet>
    <Tag><Key>team</Key><Value>analytics</Value></Tag>
    <Tag><Key>env</Key><Value>prod</Value></Tag>
  </TagSet>
</Tagging>"#;
        let tags = parse_tagging(xml).unwrap();
        assert_eq!(
            tags,
            vec![Tag::new("team", "analytics"), Tag::new("env", "prod")]
        );
        assert_eq!(format_tags(&tags), "team=analytics,env=prod");
    }

    #[test]
    fn test_parse_empty_tag_set() {
        let tags = parse_tagging("<Tagging><TagSet></TagSet></Tagging>").unwrap();
        assert!(tags.is_empty());
    }

    #[test]
    fn test_endpoint_fallback() {
        let settings = TagSettings::default();
        let client = S3TagClient::new(&settings, "http://rgw:7480/").unwrap();
        assert_eq!(client.endpoint, "http://rgw:7480");
    }

    #[tokio::test]
    async fn test_static_source() {
        let source = StaticTagSource::new().with_tags("data", vec![Tag::new("team", "a")]);
        assert_eq!(source.bucket_tags("data").await.unwrap().len(), 1);
        assert!(source.bucket_tags("other").await.unwrap().is_empty());
    }
}
