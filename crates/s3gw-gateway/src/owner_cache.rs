//! Time-bounded cache of bucket owners.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::debug;

use crate::admin::IdentitySource;
use crate::error::GatewayResult;

/// Default entry lifetime.
pub const DEFAULT_OWNER_TTL: Duration = Duration::from_secs(3600);

/// Default capacity before expired entries are swept.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

#[derive(Debug, Clone)]
struct CacheEntry {
    owner: String,
    created_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries currently held, expired or not.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that went to the identity source.
    pub misses: u64,
}

/// Bucket name to owner cache, populated on demand.
///
/// Entries are never invalidated other than by expiry. Concurrent misses for
/// the same bucket may both fetch; the last write wins. Fetch errors are not
/// cached.
pub struct BucketOwnerCache {
    source: Arc<dyn IdentitySource>,
    ttl: Duration,
    max_entries: usize,
    entries: RwLock<HashMap<String, CacheEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl std::fmt::Debug for BucketOwnerCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BucketOwnerCache")
            .field("ttl", &self.ttl)
            .field("max_entries", &self.max_entries)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

impl BucketOwnerCache {
    /// Create a cache in front of `source` with the given entry lifetime.
    pub fn new(source: Arc<dyn IdentitySource>, ttl: Duration) -> Self {
        Self {
            source,
            ttl,
            max_entries: DEFAULT_MAX_ENTRIES,
            entries: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Set the capacity at which expired entries are swept.
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries.max(1);
        self
    }

    /// Owner of `bucket`, fetched from the identity source on miss or expiry.
    pub async fn get_owner(&self, bucket: &str) -> GatewayResult<String> {
        if let Some(owner) = self.cached(bucket) {
            self.hits.fetch_add(1, Ordering::Relaxed);
            s3gw_telemetry::record_owner_lookup("hit");
            return Ok(owner);
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let owner = match self.source.bucket_owner(bucket).await {
            Ok(owner) => owner,
            Err(e) => {
                s3gw_telemetry::record_owner_lookup("error");
                return Err(e);
            }
        };
        s3gw_telemetry::record_owner_lookup("miss");

        self.insert(bucket, &owner);
        debug!(bucket, owner = %owner, "Cached bucket owner");
        Ok(owner)
    }

    fn cached(&self, bucket: &str) -> Option<String> {
        let entries = self.entries.read();
        entries
            .get(bucket)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.owner.clone())
    }

    fn insert(&self, bucket: &str, owner: &str) {
        let mut entries = self.entries.write();
        if entries.len() >= self.max_entries && !entries.contains_key(bucket) {
            let ttl = self.ttl;
            entries.retain(|_, entry| !entry.is_expired(ttl));
        }
        entries.insert(
            bucket.to_string(),
            CacheEntry {
                owner: owner.to_string(),
                created_at: Instant::now(),
            },
        );
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Current statistics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entries: self.entries.read().len(),
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::StaticIdentitySource;

    fn source() -> Arc<StaticIdentitySource> {
        let source = StaticIdentitySource::default();
        source.set_owner("data", "alice");
        source.set_owner("logs", "bob");
        Arc::new(source)
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let source = source();
        let cache = BucketOwnerCache::new(source.clone(), DEFAULT_OWNER_TTL);

        assert_eq!(cache.get_owner("data").await.unwrap(), "alice");
        assert_eq!(cache.get_owner("data").await.unwrap(), "alice");

        assert_eq!(source.owner_lookups(), 1);
        let stats = cache.stats();
        assert_eq!((stats.entries, stats.hits, stats.misses), (1, 1, 1));
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let source = source();
        let cache = BucketOwnerCache::new(source.clone(), Duration::from_millis(20));

        assert_eq!(cache.get_owner("data").await.unwrap(), "alice");
        source.set_owner("data", "carol");
        tokio::time::sleep(Duration::from_millis(40)).await;

        assert_eq!(cache.get_owner("data").await.unwrap(), "carol");
        assert_eq!(source.owner_lookups(), 2);
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let source = source();
        let cache = BucketOwnerCache::new(source.clone(), DEFAULT_OWNER_TTL);

        assert!(cache.get_owner("new-bucket").await.is_err());
        source.set_owner("new-bucket", "dave");
        assert_eq!(cache.get_owner("new-bucket").await.unwrap(), "dave");
        assert_eq!(source.owner_lookups(), 2);
    }

    #[tokio::test]
    async fn test_full_cache_sweeps_expired_entries() {
        let source = source();
        let cache = BucketOwnerCache::new(source.clone(), Duration::from_millis(10))
            .with_max_entries(1);

        cache.get_owner("data").await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.get_owner("logs").await.unwrap();

        assert_eq!(cache.stats().entries, 1);
    }
}
