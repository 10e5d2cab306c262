use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use snaplink_core::cache::Result;
use snaplink_core::{ShortId, UrlCache};
use std::time::{Duration, Instant};
use tracing::{debug, trace};
use typed_builder::TypedBuilder;

const DEFAULT_CAPACITY: u64 = 10_000;

#[derive(Debug, Clone)]
struct CachedUrl {
    source_url: String,
    ttl: Duration,
}

/// Expires each entry after the ttl it was written with.
struct PerEntryTtl;

impl Expiry<String, CachedUrl> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedUrl,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &CachedUrl,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

/// An in-process cache backed by Moka.
///
/// Suited to single-node deployments. Entries expire after the ttl passed to
/// [`UrlCache::set`]; `max_ttl` optionally caps it.
#[derive(Debug, Clone)]
pub struct MokaUrlCache {
    cache: Cache<String, CachedUrl>,
    max_ttl: Option<Duration>,
}

impl MokaUrlCache {
    /// Creates a cache holding at most 10,000 entries.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(max_capacity: u64) -> Self {
        CacheConfig::builder().max_capacity(max_capacity).build().into()
    }

    /// Creates a cache whose entries never outlive `ttl`, whatever the caller asks for.
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        CacheConfig::builder()
            .max_capacity(max_capacity)
            .max_ttl(ttl)
            .build()
            .into()
    }

    pub fn builder() -> CacheConfigBuilder {
        CacheConfig::builder()
    }

    /// Approximate number of live entries.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for MokaUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlCache for MokaUrlCache {
    async fn get(&self, short_id: &ShortId) -> Result<Option<String>> {
        match self.cache.get(short_id.as_str()).await {
            Some(entry) => {
                debug!(code = %short_id, "cache hit in moka");
                Ok(Some(entry.source_url))
            }
            None => {
                trace!(code = %short_id, "cache miss in moka");
                Ok(None)
            }
        }
    }

    async fn set(&self, short_id: &ShortId, source_url: &str, ttl: Duration) -> Result<()> {
        let ttl = self.max_ttl.map_or(ttl, |max| ttl.min(max));
        let entry = CachedUrl {
            source_url: source_url.to_owned(),
            ttl,
        };

        self.cache.insert(short_id.as_str().to_owned(), entry).await;
        trace!(code = %short_id, ttl_ms = ttl.as_millis() as u64, "cached in moka");
        Ok(())
    }
}

/// Configuration for a [`MokaUrlCache`].
#[derive(Debug, Default, TypedBuilder)]
pub struct CacheConfig {
    /// Maximum number of entries the cache can hold.
    #[builder(default, setter(strip_option))]
    max_capacity: Option<u64>,
    /// Upper bound applied to every entry's ttl.
    #[builder(default, setter(strip_option))]
    max_ttl: Option<Duration>,
}

impl From<CacheConfig> for MokaUrlCache {
    fn from(config: CacheConfig) -> Self {
        let cache = Cache::builder()
            .max_capacity(config.max_capacity.unwrap_or(DEFAULT_CAPACITY))
            .expire_after(PerEntryTtl)
            .build();

        MokaUrlCache {
            cache,
            max_ttl: config.max_ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ShortId {
        ShortId::new_unchecked(s)
    }

    #[tokio::test]
    async fn get_returns_what_was_set() {
        let cache = MokaUrlCache::new();

        assert_eq!(cache.get(&id("abc123")).await.unwrap(), None);

        cache
            .set(&id("abc123"), "https://example.com/a", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get(&id("abc123")).await.unwrap().as_deref(),
            Some("https://example.com/a")
        );
    }

    #[tokio::test]
    async fn keys_are_case_sensitive() {
        let cache = MokaUrlCache::new();

        cache
            .set(&id("abcdef"), "https://example.com/a", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(cache.get(&id("ABCDEF")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn set_overwrites_previous_value() {
        let cache = MokaUrlCache::new();

        cache
            .set(&id("abc123"), "https://example.com/a", Duration::from_secs(60))
            .await
            .unwrap();
        cache
            .set(&id("abc123"), "https://example.com/b", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get(&id("abc123")).await.unwrap().as_deref(),
            Some("https://example.com/b")
        );
    }

    #[tokio::test]
    async fn entries_expire_after_their_ttl() {
        let cache = MokaUrlCache::new();

        cache
            .set(&id("abc123"), "https://example.com/a", Duration::from_millis(50))
            .await
            .unwrap();
        cache
            .set(&id("xyz789"), "https://example.com/b", Duration::from_secs(60))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.get(&id("abc123")).await.unwrap(), None);
        assert!(cache.get(&id("xyz789")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn max_ttl_caps_requested_ttl() {
        let cache = MokaUrlCache::with_ttl(100, Duration::from_millis(50));

        cache
            .set(&id("abc123"), "https://example.com/a", Duration::from_secs(3600))
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(cache.get(&id("abc123")).await.unwrap(), None);
    }
}
