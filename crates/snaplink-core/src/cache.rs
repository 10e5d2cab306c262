use crate::error::CacheError;
use crate::short_id::ShortId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;

/// A best-effort cache of `short id -> source url` mappings.
///
/// Implementations can use Redis, in-memory caches, or nothing at all. The
/// cache is never the source of truth: an entry may be missing or evicted at
/// any time.
#[async_trait]
pub trait UrlCache: Send + Sync + 'static {
    /// Get the cached source URL.
    ///
    /// Returns `Ok(None)` if the key is not in the cache.
    async fn get(&self, short_id: &ShortId) -> Result<Option<String>>;

    /// Store a source URL that expires after `ttl`.
    async fn set(&self, short_id: &ShortId, source_url: &str, ttl: Duration) -> Result<()>;
}

#[async_trait]
impl<T: UrlCache + ?Sized> UrlCache for Arc<T> {
    async fn get(&self, short_id: &ShortId) -> Result<Option<String>> {
        (**self).get(short_id).await
    }

    async fn set(&self, short_id: &ShortId, source_url: &str, ttl: Duration) -> Result<()> {
        (**self).set(short_id, source_url, ttl).await
    }
}
