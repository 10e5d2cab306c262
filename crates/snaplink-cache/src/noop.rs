use async_trait::async_trait;
use snaplink_core::cache::Result;
use snaplink_core::{ShortId, UrlCache};
use std::time::Duration;
use tracing::debug;

/// A cache that stores nothing.
///
/// Used when caching is disabled or Redis cannot be reached at startup.
/// Every lookup is a miss and every write succeeds.
#[derive(Debug, Clone, Copy)]
pub struct NoopUrlCache;

impl NoopUrlCache {
    pub fn new() -> Self {
        debug!("caching disabled");
        Self
    }
}

impl Default for NoopUrlCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl UrlCache for NoopUrlCache {
    async fn get(&self, _short_id: &ShortId) -> Result<Option<String>> {
        Ok(None)
    }

    async fn set(&self, _short_id: &ShortId, _source_url: &str, _ttl: Duration) -> Result<()> {
        Ok(())
    }
}
