use crate::error::{RedirectorError, Result};
use crate::redirector::Redirector;
use crate::visits::VisitRecorder;
use async_trait::async_trait;
use snaplink_core::{with_timeout, ReadRepository, ShortId, UrlCache, UrlRecord};
use std::time::Duration;
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct RedirectorConfig {
    /// Lifetime of a cache entry written on a miss.
    #[builder(default = Duration::from_secs(12 * 60 * 60))]
    pub cache_ttl: Duration,
    /// Upper bound for each cache call; expiry counts as a miss.
    #[builder(default = Duration::from_millis(200))]
    pub cache_timeout: Duration,
    /// Upper bound for each store call.
    #[builder(default = Duration::from_secs(3))]
    pub store_timeout: Duration,
}

impl Default for RedirectorConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Cache-aside resolution of short ids.
///
/// The cache is an optimisation only: errors and timeouts from it are logged
/// and the store is consulted instead.
#[derive(Debug, Clone)]
pub struct RedirectorService<R, C> {
    repository: R,
    cache: C,
    visits: VisitRecorder,
    config: RedirectorConfig,
}

impl<R: ReadRepository, C: UrlCache> RedirectorService<R, C> {
    pub fn new(repository: R, cache: C, visits: VisitRecorder) -> Self {
        Self::with_config(repository, cache, visits, RedirectorConfig::default())
    }

    pub fn with_config(
        repository: R,
        cache: C,
        visits: VisitRecorder,
        config: RedirectorConfig,
    ) -> Self {
        Self {
            repository,
            cache,
            visits,
            config,
        }
    }

    pub fn config(&self) -> &RedirectorConfig {
        &self.config
    }

    async fn cached(&self, short_id: &ShortId) -> Option<String> {
        match tokio::time::timeout(self.config.cache_timeout, self.cache.get(short_id)).await {
            Ok(Ok(hit)) => hit,
            Ok(Err(e)) => {
                warn!(code = %short_id, error = %e, "cache lookup failed, using store");
                None
            }
            Err(_) => {
                warn!(code = %short_id, "cache lookup timed out, using store");
                None
            }
        }
    }

    async fn populate(&self, short_id: &ShortId, source_url: &str) {
        let set = self.cache.set(short_id, source_url, self.config.cache_ttl);
        match tokio::time::timeout(self.config.cache_timeout, set).await {
            Ok(Ok(())) => trace!(code = %short_id, "cache populated"),
            Ok(Err(e)) => warn!(code = %short_id, error = %e, "failed to populate cache"),
            Err(_) => warn!(code = %short_id, "cache population timed out"),
        }
    }

    async fn load(&self, short_id: &ShortId) -> Result<UrlRecord> {
        with_timeout(
            self.config.store_timeout,
            "find_by_short_id",
            self.repository.find_by_short_id(short_id),
        )
        .await?
        .ok_or_else(|| RedirectorError::NotFound(short_id.to_string()))
    }
}

#[async_trait]
impl<R: ReadRepository, C: UrlCache> Redirector for RedirectorService<R, C> {
    async fn resolve(&self, short_id: &ShortId) -> Result<String> {
        let source_url = match self.cached(short_id).await {
            Some(source_url) => source_url,
            None => {
                let record = self.load(short_id).await.inspect_err(|e| {
                    debug!(code = %short_id, error = %e, "short id did not resolve");
                })?;
                self.populate(short_id, &record.source_url).await;
                record.source_url
            }
        };

        self.visits.record(short_id.clone());
        debug!(code = %short_id, "resolved short id");
        Ok(source_url)
    }

    async fn stats(&self, short_id: &ShortId) -> Result<UrlRecord> {
        self.load(short_id).await
    }
}
