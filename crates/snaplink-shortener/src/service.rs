use crate::error::{Result, ShortenerError};
use crate::shortener::Shortener;
use crate::validate::normalize_source_url;
use async_trait::async_trait;
use snaplink_core::{with_timeout, NewUrlRecord, Repository, ShortId, StorageError, UrlRecord};
use snaplink_generator::Generator;
use std::time::Duration;
use tracing::{debug, info, warn};
use typed_builder::TypedBuilder;

#[derive(Debug, Clone, TypedBuilder)]
pub struct ShortenerConfig {
    /// Total inserts tried before giving up on finding a free short id.
    #[builder(default = 5)]
    pub max_attempts: u32,
    /// Upper bound for each store call.
    #[builder(default = Duration::from_secs(3))]
    pub store_timeout: Duration,
}

impl Default for ShortenerConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Creates short URLs on top of a [`Repository`] and a [`Generator`].
///
/// Uniqueness is never pre-checked: a candidate id is inserted and a
/// `DuplicateShortId` from the store triggers a fresh candidate. A
/// `DuplicateSourceUrl` means another caller shortened the same URL first,
/// and that caller's record is returned.
#[derive(Debug, Clone)]
pub struct ShortenerService<R, G> {
    repository: R,
    generator: G,
    config: ShortenerConfig,
}

impl<R: Repository, G: Generator> ShortenerService<R, G> {
    pub fn new(repository: R, generator: G) -> Self {
        Self::with_config(repository, generator, ShortenerConfig::default())
    }

    pub fn with_config(repository: R, generator: G, config: ShortenerConfig) -> Self {
        Self {
            repository,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &ShortenerConfig {
        &self.config
    }

    async fn find_existing(&self, source_url: &str) -> Result<Option<UrlRecord>> {
        let found = with_timeout(
            self.config.store_timeout,
            "find_by_source_url",
            self.repository.find_by_source_url(source_url),
        )
        .await?;
        Ok(found)
    }

    async fn insert(&self, record: NewUrlRecord) -> std::result::Result<UrlRecord, StorageError> {
        with_timeout(
            self.config.store_timeout,
            "insert",
            self.repository.insert(record),
        )
        .await
    }
}

#[async_trait]
impl<R: Repository, G: Generator> Shortener for ShortenerService<R, G> {
    async fn create_or_reuse(&self, source_url: &str) -> Result<UrlRecord> {
        let source_url = normalize_source_url(source_url)?;

        if let Some(existing) = self.find_existing(&source_url).await? {
            debug!(code = %existing.short_id, "reusing existing short url");
            return Ok(existing);
        }

        let attempts = self.config.max_attempts.max(1);
        for attempt in 1..=attempts {
            let short_id: ShortId = self.generator.generate().into();
            let candidate = NewUrlRecord {
                source_url: source_url.clone(),
                short_id: short_id.clone(),
            };

            match self.insert(candidate).await {
                Ok(record) => {
                    info!(code = %record.short_id, attempt, "created short url");
                    return Ok(record);
                }
                Err(StorageError::DuplicateShortId(_)) => {
                    debug!(code = %short_id, attempt, "short id already taken, retrying");
                }
                Err(StorageError::DuplicateSourceUrl(_)) => {
                    debug!("source url was shortened concurrently, reusing the winner");
                    return self.find_existing(&source_url).await?.ok_or_else(|| {
                        ShortenerError::Storage(StorageError::NotFound(format!(
                            "record for {source_url} vanished after a duplicate insert"
                        )))
                    });
                }
                Err(e) => {
                    warn!(code = %short_id, error = %e, "failed to insert short url");
                    return Err(e.into());
                }
            }
        }

        warn!(attempts, "no free short id found");
        Err(ShortenerError::IdentifierSpaceExhausted { attempts })
    }
}
