use crate::error::StorageError;
use crate::short_id::ShortId;
use async_trait::async_trait;
use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// A stored URL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Store-assigned identifier, never reused.
    pub id: u64,
    /// The original URL that was shortened.
    pub source_url: String,
    /// The public short id.
    pub short_id: ShortId,
    /// Number of successful redirects recorded so far.
    pub visits: u64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// The caller-supplied part of a record to insert.
///
/// The store assigns `id`, `visits` and both timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUrlRecord {
    pub source_url: String,
    pub short_id: ShortId,
}

/// A read-only view of a repository.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Retrieves the record for a given short id.
    /// Returns `None` if the id does not exist.
    async fn find_by_short_id(&self, short_id: &ShortId) -> Result<Option<UrlRecord>>;

    /// Retrieves the record for a given source URL.
    /// Returns `None` if the URL has never been shortened.
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<UrlRecord>>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Inserts a new record atomically.
    ///
    /// Returns `Err(DuplicateShortId)` or `Err(DuplicateSourceUrl)` when the
    /// insert would violate the corresponding uniqueness constraint. Nothing
    /// is written in either case.
    async fn insert(&self, record: NewUrlRecord) -> Result<UrlRecord>;

    /// Adds one to the visit counter and refreshes `updated_at`.
    ///
    /// The increment is evaluated by the store, so concurrent calls never
    /// lose updates. Returns `Err(NotFound)` if no record matches.
    async fn increment_visits(&self, short_id: &ShortId) -> Result<()>;
}

/// Bounds a store call by `timeout`; expiry becomes [`StorageError::Timeout`].
pub async fn with_timeout<T, F>(timeout: Duration, operation: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StorageError::Timeout(format!(
            "{operation} did not complete within {}ms",
            timeout.as_millis()
        ))),
    }
}

#[async_trait]
impl<T: ReadRepository + ?Sized> ReadRepository for Arc<T> {
    async fn find_by_short_id(&self, short_id: &ShortId) -> Result<Option<UrlRecord>> {
        (**self).find_by_short_id(short_id).await
    }

    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<UrlRecord>> {
        (**self).find_by_source_url(source_url).await
    }
}

#[async_trait]
impl<T: Repository + ?Sized> Repository for Arc<T> {
    async fn insert(&self, record: NewUrlRecord) -> Result<UrlRecord> {
        (**self).insert(record).await
    }

    async fn increment_visits(&self, short_id: &ShortId) -> Result<()> {
        (**self).increment_visits(short_id).await
    }
}
