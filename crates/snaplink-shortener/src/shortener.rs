use crate::error::Result;
use async_trait::async_trait;
use snaplink_core::UrlRecord;
use std::sync::Arc;

#[async_trait]
pub trait Shortener: Send + Sync + 'static {
    /// Returns the record for `source_url`, creating it on first use.
    ///
    /// Calling this repeatedly, or concurrently, with the same URL yields the
    /// same short id.
    async fn create_or_reuse(&self, source_url: &str) -> Result<UrlRecord>;
}

#[async_trait]
impl<T: Shortener + ?Sized> Shortener for Arc<T> {
    async fn create_or_reuse(&self, source_url: &str) -> Result<UrlRecord> {
        (**self).create_or_reuse(source_url).await
    }
}
