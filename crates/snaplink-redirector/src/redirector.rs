use crate::error::Result;
use async_trait::async_trait;
use snaplink_core::{ShortId, UrlRecord};
use std::sync::Arc;

#[async_trait]
pub trait Redirector: Send + Sync + 'static {
    /// Resolves a short id to its source URL and records a visit.
    async fn resolve(&self, short_id: &ShortId) -> Result<String>;

    /// Reads the stored record straight from the store, with no side effects.
    async fn stats(&self, short_id: &ShortId) -> Result<UrlRecord>;
}

#[async_trait]
impl<T: Redirector + ?Sized> Redirector for Arc<T> {
    async fn resolve(&self, short_id: &ShortId) -> Result<String> {
        (**self).resolve(short_id).await
    }

    async fn stats(&self, short_id: &ShortId) -> Result<UrlRecord> {
        (**self).stats(short_id).await
    }
}
