//! Core types and traits for the snaplink URL shortener.
//!
//! This crate provides the record model, the validated [`ShortId`] and the
//! storage and cache contracts shared by the shortener and redirector
//! services.

pub mod cache;
pub mod error;
pub mod repository;
pub mod short_id;

pub use cache::UrlCache;
pub use error::{CacheError, CoreError, StorageError};
pub use repository::{with_timeout, NewUrlRecord, ReadRepository, Repository, UrlRecord};
pub use short_id::{ShortId, SHORT_ID_LEN};
