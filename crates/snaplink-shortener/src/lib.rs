//! Creation of short URLs.
//!
//! [`ShortenerService`] turns a source URL into a stored record, reusing the
//! existing record when the URL was shortened before. Candidate ids come
//! from a [`snaplink_generator::Generator`]; the store's uniqueness
//! constraints decide whether a candidate is accepted.

pub mod error;
pub mod service;
pub mod shortener;
pub mod validate;

pub use error::ShortenerError;
pub use service::{ShortenerConfig, ShortenerService};
pub use shortener::Shortener;
