//! Cache backends for `short id -> source url` lookups.

pub mod moka;
pub mod noop;
pub mod redis;

pub use moka::{CacheConfig, MokaUrlCache};
pub use noop::NoopUrlCache;
pub use redis::RedisUrlCache;
pub use snaplink_core::{CacheError, UrlCache};
