use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use snaplink_core::cache::Result;
use snaplink_core::{CacheError, ShortId, UrlCache};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

const DEFAULT_KEY_PREFIX: &str = "snaplink:url:";

/// A Redis-backed [`UrlCache`].
///
/// Source URLs are stored as plain strings under `<prefix><short id>` with a
/// server-side expiry. The connection manager reconnects on its own after
/// the server goes away.
#[derive(Clone)]
pub struct RedisUrlCache {
    conn: ConnectionManager,
    key_prefix: String,
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> CacheError {
    let message = format!("{operation}: {err}");
    if err.is_timeout() {
        CacheError::Timeout(message)
    } else if err.is_connection_refusal() || err.is_connection_dropped() || err.is_io_error() {
        CacheError::Unavailable(message)
    } else {
        CacheError::Operation(message)
    }
}

impl RedisUrlCache {
    pub fn new(conn: ConnectionManager) -> Self {
        Self::with_prefix(conn, DEFAULT_KEY_PREFIX)
    }

    pub fn with_prefix(conn: ConnectionManager, key_prefix: impl Into<String>) -> Self {
        Self {
            conn,
            key_prefix: key_prefix.into(),
        }
    }

    /// Opens a managed connection and checks it with a `PING`.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| CacheError::Unavailable(format!("invalid redis url: {e}")))?;
        let mut conn = ConnectionManager::new(client)
            .await
            .map_err(|e| map_redis_error("failed to connect to redis", e))?;

        conn.ping::<()>()
            .await
            .map_err(|e| map_redis_error("redis ping failed", e))?;

        info!("connected to redis");
        Ok(Self::new(conn))
    }

    fn cache_key(&self, short_id: &ShortId) -> String {
        format!("{}{}", self.key_prefix, short_id.as_str())
    }
}

/// Redis expiries have one-second resolution and reject zero.
fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}

#[async_trait]
impl UrlCache for RedisUrlCache {
    async fn get(&self, short_id: &ShortId) -> Result<Option<String>> {
        let key = self.cache_key(short_id);
        let mut conn = self.conn.clone();

        match conn.get::<_, Option<String>>(&key).await {
            Ok(Some(url)) => {
                debug!(code = %short_id, "cache hit in redis");
                Ok(Some(url))
            }
            Ok(None) => {
                trace!(code = %short_id, "cache miss in redis");
                Ok(None)
            }
            Err(e) => {
                warn!(code = %short_id, error = %e, "redis error on get");
                Err(map_redis_error("failed to fetch value from redis", e))
            }
        }
    }

    async fn set(&self, short_id: &ShortId, source_url: &str, ttl: Duration) -> Result<()> {
        let key = self.cache_key(short_id);
        let secs = ttl_secs(ttl);
        let mut conn = self.conn.clone();

        match conn.set_ex::<_, _, ()>(&key, source_url, secs).await {
            Ok(()) => {
                trace!(code = %short_id, ttl_secs = secs, "cached in redis");
                Ok(())
            }
            Err(e) => {
                warn!(code = %short_id, error = %e, "redis error on set");
                Err(map_redis_error("failed to write value to redis", e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_is_rounded_down_to_whole_seconds() {
        assert_eq!(ttl_secs(Duration::from_secs(43_200)), 43_200);
        assert_eq!(ttl_secs(Duration::from_millis(2_900)), 2);
    }

    #[test]
    fn sub_second_ttl_still_expires() {
        assert_eq!(ttl_secs(Duration::ZERO), 1);
        assert_eq!(ttl_secs(Duration::from_millis(10)), 1);
    }
}
