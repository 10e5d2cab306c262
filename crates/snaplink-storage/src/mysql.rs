use async_trait::async_trait;
use jiff::Timestamp;
use snaplink_core::repository::Result;
use snaplink_core::{NewUrlRecord, ReadRepository, Repository, ShortId, StorageError, UrlRecord};
use sqlx::mysql::{MySqlPoolOptions, MySqlRow};
use sqlx::{MySqlPool, Row};
use std::time::Duration;
use tracing::{debug, info, warn};

const SHORT_ID_KEY: &str = "uq_short_urls_short_id";
const SOURCE_URL_KEY: &str = "uq_short_urls_source_url";

const SCHEMA: &str = include_str!("../ddl/mysql/short_urls.sql");

/// MySQL implementation of the repository contract.
///
/// Both uniqueness constraints live in the schema (`short_urls.sql`); inserts
/// rely on them instead of checking availability first. Timestamps are
/// assigned by the server and read back as unix milliseconds.
#[derive(Debug, Clone)]
pub struct MySqlRepository {
    pool: MySqlPool,
}

impl MySqlRepository {
    /// Creates a repository from an existing MySQL connection pool.
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }

    /// Creates a repository by opening a new MySQL connection pool.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect(database_url)
            .await
            .map_err(map_sqlx_error)?;

        info!(max_connections, "connected to mysql");
        Ok(Self::new(pool))
    }

    /// Creates the `short_urls` table if it does not exist yet.
    pub async fn ensure_schema(&self) -> Result<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        debug!("short_urls schema is in place");
        Ok(())
    }

    /// Returns a reference to the underlying pool.
    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    /// Closes every pooled connection.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("mysql pool closed");
    }
}

fn parse_millis(column: &str, millis: i64) -> Result<Timestamp> {
    Timestamp::from_millisecond(millis).map_err(|e| {
        StorageError::InvalidData(format!("invalid {column} timestamp '{millis}': {e}"))
    })
}

fn row_to_record(row: &MySqlRow) -> Result<UrlRecord> {
    let id: u64 = row.try_get("id").map_err(map_sqlx_error)?;
    let short_id: String = row.try_get("short_id").map_err(map_sqlx_error)?;
    let source_url: String = row.try_get("source_url").map_err(map_sqlx_error)?;
    let visits: u64 = row.try_get("visits").map_err(map_sqlx_error)?;
    let created_at: i64 = row.try_get("created_at_ms").map_err(map_sqlx_error)?;
    let updated_at: i64 = row.try_get("updated_at_ms").map_err(map_sqlx_error)?;

    Ok(UrlRecord {
        id,
        source_url,
        short_id: ShortId::new_unchecked(short_id),
        visits,
        created_at: parse_millis("created_at", created_at)?,
        updated_at: parse_millis("updated_at", updated_at)?,
    })
}

fn map_sqlx_error(err: sqlx::Error) -> StorageError {
    let message = err.to_string();

    match err {
        sqlx::Error::PoolTimedOut => StorageError::Timeout(message),
        sqlx::Error::PoolClosed
        | sqlx::Error::WorkerCrashed
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_) => StorageError::Unavailable(message),
        sqlx::Error::ColumnIndexOutOfBounds { .. }
        | sqlx::Error::ColumnNotFound(_)
        | sqlx::Error::ColumnDecode { .. }
        | sqlx::Error::TypeNotFound { .. }
        | sqlx::Error::Decode(_)
        | sqlx::Error::RowNotFound => StorageError::InvalidData(message),
        _ => StorageError::Query(message),
    }
}

/// Tells the two unique keys apart. MySQL reports the violated key only in
/// the message (`Duplicate entry '..' for key 'short_urls.uq_..'`).
fn map_insert_error(err: sqlx::Error, record: &NewUrlRecord) -> StorageError {
    let Some(db_err) = err.as_database_error() else {
        return map_sqlx_error(err);
    };
    if !db_err.is_unique_violation() {
        return map_sqlx_error(err);
    }

    let names_key = |key: &str| {
        db_err.constraint().is_some_and(|c| c.ends_with(key)) || db_err.message().contains(key)
    };

    if names_key(SOURCE_URL_KEY) {
        StorageError::DuplicateSourceUrl(record.source_url.clone())
    } else if names_key(SHORT_ID_KEY) {
        StorageError::DuplicateShortId(record.short_id.to_string())
    } else {
        StorageError::Query(db_err.message().to_string())
    }
}

#[async_trait]
impl ReadRepository for MySqlRepository {
    async fn find_by_short_id(&self, short_id: &ShortId) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, short_id, source_url, visits,
                   CAST(UNIX_TIMESTAMP(created_at) * 1000 AS SIGNED) AS created_at_ms,
                   CAST(UNIX_TIMESTAMP(updated_at) * 1000 AS SIGNED) AS updated_at_ms
            FROM short_urls
            WHERE short_id = ?
            LIMIT 1
            "#,
        )
        .bind(short_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_record).transpose()
    }

    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<UrlRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, short_id, source_url, visits,
                   CAST(UNIX_TIMESTAMP(created_at) * 1000 AS SIGNED) AS created_at_ms,
                   CAST(UNIX_TIMESTAMP(updated_at) * 1000 AS SIGNED) AS updated_at_ms
            FROM short_urls
            WHERE source_url = ?
            LIMIT 1
            "#,
        )
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        row.as_ref().map(row_to_record).transpose()
    }
}

#[async_trait]
impl Repository for MySqlRepository {
    async fn insert(&self, record: NewUrlRecord) -> Result<UrlRecord> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO short_urls (short_id, source_url)
            VALUES (?, ?)
            "#,
        )
        .bind(record.short_id.as_str())
        .bind(record.source_url.as_str())
        .execute(&mut *tx)
        .await;

        let inserted = match inserted {
            Ok(result) => result,
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!(error = %e, "failed to roll back insert");
                }
                return Err(map_insert_error(err, &record));
            }
        };

        let row = sqlx::query(
            r#"
            SELECT id, short_id, source_url, visits,
                   CAST(UNIX_TIMESTAMP(created_at) * 1000 AS SIGNED) AS created_at_ms,
                   CAST(UNIX_TIMESTAMP(updated_at) * 1000 AS SIGNED) AS updated_at_ms
            FROM short_urls
            WHERE id = ?
            "#,
        )
        .bind(inserted.last_insert_id())
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        row_to_record(&row)
    }

    async fn increment_visits(&self, short_id: &ShortId) -> Result<()> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        let result = sqlx::query(
            r#"
            UPDATE short_urls
            SET visits = visits + 1,
                updated_at = CURRENT_TIMESTAMP(3)
            WHERE short_id = ?
            "#,
        )
        .bind(short_id.as_str())
        .execute(&mut *tx)
        .await;

        let affected = match result {
            Ok(result) => result.rows_affected(),
            Err(err) => {
                if let Err(e) = tx.rollback().await {
                    warn!(code = %short_id, error = %e, "failed to roll back visit increment");
                }
                return Err(map_sqlx_error(err));
            }
        };

        if affected == 0 {
            tx.rollback().await.map_err(map_sqlx_error)?;
            return Err(StorageError::NotFound(short_id.to_string()));
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }
}
