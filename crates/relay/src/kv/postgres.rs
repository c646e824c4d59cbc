//! `PostgreSQL` key-value backend over the `relay_kv` table.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

use super::{KvError, KvStore};

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

/// Key-value store backed by `relay_kv`.
#[derive(Debug, Clone)]
pub struct PgKvStore {
    pool: PgPool,
}

impl PgKvStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn upsert(
        &self,
        key: &str,
        value: &[u8],
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), KvError> {
        sqlx::query(
            r"
            INSERT INTO relay_kv (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
            SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            ",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for PgKvStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let value: Option<Vec<u8>> = sqlx::query_scalar(
            r"
            SELECT value FROM relay_kv
            WHERE key = $1 AND (expires_at IS NULL OR expires_at > now())
            ",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;
        Ok(value)
    }

    async fn store(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        self.upsert(key, value, None).await
    }

    async fn store_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError> {
        let ttl_delta = chrono::Duration::from_std(ttl).map_err(|_| KvError::InvalidTtl(ttl))?;
        let expires_at = Utc::now()
            .checked_add_signed(ttl_delta)
            .ok_or(KvError::InvalidTtl(ttl))?;
        self.upsert(key, value, Some(expires_at)).await
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        sqlx::query("DELETE FROM relay_kv WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
