//! Key-value persistence consumed by every store in the relay.
//!
//! # Backends
//!
//! - [`MemoryKvStore`] - Process-local map, used when no database is configured
//! - [`PgKvStore`] - `relay_kv` table in `PostgreSQL`
//!
//! # Migrations
//!
//! The `relay_kv` table is created by `crates/relay/migrations/` and run via:
//! ```bash
//! cargo run -p devops-relay-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryKvStore;
pub use postgres::PgKvStore;

/// Errors from the key-value backend.
#[derive(Debug, Error)]
pub enum KvError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// TTL does not fit the backend's representation.
    #[error("invalid ttl: {0:?}")]
    InvalidTtl(Duration),
}

/// String-keyed byte store with optional expiry.
///
/// Expired entries behave as absent.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Load a value, `None` when absent or expired.
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, KvError>;

    /// Store a value without expiry, replacing any existing value.
    async fn store(&self, key: &str, value: &[u8]) -> Result<(), KvError>;

    /// Store a value that expires after `ttl`.
    async fn store_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError>;

    /// Delete a value. Deleting an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<(), KvError>;
}
