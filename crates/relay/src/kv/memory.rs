//! In-memory key-value backend.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KvError, KvStore};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

/// Process-local store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, Entry>>,
}

impl MemoryKvStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|entry| entry.is_live(now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn load(&self, key: &str) -> Result<Option<Vec<u8>>, KvError> {
        let now = Instant::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
                Some(_) => {}
            }
        }

        // Expired: drop it unless another writer replaced it meanwhile
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
        }
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.value.clone()))
    }

    async fn store(&self, key: &str, value: &[u8]) -> Result<(), KvError> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_vec(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn store_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), KvError> {
        let expires_at = Instant::now()
            .checked_add(ttl)
            .ok_or(KvError::InvalidTtl(ttl))?;
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_vec(),
                expires_at: Some(expires_at),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), KvError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
