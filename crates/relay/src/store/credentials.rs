//! Per-user Azure DevOps OAuth tokens and pending OAuth `state` values.
//!
//! Tokens are sealed with the relay's [`SecretCipher`] before they reach the
//! backend, so the key-value table never holds a usable bearer token.

use std::sync::Arc;
use std::time::Duration;

use devops_relay_core::UserId;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{StoreError, oauth_state_key, user_token_key};
use crate::constants::OAUTH_STATE_TTL_SECS;
use crate::crypto::{self, SecretCipher};
use crate::kv::KvStore;

/// Seconds before expiry at which a token is treated as expired.
const EXPIRY_SKEW_SECS: i64 = 60;

/// OAuth token pair for one user.
#[derive(Clone)]
pub struct UserToken {
    pub access_token: SecretString,
    pub refresh_token: SecretString,
    /// Unix timestamp (seconds) when the access token expires
    pub expires_at: i64,
}

impl std::fmt::Debug for UserToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserToken")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

impl UserToken {
    /// Check if the access token has expired at `now` (unix seconds).
    ///
    /// Less than a minute remaining counts as expired.
    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        now >= self.expires_at - EXPIRY_SKEW_SECS
    }

    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now().timestamp())
    }
}

#[derive(Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: String,
    expires_at: i64,
}

/// Sealed token storage plus OAuth `state` bookkeeping.
#[derive(Clone)]
pub struct CredentialStore {
    kv: Arc<dyn KvStore>,
    cipher: Arc<SecretCipher>,
}

impl CredentialStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>, cipher: Arc<SecretCipher>) -> Self {
        Self { kv, cipher }
    }

    /// The user's token, `None` when they never connected.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the sealed value cannot
    /// be opened.
    pub async fn load(&self, user_id: &UserId) -> Result<Option<UserToken>, StoreError> {
        let Some(bytes) = self.kv.load(&user_token_key(user_id.as_str())).await? else {
            return Ok(None);
        };
        let sealed = String::from_utf8_lossy(&bytes);
        let json = self.cipher.open(&sealed)?;
        let stored: StoredToken = serde_json::from_str(&json)?;

        Ok(Some(UserToken {
            access_token: SecretString::from(stored.access_token),
            refresh_token: SecretString::from(stored.refresh_token),
            expires_at: stored.expires_at,
        }))
    }

    /// # Errors
    ///
    /// Returns `StoreError` if sealing or the backend fails.
    pub async fn save(&self, user_id: &UserId, token: &UserToken) -> Result<(), StoreError> {
        let stored = StoredToken {
            access_token: token.access_token.expose_secret().to_owned(),
            refresh_token: token.refresh_token.expose_secret().to_owned(),
            expires_at: token.expires_at,
        };
        let sealed = self.cipher.seal(&serde_json::to_string(&stored)?)?;
        self.kv
            .store(&user_token_key(user_id.as_str()), sealed.as_bytes())
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    pub async fn delete(&self, user_id: &UserId) -> Result<(), StoreError> {
        self.kv.delete(&user_token_key(user_id.as_str())).await?;
        Ok(())
    }

    /// Generate and remember a fresh OAuth `state` for the user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    pub async fn store_oauth_state(&self, user_id: &UserId) -> Result<String, StoreError> {
        let state = format!("{}_{}", crypto::generate_secret(), user_id);
        self.kv
            .store_ttl(
                &oauth_state_key(user_id.as_str()),
                state.as_bytes(),
                Duration::from_secs(OAUTH_STATE_TTL_SECS),
            )
            .await?;
        Ok(state)
    }

    /// Check `state` against the remembered value and consume it.
    ///
    /// Returns `None` when no state is pending (never issued or expired),
    /// otherwise whether it matched.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    pub async fn verify_oauth_state(
        &self,
        user_id: &UserId,
        state: &str,
    ) -> Result<Option<bool>, StoreError> {
        let key = oauth_state_key(user_id.as_str());
        let Some(stored) = self.kv.load(&key).await? else {
            return Ok(None);
        };
        let matches = crypto::constant_time_eq(&String::from_utf8_lossy(&stored), state);
        if matches {
            self.kv.delete(&key).await?;
        }
        Ok(Some(matches))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::MemoryKvStore;

    fn store_with_kv() -> (CredentialStore, Arc<MemoryKvStore>) {
        let kv = Arc::new(MemoryKvStore::new());
        let cipher = SecretCipher::new(&SecretString::from("Zq8Lw3Nx6Pr1Tv4Yb7Mc0Kd9Hf2Js5Ga"))
            .expect("cipher");
        (CredentialStore::new(kv.clone(), Arc::new(cipher)), kv)
    }

    fn token(expires_at: i64) -> UserToken {
        UserToken {
            access_token: SecretString::from("access"),
            refresh_token: SecretString::from("refresh"),
            expires_at,
        }
    }

    #[test]
    fn test_token_is_expired() {
        let now = 1_700_000_000;
        assert!(token(now - 3600).is_expired_at(now));
        assert!(!token(now + 3600).is_expired_at(now));
        // Within the one minute skew
        assert!(token(now + 30).is_expired_at(now));
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let debug = format!("{:?}", token(0));
        assert!(!debug.contains("access\""));
        assert!(debug.contains("[REDACTED]"));
    }

    #[tokio::test]
    async fn test_save_load_delete() {
        let (store, kv) = store_with_kv();
        let user = UserId::new("u1");
        assert!(store.load(&user).await.expect("load").is_none());

        store.save(&user, &token(42)).await.expect("save");
        let raw = kv.load("user_token_u1").await.expect("raw").expect("present");
        assert!(!String::from_utf8_lossy(&raw).contains("access"));

        let loaded = store.load(&user).await.expect("load").expect("present");
        assert_eq!(loaded.access_token.expose_secret(), "access");
        assert_eq!(loaded.refresh_token.expose_secret(), "refresh");
        assert_eq!(loaded.expires_at, 42);

        store.delete(&user).await.expect("delete");
        assert!(store.load(&user).await.expect("load").is_none());
    }

    #[tokio::test]
    async fn test_oauth_state_is_single_use() {
        let (store, _) = store_with_kv();
        let user = UserId::new("u1");
        assert_eq!(store.verify_oauth_state(&user, "x").await.expect("verify"), None);

        let state = store.store_oauth_state(&user).await.expect("state");
        assert!(state.ends_with("_u1"));
        assert_eq!(
            store.verify_oauth_state(&user, "wrong").await.expect("verify"),
            Some(false)
        );
        assert_eq!(
            store.verify_oauth_state(&user, &state).await.expect("verify"),
            Some(true)
        );
        assert_eq!(store.verify_oauth_state(&user, &state).await.expect("verify"), None);
    }
}
