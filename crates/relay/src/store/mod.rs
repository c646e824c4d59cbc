//! Typed stores over the key-value backend.
//!
//! # Keys
//!
//! - `subscription_list` - Every [`SubscriptionRecord`], JSON array
//! - `subscription_secret_<subscriptionID>` - [`WebhookSecretEntry`]
//! - `project_list` - Every linked [`ProjectDetails`], JSON array
//! - `user_token_<userID>` - Sealed [`UserToken`]
//! - `oauth_state_<userID>` - Pending OAuth `state`, with TTL

pub mod credentials;
pub mod projects;
pub mod secrets;
pub mod subscriptions;

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::crypto::CryptoError;
use crate::kv::{KvError, KvStore};

pub use credentials::{CredentialStore, UserToken};
pub use projects::{ProjectDetails, ProjectStore};
pub use secrets::{SecretStore, WebhookSecretEntry};
pub use subscriptions::{
    CreatedByFilter, FilterDisplayNames, SubscriptionCandidate, SubscriptionFilters,
    SubscriptionRecord, SubscriptionRegistry, VisibilityQuery, filter_for_visibility,
};

pub const SUBSCRIPTION_LIST_KEY: &str = "subscription_list";
pub const PROJECT_LIST_KEY: &str = "project_list";

#[must_use]
pub fn subscription_secret_key(subscription_id: &str) -> String {
    format!("subscription_secret_{subscription_id}")
}

#[must_use]
pub fn user_token_key(user_id: &str) -> String {
    format!("user_token_{user_id}")
}

#[must_use]
pub fn oauth_state_key(user_id: &str) -> String {
    format!("oauth_state_{user_id}")
}

/// Errors from typed store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend failure.
    #[error("key-value error: {0}")]
    Kv(#[from] KvError),

    /// Stored value could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Stored value could not be sealed or opened.
    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),
}

async fn load_json<T: DeserializeOwned>(
    kv: &dyn KvStore,
    key: &str,
) -> Result<Option<T>, StoreError> {
    match kv.load(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

async fn store_json<T: Serialize + Sync>(
    kv: &dyn KvStore,
    key: &str,
    value: &T,
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(value)?;
    kv.store(key, &bytes).await?;
    Ok(())
}
