//! Per-subscription webhook secret and channel mapping.

use std::sync::Arc;

use devops_relay_core::ChannelId;
use serde::{Deserialize, Serialize};

use super::{StoreError, load_json, store_json, subscription_secret_key};
use crate::kv::KvStore;

/// What a subscription's callback URL was created with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSecretEntry {
    /// Sealed secret exactly as embedded in the callback URL
    pub secret: String,
    #[serde(rename = "channelID")]
    pub channel_id: ChannelId,
}

/// Secret store keyed by remote subscription id.
#[derive(Clone)]
pub struct SecretStore {
    kv: Arc<dyn KvStore>,
}

impl SecretStore {
    #[must_use]
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Upsert the mapping for a subscription.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    pub async fn put(
        &self,
        subscription_id: &str,
        channel_id: &ChannelId,
        secret: &str,
    ) -> Result<(), StoreError> {
        let entry = WebhookSecretEntry {
            secret: secret.to_owned(),
            channel_id: channel_id.clone(),
        };
        store_json(
            self.kv.as_ref(),
            &subscription_secret_key(subscription_id),
            &entry,
        )
        .await
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails or the value is corrupt.
    pub async fn get(&self, subscription_id: &str) -> Result<Option<WebhookSecretEntry>, StoreError> {
        load_json(self.kv.as_ref(), &subscription_secret_key(subscription_id)).await
    }

    /// # Errors
    ///
    /// Returns `StoreError` if the backend fails.
    pub async fn delete(&self, subscription_id: &str) -> Result<(), StoreError> {
        self.kv
            .delete(&subscription_secret_key(subscription_id))
            .await?;
        Ok(())
    }
}
