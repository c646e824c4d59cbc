//! Application state shared across handlers.

use std::sync::Arc;

use crate::chat::{ChatHost, EventHub};
use crate::config::{RelayConfig, SharedConfig};
use crate::crypto::{CryptoError, SecretCipher};
use crate::devops::{DevOpsApi, DevOpsClient, DevOpsError};
use crate::kv::KvStore;
use crate::store::{CredentialStore, ProjectStore, SecretStore, SubscriptionRegistry};

/// Error assembling the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("invalid encryption secret: {0}")]
    Crypto(#[from] CryptoError),
    #[error("Azure DevOps client: {0}")]
    DevOps(#[from] DevOpsError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`. The configuration is a live snapshot; the
/// cipher is built once from the encryption secret at startup.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: SharedConfig,
    cipher: Arc<SecretCipher>,
    chat: Arc<dyn ChatHost>,
    devops: Arc<dyn DevOpsApi>,
    events: EventHub,
    subscriptions: SubscriptionRegistry,
    projects: ProjectStore,
    secrets: SecretStore,
    credentials: CredentialStore,
}

impl AppState {
    /// Wire the stores and the Azure DevOps client over `kv` and `chat`.
    ///
    /// `events` must be the hub `chat` publishes to.
    ///
    /// # Errors
    ///
    /// Returns an error if the encryption secret is unusable or the HTTP
    /// client cannot be built.
    pub fn new(
        config: SharedConfig,
        kv: Arc<dyn KvStore>,
        chat: Arc<dyn ChatHost>,
        events: EventHub,
    ) -> Result<Self, StateError> {
        let cipher = Arc::new(SecretCipher::new(&config.snapshot().encryption_secret)?);
        let credentials = CredentialStore::new(Arc::clone(&kv), Arc::clone(&cipher));
        let devops = DevOpsClient::new(config.clone(), credentials.clone(), Arc::clone(&chat))?;

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                cipher,
                chat,
                devops: Arc::new(devops),
                events,
                subscriptions: SubscriptionRegistry::new(Arc::clone(&kv)),
                projects: ProjectStore::new(Arc::clone(&kv)),
                secrets: SecretStore::new(kv),
                credentials,
            }),
        })
    }

    /// Current configuration snapshot.
    #[must_use]
    pub fn config(&self) -> Arc<RelayConfig> {
        self.inner.config.snapshot()
    }

    #[must_use]
    pub fn shared_config(&self) -> &SharedConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn cipher(&self) -> &SecretCipher {
        &self.inner.cipher
    }

    #[must_use]
    pub fn chat(&self) -> &dyn ChatHost {
        self.inner.chat.as_ref()
    }

    #[must_use]
    pub fn devops(&self) -> &dyn DevOpsApi {
        self.inner.devops.as_ref()
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }

    #[must_use]
    pub fn subscriptions(&self) -> &SubscriptionRegistry {
        &self.inner.subscriptions
    }

    #[must_use]
    pub fn projects(&self) -> &ProjectStore {
        &self.inner.projects
    }

    #[must_use]
    pub fn secrets(&self) -> &SecretStore {
        &self.inner.secrets
    }

    #[must_use]
    pub fn credentials(&self) -> &CredentialStore {
        &self.inner.credentials
    }
}
