//! Test doubles for the relay's collaborators.
//!
//! Compiled for unit tests and, behind the `test-support` feature, for the
//! integration tests crate.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use devops_relay_core::{ChannelId, PostId, TeamId, UserId};
use secrecy::SecretString;

use crate::chat::{Channel, ChatError, ChatHost, EventHub, Post, User};
use crate::config::{DevOpsConfig, MattermostConfig, RelayConfig, SharedConfig};
use crate::kv::MemoryKvStore;
use crate::state::{AppState, StateError};
use crate::store::{ProjectDetails, StoreError, UserToken};

pub const TEST_WEBHOOK_SECRET: &str = "kT9vQ2mX7pL4wR8zN3bC6yH1jF5dG0sA";
pub const TEST_ENCRYPTION_SECRET: &str = "Zq8Lw3Nx6Pr1Tv4Yb7Mc0Kd9Hf2Js5Ga";
pub const TEST_PUBLIC_URL: &str = "https://relay.test";

/// Configuration with every remote endpoint on `base_url`.
#[must_use]
pub fn test_config(base_url: &str) -> RelayConfig {
    let base_url = base_url.trim_end_matches('/');
    RelayConfig {
        host: std::net::IpAddr::from([127, 0, 0, 1]),
        port: 3002,
        public_url: TEST_PUBLIC_URL.to_string(),
        webhook_secret: SecretString::from(TEST_WEBHOOK_SECRET),
        encryption_secret: SecretString::from(TEST_ENCRYPTION_SECRET),
        devops: DevOpsConfig {
            api_base_url: base_url.to_string(),
            release_api_base_url: base_url.to_string(),
            client_id: "relay-app-id".to_string(),
            oauth_authorize_url: format!("{base_url}/oauth2/authorize"),
            oauth_token_url: format!("{base_url}/oauth2/token"),
            oauth_scopes: "vso.code vso.hooks_write".to_string(),
            client_secret: SecretString::from("devops_client_assertion_value"),
            redirect_url: format!("{TEST_PUBLIC_URL}/oauth/complete"),
        },
        mattermost: MattermostConfig {
            site_url: base_url.to_string(),
            bot_token: SecretString::from("mattermost_bot_token_value"),
        },
        database_url: None,
        log_json: false,
        sentry_dsn: None,
        sentry_environment: None,
        sentry_traces_sample_rate: 0.0,
    }
}

/// Relay state over an in-memory store and a [`RecordingChatHost`], with
/// Azure DevOps at `base_url`.
pub struct TestRelay {
    pub state: AppState,
    pub chat: Arc<RecordingChatHost>,
    pub kv: Arc<MemoryKvStore>,
}

impl TestRelay {
    /// # Errors
    ///
    /// Returns `StateError` if the test secrets are rejected.
    pub fn new(base_url: &str) -> Result<Self, StateError> {
        let chat = Arc::new(RecordingChatHost::new());
        let kv = Arc::new(MemoryKvStore::new());
        let state = AppState::new(
            SharedConfig::new(test_config(base_url)),
            kv.clone(),
            chat.clone(),
            EventHub::new(16),
        )?;
        Ok(Self { state, chat, kv })
    }

    /// Give `user_id` a token valid for an hour.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the token cannot be saved.
    pub async fn connect(&self, user_id: &UserId) -> Result<(), StoreError> {
        let token = UserToken {
            access_token: SecretString::from(format!("token-{user_id}")),
            refresh_token: SecretString::from(format!("refresh-{user_id}")),
            expires_at: chrono::Utc::now().timestamp() + 3600,
        };
        self.state.credentials().save(user_id, &token).await
    }

    /// Link `organization/project` for `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `StoreError` if the project cannot be stored.
    pub async fn link_project(
        &self,
        user_id: &UserId,
        organization: &str,
        project: &str,
        project_id: &str,
    ) -> Result<(), StoreError> {
        self.state
            .projects()
            .link(ProjectDetails {
                owner_user_id: user_id.clone(),
                organization_name: organization.to_string(),
                project_name: project.to_string(),
                project_id: project_id.to_string(),
            })
            .await
            .map(|_| ())
    }
}

/// Open channel `id` in `team`.
#[must_use]
pub fn channel(id: &str, team: &str) -> Channel {
    Channel {
        id: ChannelId::new(id),
        team_id: TeamId::new(team),
        name: id.to_string(),
        display_name: format!("{id} channel"),
        channel_type: "O".to_string(),
    }
}

#[must_use]
pub fn user(id: &str, first_name: &str, last_name: &str) -> User {
    User {
        id: UserId::new(id),
        username: id.to_string(),
        first_name: first_name.to_string(),
        last_name: last_name.to_string(),
    }
}

#[derive(Default)]
struct Recorded {
    next_id: u64,
    posts: Vec<Post>,
    updates: Vec<Post>,
    channels: HashMap<ChannelId, Channel>,
    users: HashMap<UserId, User>,
    events: Vec<(String, UserId)>,
    direct_messages: Vec<(UserId, String)>,
    fail_posts: bool,
    fail_updates: bool,
}

/// In-memory chat host that records what the relay did.
///
/// Every registered channel is visible to every user.
#[derive(Default)]
pub struct RecordingChatHost {
    state: Mutex<Recorded>,
}

impl RecordingChatHost {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, Recorded> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_channel(&self, channel: Channel) {
        self.state().channels.insert(channel.id.clone(), channel);
    }

    pub fn add_user(&self, user: User) {
        self.state().users.insert(user.id.clone(), user);
    }

    /// Seed an existing post, returning its id.
    pub fn add_post(&self, mut post: Post) -> PostId {
        let mut state = self.state();
        if post.id.as_str().is_empty() {
            state.next_id += 1;
            post.id = PostId::new(format!("post{}", state.next_id));
        }
        let id = post.id.clone();
        state.posts.push(post);
        id
    }

    /// Make `create_post` fail.
    pub fn fail_posts(&self, fail: bool) {
        self.state().fail_posts = fail;
    }

    /// Make `update_post` fail.
    pub fn fail_updates(&self, fail: bool) {
        self.state().fail_updates = fail;
    }

    /// Posts in creation order, including direct messages and seeded posts.
    #[must_use]
    pub fn posts(&self) -> Vec<Post> {
        self.state().posts.clone()
    }

    /// Successful `update_post` calls in order.
    #[must_use]
    pub fn updates(&self) -> Vec<Post> {
        self.state().updates.clone()
    }

    #[must_use]
    pub fn post(&self, post_id: &PostId) -> Option<Post> {
        self.state().posts.iter().find(|post| &post.id == post_id).cloned()
    }

    #[must_use]
    pub fn events(&self) -> Vec<(String, UserId)> {
        self.state().events.clone()
    }

    #[must_use]
    pub fn direct_messages(&self) -> Vec<(UserId, String)> {
        self.state().direct_messages.clone()
    }
}

#[async_trait]
impl ChatHost for RecordingChatHost {
    async fn create_post(&self, post: &Post) -> Result<Post, ChatError> {
        if self.state().fail_posts {
            return Err(ChatError::Api {
                status: 500,
                message: "create_post failed".to_string(),
            });
        }
        let id = self.add_post(post.clone());
        self.post(&id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    async fn get_post(&self, post_id: &PostId) -> Result<Post, ChatError> {
        self.post(post_id)
            .ok_or_else(|| ChatError::NotFound(post_id.to_string()))
    }

    async fn update_post(&self, post: &Post) -> Result<Post, ChatError> {
        let mut state = self.state();
        if state.fail_updates {
            return Err(ChatError::Api {
                status: 500,
                message: "update_post failed".to_string(),
            });
        }
        let existing = state
            .posts
            .iter_mut()
            .find(|existing| existing.id == post.id)
            .ok_or_else(|| ChatError::NotFound(post.id.to_string()))?;
        *existing = post.clone();
        state.updates.push(post.clone());
        Ok(post.clone())
    }

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Channel, ChatError> {
        self.state()
            .channels
            .get(channel_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(channel_id.to_string()))
    }

    async fn get_user(&self, user_id: &UserId) -> Result<User, ChatError> {
        self.state()
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| ChatError::NotFound(user_id.to_string()))
    }

    async fn get_channels_for_user(
        &self,
        team_id: &TeamId,
        _user_id: &UserId,
    ) -> Result<Vec<Channel>, ChatError> {
        Ok(self
            .state()
            .channels
            .values()
            .filter(|channel| &channel.team_id == team_id)
            .cloned()
            .collect())
    }

    async fn send_direct_message(
        &self,
        user_id: &UserId,
        message: &str,
    ) -> Result<Post, ChatError> {
        self.state()
            .direct_messages
            .push((user_id.clone(), message.to_string()));
        let dm = Post::new(ChannelId::new(format!("dm_{user_id}")), message);
        let id = self.add_post(dm);
        self.post(&id)
            .ok_or_else(|| ChatError::NotFound(id.to_string()))
    }

    fn publish_event(&self, event: &str, user_id: &UserId, _data: serde_json::Value) {
        self.state()
            .events
            .push((event.to_string(), user_id.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_host_round_trip() {
        let host = RecordingChatHost::new();
        let created = host
            .create_post(&Post::new(ChannelId::new("c1"), "hello"))
            .await
            .expect("create");
        assert_eq!(created.id, PostId::new("post1"));

        let mut edited = host.get_post(&created.id).await.expect("get");
        edited.message = "edited".to_string();
        host.update_post(&edited).await.expect("update");

        assert_eq!(host.posts()[0].message, "edited");
        assert_eq!(host.updates().len(), 1);
    }

    #[tokio::test]
    async fn test_failure_switches() {
        let host = RecordingChatHost::new();
        host.fail_posts(true);
        assert!(
            host.create_post(&Post::new(ChannelId::new("c1"), "x"))
                .await
                .is_err()
        );
        assert!(host.posts().is_empty());
    }
}
