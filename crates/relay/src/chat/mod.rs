//! Chat host integration.
//!
//! This module provides:
//! - [`ChatHost`], the capability set the relay consumes from the chat host
//! - [`MattermostClient`], the Mattermost REST v4 implementation
//! - [`EventHub`], per-user event fan-out behind `GET /events`
//! - Post and attachment types

mod client;
mod error;
mod events;
mod types;

use async_trait::async_trait;
use devops_relay_core::{ChannelId, PostId, TeamId, UserId};

pub use client::MattermostClient;
pub use error::ChatError;
pub use events::{EventHub, HostEvent};
pub use types::{
    ApiErrorBody, Attachment, AttachmentField, ButtonStyle, Channel, Post, PostAction,
    PostActionIntegration, PostProps, User,
};

/// What the relay needs from the chat host.
#[async_trait]
pub trait ChatHost: Send + Sync {
    /// Create a post as the bot user.
    async fn create_post(&self, post: &Post) -> Result<Post, ChatError>;

    async fn get_post(&self, post_id: &PostId) -> Result<Post, ChatError>;

    /// Replace a post's message and attachments.
    async fn update_post(&self, post: &Post) -> Result<Post, ChatError>;

    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Channel, ChatError>;

    async fn get_user(&self, user_id: &UserId) -> Result<User, ChatError>;

    /// Channels `user_id` is a member of in `team_id`.
    async fn get_channels_for_user(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Vec<Channel>, ChatError>;

    /// Post `message` in the bot's direct channel with `user_id`.
    async fn send_direct_message(&self, user_id: &UserId, message: &str)
    -> Result<Post, ChatError>;

    /// Publish an event to `user_id`'s connected clients.
    fn publish_event(&self, event: &str, user_id: &UserId, data: serde_json::Value);
}
