//! Mattermost REST v4 types.
//!
//! Covers only what the relay reads or writes: posts with message
//! attachments, channels and users.
//!
//! See: <https://api.mattermost.com/>

use devops_relay_core::{ChannelId, PostId, TeamId, UserId};
use serde::{Deserialize, Serialize};

/// A channel post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Empty until the host assigns one.
    #[serde(default)]
    pub id: PostId,
    pub channel_id: ChannelId,
    /// Empty on create; the host fills in the bot user.
    #[serde(default)]
    pub user_id: UserId,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub props: PostProps,
}

impl Post {
    /// A new post for `channel_id`.
    #[must_use]
    pub fn new(channel_id: ChannelId, message: impl Into<String>) -> Self {
        Self {
            channel_id,
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_attachments(mut self, attachments: Vec<Attachment>) -> Self {
        self.props.attachments = attachments;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostProps {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

/// Message attachment (Slack-compatible).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Attachment {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pretext: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<PostAction>,
}

impl Attachment {
    /// Set `title`'s field value, appending the field when absent.
    pub fn set_field(&mut self, title: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(field) = self.fields.iter_mut().find(|field| field.title == title) {
            field.value = value;
        } else {
            self.fields.push(AttachmentField::new(title, value, true));
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl AttachmentField {
    #[must_use]
    pub fn new(title: impl Into<String>, value: impl Into<String>, short: bool) -> Self {
        Self {
            title: title.into(),
            value: value.into(),
            short,
        }
    }
}

/// Interactive button on an attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostAction {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub style: String,
    pub integration: PostActionIntegration,
}

impl PostAction {
    /// A button that calls `url` with `context` when clicked.
    #[must_use]
    pub fn button(
        id: impl Into<String>,
        name: impl Into<String>,
        style: ButtonStyle,
        url: impl Into<String>,
        context: serde_json::Value,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            action_type: "button".to_string(),
            style: style.as_str().to_string(),
            integration: PostActionIntegration {
                url: url.into(),
                context,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostActionIntegration {
    pub url: String,
    pub context: serde_json::Value,
}

/// Button style (affects color).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonStyle {
    /// Green button.
    Success,
    /// Red button.
    Danger,
}

impl ButtonStyle {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Danger => "danger",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    pub id: ChannelId,
    #[serde(default)]
    pub team_id: TeamId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    /// `O` open, `P` private, `D` direct, `G` group
    #[serde(rename = "type", default)]
    pub channel_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl User {
    /// Full name when set, the username otherwise.
    #[must_use]
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name, self.last_name);
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Error body returned by the REST API.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiErrorBody {
    pub message: String,
    pub status_code: u16,
}
