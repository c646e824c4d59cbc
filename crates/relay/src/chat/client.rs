//! Mattermost REST v4 client.
//!
//! Authenticates as the bot user. Channel lookups are cached for five
//! minutes since every notification and subscription resolves one.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use devops_relay_core::{ChannelId, PostId, TeamId, UserId};
use moka::future::Cache;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;
use tracing::{debug, error, instrument};

use super::error::ChatError;
use super::events::{EventHub, HostEvent};
use super::types::{ApiErrorBody, Channel, Post, User};
use super::ChatHost;
use crate::config::MattermostConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Mattermost client posting as the relay's bot.
#[derive(Clone)]
pub struct MattermostClient {
    inner: Arc<MattermostClientInner>,
}

struct MattermostClientInner {
    client: Client,
    api_base: String,
    bot_token: SecretString,
    bot_user_id: OnceCell<UserId>,
    channels: Cache<ChannelId, Channel>,
    events: EventHub,
}

impl std::fmt::Debug for MattermostClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattermostClient")
            .field("api_base", &self.inner.api_base)
            .field("bot_token", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl MattermostClient {
    /// Create a client for the configured site.
    ///
    /// # Errors
    ///
    /// Returns `ChatError::Url` if the site URL is not absolute, or
    /// `ChatError::Request` if the HTTP client cannot be built.
    pub fn new(config: &MattermostConfig, events: EventHub) -> Result<Self, ChatError> {
        let site = url::Url::parse(&config.site_url)?;
        let api_base = format!("{}/api/v4", site.as_str().trim_end_matches('/'));

        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        let channels = Cache::builder()
            .max_capacity(1000)
            .time_to_live(Duration::from_secs(300)) // 5 minutes
            .build();

        Ok(Self {
            inner: Arc::new(MattermostClientInner {
                client,
                api_base,
                bot_token: config.bot_token.clone(),
                bot_user_id: OnceCell::new(),
                channels,
                events,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.inner.api_base)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ChatError> {
        let response = self
            .inner
            .client
            .get(self.endpoint(path))
            .bearer_auth(self.inner.bot_token.expose_secret())
            .send()
            .await?;
        read_json(response, path).await
    }

    async fn send_json<B, T>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: &B,
    ) -> Result<T, ChatError>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .inner
            .client
            .request(method, self.endpoint(path))
            .bearer_auth(self.inner.bot_token.expose_secret())
            .json(body)
            .send()
            .await?;
        read_json(response, path).await
    }

    /// The bot's own user id, fetched once.
    async fn bot_user_id(&self) -> Result<&UserId, ChatError> {
        self.inner
            .bot_user_id
            .get_or_try_init(|| async {
                let me: User = self.get_json("/users/me").await?;
                Ok::<_, ChatError>(me.id)
            })
            .await
    }
}

async fn read_json<T: DeserializeOwned>(response: Response, path: &str) -> Result<T, ChatError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ChatError::NotFound(path.to_string()));
    }
    if !status.is_success() {
        let body: ApiErrorBody = response.json().await.unwrap_or_default();
        error!(status = %status, path, message = %body.message, "Mattermost API error");
        return Err(ChatError::Api {
            status: status.as_u16(),
            message: body.message,
        });
    }
    Ok(response.json().await?)
}

#[async_trait]
impl ChatHost for MattermostClient {
    #[instrument(skip(self, post), fields(channel = %post.channel_id))]
    async fn create_post(&self, post: &Post) -> Result<Post, ChatError> {
        let created: Post = self
            .send_json(reqwest::Method::POST, "/posts", post)
            .await?;
        debug!(post_id = %created.id, "Post created");
        Ok(created)
    }

    #[instrument(skip(self))]
    async fn get_post(&self, post_id: &PostId) -> Result<Post, ChatError> {
        self.get_json(&format!("/posts/{post_id}")).await
    }

    #[instrument(skip(self, post), fields(post_id = %post.id))]
    async fn update_post(&self, post: &Post) -> Result<Post, ChatError> {
        self.send_json(reqwest::Method::PUT, &format!("/posts/{}", post.id), post)
            .await
    }

    #[instrument(skip(self))]
    async fn get_channel(&self, channel_id: &ChannelId) -> Result<Channel, ChatError> {
        if let Some(channel) = self.inner.channels.get(channel_id).await {
            return Ok(channel);
        }
        let channel: Channel = self.get_json(&format!("/channels/{channel_id}")).await?;
        self.inner
            .channels
            .insert(channel_id.clone(), channel.clone())
            .await;
        Ok(channel)
    }

    #[instrument(skip(self))]
    async fn get_user(&self, user_id: &UserId) -> Result<User, ChatError> {
        self.get_json(&format!("/users/{user_id}")).await
    }

    #[instrument(skip(self))]
    async fn get_channels_for_user(
        &self,
        team_id: &TeamId,
        user_id: &UserId,
    ) -> Result<Vec<Channel>, ChatError> {
        self.get_json(&format!("/users/{user_id}/teams/{team_id}/channels"))
            .await
    }

    #[instrument(skip(self, message))]
    async fn send_direct_message(
        &self,
        user_id: &UserId,
        message: &str,
    ) -> Result<Post, ChatError> {
        let bot_id = self.bot_user_id().await?;
        let members = [bot_id.as_str(), user_id.as_str()];
        let channel: Channel = self
            .send_json(reqwest::Method::POST, "/channels/direct", &members)
            .await?;
        self.create_post(&Post::new(channel.id, message)).await
    }

    fn publish_event(&self, event: &str, user_id: &UserId, data: serde_json::Value) {
        let delivered = self.inner.events.publish(HostEvent {
            event: event.to_string(),
            user_id: user_id.clone(),
            data,
        });
        debug!(event, user_id = %user_id, delivered, "Event published");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> MattermostClient {
        let config = MattermostConfig {
            site_url: server.uri(),
            bot_token: SecretString::from("bot-token"),
        };
        MattermostClient::new(&config, EventHub::default()).expect("client")
    }

    #[tokio::test]
    async fn test_create_post_uses_bot_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v4/posts"))
            .and(header("authorization", "Bearer bot-token"))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p1",
                "channel_id": "c1",
                "user_id": "bot",
                "message": "hi"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let post = client_for(&server)
            .create_post(&Post::new(ChannelId::new("c1"), "hi"))
            .await
            .expect("post");
        assert_eq!(post.id, PostId::new("p1"));
    }

    #[tokio::test]
    async fn test_get_channel_is_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/channels/c1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "c1",
                "name": "town-square",
                "type": "O"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let id = ChannelId::new("c1");
        assert_eq!(client.get_channel(&id).await.expect("first").name, "town-square");
        assert_eq!(client.get_channel(&id).await.expect("second").name, "town-square");
    }

    #[tokio::test]
    async fn test_not_found_maps_to_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = client_for(&server).get_user(&UserId::new("missing")).await;
        assert!(matches!(result, Err(ChatError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_api_error_carries_message() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v4/posts/p1"))
            .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
                "message": "no permission",
                "status_code": 403
            })))
            .mount(&server)
            .await;

        let mut post = Post::new(ChannelId::new("c1"), "edited");
        post.id = PostId::new("p1");
        let result = client_for(&server).update_post(&post).await;
        assert!(matches!(
            result,
            Err(ChatError::Api { status: 403, ref message }) if message == "no permission"
        ));
    }

    #[tokio::test]
    async fn test_direct_message_opens_channel_with_bot() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v4/users/me"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"id": "bot"})),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v4/channels/direct"))
            .and(body_json(serde_json::json!(["bot", "u1"])))
            .respond_with(
                ResponseTemplate::new(201)
                    .set_body_json(serde_json::json!({"id": "dm", "type": "D"})),
            )
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v4/posts"))
            .and(body_json(serde_json::json!({
                "id": "",
                "channel_id": "dm",
                "user_id": "",
                "message": "hello",
                "props": {}
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "id": "p1",
                "channel_id": "dm"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let user = UserId::new("u1");
        client.send_direct_message(&user, "hello").await.expect("dm");
        client.send_direct_message(&user, "hello").await.expect("dm");
    }

    #[tokio::test]
    async fn test_publish_event_reaches_hub() {
        let server = MockServer::start().await;
        let hub = EventHub::default();
        let mut receiver = hub.subscribe();
        let config = MattermostConfig {
            site_url: server.uri(),
            bot_token: SecretString::from("bot-token"),
        };
        let client = MattermostClient::new(&config, hub).expect("client");

        client.publish_event("disconnect", &UserId::new("u1"), serde_json::Value::Null);
        let event = receiver.recv().await.expect("event");
        assert_eq!(event.event, "disconnect");
    }
}
