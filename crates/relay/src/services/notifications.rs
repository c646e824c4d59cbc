//! Inbound service hook deliveries.
//!
//! The checks run in a fixed order and the first failure stops the request:
//! channel id, webhook secret, body, channel binding. Only then is the event
//! rendered and posted.

use devops_relay_core::{ChannelId, EventType};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::chat::Post;
use crate::constants::{
    CHANNEL_SUBSCRIPTION_MISMATCH, INVALID_CHANNEL_ID, INVALID_NOTIFICATION_BODY,
    INVALID_WEBHOOK_SECRET,
};
use crate::crypto;
use crate::error::AppError;
use crate::notifications::{Envelope, RenderContext, render};
use crate::state::AppState;
use crate::store::SubscriptionRecord;

/// Query of `POST /notification`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct NotificationQuery {
    #[serde(rename = "channelID")]
    pub channel_id: Option<String>,
    #[serde(rename = "webhookSecret")]
    pub webhook_secret: Option<String>,
}

fn verified_channel(query: &NotificationQuery) -> Result<ChannelId, AppError> {
    query
        .channel_id
        .as_deref()
        .map(ChannelId::new)
        .filter(ChannelId::is_valid)
        .ok_or_else(|| AppError::Validation(INVALID_CHANNEL_ID.to_string()))
}

fn verify_secret(state: &AppState, sealed: Option<&str>) -> Result<(), AppError> {
    let invalid = || AppError::BadRequest(INVALID_WEBHOOK_SECRET.to_string());
    let sealed = sealed.filter(|sealed| !sealed.is_empty()).ok_or_else(invalid)?;

    let opened = state.cipher().open(sealed).map_err(|e| {
        debug!(error = %e, "Webhook secret did not decrypt");
        invalid()
    })?;
    let config = state.config();
    if crypto::constant_time_eq(&opened, config.webhook_secret.expose_secret()) {
        Ok(())
    } else {
        Err(invalid())
    }
}

/// Reject a delivery whose subscription is bound to another channel.
async fn check_binding(
    state: &AppState,
    envelope: &Envelope,
    channel_id: &ChannelId,
) -> Result<(), AppError> {
    if envelope.subscription_id.is_empty() {
        return Ok(());
    }
    match state.secrets().get(&envelope.subscription_id).await? {
        Some(entry) if &entry.channel_id != channel_id => {
            warn!(
                subscription_id = %envelope.subscription_id,
                bound_channel = %entry.channel_id,
                "Notification channel does not match subscription"
            );
            Err(AppError::BadRequest(CHANNEL_SUBSCRIPTION_MISMATCH.to_string()))
        }
        _ => Ok(()),
    }
}

/// The stored subscription, for events whose payload lacks project details.
async fn fallback_record(
    state: &AppState,
    envelope: &Envelope,
) -> Result<Option<SubscriptionRecord>, AppError> {
    let needs_record = matches!(
        envelope.kind(),
        Some(EventType::ReleaseDeploymentApprovalPending | EventType::RunStageWaitingForApproval)
    );
    if !needs_record || envelope.subscription_id.is_empty() {
        return Ok(None);
    }
    Ok(state
        .subscriptions()
        .find_by_id(&envelope.subscription_id)
        .await?)
}

/// Verify, render and post one delivery.
///
/// # Errors
///
/// Returns a 400 class error for a bad channel id, secret, body or binding
/// and a 500 class error when rendering or posting fails.
#[instrument(skip_all, fields(channel_id = ?query.channel_id))]
pub async fn handle_notification(
    state: &AppState,
    query: &NotificationQuery,
    body: &[u8],
) -> Result<Post, AppError> {
    let channel_id = verified_channel(query)?;
    verify_secret(state, query.webhook_secret.as_deref())?;

    let envelope = Envelope::from_slice(body).map_err(|e| {
        debug!(error = %e, "Notification body is not an envelope");
        AppError::BadRequest(INVALID_NOTIFICATION_BODY.to_string())
    })?;
    check_binding(state, &envelope, &channel_id).await?;

    let record = fallback_record(state, &envelope).await?;
    let config = state.config();
    let context = RenderContext {
        public_url: config.public_url(),
        organization: record.as_ref().map(|record| record.organization.as_str()),
        project_name: record.as_ref().map(|record| record.project_name.as_str()),
        project_id: record.as_ref().map(|record| record.project_id.as_str()),
    };
    let rendered = render(&envelope, &context)?;

    let post = state
        .chat()
        .create_post(&rendered.into_post(channel_id))
        .await?;
    info!(event_type = %envelope.event_type, post_id = %post.id, "Notification posted");
    Ok(post)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TEST_WEBHOOK_SECRET, TestRelay};

    const CHANNEL: &str = "abcdefghijklmnopqrstuvwxyz";
    const OTHER_CHANNEL: &str = "zyxwvutsrqponmlkjihgfedcba";

    fn relay() -> TestRelay {
        TestRelay::new("http://127.0.0.1:9").expect("relay")
    }

    fn query(relay: &TestRelay, secret: &str) -> NotificationQuery {
        NotificationQuery {
            channel_id: Some(CHANNEL.to_string()),
            webhook_secret: Some(relay.state.cipher().seal(secret).expect("seal")),
        }
    }

    #[tokio::test]
    async fn test_git_push_posts_branch() {
        let relay = relay();
        let body = br#"{"eventType":"git.push","resource":{"refUpdates":[{"name":"refs/heads/main"}]}}"#;

        let post = handle_notification(&relay.state, &query(&relay, TEST_WEBHOOK_SECRET), body)
            .await
            .expect("posted");
        assert!(post.message.contains("main"));
        assert_eq!(post.channel_id, ChannelId::new(CHANNEL));
        assert_eq!(relay.chat.posts().len(), 1);
    }

    #[tokio::test]
    async fn test_wrong_secret_never_posts() {
        let relay = relay();
        let body = br#"{"eventType":"git.push"}"#;

        let wrong = handle_notification(&relay.state, &query(&relay, "another-secret"), body).await;
        assert!(matches!(wrong, Err(AppError::BadRequest(ref m)) if m == INVALID_WEBHOOK_SECRET));

        let missing = NotificationQuery {
            channel_id: Some(CHANNEL.to_string()),
            webhook_secret: None,
        };
        let missing = handle_notification(&relay.state, &missing, body).await;
        assert!(matches!(missing, Err(AppError::BadRequest(_))));

        let garbage = NotificationQuery {
            channel_id: Some(CHANNEL.to_string()),
            webhook_secret: Some("not-sealed".to_string()),
        };
        let garbage = handle_notification(&relay.state, &garbage, body).await;
        assert!(matches!(garbage, Err(AppError::BadRequest(_))));

        assert!(relay.chat.posts().is_empty());
    }

    #[tokio::test]
    async fn test_channel_checked_before_secret() {
        let relay = relay();
        let query = NotificationQuery {
            channel_id: Some("short".to_string()),
            webhook_secret: None,
        };
        let result = handle_notification(&relay.state, &query, b"{}").await;
        assert!(matches!(result, Err(AppError::Validation(ref m)) if m == INVALID_CHANNEL_ID));
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let relay = relay();
        let result =
            handle_notification(&relay.state, &query(&relay, TEST_WEBHOOK_SECRET), b"{not json").await;
        assert!(matches!(result, Err(AppError::BadRequest(ref m)) if m == INVALID_NOTIFICATION_BODY));
        assert!(relay.chat.posts().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_event_posts_base_markdown() {
        let relay = relay();
        let body = br#"{"eventType":"tfvc.checkin","detailedMessage":{"markdown":"Changeset 42 checked in"}}"#;
        let post = handle_notification(&relay.state, &query(&relay, TEST_WEBHOOK_SECRET), body)
            .await
            .expect("posted");
        assert_eq!(post.message, "Changeset 42 checked in");
    }

    #[tokio::test]
    async fn test_bad_timestamp_is_server_error_without_post() {
        let relay = relay();
        let body = br#"{"eventType":"build.complete","resource":{"startTime":"yesterday","finishTime":"today"}}"#;
        let result =
            handle_notification(&relay.state, &query(&relay, TEST_WEBHOOK_SECRET), body).await;
        let error = result.expect_err("render fails");
        assert!(matches!(error, AppError::Render(_)));
        assert_eq!(error.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
        assert!(relay.chat.posts().is_empty());
    }

    #[tokio::test]
    async fn test_subscription_bound_to_other_channel_is_rejected() {
        let relay = relay();
        relay
            .state
            .secrets()
            .put("sub-1", &ChannelId::new(OTHER_CHANNEL), "sealed")
            .await
            .expect("put");
        let body = br#"{"subscriptionId":"sub-1","eventType":"git.push"}"#;

        let result =
            handle_notification(&relay.state, &query(&relay, TEST_WEBHOOK_SECRET), body).await;
        assert!(
            matches!(result, Err(AppError::BadRequest(ref m)) if m == CHANNEL_SUBSCRIPTION_MISMATCH)
        );
        assert!(relay.chat.posts().is_empty());
    }

    #[tokio::test]
    async fn test_post_failure_is_server_error() {
        let relay = relay();
        relay.chat.fail_posts(true);
        let result =
            handle_notification(&relay.state, &query(&relay, TEST_WEBHOOK_SECRET), b"{}").await;
        assert!(matches!(result, Err(AppError::Chat(_))));
    }
}
