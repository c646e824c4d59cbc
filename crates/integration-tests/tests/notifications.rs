//! Service hook deliveries, from subscription callback URL to chat post.

use axum::http::StatusCode;
use devops_relay_core::ChannelId;
use devops_relay_integration_tests::{CHANNEL_ID, TestContext, relay_path};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const HOOKS_PATH: &str = "/Org1/_apis/hooks/subscriptions";

const PUSH: &str = r#"{
    "subscriptionId": "sub-1",
    "eventType": "git.push",
    "detailedMessage": {"markdown": "Alice pushed to main"},
    "resource": {
        "refUpdates": [{"name": "refs/heads/main"}],
        "repository": {"name": "web"},
        "pushedBy": {"displayName": "Alice"}
    }
}"#;

/// Subscribe `CHANNEL_ID` to pushes and return the callback the relay
/// registered, relative to the relay.
async fn subscribed_callback(ctx: &TestContext) -> String {
    Mock::given(method("POST"))
        .and(path(HOOKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sub-1"})))
        .mount(&ctx.server)
        .await;

    let response = ctx
        .send(TestContext::user_request(
            "POST",
            "/subscriptions",
            &json!({
                "organization": "Org1",
                "project": "Proj1",
                "eventType": "git.push",
                "serviceType": "repos",
                "channelID": CHANNEL_ID
            }),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);

    let bodies = ctx.remote_bodies("POST", HOOKS_PATH).await;
    let url = bodies[0]["consumerInputs"]["url"]
        .as_str()
        .expect("callback url");
    relay_path(url)
}

#[tokio::test]
async fn test_registered_callback_posts_push() {
    let ctx = TestContext::new().await;
    let callback = subscribed_callback(&ctx).await;

    let response = ctx.send(TestContext::delivery(&callback, PUSH)).await;
    assert_eq!(response.status, StatusCode::OK);

    let posts = ctx.relay.chat.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].channel_id, ChannelId::new(CHANNEL_ID));
    assert!(posts[0].message.contains("main"));
}

#[tokio::test]
async fn test_forged_secret_is_rejected_without_post() {
    let ctx = TestContext::new().await;
    subscribed_callback(&ctx).await;

    let forged = format!("/notification?channelID={CHANNEL_ID}&webhookSecret=forged");
    let response = ctx.send(TestContext::delivery(&forged, PUSH)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    let missing = format!("/notification?channelID={CHANNEL_ID}");
    let response = ctx.send(TestContext::delivery(&missing, PUSH)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);

    assert!(ctx.relay.chat.posts().is_empty());
}

#[tokio::test]
async fn test_callback_replayed_to_other_channel_is_rejected() {
    let ctx = TestContext::new().await;
    let callback = subscribed_callback(&ctx).await;

    let other = "zyxwvutsrqponmlkjihgfedcba";
    let redirected = callback.replacen(CHANNEL_ID, other, 1);
    let response = ctx.send(TestContext::delivery(&redirected, PUSH)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(ctx.relay.chat.posts().is_empty());
}

#[tokio::test]
async fn test_invalid_channel_id_is_rejected() {
    let ctx = TestContext::new().await;
    let callback = subscribed_callback(&ctx).await;

    let short = callback.replacen(CHANNEL_ID, "C1", 1);
    let response = ctx.send(TestContext::delivery(&short, PUSH)).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(ctx.relay.chat.posts().is_empty());
}

#[tokio::test]
async fn test_unknown_event_posts_its_markdown() {
    let ctx = TestContext::new().await;
    let callback = subscribed_callback(&ctx).await;

    let body = r#"{
        "eventType": "tfvc.checkin",
        "detailedMessage": {"markdown": "Changeset 42 checked in"}
    }"#;
    let response = ctx.send(TestContext::delivery(&callback, body)).await;
    assert_eq!(response.status, StatusCode::OK);

    let posts = ctx.relay.chat.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].message, "Changeset 42 checked in");
}

#[tokio::test]
async fn test_malformed_body_is_rejected() {
    let ctx = TestContext::new().await;
    let callback = subscribed_callback(&ctx).await;

    let response = ctx.send(TestContext::delivery(&callback, "{not json")).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(ctx.relay.chat.posts().is_empty());
}
