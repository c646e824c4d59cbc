//! Subscription lifecycle through the HTTP routes.

use axum::http::StatusCode;
use devops_relay_integration_tests::{TestContext, USER_ID};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

const HOOKS_PATH: &str = "/Org1/_apis/hooks/subscriptions";

// =============================================================================
// Helpers
// =============================================================================

fn work_item_subscription() -> serde_json::Value {
    json!({
        "organization": "Org1",
        "project": "Proj1",
        "eventType": "workitem.created",
        "serviceType": "boards",
        "channelID": "C1",
        "areaPath": "Proj1\\Team"
    })
}

async fn mount_create(ctx: &TestContext) {
    Mock::given(method("POST"))
        .and(path(HOOKS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "sub-1"})))
        .mount(&ctx.server)
        .await;
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_subscribe_registers_service_hook() {
    let ctx = TestContext::new().await;
    mount_create(&ctx).await;

    let response = ctx
        .send(TestContext::user_request(
            "POST",
            "/subscriptions",
            &work_item_subscription(),
        ))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let record = response.json();
    assert_eq!(record["subscriptionID"], "sub-1");
    assert_eq!(record["createdBy"], "Alice Smith");

    let bodies = ctx.remote_bodies("POST", HOOKS_PATH).await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["publisherId"], "tfs");
    assert_eq!(bodies[0]["eventType"], "workitem.created");
    assert_eq!(bodies[0]["publisherInputs"]["areaPath"], "Proj1\\Team");
    let url = bodies[0]["consumerInputs"]["url"].as_str().expect("callback url");
    assert!(url.contains("channelID=C1"));
    assert!(url.contains("webhookSecret="));

    let stored = ctx.relay.state.subscriptions().list(None).await.expect("list");
    assert_eq!(stored.len(), 1);
}

#[tokio::test]
async fn test_duplicate_subscribe_is_rejected_without_remote_call() {
    let ctx = TestContext::new().await;
    mount_create(&ctx).await;

    let first = ctx
        .send(TestContext::user_request(
            "POST",
            "/subscriptions",
            &work_item_subscription(),
        ))
        .await;
    assert_eq!(first.status, StatusCode::OK);

    let second = ctx
        .send(TestContext::user_request(
            "POST",
            "/subscriptions",
            &work_item_subscription(),
        ))
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert!(second.json()["error"].is_string());
    assert_eq!(ctx.remote_bodies("POST", HOOKS_PATH).await.len(), 1);
}

#[tokio::test]
async fn test_subscribe_validates_before_remote_call() {
    let ctx = TestContext::new().await;
    mount_create(&ctx).await;

    let mut payload = work_item_subscription();
    payload["eventType"] = json!("git.push");
    let response = ctx
        .send(TestContext::user_request("POST", "/subscriptions", &payload))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert!(ctx.remote_bodies("POST", HOOKS_PATH).await.is_empty());
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let ctx = TestContext::new().await;
    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/subscriptions")
        .header(devops_relay::constants::HEADER_USER_ID, USER_ID)
        .header(axum::http::header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from("{not json"))
        .expect("request");
    let response = ctx.send(request).await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Delete and list
// =============================================================================

#[tokio::test]
async fn test_delete_removes_remote_hook_once() {
    let ctx = TestContext::new().await;
    mount_create(&ctx).await;
    Mock::given(method("DELETE"))
        .and(path(format!("{HOOKS_PATH}/sub-1")))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&ctx.server)
        .await;

    ctx.send(TestContext::user_request(
        "POST",
        "/subscriptions",
        &work_item_subscription(),
    ))
    .await;

    let delete = json!({
        "organization": "Org1",
        "project": "Proj1",
        "eventType": "workitem.created",
        "channelID": "C1",
        "mmUserID": USER_ID,
        "areaPath": "Proj1\\Team"
    });
    let response = ctx
        .send(TestContext::user_request("DELETE", "/subscriptions", &delete))
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(ctx.relay.state.subscriptions().list(None).await.expect("list").is_empty());

    let again = ctx
        .send(TestContext::user_request("DELETE", "/subscriptions", &delete))
        .await;
    assert_eq!(again.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_as_markdown_table() {
    let ctx = TestContext::new().await;
    mount_create(&ctx).await;
    ctx.send(TestContext::user_request(
        "POST",
        "/subscriptions",
        &work_item_subscription(),
    ))
    .await;

    let json_list = ctx
        .send(TestContext::user_request(
            "GET",
            "/subscriptions?team_id=T1",
            &json!({}),
        ))
        .await;
    assert_eq!(json_list.status, StatusCode::OK);
    assert_eq!(json_list.json().as_array().map(Vec::len), Some(1));

    let markdown = ctx
        .send(TestContext::user_request(
            "GET",
            "/subscriptions?team_id=T1&service_type=boards&format=markdown",
            &json!({}),
        ))
        .await;
    assert_eq!(markdown.status, StatusCode::OK);
    assert!(markdown.text().contains("sub-1"));
}

#[tokio::test]
async fn test_list_requires_team() {
    let ctx = TestContext::new().await;
    let response = ctx
        .send(TestContext::user_request("GET", "/subscriptions", &json!({})))
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
}
