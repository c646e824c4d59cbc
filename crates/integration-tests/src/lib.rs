//! Integration tests for DevOps Relay.
//!
//! Every test drives the full router with `tower::ServiceExt::oneshot`. The
//! chat host is an in-memory recorder, the key-value store is in memory, and
//! Azure DevOps is a `wiremock` server.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p devops-relay-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `subscriptions` - Subscribe, duplicate, list and delete
//! - `notifications` - Webhook verification and rendering
//! - `approvals` - Approval button callbacks

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
};
use devops_relay::constants::HEADER_USER_ID;
use devops_relay::routes;
use devops_relay::testing::{TestRelay, channel, user};
use devops_relay_core::UserId;
use tower::ServiceExt;
use wiremock::MockServer;

pub use devops_relay::testing::TEST_PUBLIC_URL;

/// The connected user every test acts as.
pub const USER_ID: &str = "u1";
/// A channel id in the chat host's 26 character format.
pub const CHANNEL_ID: &str = "abcdefghijklmnopqrstuvwxyz";

/// Relay wired to an Azure DevOps mock, with `u1` connected, `Org1/Proj1`
/// linked and `CHANNEL_ID` known to the chat host.
pub struct TestContext {
    pub server: MockServer,
    pub relay: TestRelay,
    router: Router,
}

/// Status and body of a routed request.
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

impl TestResponse {
    /// # Panics
    ///
    /// Panics if the body is not JSON.
    #[must_use]
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("json body")
    }

    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

impl TestContext {
    /// # Panics
    ///
    /// Panics if the relay cannot be assembled.
    pub async fn new() -> Self {
        let server = MockServer::start().await;
        let relay = TestRelay::new(&server.uri()).expect("relay");
        let user_id = UserId::new(USER_ID);
        relay.connect(&user_id).await.expect("connect");
        relay
            .link_project(&user_id, "Org1", "Proj1", "project-guid")
            .await
            .expect("link");
        relay.chat.add_channel(channel(CHANNEL_ID, "T1"));
        relay.chat.add_channel(channel("C1", "T1"));
        relay.chat.add_user(user(USER_ID, "Alice", "Smith"));

        let router = routes::app(relay.state.clone());
        Self {
            server,
            relay,
            router,
        }
    }

    /// # Panics
    ///
    /// Panics if the router fails or the body cannot be read.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body")
            .to_vec();
        TestResponse { status, body }
    }

    /// JSON request acting as [`USER_ID`].
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    #[must_use]
    pub fn user_request(method: &str, uri: &str, body: &serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(HEADER_USER_ID, USER_ID)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    /// Service hook delivery to `path_and_query`.
    ///
    /// # Panics
    ///
    /// Panics if the request cannot be built.
    #[must_use]
    pub fn delivery(path_and_query: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(path_and_query)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request")
    }

    /// Bodies of every request the mock received for `method path`.
    ///
    /// # Panics
    ///
    /// Panics if the mock server does not record requests.
    pub async fn remote_bodies(&self, method: &str, path: &str) -> Vec<serde_json::Value> {
        self.server
            .received_requests()
            .await
            .expect("recorded requests")
            .iter()
            .filter(|request| request.method.as_str() == method && request.url.path() == path)
            .map(|request| serde_json::from_slice(&request.body).unwrap_or(serde_json::Value::Null))
            .collect()
    }
}

/// Path and query of a callback URL the relay registered, relative to the relay.
///
/// # Panics
///
/// Panics if `url` is not under [`TEST_PUBLIC_URL`].
#[must_use]
pub fn relay_path(url: &str) -> String {
    url.strip_prefix(TEST_PUBLIC_URL)
        .expect("callback under public url")
        .to_string()
}
