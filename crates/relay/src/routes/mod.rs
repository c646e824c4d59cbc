//! HTTP route handlers for the relay.
//!
//! # Route Structure
//!
//! ```text
//! GET    /health                      - Liveness check
//!
//! # Azure DevOps service hooks
//! POST   /notification                - Webhook delivery (?channelID=&webhookSecret=)
//!
//! # Subscriptions (user header required)
//! POST   /subscriptions               - Create subscription
//! DELETE /subscriptions               - Delete subscription
//! GET    /subscriptions               - List subscriptions (JSON or ?format=markdown)
//! POST   /subscriptions/filters       - Legal filter values
//!
//! # Projects (user header required)
//! POST   /link                        - Link project
//! GET    /project/link                - Linked projects
//! POST   /project/unlink              - Unlink project and delete its subscriptions
//!
//! # Work items and previews (user header required)
//! POST   /tasks                       - Create work item
//! POST   /previews                    - Preview attachment for a pasted link (204 when none)
//!
//! # Approval buttons (user header required)
//! POST   /pipelines/release/approve   - Release deployment approval
//! POST   /pipelines/run/approve       - Run stage approval
//!
//! # Webapp events (user header required)
//! GET    /events                      - Server-sent events for the user
//!
//! # OAuth (user header required)
//! GET    /oauth/connect               - Redirect to Azure DevOps
//! GET    /oauth/complete              - OAuth redirect target
//! GET    /user                        - Connected account details
//! ```

pub mod approvals;
pub mod events;
pub mod notification;
pub mod oauth;
pub mod previews;
pub mod projects;
pub mod subscriptions;
pub mod work_items;

use axum::{
    Json, Router,
    extract::{FromRequest, Request},
    middleware::from_fn,
    routing::{get, post},
};
use serde::de::DeserializeOwned;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use crate::constants::{PATH_NOTIFICATION, PATH_RELEASE_APPROVAL, PATH_RUN_APPROVAL};
use crate::error::AppError;
use crate::middleware::request_id_middleware;
use crate::state::AppState;

/// JSON body whose rejection answers as a validation error.
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(request: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(request, state)
            .await
            .map_err(|rejection| AppError::Validation(rejection.body_text()))?;
        Ok(Self(value))
    }
}

/// Every relay route, without state.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route(PATH_NOTIFICATION, post(notification::receive))
        .route(
            "/subscriptions",
            post(subscriptions::create)
                .delete(subscriptions::delete)
                .get(subscriptions::list),
        )
        .route("/subscriptions/filters", post(subscriptions::filter_values))
        .route("/link", post(projects::link))
        .route("/project/link", get(projects::list))
        .route("/project/unlink", post(projects::unlink))
        .route("/tasks", post(work_items::create))
        .route("/previews", post(previews::preview))
        .route(PATH_RELEASE_APPROVAL, post(approvals::release))
        .route(PATH_RUN_APPROVAL, post(approvals::run))
        .route("/events", get(events::stream))
        .route("/oauth/connect", get(oauth::connect))
        .route("/oauth/complete", get(oauth::complete))
        .route("/user", get(oauth::account))
}

/// The relay application with request tracing and request ids.
pub fn app(state: AppState) -> Router {
    routes()
        .layer(from_fn(request_id_middleware))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri().path(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}
