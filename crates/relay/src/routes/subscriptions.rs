//! Subscription routes.

use axum::{
    Json,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use devops_relay_core::ServiceType;
use serde::Deserialize;

use crate::devops::FilterValues;
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::routes::JsonBody;
use crate::services::subscriptions::{
    self, CreateSubscriptionPayload, DeleteSubscriptionPayload, FilterValuesPayload, ListQuery,
    subscriptions_table,
};
use crate::state::AppState;
use crate::store::SubscriptionRecord;

const FORMAT_MARKDOWN: &str = "markdown";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FormatQuery {
    format: Option<String>,
}

pub async fn create(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(payload): JsonBody<CreateSubscriptionPayload>,
) -> Result<Json<SubscriptionRecord>, AppError> {
    let record = subscriptions::subscribe(&state, &user_id, payload).await?;
    Ok(Json(record))
}

pub async fn delete(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(payload): JsonBody<DeleteSubscriptionPayload>,
) -> Result<StatusCode, AppError> {
    subscriptions::unsubscribe(&state, &user_id, payload).await?;
    Ok(StatusCode::OK)
}

/// JSON by default; `?format=markdown` renders one table per service type.
pub async fn list(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Query(query): Query<ListQuery>,
    Query(format): Query<FormatQuery>,
) -> Result<Response, AppError> {
    let records = subscriptions::list_subscriptions(&state, &user_id, &query).await?;

    if format.format.as_deref() != Some(FORMAT_MARKDOWN) {
        return Ok(Json(records).into_response());
    }

    let requested: Option<ServiceType> = query
        .service_type
        .as_deref()
        .and_then(|service| service.parse().ok());
    let tables = requested
        .map_or_else(|| ServiceType::ALL.to_vec(), |service| vec![service])
        .into_iter()
        .map(|service| subscriptions_table(service, &records))
        .collect::<Vec<_>>()
        .join("\n");
    Ok(tables.into_response())
}

pub async fn filter_values(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(payload): JsonBody<FilterValuesPayload>,
) -> Result<Json<FilterValues>, AppError> {
    let values = subscriptions::filter_values(&state, &user_id, payload).await?;
    Ok(Json(values))
}
