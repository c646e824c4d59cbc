//! Service hook delivery route.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::StatusCode,
};

use crate::error::AppError;
use crate::services::notifications::{NotificationQuery, handle_notification};
use crate::state::AppState;

/// `POST /notification?channelID=&webhookSecret=`
pub async fn receive(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    body: Bytes,
) -> Result<StatusCode, AppError> {
    handle_notification(&state, &query, &body).await?;
    Ok(StatusCode::OK)
}
