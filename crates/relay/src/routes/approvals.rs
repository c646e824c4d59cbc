//! Approval button callbacks.

use axum::{Json, extract::State};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::routes::JsonBody;
use crate::services::approvals::{
    ActionRequest, ActionResponse, handle_release_approval, handle_run_approval,
};
use crate::state::AppState;

/// `POST /pipelines/release/approve`
pub async fn release(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(request): JsonBody<ActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(handle_release_approval(&state, &user_id, &request).await?))
}

/// `POST /pipelines/run/approve`
pub async fn run(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(request): JsonBody<ActionRequest>,
) -> Result<Json<ActionResponse>, AppError> {
    Ok(Json(handle_run_approval(&state, &user_id, &request).await?))
}
