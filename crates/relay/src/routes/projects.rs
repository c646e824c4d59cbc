//! Project link routes.

use axum::{Json, extract::State, http::StatusCode};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::routes::JsonBody;
use crate::services::projects::{self, ProjectPayload};
use crate::state::AppState;
use crate::store::ProjectDetails;

pub async fn link(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(payload): JsonBody<ProjectPayload>,
) -> Result<Json<ProjectDetails>, AppError> {
    Ok(Json(projects::link_project(&state, &user_id, payload).await?))
}

pub async fn list(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<Vec<ProjectDetails>>, AppError> {
    Ok(Json(projects::list_projects(&state, &user_id).await?))
}

pub async fn unlink(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(payload): JsonBody<ProjectPayload>,
) -> Result<StatusCode, AppError> {
    projects::unlink_project(&state, &user_id, payload).await?;
    Ok(StatusCode::OK)
}
