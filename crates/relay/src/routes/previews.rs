//! Link preview route.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::routes::JsonBody;
use crate::services::previews::{self, PreviewPayload};
use crate::state::AppState;

/// `POST /previews`: the post with a preview attached, or 204 to post it
/// unchanged.
pub async fn preview(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(payload): JsonBody<PreviewPayload>,
) -> Result<Response, AppError> {
    Ok(match previews::preview_post(&state, &user_id, payload).await? {
        Some(post) => Json(post).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    })
}
