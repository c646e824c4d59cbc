//! Work item routes.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::devops::WorkItem;
use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::routes::JsonBody;
use crate::services::work_items::{self, CreateWorkItemPayload};
use crate::state::AppState;

/// `POST /tasks`
pub async fn create(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    JsonBody(payload): JsonBody<CreateWorkItemPayload>,
) -> Result<Json<WorkItemCreated>, AppError> {
    let item = work_items::create_work_item(&state, &user_id, payload).await?;
    Ok(Json(WorkItemCreated::from(&item)))
}

#[derive(Debug, Serialize)]
pub struct WorkItemCreated {
    pub id: i64,
    pub title: String,
    pub link: String,
}

impl From<&WorkItem> for WorkItemCreated {
    fn from(item: &WorkItem) -> Self {
        Self {
            id: item.id,
            title: item.fields.title.clone(),
            link: item.links.html.href.clone(),
        }
    }
}
