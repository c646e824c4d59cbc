//! Creating work items from the chat host.

use devops_relay_core::UserId;
use serde::Deserialize;
use tracing::{error, info, instrument, warn};

use crate::constants::{
    ORGANIZATION_REQUIRED, PROJECT_REQUIRED, TASK_TITLE_REQUIRED, TASK_TYPE_REQUIRED,
};
use crate::devops::{WorkItem, WorkItemRequest};
use crate::error::AppError;
use crate::state::AppState;

/// Body of `POST /tasks`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateWorkItemPayload {
    pub organization: String,
    pub project: String,
    #[serde(rename = "type")]
    pub work_item_type: String,
    pub fields: WorkItemFieldsPayload,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WorkItemFieldsPayload {
    pub title: String,
    pub description: String,
    pub area_path: String,
}

impl CreateWorkItemPayload {
    fn into_request(self) -> Result<WorkItemRequest, AppError> {
        let required = [
            (&self.organization, ORGANIZATION_REQUIRED),
            (&self.project, PROJECT_REQUIRED),
            (&self.work_item_type, TASK_TYPE_REQUIRED),
            (&self.fields.title, TASK_TITLE_REQUIRED),
        ];
        if let Some((_, message)) = required.into_iter().find(|(value, _)| value.trim().is_empty()) {
            return Err(AppError::Validation(message.to_string()));
        }
        Ok(WorkItemRequest {
            organization: self.organization.trim().to_string(),
            project: self.project.trim().to_string(),
            work_item_type: self.work_item_type.trim().to_string(),
            title: self.fields.title.trim().to_string(),
            description: self.fields.description.trim().to_string(),
            area_path: self.fields.area_path.trim().to_string(),
        })
    }
}

/// Create the work item and DM `user_id` a link to it.
///
/// # Errors
///
/// Returns `AppError::Validation` for missing fields, otherwise whatever the
/// Azure DevOps call returns. A failed DM is only logged.
#[instrument(skip(state, payload), fields(user_id = %user_id, project = %payload.project))]
pub async fn create_work_item(
    state: &AppState,
    user_id: &UserId,
    payload: CreateWorkItemPayload,
) -> Result<WorkItem, AppError> {
    let request = payload.into_request()?;
    let item = state.devops().create_work_item(user_id, &request).await?;
    info!(work_item_id = item.id, "Work item created");

    let creator = match state.chat().get_user(user_id).await {
        Ok(user) => user.display_name(),
        Err(e) => {
            warn!(error = %e, "Failed to look up work item creator");
            user_id.to_string()
        }
    };
    let message = format!(
        "Work item [#{}: \"{}\"]({}) of type \"{}\" was successfully created by {creator}.",
        item.id, request.title, item.links.html.href, request.work_item_type
    );
    if let Err(e) = state.chat().send_direct_message(user_id, &message).await {
        error!(error = %e, "Failed to DM work item confirmation");
    }
    Ok(item)
}
