//! Approve and Reject button callbacks.
//!
//! The remote decision is applied first. A 400 from Azure DevOps means the
//! approval already left the pending state, so the current status is fetched
//! and shown instead. The post update comes last and is never rolled back
//! into the remote decision.

use devops_relay_core::{PostId, UserId};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use crate::constants::APPROVAL_PROCESSED;
use crate::devops::{DevOpsError, RunApproval};
use crate::error::AppError;
use crate::notifications::approval_posts::{apply_release_status, apply_run_status};
use crate::notifications::{ReleaseApprovalContext, RunApprovalContext};
use crate::state::AppState;

/// Request the chat host sends when a post button is clicked.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ActionRequest {
    pub user_id: String,
    pub post_id: String,
    pub channel_id: String,
    pub context: serde_json::Value,
}

/// Reply shown to the clicking user only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ephemeral_text: String,
}

impl ActionResponse {
    fn processed() -> Self {
        Self {
            ephemeral_text: APPROVAL_PROCESSED.to_string(),
        }
    }
}

fn context<C: serde::de::DeserializeOwned>(request: &ActionRequest) -> Result<C, AppError> {
    serde_json::from_value(request.context.clone())
        .map_err(|e| AppError::Internal(format!("invalid approval context: {e}")))
}

fn not_pending(approval_id: &str) {
    warn!(
        "Approval(s) {approval_id} are not in a pending state. Only pending approval(s) can be updated"
    );
}

/// Decide a release deployment approval and rewrite its post.
///
/// # Errors
///
/// Returns `AppError::Internal` for an unreadable context and server errors
/// when Azure DevOps or the post update fails.
#[instrument(skip(state, request), fields(user_id = %user_id, post_id = %request.post_id))]
pub async fn handle_release_approval(
    state: &AppState,
    user_id: &UserId,
    request: &ActionRequest,
) -> Result<ActionResponse, AppError> {
    let context: ReleaseApprovalContext = context(request)?;

    let status = match state
        .devops()
        .update_release_approval(
            user_id,
            &context.organization,
            &context.project_name,
            context.approval_id,
            context.request_type,
        )
        .await
    {
        Ok(()) => context.request_type.as_str().to_string(),
        Err(e) if e.status() == Some(400) => {
            not_pending(&context.approval_id.to_string());
            state
                .devops()
                .get_release_approval(
                    user_id,
                    &context.organization,
                    &context.project_name,
                    context.approval_id,
                )
                .await?
                .status
        }
        Err(e) => return Err(e.into()),
    };

    let mut post = state
        .chat()
        .get_post(&PostId::new(request.post_id.as_str()))
        .await?;
    apply_release_status(&mut post, &status);
    state.chat().update_post(&post).await?;

    info!(approval_id = context.approval_id, %status, "Release approval processed");
    Ok(ActionResponse::processed())
}

/// Current details of a run stage approval, with steps.
async fn run_approval_details(
    state: &AppState,
    user_id: &UserId,
    context: &RunApprovalContext,
) -> Result<RunApproval, DevOpsError> {
    state
        .devops()
        .get_run_approval(
            user_id,
            &context.organization,
            &context.project_id,
            &context.approval_id,
        )
        .await
}

/// Decide a pipeline run stage approval and rewrite its post.
///
/// # Errors
///
/// Same as [`handle_release_approval`].
#[instrument(skip(state, request), fields(user_id = %user_id, post_id = %request.post_id))]
pub async fn handle_run_approval(
    state: &AppState,
    user_id: &UserId,
    request: &ActionRequest,
) -> Result<ActionResponse, AppError> {
    let context: RunApprovalContext = context(request)?;

    let approval = match state
        .devops()
        .update_run_approval(
            user_id,
            &context.organization,
            &context.project_id,
            &context.approval_id,
            context.request_type,
        )
        .await
    {
        // The update response leaves steps collapsed
        Ok(approval) if approval.steps.is_empty() => {
            run_approval_details(state, user_id, &context).await?
        }
        Ok(approval) => approval,
        Err(e) if e.status() == Some(400) => {
            not_pending(&context.approval_id);
            run_approval_details(state, user_id, &context).await?
        }
        Err(e) => return Err(e.into()),
    };

    let mut post = state
        .chat()
        .get_post(&PostId::new(request.post_id.as_str()))
        .await?;
    apply_run_status(&mut post, &approval);
    state.chat().update_post(&post).await?;

    info!(approval_id = %context.approval_id, status = %approval.status, "Run approval processed");
    Ok(ActionResponse::processed())
}
