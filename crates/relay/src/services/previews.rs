//! Previews for Azure DevOps links in a message about to be posted.

use devops_relay_core::{ChannelId, UserId};
use serde::Deserialize;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::chat::{Attachment, Post};
use crate::constants::CHANNEL_ID_OR_MESSAGE_REQUIRED;
use crate::devops::DevOpsError;
use crate::error::AppError;
use crate::notifications::previews::{self, LinkTarget, PreviewLink};
use crate::state::AppState;

/// Body of `POST /previews`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PreviewPayload {
    #[serde(rename = "channelID")]
    pub channel_id: ChannelId,
    pub message: String,
}

/// The post with a preview attachment for the first recognized link.
///
/// Returns `None` when the message has no recognized link or the resource
/// cannot be fetched for `user_id`; the message then posts unchanged.
///
/// # Errors
///
/// Returns `AppError::Validation` when the channel or message is missing.
#[instrument(skip(state, payload), fields(user_id = %user_id, channel_id = %payload.channel_id))]
pub async fn preview_post(
    state: &AppState,
    user_id: &UserId,
    payload: PreviewPayload,
) -> Result<Option<Post>, AppError> {
    if payload.channel_id.as_str().is_empty() || payload.message.trim().is_empty() {
        return Err(AppError::Validation(CHANNEL_ID_OR_MESSAGE_REQUIRED.to_string()));
    }

    let host = Url::parse(&state.config().devops.api_base_url)
        .map_err(|e| AppError::Internal(format!("invalid Azure DevOps URL: {e}")))?;
    let Some(link) = previews::find_link(&payload.message, &host) else {
        return Ok(None);
    };

    match fetch_attachment(state, user_id, &link).await {
        Ok(attachment) => {
            debug!(url = %link.url, "Link preview attached");
            Ok(Some(
                Post::new(payload.channel_id, payload.message).with_attachments(vec![attachment]),
            ))
        }
        Err(e) => {
            warn!(error = %e, url = %link.url, "Link preview unavailable");
            Ok(None)
        }
    }
}

async fn fetch_attachment(
    state: &AppState,
    user_id: &UserId,
    link: &PreviewLink,
) -> Result<Attachment, DevOpsError> {
    let devops = state.devops();
    let attachment = match &link.target {
        LinkTarget::WorkItem {
            organization, id, ..
        } => previews::work_item_attachment(
            &devops.get_work_item(user_id, organization, *id).await?,
            &link.url,
        ),
        LinkTarget::PullRequest {
            organization,
            project,
            id,
            ..
        } => previews::pull_request_attachment(
            &devops
                .get_pull_request(user_id, organization, project, *id)
                .await?,
            &link.url,
        ),
        LinkTarget::Build {
            organization,
            project,
            id,
        } => previews::build_attachment(
            &devops.get_build(user_id, organization, project, *id).await?,
            &link.url,
        ),
        LinkTarget::Release {
            organization,
            project,
            id,
        } => previews::release_attachment(
            &devops.get_release(user_id, organization, project, *id).await?,
            &link.url,
        ),
    };
    Ok(attachment)
}
