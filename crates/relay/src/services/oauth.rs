//! OAuth connect and complete.

use devops_relay_core::UserId;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};

use crate::constants::{AUTH_ATTEMPT_EXPIRED, CONNECTED, INVALID_OAUTH_STATE, NOT_CONNECTED};
use crate::devops::auth;
use crate::error::AppError;
use crate::state::AppState;

/// Query of `GET /oauth/complete`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CompleteQuery {
    pub code: String,
    pub state: String,
}

/// Remember a fresh `state` for `user_id` and build the authorize URL.
///
/// # Errors
///
/// Returns a server error if the state cannot be stored or the authorize URL
/// is malformed.
#[instrument(skip(state), fields(user_id = %user_id))]
pub async fn connect_url(state: &AppState, user_id: &UserId) -> Result<String, AppError> {
    let oauth_state = state.credentials().store_oauth_state(user_id).await?;
    let config = state.config();
    let url = auth::authorize_url(&config.devops, &oauth_state)
        .map_err(|e| AppError::Internal(format!("invalid authorize URL: {e}")))?;
    Ok(url.into())
}

/// Verify the returned `state`, exchange the code and store the token.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for an expired or mismatched state and a
/// server error when the exchange fails.
#[instrument(skip(state, query), fields(user_id = %user_id))]
pub async fn complete(
    state: &AppState,
    user_id: &UserId,
    query: &CompleteQuery,
) -> Result<(), AppError> {
    match state
        .credentials()
        .verify_oauth_state(user_id, &query.state)
        .await?
    {
        None => return Err(AppError::BadRequest(AUTH_ATTEMPT_EXPIRED.to_string())),
        Some(false) => {
            warn!("OAuth state mismatch");
            return Err(AppError::BadRequest(INVALID_OAUTH_STATE.to_string()));
        }
        Some(true) => {}
    }

    let token = state.devops().exchange_code(&query.code).await?;
    state.credentials().save(user_id, &token).await?;
    info!("Azure DevOps account connected");

    if let Err(e) = state.chat().send_direct_message(user_id, CONNECTED).await {
        error!(error = %e, "Failed to DM connection confirmation");
    }
    Ok(())
}

/// Body of `GET /user`. Tokens never leave the relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountDetails {
    #[serde(rename = "mattermostUserID")]
    pub mattermost_user_id: UserId,
    pub is_connected: bool,
    /// Unix timestamp (seconds) when the access token expires
    pub token_expires_at: i64,
}

/// Connection details for `user_id`.
///
/// # Errors
///
/// Returns `AppError::NotAuthorized` when no account is connected.
pub async fn account_details(
    state: &AppState,
    user_id: &UserId,
) -> Result<AccountDetails, AppError> {
    let token = state
        .credentials()
        .load(user_id)
        .await?
        .ok_or_else(|| AppError::NotAuthorized(NOT_CONNECTED.to_string()))?;
    Ok(AccountDetails {
        mattermost_user_id: user_id.clone(),
        is_connected: true,
        token_expires_at: token.expires_at,
    })
}
