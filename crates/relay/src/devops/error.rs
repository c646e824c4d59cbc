//! Azure DevOps gateway errors.

use thiserror::Error;

use crate::store::StoreError;

/// Errors that can occur when calling Azure DevOps.
#[derive(Debug, Error)]
pub enum DevOpsError {
    /// HTTP request failed.
    #[error("Azure DevOps request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// Azure DevOps answered with a non-success status.
    #[error("Azure DevOps API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The user never connected an account.
    #[error("Azure DevOps account is not connected")]
    NotConnected,

    /// Token refresh failed; credentials have been removed.
    #[error("Azure DevOps session expired")]
    SessionExpired,

    /// OAuth token endpoint rejected the grant.
    #[error("OAuth token request failed: {0}")]
    TokenRequest(String),

    /// A success response did not have the expected shape.
    #[error("unexpected Azure DevOps response: {0}")]
    UnexpectedResponse(String),

    /// Credential storage failed.
    #[error("credential store error: {0}")]
    Store(#[from] StoreError),

    /// A request URL could not be built.
    #[error("invalid Azure DevOps URL: {0}")]
    Url(#[from] url::ParseError),
}

impl DevOpsError {
    /// Upstream status code, when the error came from the API.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
