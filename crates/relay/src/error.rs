//! Unified error handling for the relay's HTTP surface.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::chat::ChatError;
use crate::constants::{GENERIC_ERROR_MESSAGE, NOT_CONNECTED};
use crate::crypto::CryptoError;
use crate::devops::DevOpsError;
use crate::notifications::RenderError;
use crate::store::StoreError;

/// Application-level error type for relay handlers.
///
/// Only validation, permission and not-connected errors show their own text
/// to the caller. Everything else answers with [`GENERIC_ERROR_MESSAGE`].
#[derive(Debug, Error)]
pub enum AppError {
    /// A required field is missing or malformed.
    #[error("{0}")]
    Validation(String),

    /// The request was understood but refused, e.g. a duplicate subscription.
    #[error("{0}")]
    BadRequest(String),

    /// No user session on the request.
    #[error("{0}")]
    NotAuthorized(String),

    /// Subscription or project absent.
    #[error("{0}")]
    NotFound(String),

    /// Azure DevOps refused the caller's access.
    #[error("{0}")]
    Permission(String),

    #[error("Azure DevOps error: {0}")]
    DevOps(#[from] DevOpsError),

    #[error("Chat host error: {0}")]
    Chat(#[from] ChatError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    #[error("Crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotAuthorized(_) | Self::DevOps(DevOpsError::NotConnected) => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Permission(_) => StatusCode::FORBIDDEN,
            Self::DevOps(_)
            | Self::Chat(_)
            | Self::Store(_)
            | Self::Render(_)
            | Self::Crypto(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text shown to the caller.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Validation(message)
            | Self::BadRequest(message)
            | Self::NotAuthorized(message)
            | Self::NotFound(message)
            | Self::Permission(message) => message.clone(),
            Self::DevOps(DevOpsError::NotConnected) => NOT_CONNECTED.to_string(),
            _ => GENERIC_ERROR_MESSAGE.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Relay request error"
            );
        } else {
            tracing::debug!(error = %self, status = %status, "Relay request rejected");
        }

        let body = serde_json::json!({ "error": self.public_message() });
        (status, Json(body)).into_response()
    }
}

/// Set the Sentry user context from a chat user ID.
pub fn set_sentry_user(user_id: &str) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}
