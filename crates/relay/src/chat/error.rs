//! Chat host errors.

use thiserror::Error;

/// Errors that can occur when talking to the chat host.
#[derive(Debug, Error)]
pub enum ChatError {
    /// HTTP request failed.
    #[error("chat host request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The host answered with a non-success status.
    #[error("chat host API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Requested entity does not exist.
    #[error("chat host entity not found: {0}")]
    NotFound(String),

    /// Host URL could not be built.
    #[error("invalid chat host URL: {0}")]
    Url(#[from] url::ParseError),
}
