//! Chat user extractor.
//!
//! Mattermost authenticates the user and forwards the id in the
//! `Mattermost-User-ID` header. Requests without it are rejected.

use axum::{extract::FromRequestParts, http::request::Parts};
use devops_relay_core::UserId;

use crate::constants::{HEADER_USER_ID, MM_USER_ID_REQUIRED};
use crate::error::{AppError, set_sentry_user};

/// Extractor that requires the chat host's user header.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(RequireUser(user_id): RequireUser) -> impl IntoResponse {
///     format!("Hello, {user_id}!")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireUser(pub UserId);

impl<S> FromRequestParts<S> for RequireUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(HEADER_USER_ID)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .ok_or_else(|| AppError::NotAuthorized(MM_USER_ID_REQUIRED.to_string()))?;

        set_sentry_user(user_id);
        tracing::Span::current().record("user_id", user_id);
        Ok(Self(UserId::new(user_id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    async fn extract(request: Request<()>) -> Result<RequireUser, AppError> {
        let (mut parts, ()) = request.into_parts();
        RequireUser::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_header_yields_user() {
        let request = Request::builder()
            .header(HEADER_USER_ID, "u1")
            .body(())
            .expect("request");
        let RequireUser(user_id) = extract(request).await.expect("user");
        assert_eq!(user_id, UserId::new("u1"));
    }

    #[tokio::test]
    async fn test_missing_or_blank_header_is_unauthorized() {
        let missing = extract(Request::builder().body(()).expect("request")).await;
        assert!(matches!(missing, Err(AppError::NotAuthorized(ref m)) if m == MM_USER_ID_REQUIRED));

        let blank = Request::builder()
            .header(HEADER_USER_ID, "  ")
            .body(())
            .expect("request");
        assert!(extract(blank).await.is_err());
    }
}
