//! OAuth routes.

use axum::{
    Json,
    extract::{Query, State},
    response::{Html, Redirect},
};

use crate::error::AppError;
use crate::middleware::RequireUser;
use crate::services::oauth::{self, AccountDetails, CompleteQuery};
use crate::state::AppState;

const COMPLETE_PAGE: &str = "<!DOCTYPE html>\
<html><head><title>Azure DevOps connected</title></head>\
<body><p>Your Azure DevOps account is connected. You can close this window.</p>\
<script>window.close();</script></body></html>";

/// `GET /oauth/connect`
pub async fn connect(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Redirect, AppError> {
    let url = oauth::connect_url(&state, &user_id).await?;
    Ok(Redirect::to(&url))
}

/// `GET /oauth/complete?code=&state=`
pub async fn complete(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
    Query(query): Query<CompleteQuery>,
) -> Result<Html<&'static str>, AppError> {
    oauth::complete(&state, &user_id, &query).await?;
    Ok(Html(COMPLETE_PAGE))
}

/// `GET /user`
pub async fn account(
    State(state): State<AppState>,
    RequireUser(user_id): RequireUser,
) -> Result<Json<AccountDetails>, AppError> {
    Ok(Json(oauth::account_details(&state, &user_id).await?))
}
