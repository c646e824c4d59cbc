//! Azure DevOps OAuth token endpoint.
//!
//! Azure DevOps OAuth uses the JWT-bearer assertion flow: the client secret
//! travels as `client_assertion` and the code or refresh token as
//! `assertion`, both form encoded.
//!
//! See: <https://learn.microsoft.com/azure/devops/integrate/get-started/authentication/oauth>

use secrecy::{ExposeSecret, SecretString};
use tracing::instrument;

use super::error::DevOpsError;
use super::types::TokenResponse;
use crate::config::DevOpsConfig;
use crate::store::UserToken;

const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const GRANT_TYPE_CODE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const GRANT_TYPE_REFRESH: &str = "refresh_token";
const RESPONSE_TYPE: &str = "Assertion";

/// URL the user is sent to in order to authorize the relay.
///
/// # Errors
///
/// Returns an error if the configured authorize URL is not absolute.
pub fn authorize_url(config: &DevOpsConfig, state: &str) -> Result<url::Url, url::ParseError> {
    let mut url = url::Url::parse(&config.oauth_authorize_url)?;
    url.query_pairs_mut()
        .append_pair("client_id", &config.client_id)
        .append_pair("response_type", RESPONSE_TYPE)
        .append_pair("state", state)
        .append_pair("scope", &config.oauth_scopes)
        .append_pair("redirect_uri", &config.redirect_url);
    Ok(url)
}

/// Exchange an authorization code for a token pair.
///
/// # Errors
///
/// Returns `DevOpsError::TokenRequest` if the grant is rejected.
#[instrument(skip_all)]
pub async fn exchange_code(
    client: &reqwest::Client,
    config: &DevOpsConfig,
    code: &str,
) -> Result<UserToken, DevOpsError> {
    token_request(client, config, GRANT_TYPE_CODE, code).await
}

/// Exchange a refresh token for a new token pair.
///
/// # Errors
///
/// Returns `DevOpsError::TokenRequest` if the refresh token is rejected.
#[instrument(skip_all)]
pub async fn refresh_access_token(
    client: &reqwest::Client,
    config: &DevOpsConfig,
    refresh_token: &SecretString,
) -> Result<UserToken, DevOpsError> {
    token_request(
        client,
        config,
        GRANT_TYPE_REFRESH,
        refresh_token.expose_secret(),
    )
    .await
}

async fn token_request(
    client: &reqwest::Client,
    config: &DevOpsConfig,
    grant_type: &str,
    assertion: &str,
) -> Result<UserToken, DevOpsError> {
    let now = chrono::Utc::now().timestamp();

    let response = client
        .post(&config.oauth_token_url)
        .form(&[
            ("client_assertion_type", CLIENT_ASSERTION_TYPE),
            ("client_assertion", config.client_secret.expose_secret()),
            ("grant_type", grant_type),
            ("assertion", assertion),
            ("redirect_uri", config.redirect_url.as_str()),
        ])
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let token: TokenResponse = response.json().await?;

        Ok(UserToken {
            access_token: SecretString::from(token.access_token),
            refresh_token: SecretString::from(token.refresh_token),
            expires_at: now + token.expires_in,
        })
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(DevOpsError::TokenRequest(format!("{status}: {error_text}")))
    }
}
