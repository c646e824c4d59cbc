//! Relay configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `RELAY_PUBLIC_URL` - Public URL Azure DevOps and Mattermost call back into
//! - `RELAY_WEBHOOK_SECRET` - Shared secret embedded in every service hook URL (min 32 chars, high entropy)
//! - `RELAY_ENCRYPTION_SECRET` - Key material for encrypting secrets and tokens (min 32 chars, high entropy)
//! - `DEVOPS_OAUTH_CLIENT_ID` - Azure DevOps OAuth app id
//! - `DEVOPS_OAUTH_CLIENT_SECRET` - Azure DevOps OAuth app client secret
//! - `DEVOPS_OAUTH_REDIRECT_URL` - Redirect URL registered with the OAuth app
//! - `MATTERMOST_URL` - Mattermost site URL
//! - `MATTERMOST_BOT_TOKEN` - Bot access token used to post into channels
//!
//! ## Optional
//! - `RELAY_HOST` - Bind address (default: 127.0.0.1)
//! - `RELAY_PORT` - Listen port (default: 3002)
//! - `RELAY_DATABASE_URL` - `PostgreSQL` connection string for the key-value table
//!   (falls back to `DATABASE_URL`; in-memory store when neither is set)
//! - `RELAY_LOG_JSON` - Emit JSON logs when set
//! - `DEVOPS_API_BASE_URL` - Azure DevOps REST base URL (default: <https://dev.azure.com>)
//! - `DEVOPS_RELEASE_API_BASE_URL` - Release management base URL (default: the REST
//!   base URL on the `vsrm.` sub-host)
//! - `DEVOPS_OAUTH_AUTHORIZE_URL` - Authorize endpoint (default: <https://app.vssps.visualstudio.com/oauth2/authorize>)
//! - `DEVOPS_OAUTH_TOKEN_URL` - Token endpoint (default: <https://app.vssps.visualstudio.com/oauth2/token>)
//! - `DEVOPS_OAUTH_SCOPES` - Space separated scopes requested on connect
//! - `SENTRY_DSN` - Sentry error tracking DSN
//! - `SENTRY_ENVIRONMENT` - Sentry environment name
//! - `SENTRY_TRACES_SAMPLE_RATE` - Sentry traces sample rate (default: 1.0)
//!
//! # Reloading
//!
//! The live configuration is held in a [`SharedConfig`]. Handlers take a
//! snapshot per request; [`SharedConfig::reload_from_env`] swaps in a new
//! snapshot and leaves the old one in place if the new one fails validation.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use thiserror::Error;

const MIN_SECRET_LENGTH: usize = 32;
const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;
const DEFAULT_DEVOPS_API_BASE_URL: &str = "https://dev.azure.com";
const DEFAULT_DEVOPS_OAUTH_AUTHORIZE_URL: &str =
    "https://app.vssps.visualstudio.com/oauth2/authorize";
const DEFAULT_DEVOPS_OAUTH_TOKEN_URL: &str = "https://app.vssps.visualstudio.com/oauth2/token";
const DEFAULT_DEVOPS_OAUTH_SCOPES: &str =
    "vso.build_execute vso.code vso.hooks_write vso.project vso.release_manage vso.work_write";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Relay configuration.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL of the relay, used in callback URLs
    pub public_url: String,
    /// Plugin-wide webhook secret
    pub webhook_secret: SecretString,
    /// Key material for [`crate::crypto::SecretCipher`]
    pub encryption_secret: SecretString,
    /// Azure DevOps API configuration
    pub devops: DevOpsConfig,
    /// Mattermost host configuration
    pub mattermost: MattermostConfig,
    /// `PostgreSQL` URL for the key-value table; in-memory store when `None`
    pub database_url: Option<SecretString>,
    /// Emit JSON logs
    pub log_json: bool,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment (e.g., "development", "staging", "production")
    pub sentry_environment: Option<String>,
    /// Sentry traces sample rate for performance monitoring (0.0 to 1.0)
    pub sentry_traces_sample_rate: f32,
}

/// Azure DevOps REST and OAuth configuration.
///
/// Implements `Debug` manually to redact the client secret.
#[derive(Clone)]
pub struct DevOpsConfig {
    /// REST base URL, e.g. `https://dev.azure.com`
    pub api_base_url: String,
    /// Release management base URL, `api_base_url` on the `vsrm.` sub-host
    pub release_api_base_url: String,
    /// OAuth app id
    pub client_id: String,
    /// OAuth authorize endpoint users are redirected to on connect
    pub oauth_authorize_url: String,
    /// OAuth token endpoint used for code exchange and refresh
    pub oauth_token_url: String,
    /// Scopes requested on connect
    pub oauth_scopes: String,
    /// OAuth client secret (sent as the client assertion)
    pub client_secret: SecretString,
    /// Redirect URL registered with the OAuth app
    pub redirect_url: String,
}

impl std::fmt::Debug for DevOpsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DevOpsConfig")
            .field("api_base_url", &self.api_base_url)
            .field("release_api_base_url", &self.release_api_base_url)
            .field("client_id", &self.client_id)
            .field("oauth_authorize_url", &self.oauth_authorize_url)
            .field("oauth_token_url", &self.oauth_token_url)
            .field("oauth_scopes", &self.oauth_scopes)
            .field("client_secret", &"[REDACTED]")
            .field("redirect_url", &self.redirect_url)
            .finish()
    }
}

/// Mattermost host configuration.
///
/// Implements `Debug` manually to redact the bot token.
#[derive(Clone)]
pub struct MattermostConfig {
    /// Site URL, e.g. `https://chat.example.com`
    pub site_url: String,
    /// Bot access token
    pub bot_token: SecretString,
}

impl std::fmt::Debug for MattermostConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MattermostConfig")
            .field("site_url", &self.site_url)
            .field("bot_token", &"[REDACTED]")
            .finish()
    }
}

impl RelayConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let host = get_env_or_default("RELAY_HOST", "127.0.0.1")
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar("RELAY_HOST".to_string(), e.to_string()))?;
        let port = get_env_or_default("RELAY_PORT", "3002")
            .parse::<u16>()
            .map_err(|e| ConfigError::InvalidEnvVar("RELAY_PORT".to_string(), e.to_string()))?;
        let public_url = get_url("RELAY_PUBLIC_URL", None)?;

        let webhook_secret = get_validated_secret("RELAY_WEBHOOK_SECRET")?;
        validate_secret_length(&webhook_secret, "RELAY_WEBHOOK_SECRET")?;
        let encryption_secret = get_validated_secret("RELAY_ENCRYPTION_SECRET")?;
        validate_secret_length(&encryption_secret, "RELAY_ENCRYPTION_SECRET")?;

        let devops = DevOpsConfig::from_env()?;
        let mattermost = MattermostConfig::from_env()?;
        let database_url = get_database_url("RELAY_DATABASE_URL");
        let log_json = get_optional_env("RELAY_LOG_JSON").is_some();
        let sentry_dsn = get_optional_env("SENTRY_DSN");
        let sentry_environment = get_optional_env("SENTRY_ENVIRONMENT");
        let sentry_traces_sample_rate = get_optional_env("SENTRY_TRACES_SAMPLE_RATE")
            .and_then(|s| s.parse().ok())
            .unwrap_or(1.0);

        Ok(Self {
            host,
            port,
            public_url,
            webhook_secret,
            encryption_secret,
            devops,
            mattermost,
            database_url,
            log_json,
            sentry_dsn,
            sentry_environment,
            sentry_traces_sample_rate,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Public URL without a trailing slash.
    #[must_use]
    pub fn public_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}

impl DevOpsConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = get_url("DEVOPS_API_BASE_URL", Some(DEFAULT_DEVOPS_API_BASE_URL))?;
        let release_api_base_url = match get_optional_env("DEVOPS_RELEASE_API_BASE_URL") {
            Some(_) => get_url("DEVOPS_RELEASE_API_BASE_URL", None)?,
            None => release_base_url(&api_base_url),
        };

        Ok(Self {
            api_base_url,
            release_api_base_url,
            client_id: get_required_env("DEVOPS_OAUTH_CLIENT_ID")?,
            oauth_authorize_url: get_url(
                "DEVOPS_OAUTH_AUTHORIZE_URL",
                Some(DEFAULT_DEVOPS_OAUTH_AUTHORIZE_URL),
            )?,
            oauth_token_url: get_url(
                "DEVOPS_OAUTH_TOKEN_URL",
                Some(DEFAULT_DEVOPS_OAUTH_TOKEN_URL),
            )?,
            oauth_scopes: get_env_or_default("DEVOPS_OAUTH_SCOPES", DEFAULT_DEVOPS_OAUTH_SCOPES),
            client_secret: get_required_secret("DEVOPS_OAUTH_CLIENT_SECRET")?,
            redirect_url: get_required_env("DEVOPS_OAUTH_REDIRECT_URL")?,
        })
    }
}

impl MattermostConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let bot_token = get_required_env("MATTERMOST_BOT_TOKEN")?;
        if let Err(e) = validate_secret_strength(&bot_token, "MATTERMOST_BOT_TOKEN") {
            tracing::warn!("MATTERMOST_BOT_TOKEN validation warning: {e}");
        }

        Ok(Self {
            site_url: get_url("MATTERMOST_URL", None)?,
            bot_token: SecretString::from(bot_token),
        })
    }
}

// =============================================================================
// Live configuration
// =============================================================================

/// Read-mostly handle to the current configuration snapshot.
///
/// Cloning shares the same snapshot slot.
#[derive(Clone)]
pub struct SharedConfig {
    current: Arc<RwLock<Arc<RelayConfig>>>,
}

impl SharedConfig {
    #[must_use]
    pub fn new(config: RelayConfig) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(config))),
        }
    }

    /// The configuration in effect right now.
    #[must_use]
    pub fn snapshot(&self) -> Arc<RelayConfig> {
        let guard = self.current.read().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(&guard)
    }

    /// Swap in a new configuration. In-flight requests keep their snapshot.
    pub fn replace(&self, config: RelayConfig) {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        *guard = Arc::new(config);
    }

    /// Re-read the environment and swap the snapshot on success.
    ///
    /// # Errors
    ///
    /// Returns the validation error and keeps the current snapshot.
    pub fn reload_from_env(&self) -> Result<(), ConfigError> {
        let config = RelayConfig::from_env()?;
        self.replace(config);
        Ok(())
    }
}

impl std::fmt::Debug for SharedConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SharedConfig").field(&self.snapshot()).finish()
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Release management lives on the `vsrm.` sub-host of the REST base URL.
#[must_use]
pub fn release_base_url(api_base_url: &str) -> String {
    api_base_url.replacen("://", "://vsrm.", 1)
}

/// Get a required environment variable.
fn get_required_env(key: &str) -> Result<String, ConfigError> {
    std::env::var(key).map_err(|_| ConfigError::MissingEnvVar(key.to_string()))
}

/// Get a required environment variable as a secret.
fn get_required_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    Ok(SecretString::from(value))
}

/// Get database URL with fallback to generic `DATABASE_URL` (used by Fly.io postgres attach).
fn get_database_url(primary_key: &str) -> Option<SecretString> {
    std::env::var(primary_key)
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .map(SecretString::from)
}

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or_default(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Get a URL-valued variable, checking that it parses.
fn get_url(key: &str, default: Option<&str>) -> Result<String, ConfigError> {
    let value = match default {
        Some(default) => get_env_or_default(key, default),
        None => get_required_env(key)?,
    };
    url::Url::parse(&value)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(value)
}

/// Validate that a secret meets minimum length requirements.
fn validate_secret_length(secret: &SecretString, var_name: &str) -> Result<(), ConfigError> {
    let value = secret.expose_secret();
    if value.len() < MIN_SECRET_LENGTH {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "must be at least {} characters (got {})",
                MIN_SECRET_LENGTH,
                value.len()
            ),
        ));
    }
    Ok(())
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.len() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
pub(crate) fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

/// Load and validate a secret from environment.
fn get_validated_secret(key: &str) -> Result<SecretString, ConfigError> {
    let value = get_required_env(key)?;
    validate_secret_strength(&value, key)?;
    Ok(SecretString::from(value))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_config() -> RelayConfig {
        RelayConfig {
            host: "127.0.0.1".parse().unwrap(),
            port: 3002,
            public_url: "https://relay.test/".to_string(),
            webhook_secret: SecretString::from("kT9vQ2mX7pL4wR8zN3bC6yH1jF5dG0sA"),
            encryption_secret: SecretString::from("Zq8Lw3Nx6Pr1Tv4Yb7Mc0Kd9Hf2Js5Ga"),
            devops: DevOpsConfig {
                api_base_url: DEFAULT_DEVOPS_API_BASE_URL.to_string(),
                release_api_base_url: release_base_url(DEFAULT_DEVOPS_API_BASE_URL),
                client_id: "relay-app-id".to_string(),
                oauth_authorize_url: DEFAULT_DEVOPS_OAUTH_AUTHORIZE_URL.to_string(),
                oauth_token_url: DEFAULT_DEVOPS_OAUTH_TOKEN_URL.to_string(),
                oauth_scopes: DEFAULT_DEVOPS_OAUTH_SCOPES.to_string(),
                client_secret: SecretString::from("devops_client_assertion_value"),
                redirect_url: "https://relay.test/oauth/complete".to_string(),
            },
            mattermost: MattermostConfig {
                site_url: "https://chat.test".to_string(),
                bot_token: SecretString::from("mattermost_bot_token_value"),
            },
            database_url: None,
            log_json: false,
            sentry_dsn: None,
            sentry_environment: None,
            sentry_traces_sample_rate: 1.0,
        }
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength_placeholder() {
        let result = validate_secret_strength("your-webhook-key-here", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_low_entropy() {
        let result = validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR");
        assert!(matches!(result, Err(ConfigError::InsecureSecret(_, _))));
    }

    #[test]
    fn test_validate_secret_strength_valid() {
        let result = validate_secret_strength("aB3$xY9!mK2@nL5#pQ7&rT0*uW4^zC6", "TEST_VAR");
        assert!(result.is_ok());
    }

    #[test]
    fn test_validate_secret_length_too_short() {
        let secret = SecretString::from("short");
        assert!(validate_secret_length(&secret, "RELAY_WEBHOOK_SECRET").is_err());
    }

    #[test]
    fn test_socket_addr_and_public_url() {
        let config = sample_config();
        let addr = config.socket_addr();
        assert_eq!(addr.port(), 3002);
        assert_eq!(config.public_url(), "https://relay.test");
    }

    #[test]
    fn test_release_base_url() {
        assert_eq!(
            release_base_url("https://dev.azure.com"),
            "https://vsrm.dev.azure.com"
        );
        assert_eq!(
            sample_config().devops.release_api_base_url,
            "https://vsrm.dev.azure.com"
        );
    }

    #[test]
    fn test_shared_config_replace_swaps_snapshot() {
        let shared = SharedConfig::new(sample_config());
        let before = shared.snapshot();

        let mut next = sample_config();
        next.public_url = "https://relay2.test".to_string();
        shared.replace(next);

        assert_eq!(before.public_url(), "https://relay.test");
        assert_eq!(shared.snapshot().public_url(), "https://relay2.test");
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = sample_config();
        let debug_output = format!("{config:?}");

        assert!(debug_output.contains("https://chat.test"));
        assert!(debug_output.contains("[REDACTED]"));
        assert!(!debug_output.contains("devops_client_assertion_value"));
        assert!(!debug_output.contains("mattermost_bot_token_value"));
    }
}
