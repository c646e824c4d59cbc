//! Secret tooling.
//!
//! `encode` produces the same sealed token the relay embeds in service hook
//! URLs, which helps when registering a hook by hand.
//!
//! # Environment Variables
//!
//! - `RELAY_ENCRYPTION_SECRET` - Key material used to seal
//! - `RELAY_WEBHOOK_SECRET` - Secret sealed when `--secret` is not given

use devops_relay::crypto::{self, CryptoError, SecretCipher};
use secrecy::SecretString;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SecretError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Encryption error: {0}")]
    Crypto(#[from] CryptoError),
}

/// Print a random URL-safe secret.
pub fn generate() {
    #[allow(clippy::print_stdout)]
    {
        println!("{}", crypto::generate_secret());
    }
}

/// Print `secret` (or `RELAY_WEBHOOK_SECRET`) sealed with the encryption secret.
///
/// # Errors
///
/// Returns `SecretError` if a variable is missing or sealing fails.
pub fn encode(secret: Option<&str>) -> Result<(), SecretError> {
    dotenvy::dotenv().ok();

    let encryption_secret = std::env::var("RELAY_ENCRYPTION_SECRET")
        .map(SecretString::from)
        .map_err(|_| SecretError::MissingEnvVar("RELAY_ENCRYPTION_SECRET"))?;
    let secret = match secret {
        Some(secret) => secret.to_string(),
        None => std::env::var("RELAY_WEBHOOK_SECRET")
            .map_err(|_| SecretError::MissingEnvVar("RELAY_WEBHOOK_SECRET"))?,
    };

    let cipher = SecretCipher::new(&encryption_secret)?;
    let sealed = cipher.seal(&secret)?;

    #[allow(clippy::print_stdout)]
    {
        println!("{sealed}");
    }
    Ok(())
}
