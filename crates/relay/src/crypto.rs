//! Secret encryption for callback URLs and stored tokens.
//!
//! - **Algorithm**: AES-256-GCM (authenticated encryption)
//! - **Key**: SHA-256 of the configured encryption secret
//! - **Nonce**: 12 bytes, randomly generated per encryption
//! - **Format**: nonce + ciphertext + auth tag, base64 URL-safe without padding
//!
//! The encoded form is safe to place in a query string unescaped.

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Nonce size for AES-256-GCM (12 bytes / 96 bits).
const NONCE_SIZE: usize = 12;

/// Length of generated secrets before encoding.
const GENERATED_SECRET_BYTES: usize = 32;

/// Errors from encrypting or decrypting secrets.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// No key material configured.
    #[error("encryption key is empty")]
    EmptyKey,

    /// Input is not valid base64.
    #[error("invalid encoding: {0}")]
    Encoding(#[from] base64::DecodeError),

    /// Input is shorter than a nonce.
    #[error("ciphertext too short")]
    Truncated,

    /// Authentication tag did not verify (wrong key or tampered data).
    #[error("decryption failed")]
    Decrypt,

    /// Encryption failed.
    #[error("encryption failed")]
    Encrypt,

    /// Decrypted bytes are not UTF-8.
    #[error("decrypted secret is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// AES-256-GCM cipher keyed from the relay's encryption secret.
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Derive a cipher from the configured encryption secret.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::EmptyKey` if the secret is empty.
    pub fn new(encryption_secret: &SecretString) -> Result<Self, CryptoError> {
        let material = encryption_secret.expose_secret();
        if material.is_empty() {
            return Err(CryptoError::EmptyKey);
        }
        let digest: [u8; 32] = Sha256::digest(material.as_bytes()).into();
        let key = Key::<Aes256Gcm>::from(digest);
        Ok(Self {
            cipher: Aes256Gcm::new(&key),
        })
    }

    /// Encrypt `plaintext`, returning nonce + ciphertext.
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Encrypt` if the AEAD operation fails.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from(nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut output = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        output.extend_from_slice(&nonce_bytes);
        output.extend_from_slice(&ciphertext);
        Ok(output)
    }

    /// Decrypt nonce + ciphertext produced by [`Self::encrypt`].
    ///
    /// # Errors
    ///
    /// Returns `CryptoError::Truncated` or `CryptoError::Decrypt` for bad input.
    pub fn decrypt(&self, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if data.len() < NONCE_SIZE {
            return Err(CryptoError::Truncated);
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);

        self.cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }

    /// Encrypt and encode a secret for embedding in a URL.
    ///
    /// # Errors
    ///
    /// Propagates encryption failures.
    pub fn seal(&self, secret: &str) -> Result<String, CryptoError> {
        let encrypted = self.encrypt(secret.as_bytes())?;
        Ok(encode(&encrypted))
    }

    /// Decode and decrypt a value produced by [`Self::seal`].
    ///
    /// # Errors
    ///
    /// Returns an error if the value is not valid base64, was not produced
    /// with this key, or is not UTF-8.
    pub fn open(&self, sealed: &str) -> Result<String, CryptoError> {
        let encrypted = decode(sealed)?;
        let plaintext = self.decrypt(&encrypted)?;
        Ok(String::from_utf8(plaintext)?)
    }
}

/// URL-safe base64 without padding.
#[must_use]
pub fn encode(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Inverse of [`encode`]. Trailing padding is tolerated.
///
/// # Errors
///
/// Returns `CryptoError::Encoding` for invalid input.
pub fn decode(data: &str) -> Result<Vec<u8>, CryptoError> {
    Ok(URL_SAFE_NO_PAD.decode(data.trim_end_matches('='))?)
}

/// Generate a random URL-safe secret.
#[must_use]
pub fn generate_secret() -> String {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    encode(&bytes)
}

/// Constant-time string comparison to prevent timing attacks.
#[must_use]
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.bytes()
        .zip(b.bytes())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}
