//! Field-level encryption for sensitive columns (phone numbers, adopter
//! messages).
//!
//! Values are sealed with AES-256-GCM under a fresh random nonce and stored as
//! `base64(nonce || ciphertext || tag)`. The empty string is stored as-is so
//! optional text columns do not grow ciphertext for "nothing".

use aes_gcm::{
    aead::{rand_core::RngCore, Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::fmt;
use thiserror::Error;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;
const TAG_SIZE: usize = 16;

#[derive(Debug, Error)]
pub enum CipherError {
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    #[error("invalid hex key: {0}")]
    InvalidHex(String),

    #[error("ciphertext is not valid base64")]
    InvalidEncoding,

    #[error("ciphertext too short")]
    TooShort,

    #[error("encryption failed")]
    EncryptionFailed,

    /// Wrong key or tampered ciphertext
    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    #[error("decrypted value is not utf-8")]
    NotUtf8,
}

#[derive(Clone)]
pub struct FieldCipher {
    key: [u8; KEY_SIZE],
}

impl FieldCipher {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        if bytes.len() != KEY_SIZE {
            return Err(CipherError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: bytes.len(),
            });
        }
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        Ok(Self { key })
    }

    /// Parse the 64-character hex key from `FIELD_ENCRYPTION_KEY`.
    pub fn from_hex(hex_key: &str) -> Result<Self, CipherError> {
        let bytes =
            hex::decode(hex_key.trim()).map_err(|e| CipherError::InvalidHex(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Random key, used by tests and local tooling.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CipherError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::EncryptionFailed)?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend(sealed);
        Ok(STANDARD.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CipherError> {
        if encoded.is_empty() {
            return Ok(String::new());
        }

        let raw = STANDARD
            .decode(encoded)
            .map_err(|_| CipherError::InvalidEncoding)?;
        if raw.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CipherError::TooShort);
        }

        let (nonce_bytes, sealed) = raw.split_at(NONCE_SIZE);
        let cipher = Aes256Gcm::new_from_slice(&self.key).map_err(|_| CipherError::DecryptionFailed)?;
        let plain = cipher
            .decrypt(Nonce::from_slice(nonce_bytes), sealed)
            .map_err(|_| CipherError::DecryptionFailed)?;

        String::from_utf8(plain).map_err(|_| CipherError::NotUtf8)
    }

    /// Encrypt an optional column value.
    pub fn encrypt_opt(&self, value: Option<&str>) -> Result<Option<String>, CipherError> {
        value.map(|v| self.encrypt(v)).transpose()
    }

    pub fn decrypt_opt(&self, value: Option<&str>) -> Result<Option<String>, CipherError> {
        value.map(|v| self.decrypt(v)).transpose()
    }
}

// Never print key material.
impl fmt::Debug for FieldCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldCipher").finish_non_exhaustive()
    }
}
