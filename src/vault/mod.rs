//! Password encryption at rest: AES-256-GCM under the device key.
//!
//! Each password is sealed independently into an [`EncryptedField`]:
//! base64 ciphertext (with the 16-byte tag appended) and the base64
//! 12-byte nonce. A fresh nonce is drawn from the OS RNG for every
//! call, so sealing the same password twice never repeats.

pub mod keystore;
pub mod migration;

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::error::{Result, VaultError};
use keystore::KeyStore;

pub const NONCE_LEN: usize = 12;

/// A password at rest. Opaque without the device key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedField {
    /// base64 AES-GCM ciphertext including the authentication tag
    pub ciphertext: String,
    /// base64 12-byte nonce
    pub iv: String,
}

/// Anything that can seal a plaintext password.
///
/// The migration runner and the account store only need this much of
/// the codec.
#[async_trait]
pub trait PasswordSealer: Send + Sync {
    async fn seal(&self, plaintext: &str) -> Result<EncryptedField>;
}

/// Encrypts and decrypts single password fields with the device key.
#[derive(Clone)]
pub struct CipherCodec {
    keys: KeyStore,
}

impl CipherCodec {
    pub fn new(keys: KeyStore) -> Self {
        Self { keys }
    }

    pub fn key_store(&self) -> &KeyStore {
        &self.keys
    }

    /// Seal `plaintext` under a fresh random nonce.
    pub async fn encrypt(&self, plaintext: &str) -> Result<EncryptedField> {
        let key = self
            .keys
            .get_or_create_key()
            .await
            .map_err(|e| VaultError::Encryption(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| VaultError::Encryption("AES-GCM encryption failed".into()))?;

        Ok(EncryptedField {
            ciphertext: STANDARD.encode(ciphertext),
            iv: STANDARD.encode(nonce_bytes),
        })
    }

    /// Open an [`EncryptedField`]. Either the whole plaintext or an error.
    pub async fn decrypt(&self, field: &EncryptedField) -> Result<String> {
        let ciphertext = STANDARD
            .decode(&field.ciphertext)
            .map_err(|e| VaultError::Decryption(format!("ciphertext is not base64: {}", e)))?;
        let nonce_bytes = STANDARD
            .decode(&field.iv)
            .map_err(|e| VaultError::Decryption(format!("iv is not base64: {}", e)))?;
        if nonce_bytes.len() != NONCE_LEN {
            return Err(VaultError::Decryption(format!(
                "iv must be {} bytes, found {}",
                NONCE_LEN,
                nonce_bytes.len()
            )));
        }

        let key = self
            .keys
            .get_or_create_key()
            .await
            .map_err(|e| VaultError::Decryption(e.to_string()))?;
        let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
            .map_err(|e| VaultError::Decryption(e.to_string()))?;

        let plaintext = Zeroizing::new(
            cipher
                .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
                .map_err(|_| {
                    VaultError::Decryption("authentication failed: wrong key or corrupted data".into())
                })?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| VaultError::Decryption("plaintext is not valid UTF-8".into()))
    }
}

#[async_trait]
impl PasswordSealer for CipherCodec {
    async fn seal(&self, plaintext: &str) -> Result<EncryptedField> {
        self.encrypt(plaintext).await
    }
}
