//! Device key lifecycle: fetch-or-generate, persist, reconstruct.
//!
//! The key is a random 256-bit AES-GCM key, created lazily the first
//! time anything needs to encrypt or decrypt, exported as a JWK and
//! stored in the local (non-synced) namespace. It is never rotated
//! or deleted here.
//!
//! Creation is single-flight per `KeyStore` handle: concurrent first
//! calls wait on the same mutex and observe the key the winner wrote.
//! Two processes sharing one substrate can still race.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use zeroize::{Zeroize, Zeroizing};

use crate::error::{Result, VaultError};
use crate::storage::{StorageArea, CRYPTO_KEY};

pub const KEY_LEN: usize = 32;
const JWK_ALG: &str = "A256GCM";

/// A 256-bit AES-GCM key bound to this device.
#[derive(Clone)]
pub struct DeviceKey {
    bytes: Zeroizing<[u8; KEY_LEN]>,
}

impl DeviceKey {
    /// Generate a fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = Zeroizing::new([0u8; KEY_LEN]);
        OsRng.fill_bytes(&mut bytes[..]);
        Self { bytes }
    }

    pub fn from_bytes(raw: [u8; KEY_LEN]) -> Self {
        let mut raw = raw;
        let key = Self {
            bytes: Zeroizing::new(raw),
        };
        raw.zeroize();
        key
    }

    pub(crate) fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }

    /// Short non-secret identifier for logs.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.bytes[..]);
        hex::encode(&digest[..8])
    }

    /// Export in the interoperable JSON Web Key encoding.
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "oct".into(),
            k: URL_SAFE_NO_PAD.encode(&self.bytes[..]),
            alg: Some(JWK_ALG.into()),
            ext: Some(true),
            key_ops: Some(vec!["encrypt".into(), "decrypt".into()]),
        }
    }

    /// Import a JWK previously produced by [`DeviceKey::to_jwk`] (or WebCrypto's `exportKey`).
    pub fn from_jwk(jwk: &Jwk) -> Result<Self> {
        if jwk.kty != "oct" {
            return Err(VaultError::KeyInitialization(format!(
                "unsupported key type '{}'",
                jwk.kty
            )));
        }
        if let Some(alg) = &jwk.alg {
            if alg != JWK_ALG {
                return Err(VaultError::KeyInitialization(format!(
                    "unsupported key algorithm '{}'",
                    alg
                )));
            }
        }

        let raw = Zeroizing::new(
            URL_SAFE_NO_PAD
                .decode(jwk.k.trim_end_matches('='))
                .map_err(|e| VaultError::KeyInitialization(format!("key material: {}", e)))?,
        );
        let bytes: [u8; KEY_LEN] = raw.as_slice().try_into().map_err(|_| {
            VaultError::KeyInitialization(format!(
                "expected {} key bytes, found {}",
                KEY_LEN,
                raw.len()
            ))
        })?;
        Ok(Self::from_bytes(bytes))
    }
}

impl fmt::Debug for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceKey")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// JSON Web Key for a symmetric key (RFC 7517 / 7518).
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Jwk {
    pub kty: String,
    pub k: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ext: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_ops: Option<Vec<String>>,
}

impl Drop for Jwk {
    fn drop(&mut self) {
        self.k.zeroize();
    }
}

/// Owner of the device key. Cheap to clone; clones share the cache and the creation lock.
#[derive(Clone)]
pub struct KeyStore {
    local: Arc<dyn StorageArea>,
    cached: Arc<Mutex<Option<DeviceKey>>>,
}

impl KeyStore {
    /// `local` must be the device-local namespace; the key must never reach synced storage.
    pub fn new(local: Arc<dyn StorageArea>) -> Self {
        Self {
            local,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// Return the device key, creating and persisting it on first use.
    pub async fn get_or_create_key(&self) -> Result<DeviceKey> {
        let mut cached = self.cached.lock().await;
        if let Some(key) = cached.as_ref() {
            return Ok(key.clone());
        }

        let stored = self
            .local
            .get(CRYPTO_KEY)
            .await
            .map_err(|e| VaultError::KeyInitialization(format!("reading stored key: {}", e)))?;

        let key = match stored {
            Some(value) => {
                let jwk: Jwk = serde_json::from_value(value).map_err(|e| {
                    VaultError::KeyInitialization(format!("stored key is not a JWK: {}", e))
                })?;
                let key = DeviceKey::from_jwk(&jwk)?;
                info!(fingerprint = %key.fingerprint(), "Device key loaded");
                key
            }
            None => {
                let key = DeviceKey::generate();
                let jwk = serde_json::to_value(key.to_jwk()).map_err(|e| {
                    VaultError::KeyInitialization(format!("exporting key: {}", e))
                })?;
                self.local.set(CRYPTO_KEY, jwk).await.map_err(|e| {
                    VaultError::KeyInitialization(format!("persisting key: {}", e))
                })?;
                info!(fingerprint = %key.fingerprint(), "🔐 New device key generated and stored");
                key
            }
        };

        *cached = Some(key.clone());
        Ok(key)
    }
}
