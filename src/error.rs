//! Error types for the vault and its storage substrate.

use thiserror::Error;

/// Failures raised by a [`StorageArea`](crate::storage::StorageArea).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored value is not valid JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("quota exceeded for '{key}': {bytes} bytes (limit {limit})")]
    QuotaExceeded {
        key: String,
        bytes: usize,
        limit: usize,
    },

    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// Failures surfaced by the key store, cipher codec and account store.
#[derive(Debug, Error)]
pub enum VaultError {
    /// Key generation, import or persistence failed. Blocks all crypto until resolved.
    #[error("failed to initialize encryption key: {0}")]
    KeyInitialization(String),

    /// A single plaintext could not be sealed. Save/update callers must treat this
    /// as a failed write.
    #[error("failed to encrypt password: {0}")]
    Encryption(String),

    /// Tampered, corrupt or foreign ciphertext, or malformed base64/nonce.
    #[error("failed to decrypt password: {0}")]
    Decryption(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

pub type Result<T, E = VaultError> = std::result::Result<T, E>;
