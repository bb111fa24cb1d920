//! Key-value persistence substrate.
//!
//! The vault never talks to a concrete store directly. Everything goes
//! through [`StorageArea`], which mirrors the browser storage API:
//! whole JSON values addressed by a string key, no transactions, last
//! write wins. Two namespaces are used:
//!
//!   synced  account records and theme, replicated across devices, quota-limited
//!   local   the device key and the auto-fill side channel, never leaves the device

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;

use crate::error::StorageError;

pub mod file;
pub mod memory;

pub use file::FileStorage;
pub use memory::MemoryStorage;

/// Storage key for the account collection (synced).
pub const ACCOUNTS_KEY: &str = "aws_accounts";
/// Storage key for the theme preference (synced).
pub const THEME_KEY: &str = "aws_theme";
/// Storage key for the exported device key (local).
pub const CRYPTO_KEY: &str = "aws_crypto_key";
/// Storage key for the auto-fill side channel (local).
pub const PENDING_CREDENTIALS_KEY: &str = "pendingCredentials";

/// A single key-value storage namespace.
#[async_trait]
pub trait StorageArea: Send + Sync {
    /// Fetch a value, `None` if the key was never written or was removed.
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    /// Replace the value stored under `key`.
    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// The two logical namespaces the vault uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageNamespace {
    Synced,
    Local,
}

impl StorageNamespace {
    /// Quota imposed by the backing browser area. Local storage is unlimited.
    pub fn quota(self) -> Option<Quota> {
        match self {
            StorageNamespace::Synced => Some(Quota::SYNC),
            StorageNamespace::Local => None,
        }
    }

    /// File name used by [`FileStorage`] for this namespace.
    pub fn file_name(self) -> &'static str {
        match self {
            StorageNamespace::Synced => "sync.json",
            StorageNamespace::Local => "local.json",
        }
    }
}

/// Byte limits of a quota-limited area.
///
/// An item's size is the length of its key plus its serialized JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    pub per_item_bytes: usize,
    pub total_bytes: usize,
}

impl Quota {
    /// Limits of the browser's synced storage area.
    pub const SYNC: Quota = Quota {
        per_item_bytes: 8_192,
        total_bytes: 102_400,
    };

    /// Check that writing `value` under `key` keeps `items` within limits.
    pub(crate) fn check(
        &self,
        items: &HashMap<String, Value>,
        key: &str,
        value: &Value,
    ) -> Result<(), StorageError> {
        let bytes = item_size(key, value)?;
        if bytes > self.per_item_bytes {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                bytes,
                limit: self.per_item_bytes,
            });
        }

        let mut total = bytes;
        for (k, v) in items.iter().filter(|(k, _)| k.as_str() != key) {
            total += item_size(k, v)?;
        }
        if total > self.total_bytes {
            return Err(StorageError::QuotaExceeded {
                key: key.to_string(),
                bytes: total,
                limit: self.total_bytes,
            });
        }
        Ok(())
    }
}

fn item_size(key: &str, value: &Value) -> Result<usize, StorageError> {
    Ok(key.len() + serde_json::to_vec(value)?.len())
}

/// Read and deserialize a typed value.
pub async fn get_json<T: DeserializeOwned>(
    area: &dyn StorageArea,
    key: &str,
) -> Result<Option<T>, StorageError> {
    match area.get(key).await? {
        Some(value) => Ok(Some(serde_json::from_value(value)?)),
        None => Ok(None),
    }
}

/// Serialize and store a typed value.
pub async fn set_json<T: Serialize>(
    area: &dyn StorageArea,
    key: &str,
    value: &T,
) -> Result<(), StorageError> {
    area.set(key, serde_json::to_value(value)?).await
}
