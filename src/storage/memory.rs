//! In-memory storage area.
//!
//! Used as the substitute substrate in tests and for ephemeral runs.
//! Counts successful writes so callers can assert that an operation
//! did (or did not) touch storage.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{Quota, StorageArea, StorageNamespace};
use crate::error::StorageError;

#[derive(Default)]
pub struct MemoryStorage {
    items: RwLock<HashMap<String, Value>>,
    quota: Option<Quota>,
    writes: AtomicUsize,
    fail_writes: AtomicBool,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// An area with the quota of the given namespace.
    pub fn for_namespace(namespace: StorageNamespace) -> Self {
        Self {
            quota: namespace.quota(),
            ..Self::default()
        }
    }

    pub fn with_quota(quota: Quota) -> Self {
        Self {
            quota: Some(quota),
            ..Self::default()
        }
    }

    /// Number of successful `set`/`remove` calls so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every subsequent write fail with `StorageError::Unavailable`.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("writes disabled".into()));
        }
        Ok(())
    }
}

fn poisoned() -> StorageError {
    StorageError::Unavailable("memory storage lock poisoned".into())
}

#[async_trait]
impl StorageArea for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        Ok(items.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        if let Some(quota) = &self.quota {
            quota.check(&items, key, &value)?;
        }
        items.insert(key.to_string(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.remove(key);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
