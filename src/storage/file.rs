//! File-backed storage area: one JSON document per namespace.
//!
//! Every write rewrites the whole document:
//!   1. write to <file>.tmp (0600 on unix)
//!   2. fsync
//!   3. rename over <file> (atomic on POSIX)
//!
//! A crash mid-write leaves the previous document intact.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use super::{Quota, StorageArea, StorageNamespace};
use crate::error::StorageError;

pub struct FileStorage {
    path: PathBuf,
    quota: Option<Quota>,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>, quota: Option<Quota>) -> Self {
        Self {
            path: path.into(),
            quota,
            write_lock: Mutex::new(()),
        }
    }

    /// Open the document for `namespace` inside `dir`.
    pub fn for_namespace(dir: &Path, namespace: StorageNamespace) -> Self {
        Self::new(dir.join(namespace.file_name()), namespace.quota())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, Value>, StorageError> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(HashMap::new());
        }
        let doc: Map<String, Value> = serde_json::from_slice(&raw)?;
        Ok(doc.into_iter().collect())
    }

    async fn persist(&self, items: HashMap<String, Value>) -> Result<(), StorageError> {
        let doc: Map<String, Value> = items.into_iter().collect();
        let bytes = serde_json::to_vec_pretty(&Value::Object(doc))?;
        atomic_write(&self.path, &bytes).await
    }
}

#[async_trait]
impl StorageArea for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let mut items = self.load().await?;
        Ok(items.remove(key))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        if let Some(quota) = &self.quota {
            quota.check(&items, key, &value)?;
        }
        items.insert(key.to_string(), value);
        self.persist(items).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        let _guard = self.write_lock.lock().await;
        let mut items = self.load().await?;
        if items.remove(key).is_none() {
            return Ok(());
        }
        self.persist(items).await
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let tmp_path = path.with_extension("json.tmp");
    {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&tmp_path).await?;
        file.write_all(bytes).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
    }

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}
