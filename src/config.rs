//! Runtime configuration.
//!
//! Resolution order, last wins:
//!   1. defaults (`~/.aws-signin-vault`, human-readable logs)
//!   2. `<data_dir>/config.yaml`, if present
//!   3. `SIGNIN_VAULT_*` environment variables

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::storage::StorageNamespace;

pub const CONFIG_FILE: &str = "config.yaml";
const DEFAULT_LOG_FILTER: &str = "aws_signin_vault=info,signin_vault=info";

/// Optional overrides read from `config.yaml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    log_json: Option<bool>,
    log_filter: Option<String>,
    migrate_on_startup: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Emit JSON log lines instead of the human format.
    pub log_json: bool,
    /// Used when `RUST_LOG` is unset.
    pub log_filter: String,
    pub migrate_on_startup: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::resolve(|name| std::env::var(name).ok(), dirs::home_dir())
    }

    /// Resolve from an explicit variable lookup and home directory.
    pub fn resolve(
        lookup: impl Fn(&str) -> Option<String>,
        home: Option<PathBuf>,
    ) -> Result<Self> {
        let data_dir = match lookup("SIGNIN_VAULT_DATA_DIR") {
            Some(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => home
                .context("Cannot determine home directory; set SIGNIN_VAULT_DATA_DIR")?
                .join(".aws-signin-vault"),
        };

        let mut config = Self {
            data_dir,
            log_json: false,
            log_filter: DEFAULT_LOG_FILTER.into(),
            migrate_on_startup: true,
        };

        let file = load_file_config(&config.data_dir.join(CONFIG_FILE))?;
        if let Some(json) = file.log_json {
            config.log_json = json;
        }
        if let Some(filter) = file.log_filter {
            config.log_filter = filter;
        }
        if let Some(migrate) = file.migrate_on_startup {
            config.migrate_on_startup = migrate;
        }

        if let Some(raw) = lookup("SIGNIN_VAULT_LOG_JSON") {
            config.log_json = parse_bool(&raw)
                .with_context(|| format!("SIGNIN_VAULT_LOG_JSON: invalid value '{}'", raw))?;
        }

        Ok(config)
    }

    /// Path of the document backing `namespace`.
    pub fn storage_path(&self, namespace: StorageNamespace) -> PathBuf {
        self.data_dir.join(namespace.file_name())
    }
}

fn load_file_config(path: &Path) -> Result<FileConfig> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(FileConfig::default()),
        Err(e) => return Err(e).with_context(|| format!("Failed to read {}", path.display())),
    };
    if raw.trim().is_empty() {
        return Ok(FileConfig::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
