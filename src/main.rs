//! Startup runner for the AWS signin vault.
//!
//! Does what the extension's background context does on launch:
//! opens both storage areas, upgrades any legacy plaintext passwords,
//! and reports the state of the vault. Safe to run repeatedly.
//!
//! Security:
//! - Passwords encrypted at rest (AES-256-GCM, per-field random nonce)
//! - Device key kept in the local area only, never in synced storage
//! - Storage documents written atomically with 0600 permissions

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use aws_signin_vault::{Config, FileStorage, StorageNamespace, VaultContext};

fn init_logging(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| config.log_filter.as_str().into());

    if config.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load configuration")?;
    init_logging(&config);

    info!("🔑 AWS Signin Vault v{}", env!("CARGO_PKG_VERSION"));

    std::fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("Failed to create {}", config.data_dir.display()))?;

    let synced = Arc::new(FileStorage::new(
        config.storage_path(StorageNamespace::Synced),
        StorageNamespace::Synced.quota(),
    ));
    let local = Arc::new(FileStorage::new(
        config.storage_path(StorageNamespace::Local),
        StorageNamespace::Local.quota(),
    ));
    let vault = VaultContext::new(synced, local);

    // ── Migration ───────────────────────────────────────────────────
    // Must finish (including its write) before anything lists accounts.
    if config.migrate_on_startup {
        let report = vault
            .migrate()
            .await
            .context("Password migration could not be persisted")?;
        if !report.failed.is_empty() {
            warn!(
                failed = report.failed.len(),
                "Some passwords are still plaintext, will retry on next startup"
            );
        }
    } else {
        info!("Migration disabled by configuration");
    }

    // ── Status ──────────────────────────────────────────────────────
    let accounts = vault
        .accounts()
        .list_accounts()
        .await
        .context("Failed to read accounts")?;
    let unreadable = accounts
        .iter()
        .filter(|a| a.password.is_encrypted() || a.password.is_unreadable())
        .count();
    let theme = vault.theme().await.context("Failed to read theme")?;

    if accounts.is_empty() {
        info!("📦 Vault is empty");
    } else {
        info!(
            accounts = accounts.len(),
            unreadable_passwords = unreadable,
            "📦 Vault contains {} account(s)",
            accounts.len()
        );
    }

    info!(
        data_dir = %config.data_dir.display(),
        theme = %theme,
        "Vault ready"
    );
    Ok(())
}
