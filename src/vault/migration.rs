//! One-shot upgrade of legacy plaintext passwords to sealed fields.
//!
//! Runs at startup before anything reads accounts. Per record:
//!
//!   Absent      → untouched
//!   Encrypted   → untouched (already migrated)
//!   Plaintext   → sealed in place; an empty string is left alone
//!   Unreadable  → untouched, logged
//!
//! The collection is written back only if something changed, so a
//! second run over a migrated collection does no I/O beyond the read.
//! A record whose seal fails stays plaintext and is retried on the
//! next startup; it never aborts the batch.

use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use super::PasswordSealer;
use crate::accounts::{AccountRecord, AccountsDocument, PasswordField};
use crate::error::Result;
use crate::storage::{self, StorageArea, ACCOUNTS_KEY};

/// Outcome of a migration pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub scanned: usize,
    pub migrated: usize,
    pub already_encrypted: usize,
    pub without_password: usize,
    /// Records whose password slot has an unrecognised shape.
    pub unreadable: Vec<String>,
    /// Ids of records left in plaintext because sealing failed.
    pub failed: Vec<String>,
    /// Whether the collection was written back.
    pub persisted: bool,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        self.migrated > 0
    }
}

pub struct MigrationRunner {
    synced: Arc<dyn StorageArea>,
    sealer: Arc<dyn PasswordSealer>,
}

impl MigrationRunner {
    pub fn new(synced: Arc<dyn StorageArea>, sealer: Arc<dyn PasswordSealer>) -> Self {
        Self { synced, sealer }
    }

    /// Load the stored collection, migrate it, and persist it if anything changed.
    pub async fn run(&self) -> Result<MigrationReport> {
        let mut doc: AccountsDocument = storage::get_json(self.synced.as_ref(), ACCOUNTS_KEY)
            .await?
            .unwrap_or_default();

        let mut report = self.migrate_all(&mut doc.accounts).await;

        if report.changed() {
            storage::set_json(self.synced.as_ref(), ACCOUNTS_KEY, &doc).await?;
            report.persisted = true;
        }

        info!(
            scanned = report.scanned,
            migrated = report.migrated,
            already_encrypted = report.already_encrypted,
            failed = report.failed.len(),
            unreadable = report.unreadable.len(),
            persisted = report.persisted,
            "Password migration complete"
        );
        Ok(report)
    }

    /// Migrate `records` in memory. Never fails as a whole.
    pub async fn migrate_all(&self, records: &mut [AccountRecord]) -> MigrationReport {
        let mut report = MigrationReport {
            scanned: records.len(),
            ..MigrationReport::default()
        };

        for record in records.iter_mut() {
            let plaintext = match &record.password {
                PasswordField::Absent => {
                    report.without_password += 1;
                    continue;
                }
                PasswordField::Plaintext(p) if p.is_empty() => {
                    report.without_password += 1;
                    continue;
                }
                PasswordField::Encrypted(_) => {
                    report.already_encrypted += 1;
                    continue;
                }
                PasswordField::Unreadable(_) => {
                    warn!(record = %record.id, "Skipping password with an unrecognised shape");
                    report.unreadable.push(record.id.clone());
                    continue;
                }
                PasswordField::Plaintext(p) => p,
            };

            match self.sealer.seal(plaintext).await {
                Ok(sealed) => {
                    record.password = PasswordField::Encrypted(sealed);
                    report.migrated += 1;
                }
                Err(e) => {
                    warn!(record = %record.id, "Leaving password unmigrated: {}", e);
                    report.failed.push(record.id.clone());
                }
            }
        }

        report
    }
}
