//! Wiring for one execution context (popup, background, filler).
//!
//! Every context builds its own handles over the same two storage
//! areas. The key store is shared by all handles built here.

use std::sync::Arc;

use crate::accounts::AccountStore;
use crate::autofill::AutofillChannel;
use crate::error::Result;
use crate::preferences::{self, Theme};
use crate::storage::StorageArea;
use crate::vault::keystore::KeyStore;
use crate::vault::migration::{MigrationReport, MigrationRunner};
use crate::vault::CipherCodec;

pub struct VaultContext {
    synced: Arc<dyn StorageArea>,
    codec: CipherCodec,
    accounts: AccountStore,
    autofill: AutofillChannel,
}

impl VaultContext {
    pub fn new(synced: Arc<dyn StorageArea>, local: Arc<dyn StorageArea>) -> Self {
        let codec = CipherCodec::new(KeyStore::new(Arc::clone(&local)));
        Self {
            accounts: AccountStore::new(Arc::clone(&synced), codec.clone()),
            autofill: AutofillChannel::new(local, codec.clone()),
            synced,
            codec,
        }
    }

    /// Startup step: upgrade legacy passwords before anything reads accounts.
    pub async fn migrate(&self) -> Result<MigrationReport> {
        MigrationRunner::new(Arc::clone(&self.synced), Arc::new(self.codec.clone()))
            .run()
            .await
    }

    pub fn accounts(&self) -> &AccountStore {
        &self.accounts
    }

    pub fn autofill(&self) -> &AutofillChannel {
        &self.autofill
    }

    pub fn codec(&self) -> &CipherCodec {
        &self.codec
    }

    pub async fn theme(&self) -> Result<Theme> {
        preferences::get_theme(self.synced.as_ref()).await
    }

    pub async fn set_theme(&self, theme: Theme) -> Result<()> {
        preferences::set_theme(self.synced.as_ref(), theme).await
    }
}
