//! Account CRUD over the synced namespace.
//!
//! The whole collection lives in one value (`aws_accounts`), so every
//! write is read → modify in memory → write back. There is no version
//! check: two contexts writing concurrently lose one update.
//!
//! Write paths always work on the raw collection as stored. Only the
//! read path decrypts, and a record that fails to decrypt is returned
//! still sealed instead of failing the list. A password slot with an
//! unrecognised shape is carried through reads and writes untouched.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    normalize_alias, normalize_optional, normalize_signin_url, now_millis, validate_account_id,
    AccountDraft, AccountRecord, AccountUpdate, AccountsDocument, PasswordField,
};
use crate::error::Result;
use crate::storage::{self, StorageArea, ACCOUNTS_KEY};
use crate::vault::CipherCodec;

#[derive(Clone)]
pub struct AccountStore {
    synced: Arc<dyn StorageArea>,
    codec: CipherCodec,
}

impl AccountStore {
    pub fn new(synced: Arc<dyn StorageArea>, codec: CipherCodec) -> Self {
        Self { synced, codec }
    }

    pub fn codec(&self) -> &CipherCodec {
        &self.codec
    }

    async fn load(&self) -> Result<AccountsDocument> {
        Ok(storage::get_json(self.synced.as_ref(), ACCOUNTS_KEY)
            .await?
            .unwrap_or_default())
    }

    async fn persist(&self, doc: &AccountsDocument) -> Result<()> {
        storage::set_json(self.synced.as_ref(), ACCOUNTS_KEY, doc).await?;
        Ok(())
    }

    /// Seal a plaintext slot; other shapes pass through.
    async fn seal(&self, password: PasswordField) -> Result<PasswordField> {
        match password {
            PasswordField::Plaintext(p) if p.is_empty() => Ok(PasswordField::Absent),
            PasswordField::Plaintext(p) => Ok(PasswordField::Encrypted(self.codec.encrypt(&p).await?)),
            other => Ok(other),
        }
    }

    /// Decrypt a record's password for display. Failure leaves it sealed.
    async fn reveal(&self, mut record: AccountRecord) -> AccountRecord {
        let decrypted = match &record.password {
            PasswordField::Encrypted(field) => self.codec.decrypt(field).await,
            PasswordField::Unreadable(_) => {
                warn!(record = %record.id, "Stored password has an unrecognised shape, leaving it as is");
                return record;
            }
            _ => return record,
        };
        match decrypted {
            Ok(plaintext) => record.password = PasswordField::Plaintext(plaintext),
            Err(e) => {
                warn!(record = %record.id, "Could not decrypt password, leaving it sealed: {}", e);
            }
        }
        record
    }

    /// All accounts, with passwords decrypted where possible.
    pub async fn list_accounts(&self) -> Result<Vec<AccountRecord>> {
        let doc = self.load().await?;
        let mut out = Vec::with_capacity(doc.accounts.len());
        for record in doc.accounts {
            out.push(self.reveal(record).await);
        }
        Ok(out)
    }

    pub async fn get_account(&self, id: &str) -> Result<Option<AccountRecord>> {
        let doc = self.load().await?;
        match doc.accounts.into_iter().find(|a| a.id == id) {
            Some(record) => Ok(Some(self.reveal(record).await)),
            None => Ok(None),
        }
    }

    /// Validate, seal and append a new account.
    ///
    /// If sealing fails nothing is written.
    pub async fn save_account(&self, draft: AccountDraft) -> Result<AccountRecord> {
        validate_account_id(&draft.account_id)?;
        let alias = normalize_alias(&draft.alias)?;
        let signin_url = normalize_signin_url(draft.signin_url)?;
        let password = self.seal(PasswordField::from_input(draft.password)).await?;

        let now = now_millis();
        let record = AccountRecord {
            id: Uuid::new_v4().to_string(),
            account_id: draft.account_id,
            alias,
            username: normalize_optional(draft.username),
            password,
            signin_url,
            created_at: now,
            updated_at: now,
        };

        let mut doc = self.load().await?;
        doc.accounts.push(record.clone());
        self.persist(&doc).await?;

        info!(record = %record.id, account_id = %record.account_id, "Account saved");
        Ok(record)
    }

    /// Apply `update` to the account with `id`. `None` if no such account.
    pub async fn update_account(
        &self,
        id: &str,
        update: AccountUpdate,
    ) -> Result<Option<AccountRecord>> {
        let mut doc = self.load().await?;
        let Some(index) = doc.accounts.iter().position(|a| a.id == id) else {
            return Ok(None);
        };

        let mut record = doc.accounts[index].clone();
        if let Some(account_id) = update.account_id {
            validate_account_id(&account_id)?;
            record.account_id = account_id;
        }
        if let Some(alias) = update.alias {
            record.alias = normalize_alias(&alias)?;
        }
        if let Some(username) = update.username {
            record.username = normalize_optional(username);
        }
        if let Some(signin_url) = update.signin_url {
            record.signin_url = normalize_signin_url(signin_url)?;
        }
        if let Some(password) = update.password {
            record.password = PasswordField::from_input(password);
        }
        // Also upgrades a legacy plaintext password the migration could not seal.
        record.password = self.seal(record.password).await?;
        record.updated_at = now_millis().max(record.created_at);

        doc.accounts[index] = record.clone();
        self.persist(&doc).await?;

        info!(record = %record.id, "Account updated");
        Ok(Some(record))
    }

    /// Remove the account with `id`. `false` (and no write) if it does not exist.
    pub async fn delete_account(&self, id: &str) -> Result<bool> {
        let mut doc = self.load().await?;
        let before = doc.accounts.len();
        doc.accounts.retain(|a| a.id != id);
        if doc.accounts.len() == before {
            return Ok(false);
        }

        self.persist(&doc).await?;
        info!(record = %id, "Account deleted");
        Ok(true)
    }

    /// Whether an account with this AWS account ID is already saved.
    pub async fn account_id_exists(&self, account_id: &str) -> Result<bool> {
        let doc = self.load().await?;
        Ok(doc.accounts.iter().any(|a| a.account_id == account_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::VaultError;
    use crate::storage::MemoryStorage;
    use crate::vault::keystore::KeyStore;
    use crate::vault::EncryptedField;

    struct Fixture {
        synced: Arc<MemoryStorage>,
        local: Arc<MemoryStorage>,
        store: AccountStore,
    }

    fn fixture() -> Fixture {
        let synced = Arc::new(MemoryStorage::new());
        let local = Arc::new(MemoryStorage::new());
        let codec = CipherCodec::new(KeyStore::new(local.clone()));
        let store = AccountStore::new(synced.clone(), codec);
        Fixture { synced, local, store }
    }

    fn draft(account_id: &str, alias: &str, password: Option<&str>) -> AccountDraft {
        AccountDraft {
            account_id: account_id.into(),
            alias: alias.into(),
            username: Some("ops".into()),
            password: password.map(Into::into),
            signin_url: None,
        }
    }

    async fn raw(synced: &MemoryStorage) -> AccountsDocument {
        storage::get_json(synced, ACCOUNTS_KEY).await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_save_seals_and_list_reveals() {
        let fx = fixture();
        let saved = fx
            .store
            .save_account(draft("123456789012", "Prod", Some("s3cr3t")))
            .await
            .unwrap();
        assert!(saved.password.is_encrypted());
        assert_eq!(saved.created_at, saved.updated_at);

        let doc = raw(&fx.synced).await;
        match &doc.accounts[0].password {
            PasswordField::Encrypted(f) => assert_ne!(f.ciphertext, "s3cr3t"),
            other => panic!("stored password not sealed: {:?}", other),
        }

        let listed = fx.store.list_accounts().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].password.plaintext(), Some("s3cr3t"));
        assert_eq!(listed[0].alias, "Prod");
    }

    #[tokio::test]
    async fn test_save_rejects_invalid_input_without_writing() {
        let fx = fixture();
        assert!(matches!(
            fx.store.save_account(draft("1234", "Prod", None)).await,
            Err(VaultError::InvalidInput(_))
        ));
        assert!(matches!(
            fx.store.save_account(draft("123456789012", "  ", None)).await,
            Err(VaultError::InvalidInput(_))
        ));
        assert_eq!(fx.synced.writes(), 0);
    }

    #[tokio::test]
    async fn test_encryption_failure_aborts_save() {
        let fx = fixture();
        fx.local.set_fail_writes(true);
        let result = fx
            .store
            .save_account(draft("123456789012", "Prod", Some("pw")))
            .await;
        assert!(matches!(result, Err(VaultError::Encryption(_))));
        assert_eq!(fx.synced.writes(), 0);
    }

    #[tokio::test]
    async fn test_save_without_password() {
        let fx = fixture();
        let saved = fx
            .store
            .save_account(draft("123456789012", "Dev", Some("")))
            .await
            .unwrap();
        assert!(saved.password.is_absent());
        // No key needed when nothing is sealed.
        assert_eq!(fx.local.writes(), 0);
    }

    #[tokio::test]
    async fn test_undecryptable_record_does_not_block_list() {
        let fx = fixture();
        fx.store
            .save_account(draft("111111111111", "Good", Some("fine")))
            .await
            .unwrap();

        let mut doc = raw(&fx.synced).await;
        let mut broken = doc.accounts[0].clone();
        broken.id = "broken".into();
        broken.password = PasswordField::Encrypted(EncryptedField {
            ciphertext: "AAAAAAAAAAAAAAAAAAAAAAAA".into(),
            iv: "AAAAAAAAAAAAAAAA".into(),
        });
        doc.accounts.push(broken);
        storage::set_json(fx.synced.as_ref(), ACCOUNTS_KEY, &doc).await.unwrap();

        let listed = fx.store.list_accounts().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].password.plaintext(), Some("fine"));
        assert!(listed[1].password.is_encrypted());
    }

    #[tokio::test]
    async fn test_damaged_password_shape_does_not_block_list() {
        let fx = fixture();
        let good = fx
            .store
            .save_account(draft("111111111111", "Good", Some("fine")))
            .await
            .unwrap();

        let mut stored = fx.synced.get(ACCOUNTS_KEY).await.unwrap().unwrap();
        let damaged = serde_json::json!({
            "id": "bad",
            "accountId": "222222222222",
            "alias": "Damaged",
            "password": {"ciphertext": "AAAA"},
            "createdAt": 1,
            "updatedAt": 1
        });
        stored["accounts"].as_array_mut().unwrap().push(damaged);
        fx.synced.set(ACCOUNTS_KEY, stored).await.unwrap();

        let listed = fx.store.list_accounts().await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].password.plaintext(), Some("fine"));
        assert!(listed[1].password.is_unreadable());
        assert!(fx.store.get_account("bad").await.unwrap().is_some());

        // Writes to other records keep the damaged slot byte-for-byte.
        fx.store
            .update_account(
                &good.id,
                AccountUpdate {
                    alias: Some("Still good".into()),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap();
        let stored = fx.synced.get(ACCOUNTS_KEY).await.unwrap().unwrap();
        assert_eq!(stored["accounts"][1]["password"], serde_json::json!({"ciphertext": "AAAA"}));
        assert!(fx.store.account_id_exists("222222222222").await.unwrap());
    }

    #[tokio::test]
    async fn test_update_merges_and_reseals() {
        let fx = fixture();
        let saved = fx
            .store
            .save_account(draft("123456789012", "Prod", Some("old")))
            .await
            .unwrap();

        let updated = fx
            .store
            .update_account(
                &saved.id,
                AccountUpdate {
                    alias: Some(" Production ".into()),
                    password: Some(Some("new".into())),
                    username: Some(None),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.alias, "Production");
        assert_eq!(updated.username, None);
        assert!(updated.password.is_encrypted());
        assert!(updated.updated_at >= saved.updated_at);
        assert_eq!(updated.created_at, saved.created_at);

        let fetched = fx.store.get_account(&saved.id).await.unwrap().unwrap();
        assert_eq!(fetched.password.plaintext(), Some("new"));
        assert_eq!(fetched.account_id, "123456789012");
    }

    #[tokio::test]
    async fn test_update_keeps_password_when_untouched() {
        let fx = fixture();
        let saved = fx
            .store
            .save_account(draft("123456789012", "Prod", Some("keep-me")))
            .await
            .unwrap();
        fx.store
            .update_account(
                &saved.id,
                AccountUpdate {
                    alias: Some("Renamed".into()),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap();

        let stored = &raw(&fx.synced).await.accounts[0];
        assert_eq!(stored.password, saved.password);
    }

    #[tokio::test]
    async fn test_update_seals_legacy_plaintext() {
        let fx = fixture();
        let legacy = AccountRecord {
            id: "legacy".into(),
            account_id: "123456789012".into(),
            alias: "Old".into(),
            username: None,
            password: PasswordField::Plaintext("legacy-pw".into()),
            signin_url: None,
            created_at: 1,
            updated_at: 1,
        };
        let doc = AccountsDocument {
            accounts: vec![legacy],
        };
        storage::set_json(fx.synced.as_ref(), ACCOUNTS_KEY, &doc).await.unwrap();

        fx.store
            .update_account(
                "legacy",
                AccountUpdate {
                    alias: Some("Old but sealed".into()),
                    ..AccountUpdate::default()
                },
            )
            .await
            .unwrap();
        assert!(raw(&fx.synced).await.accounts[0].password.is_encrypted());
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let fx = fixture();
        let result = fx
            .store
            .update_account("missing", AccountUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
        assert_eq!(fx.synced.writes(), 0);
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let fx = fixture();
        let saved = fx
            .store
            .save_account(draft("123456789012", "Prod", None))
            .await
            .unwrap();
        assert!(fx.store.account_id_exists("123456789012").await.unwrap());
        assert!(!fx.store.account_id_exists("000000000000").await.unwrap());

        let writes = fx.synced.writes();
        assert!(!fx.store.delete_account("missing").await.unwrap());
        assert_eq!(fx.synced.writes(), writes);

        assert!(fx.store.delete_account(&saved.id).await.unwrap());
        assert!(fx.store.list_accounts().await.unwrap().is_empty());
        assert!(!fx.store.account_id_exists("123456789012").await.unwrap());
    }
}
