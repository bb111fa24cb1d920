//! Hand-off of a decrypted credential bundle to the signin page filler.
//!
//! The popup stages the bundle in local storage right before opening
//! the signin URL; the filler takes it once. Bundles older than
//! 30 seconds are dropped unread.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;
use zeroize::Zeroize;

use crate::accounts::{now_millis, AccountRecord, PasswordField};
use crate::error::{Result, VaultError};
use crate::storage::{StorageArea, PENDING_CREDENTIALS_KEY};
use crate::vault::CipherCodec;

pub const DEFAULT_SIGNIN_URL: &str = "https://signin.aws.amazon.com/console";

/// How long a staged bundle stays usable.
pub const PENDING_TTL_MS: i64 = 30_000;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCredentials {
    pub account_id: String,
    pub username: String,
    /// plaintext
    pub password: String,
    /// epoch milliseconds
    pub timestamp: i64,
}

impl PendingCredentials {
    /// Saturates, so a corrupt timestamp far in the past reads as very old.
    pub fn age_at(&self, now_ms: i64) -> i64 {
        now_ms.saturating_sub(self.timestamp)
    }

    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.age_at(now_ms) > PENDING_TTL_MS
    }
}

impl fmt::Debug for PendingCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCredentials")
            .field("account_id", &self.account_id)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timestamp", &self.timestamp)
            .finish()
    }
}

impl Drop for PendingCredentials {
    fn drop(&mut self) {
        self.password.zeroize();
    }
}

/// Where to send the user for `account`: its custom URL or the default console signin.
pub fn signin_url(account: &AccountRecord) -> Result<Url> {
    let raw = account.signin_url.as_deref().unwrap_or(DEFAULT_SIGNIN_URL);
    Url::parse(raw).map_err(|e| VaultError::InvalidInput(format!("invalid signin URL: {}", e)))
}

pub struct AutofillChannel {
    local: Arc<dyn StorageArea>,
    codec: CipherCodec,
}

impl AutofillChannel {
    pub fn new(local: Arc<dyn StorageArea>, codec: CipherCodec) -> Self {
        Self { local, codec }
    }

    /// Stage `account`'s credentials and return the URL to open.
    pub async fn stage(&self, account: &AccountRecord) -> Result<Url> {
        self.stage_at(account, now_millis()).await
    }

    pub async fn stage_at(&self, account: &AccountRecord, now_ms: i64) -> Result<Url> {
        let url = signin_url(account)?;
        let password = match &account.password {
            PasswordField::Absent => String::new(),
            PasswordField::Plaintext(p) => p.clone(),
            PasswordField::Encrypted(field) => self.codec.decrypt(field).await?,
            PasswordField::Unreadable(_) => {
                return Err(VaultError::Decryption(
                    "stored password has an unrecognised shape".into(),
                ))
            }
        };

        let pending = PendingCredentials {
            account_id: account.account_id.clone(),
            username: account.username.clone().unwrap_or_default(),
            password,
            timestamp: now_ms,
        };
        let value = serde_json::to_value(&pending).map_err(crate::error::StorageError::from)?;
        self.local.set(PENDING_CREDENTIALS_KEY, value).await?;

        info!(account_id = %account.account_id, url = %url, "Credentials staged for signin");
        Ok(url)
    }

    /// Consume the staged bundle, if one exists and is still fresh.
    pub async fn take(&self) -> Result<Option<PendingCredentials>> {
        self.take_at(now_millis()).await
    }

    pub async fn take_at(&self, now_ms: i64) -> Result<Option<PendingCredentials>> {
        let Some(value) = self.local.get(PENDING_CREDENTIALS_KEY).await? else {
            return Ok(None);
        };

        // Whatever happens next, the bundle is single-use.
        self.local.remove(PENDING_CREDENTIALS_KEY).await?;

        let pending: PendingCredentials = match serde_json::from_value(value) {
            Ok(p) => p,
            Err(e) => {
                warn!("Discarding malformed pending credentials: {}", e);
                return Ok(None);
            }
        };

        if pending.is_expired_at(now_ms) {
            info!(
                account_id = %pending.account_id,
                age_ms = pending.age_at(now_ms),
                "Discarding expired pending credentials"
            );
            return Ok(None);
        }

        Ok(Some(pending))
    }
}
