//! Saved AWS accounts: record types, validation and the account store.

pub mod store;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, VaultError};
use crate::vault::EncryptedField;

pub use store::AccountStore;

/// The password slot of an account, tagged by migration state.
///
/// On disk this is the legacy union: field omitted (or `null`), a bare
/// JSON string written by older versions, or a `{ciphertext, iv}` object.
/// Any other shape is kept verbatim as `Unreadable` so one damaged record
/// cannot fail the decode of the whole collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PasswordField {
    #[default]
    Absent,
    Plaintext(String),
    Encrypted(EncryptedField),
    Unreadable(serde_json::Value),
}

impl PasswordField {
    pub fn is_absent(&self) -> bool {
        matches!(self, PasswordField::Absent)
    }

    pub fn is_plaintext(&self) -> bool {
        matches!(self, PasswordField::Plaintext(_))
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, PasswordField::Encrypted(_))
    }

    pub fn is_unreadable(&self) -> bool {
        matches!(self, PasswordField::Unreadable(_))
    }

    /// Empty strings count as no password.
    pub fn from_input(password: Option<String>) -> Self {
        match password {
            Some(p) if !p.is_empty() => PasswordField::Plaintext(p),
            _ => PasswordField::Absent,
        }
    }

    /// Plaintext value, if this slot currently holds one.
    pub fn plaintext(&self) -> Option<&str> {
        match self {
            PasswordField::Plaintext(p) => Some(p.as_str()),
            _ => None,
        }
    }
}

/// A saved AWS account as stored in the synced namespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountRecord {
    pub id: String,
    /// 12-digit AWS account ID
    pub account_id: String,
    pub alias: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "PasswordField::is_absent")]
    pub password: PasswordField,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signin_url: Option<String>,
    /// epoch milliseconds
    pub created_at: i64,
    /// epoch milliseconds
    pub updated_at: i64,
}

/// The value stored under `aws_accounts`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountsDocument {
    #[serde(default)]
    pub accounts: Vec<AccountRecord>,
}

/// Input for a new account. The password is plaintext here and sealed on save.
#[derive(Debug, Clone, Default)]
pub struct AccountDraft {
    pub account_id: String,
    pub alias: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub signin_url: Option<String>,
}

/// Partial update of an existing account.
///
/// Clearable fields use a double `Option`: `None` leaves the field alone,
/// `Some(None)` clears it, `Some(Some(v))` sets it.
#[derive(Debug, Clone, Default)]
pub struct AccountUpdate {
    pub account_id: Option<String>,
    pub alias: Option<String>,
    pub username: Option<Option<String>>,
    pub password: Option<Option<String>>,
    pub signin_url: Option<Option<String>>,
}

pub(crate) fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// AWS account IDs are exactly twelve ASCII digits.
pub fn validate_account_id(account_id: &str) -> Result<()> {
    if account_id.len() == 12 && account_id.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(VaultError::InvalidInput(
            "account ID must be exactly 12 digits".into(),
        ))
    }
}

pub(crate) fn normalize_alias(alias: &str) -> Result<String> {
    let alias = alias.trim();
    if alias.is_empty() {
        return Err(VaultError::InvalidInput("account name is required".into()));
    }
    Ok(alias.to_string())
}

/// Trim optional text input; blank becomes `None`.
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn normalize_signin_url(value: Option<String>) -> Result<Option<String>> {
    let Some(raw) = normalize_optional(value) else {
        return Ok(None);
    };
    let url = Url::parse(&raw)
        .map_err(|e| VaultError::InvalidInput(format!("invalid signin URL: {}", e)))?;
    match url.scheme() {
        "https" | "http" => Ok(Some(raw)),
        other => Err(VaultError::InvalidInput(format!(
            "signin URL must be http(s), got '{}'",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_password_field_legacy_shapes() {
        let absent: AccountRecord = serde_json::from_value(json!({
            "id": "a", "accountId": "123456789012", "alias": "Dev",
            "createdAt": 1, "updatedAt": 1
        }))
        .unwrap();
        assert!(absent.password.is_absent());

        let null: AccountRecord = serde_json::from_value(json!({
            "id": "a", "accountId": "123456789012", "alias": "Dev",
            "password": null, "createdAt": 1, "updatedAt": 1
        }))
        .unwrap();
        assert!(null.password.is_absent());

        let plain: AccountRecord = serde_json::from_value(json!({
            "id": "a", "accountId": "123456789012", "alias": "Dev",
            "password": "legacy", "createdAt": 1, "updatedAt": 1
        }))
        .unwrap();
        assert_eq!(plain.password, PasswordField::Plaintext("legacy".into()));

        let sealed: AccountRecord = serde_json::from_value(json!({
            "id": "a", "accountId": "123456789012", "alias": "Dev",
            "password": {"ciphertext": "Y3Q=", "iv": "aXY="},
            "createdAt": 1, "updatedAt": 1
        }))
        .unwrap();
        assert!(sealed.password.is_encrypted());
    }

    #[test]
    fn test_damaged_password_shapes_are_kept_verbatim() {
        for damaged in [
            json!({"ciphertext": "AAAA"}),
            json!({"ciphertext": "AAAA", "iv": 12}),
            json!(42),
        ] {
            let record: AccountRecord = serde_json::from_value(json!({
                "id": "a", "accountId": "123456789012", "alias": "Dev",
                "password": damaged.clone(), "createdAt": 1, "updatedAt": 1
            }))
            .unwrap();
            assert_eq!(record.password, PasswordField::Unreadable(damaged.clone()));

            let written = serde_json::to_value(&record).unwrap();
            assert_eq!(written["password"], damaged);
        }
    }

    #[test]
    fn test_record_serializes_camel_case_and_omits_absent() {
        let record = AccountRecord {
            id: "id-1".into(),
            account_id: "123456789012".into(),
            alias: "Prod".into(),
            username: None,
            password: PasswordField::Absent,
            signin_url: Some("https://example.signin.aws.amazon.com/console".into()),
            created_at: 10,
            updated_at: 20,
        };
        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["accountId"], "123456789012");
        assert_eq!(value["signinUrl"], "https://example.signin.aws.amazon.com/console");
        assert!(value.get("password").is_none());
        assert!(value.get("username").is_none());
    }

    #[test]
    fn test_account_id_validation() {
        assert!(validate_account_id("123456789012").is_ok());
        assert!(validate_account_id("12345678901").is_err());
        assert!(validate_account_id("1234567890123").is_err());
        assert!(validate_account_id("12345678901a").is_err());
        assert!(validate_account_id("١٢٣٤٥٦٧٨٩٠١٢").is_err());
    }

    #[test]
    fn test_input_normalization() {
        assert_eq!(normalize_alias("  Prod ").unwrap(), "Prod");
        assert!(normalize_alias("   ").is_err());
        assert_eq!(normalize_optional(Some("  ".into())), None);
        assert_eq!(normalize_optional(Some(" bob ".into())), Some("bob".into()));
        assert_eq!(PasswordField::from_input(Some(String::new())), PasswordField::Absent);
        assert_eq!(
            PasswordField::from_input(Some(" pw ".into())),
            PasswordField::Plaintext(" pw ".into())
        );
    }

    #[test]
    fn test_signin_url_validation() {
        assert_eq!(normalize_signin_url(None).unwrap(), None);
        assert_eq!(normalize_signin_url(Some(" ".into())).unwrap(), None);
        assert!(normalize_signin_url(Some("https://acme.signin.aws.amazon.com/console".into()))
            .unwrap()
            .is_some());
        assert!(normalize_signin_url(Some("not a url".into())).is_err());
        assert!(normalize_signin_url(Some("javascript:alert(1)".into())).is_err());
    }
}
