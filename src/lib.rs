//! AWS signin vault: saved AWS account credentials, encrypted at rest.
//!
//! Account records live in synced storage; their passwords are sealed
//! with AES-256-GCM under a key that never leaves the device:
//!
//!   KeyStore      fetch-or-generate the device key (local storage, JWK)
//!   CipherCodec   seal / open one password field
//!   Migration     upgrade legacy plaintext passwords once, idempotently
//!   AccountStore  CRUD; decrypts on read, seals on write
//!   Autofill      30-second side channel to the signin page filler

pub mod accounts;
pub mod autofill;
pub mod config;
pub mod context;
pub mod error;
pub mod preferences;
pub mod storage;
pub mod vault;

pub use accounts::{AccountDraft, AccountRecord, AccountStore, AccountUpdate, PasswordField};
pub use autofill::{AutofillChannel, PendingCredentials};
pub use config::Config;
pub use context::VaultContext;
pub use error::{Result, StorageError, VaultError};
pub use preferences::Theme;
pub use storage::{FileStorage, MemoryStorage, StorageArea, StorageNamespace};
pub use vault::keystore::{DeviceKey, KeyStore};
pub use vault::migration::{MigrationReport, MigrationRunner};
pub use vault::{CipherCodec, EncryptedField, PasswordSealer};
