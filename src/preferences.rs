//! Popup theme preference, synced across devices.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, VaultError};
use crate::storage::{self, StorageArea, THEME_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    System,
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
            Theme::System => "system",
        };
        f.write_str(s)
    }
}

impl FromStr for Theme {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "light" => Ok(Theme::Light),
            "dark" => Ok(Theme::Dark),
            "system" => Ok(Theme::System),
            other => Err(VaultError::InvalidInput(format!("unknown theme '{}'", other))),
        }
    }
}

/// Stored theme, falling back to `System` when unset or unreadable.
pub async fn get_theme(synced: &dyn StorageArea) -> Result<Theme> {
    match storage::get_json::<Theme>(synced, THEME_KEY).await {
        Ok(theme) => Ok(theme.unwrap_or_default()),
        Err(crate::error::StorageError::Serialization(e)) => {
            tracing::warn!("Ignoring unreadable theme preference: {}", e);
            Ok(Theme::default())
        }
        Err(e) => Err(e.into()),
    }
}

pub async fn set_theme(synced: &dyn StorageArea, theme: Theme) -> Result<()> {
    storage::set_json(synced, THEME_KEY, &theme).await?;
    Ok(())
}
