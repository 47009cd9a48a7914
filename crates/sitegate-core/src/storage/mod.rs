mod config;
pub mod database;
mod memory;

pub use config::{BlockPageConfig, Config, LoggingConfig, StorageConfig};
pub use database::Database;
pub use memory::MemoryStore;

use std::path::PathBuf;

use crate::catalog::Catalog;
use crate::error::{ConfigError, StoreError};

/// Persisted key holding the global enforcement flag.
pub const ENABLED_KEY: &str = "extensionEnabled";
/// Persisted key holding the catalog.
pub const CATALOG_KEY: &str = "blockedSites";

/// Snapshot of the persisted document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    pub enabled: bool,
    pub catalog: Catalog,
}

impl Default for StoredState {
    fn default() -> Self {
        Self {
            enabled: true,
            catalog: Catalog::default_catalog(),
        }
    }
}

/// Persistent allowance storage.
///
/// Writes are last-write-wins per key; there is no transaction spanning the
/// flag and the catalog.
pub trait AllowanceStore {
    /// Read both keys, substituting defaults for anything never written.
    fn load(&self) -> Result<StoredState, StoreError>;

    fn save_catalog(&mut self, catalog: &Catalog) -> Result<(), StoreError>;

    fn save_enabled(&mut self, enabled: bool) -> Result<(), StoreError>;

    /// Whether anything has been persisted yet.
    fn is_installed(&self) -> Result<bool, StoreError>;

    /// Write the default document, overwriting whatever is there.
    fn reset(&mut self) -> Result<(), StoreError> {
        let defaults = StoredState::default();
        self.save_enabled(defaults.enabled)?;
        self.save_catalog(&defaults.catalog)
    }

    /// First-run install: write defaults only if nothing is stored.
    ///
    /// Returns `true` when defaults were written.
    fn install(&mut self) -> Result<bool, StoreError> {
        if self.is_installed()? {
            return Ok(false);
        }
        self.reset()?;
        tracing::info!("installed default catalog");
        Ok(true)
    }
}

/// Returns `~/.config/sitegate[-dev]/` based on SITEGATE_ENV.
///
/// `SITEGATE_DATA_DIR` overrides the location entirely.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("SITEGATE_DATA_DIR") {
        Some(dir) => PathBuf::from(dir),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("SITEGATE_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("sitegate-dev")
            } else {
                base_dir.join("sitegate")
            }
        }
    };

    std::fs::create_dir_all(&dir)
        .map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}

pub(crate) fn decode<T: serde::de::DeserializeOwned>(key: &str, raw: &str) -> Result<T, StoreError> {
    serde_json::from_str(raw).map_err(|source| StoreError::Corrupt {
        key: key.to_string(),
        source,
    })
}

pub(crate) fn encode<T: serde::Serialize>(key: &str, value: &T) -> Result<String, StoreError> {
    serde_json::to_string(value).map_err(|source| StoreError::Encode {
        key: key.to_string(),
        source,
    })
}
