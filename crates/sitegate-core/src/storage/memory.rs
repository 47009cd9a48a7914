use super::{AllowanceStore, StoredState};
use crate::catalog::Catalog;
use crate::error::StoreError;

/// In-process store for tests and dry runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    enabled: Option<bool>,
    catalog: Option<Catalog>,
    /// Number of catalog writes, for asserting persistence behavior.
    catalog_writes: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `state`.
    pub fn with_state(state: StoredState) -> Self {
        Self {
            enabled: Some(state.enabled),
            catalog: Some(state.catalog),
            catalog_writes: 0,
        }
    }

    pub fn catalog_writes(&self) -> usize {
        self.catalog_writes
    }
}

impl AllowanceStore for MemoryStore {
    fn load(&self) -> Result<StoredState, StoreError> {
        let defaults = StoredState::default();
        Ok(StoredState {
            enabled: self.enabled.unwrap_or(defaults.enabled),
            catalog: self.catalog.clone().unwrap_or(defaults.catalog),
        })
    }

    fn save_catalog(&mut self, catalog: &Catalog) -> Result<(), StoreError> {
        self.catalog = Some(catalog.clone());
        self.catalog_writes += 1;
        Ok(())
    }

    fn save_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.enabled = Some(enabled);
        Ok(())
    }

    fn is_installed(&self) -> Result<bool, StoreError> {
        Ok(self.catalog.is_some())
    }
}
