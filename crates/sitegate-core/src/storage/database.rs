//! SQLite-backed allowance store.
//!
//! Every persisted key is one row of a `kv` table holding a JSON document,
//! mirroring the key-value layout a browser extension's local storage has.

use std::path::Path;

use rusqlite::{params, Connection};

use super::{decode, encode, AllowanceStore, StoredState, CATALOG_KEY, ENABLED_KEY};
use crate::catalog::Catalog;
use crate::error::StoreError;

/// SQLite database for allowance storage.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|source| StoreError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Open an in-memory database.
    pub fn open_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), StoreError> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )?;
        Ok(())
    }

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut stmt = self.conn.prepare("SELECT value FROM kv WHERE key = ?1")?;
        let result = stmt.query_row(params![key], |row| row.get::<_, String>(0));
        match result {
            Ok(v) => Ok(Some(v)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }
}

impl AllowanceStore for Database {
    fn load(&self) -> Result<StoredState, StoreError> {
        let defaults = StoredState::default();
        let enabled = match self.kv_get(ENABLED_KEY)? {
            Some(raw) => decode(ENABLED_KEY, &raw)?,
            None => defaults.enabled,
        };
        let catalog = match self.kv_get(CATALOG_KEY)? {
            Some(raw) => decode(CATALOG_KEY, &raw)?,
            None => defaults.catalog,
        };
        Ok(StoredState { enabled, catalog })
    }

    fn save_catalog(&mut self, catalog: &Catalog) -> Result<(), StoreError> {
        self.kv_set(CATALOG_KEY, &encode(CATALOG_KEY, catalog)?)
    }

    fn save_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.kv_set(ENABLED_KEY, &encode(ENABLED_KEY, &enabled)?)
    }

    fn is_installed(&self) -> Result<bool, StoreError> {
        Ok(self.kv_get(CATALOG_KEY)?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SiteRef;

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
    }

    #[test]
    fn empty_store_loads_defaults() {
        let db = Database::open_memory().unwrap();
        assert!(!db.is_installed().unwrap());
        assert_eq!(db.load().unwrap(), StoredState::default());
    }

    #[test]
    fn install_only_writes_once() {
        let mut db = Database::open_memory().unwrap();
        assert!(db.install().unwrap());

        let mut state = db.load().unwrap();
        state.catalog.grant(&SiteRef::new("socialMedia", 0)).unwrap();
        db.save_catalog(&state.catalog).unwrap();

        assert!(!db.install().unwrap());
        let reloaded = db.load().unwrap();
        assert_eq!(
            reloaded.catalog.get(&SiteRef::new("socialMedia", 0)).unwrap().time_remaining,
            900
        );
    }

    #[test]
    fn enabled_flag_persists_as_json_bool() {
        let mut db = Database::open_memory().unwrap();
        db.save_enabled(false).unwrap();
        assert_eq!(db.kv_get(ENABLED_KEY).unwrap().as_deref(), Some("false"));
        assert!(!db.load().unwrap().enabled);
    }

    #[test]
    fn corrupt_catalog_is_reported() {
        let db = Database::open_memory().unwrap();
        db.kv_set(CATALOG_KEY, "{not json").unwrap();
        assert!(matches!(db.load(), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn reopening_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sitegate.db");
        {
            let mut db = Database::open(&path).unwrap();
            db.install().unwrap();
            db.save_enabled(false).unwrap();
        }
        let db = Database::open(&path).unwrap();
        assert!(db.is_installed().unwrap());
        assert!(!db.load().unwrap().enabled);
    }
}
