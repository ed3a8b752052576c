//! SQLite-backed key/value store for device-scoped state.

use rankboard_core::identity::{KeyValueStore, StoredIdentity, DEVICE_ID_KEY};
use rankboard_core::store::StoreError;
use rankboard_core::types::new_id;

use crate::db::{lock, DbError, KvRepository, SharedRepository};

/// Identity that survives restarts in the local `kv` table.
pub type DeviceIdentity = StoredIdentity<SqliteKeyValueStore>;

#[derive(Clone)]
pub struct SqliteKeyValueStore {
    repo: SharedRepository,
}

impl SqliteKeyValueStore {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    /// Stable per-install id, generated on first use.
    pub fn device_id(&self) -> Result<String, StoreError> {
        if let Some(id) = self.get(DEVICE_ID_KEY)? {
            return Ok(id);
        }
        let id = new_id();
        self.set(DEVICE_ID_KEY, &id)?;
        tracing::info!(device_id = %id, "generated device id");
        Ok(id)
    }
}

fn unavailable(e: DbError) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        lock(&self.repo)
            .and_then(|repo| repo.kv_get(key))
            .map_err(unavailable)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.repo)
            .and_then(|repo| repo.kv_set(key, value))
            .map_err(unavailable)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.repo)
            .and_then(|repo| repo.kv_remove(key))
            .map_err(unavailable)
    }
}
