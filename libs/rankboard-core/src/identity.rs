//! Device-scoped persisted state and the current-user seam.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::store::StoreError;

/// Key under which the signed-in user id is kept.
pub const CURRENT_USER_KEY: &str = "currentUserId";

/// Key under which the per-install device id is kept.
pub const DEVICE_ID_KEY: &str = "deviceId";

/// Small synchronous key-value persistence.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("kv lock poisoned".to_string()))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("kv lock poisoned".to_string()))?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Unavailable("kv lock poisoned".to_string()))?
            .remove(key);
        Ok(())
    }
}

/// Source of the opaque, stable user id; `None` when signed out.
pub trait IdentityProvider: Send + Sync {
    fn current_user_id(&self) -> Option<String>;
}

/// Fixed identity, mostly for tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl StaticIdentity {
    pub fn signed_in(uid: impl Into<String>) -> Self {
        Self(Some(uid.into()))
    }

    pub fn signed_out() -> Self {
        Self(None)
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Identity persisted in a [`KeyValueStore`] so it survives restarts.
pub struct StoredIdentity<K> {
    kv: K,
}

impl<K: KeyValueStore> StoredIdentity<K> {
    pub fn new(kv: K) -> Self {
        Self { kv }
    }

    pub fn sign_in(&self, uid: &str) -> Result<(), StoreError> {
        self.kv.set(CURRENT_USER_KEY, uid)
    }

    pub fn sign_out(&self) -> Result<(), StoreError> {
        self.kv.remove(CURRENT_USER_KEY)
    }
}

impl<K: KeyValueStore> IdentityProvider for StoredIdentity<K> {
    fn current_user_id(&self) -> Option<String> {
        match self.kv.get(CURRENT_USER_KEY) {
            Ok(uid) => uid.filter(|u| !u.is_empty()),
            Err(e) => {
                tracing::warn!("identity lookup failed, treating as signed out: {}", e);
                None
            }
        }
    }
}
