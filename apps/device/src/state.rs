//! Application state.

use std::sync::{Arc, Mutex};

use rankboard_core::error::{CoreError, Result};
use rankboard_core::identity::{IdentityProvider, KeyValueStore};
use rankboard_core::social::SocialGuard;
use rankboard_core::store::DocumentStore;
use rankboard_core::types::Board;

use crate::config::DeviceConfig;
use crate::db::{SharedRepository, SqliteRepository};
use crate::kv::{DeviceIdentity, SqliteKeyValueStore};
use crate::ranking::RankManager;
use crate::remote::HttpDocumentStore;
use crate::snapshots::SnapshotEngine;
use crate::sync::{SyncEngine, SyncError, SyncStats};

/// Key under which the backend device token is kept.
pub const DEVICE_TOKEN_KEY: &str = "deviceToken";

/// Services that need the shared store.
#[derive(Clone)]
struct Online {
    social: SocialGuard<dyn DocumentStore>,
    sync: SyncEngine,
}

impl Online {
    fn new(store: Arc<dyn DocumentStore>, config: &DeviceConfig) -> Self {
        Self {
            social: SocialGuard::with_limits(store.clone(), config.limits.clone()),
            sync: SyncEngine::new(store),
        }
    }
}

/// Global application state.
pub struct AppState {
    pub repository: SharedRepository,
    pub config: DeviceConfig,
    kv: SqliteKeyValueStore,
    identity: DeviceIdentity,
    online: Option<Online>,
}

impl AppState {
    /// Open the database at the configured path and connect to the backend
    /// when one is configured.
    pub fn open(config: DeviceConfig) -> anyhow::Result<Self> {
        if let Some(parent) = config.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let repository = SqliteRepository::open(&config.db_path)?;
        let mut state = Self::with_store(repository, config, None);

        if let Some(url) = state.config.backend_url.clone() {
            let mut remote = HttpDocumentStore::new(&url);
            if let Some(token) = state.kv.get(DEVICE_TOKEN_KEY)? {
                remote = remote.with_token(token);
            }
            state.connect(Arc::new(remote));
        }

        tracing::info!(
            db = %state.config.db_path.display(),
            online = state.online.is_some(),
            "device state opened"
        );
        Ok(state)
    }

    /// Build state over an already opened repository and, optionally, a
    /// shared store.
    pub fn with_store(
        repository: SqliteRepository,
        config: DeviceConfig,
        store: Option<Arc<dyn DocumentStore>>,
    ) -> Self {
        let repository = Arc::new(Mutex::new(repository));
        let kv = SqliteKeyValueStore::new(repository.clone());
        let online = store.map(|s| Online::new(s, &config));
        Self {
            identity: DeviceIdentity::new(kv.clone()),
            repository,
            config,
            kv,
            online,
        }
    }

    fn connect(&mut self, store: Arc<dyn DocumentStore>) {
        self.online = Some(Online::new(store, &self.config));
    }

    pub fn ranks(&self) -> RankManager {
        RankManager::new(self.repository.clone())
    }

    pub fn snapshots(&self) -> SnapshotEngine {
        SnapshotEngine::new(self.repository.clone())
    }

    pub fn identity(&self) -> &DeviceIdentity {
        &self.identity
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.identity.current_user_id()
    }

    pub fn device_id(&self) -> Result<String> {
        Ok(self.kv.device_id()?)
    }

    pub fn is_online(&self) -> bool {
        self.online.is_some()
    }

    /// Social guard over the shared store.
    pub fn social(&self) -> Result<&SocialGuard<dyn DocumentStore>> {
        self.online
            .as_ref()
            .map(|o| &o.social)
            .ok_or_else(|| CoreError::Transient("no backend configured".to_string()))
    }

    /// Register with the backend and keep the issued token.
    pub async fn register_device(&mut self, name: Option<String>) -> anyhow::Result<String> {
        let url = self
            .config
            .backend_url
            .clone()
            .ok_or_else(|| anyhow::anyhow!("RANKBOARD_BACKEND_URL is not set"))?;

        let remote = HttpDocumentStore::new(&url);
        let (token, device_id) = remote.register_device(name).await?;
        self.kv.set(DEVICE_TOKEN_KEY, &token)?;
        self.connect(Arc::new(remote.with_token(token)));

        tracing::info!(device = %device_id, "device registered");
        Ok(device_id)
    }

    /// Create a board, consulting the shared board limit when signed in and
    /// online. Offline creation is never limited.
    pub async fn create_board(&self, name: &str) -> Result<Board> {
        if let (Some(uid), Some(online)) = (self.current_user_id(), self.online.as_ref()) {
            let status = online.social.check_board_creation_limit(Some(uid.as_str())).await?;
            if !status.allowed {
                return Err(CoreError::RateLimitExceeded(status.message.unwrap_or_default()));
            }
        }
        self.ranks().create_board(name)
    }

    /// Reconcile with the shared store as the signed-in user.
    pub async fn sync_now(&self) -> std::result::Result<SyncStats, SyncError> {
        let online = self
            .online
            .as_ref()
            .ok_or_else(|| SyncError::Network("no backend configured".to_string()))?;
        let uid = self.current_user_id();
        online.sync.sync(&self.repository, uid.as_deref()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rankboard_core::store::{Collection, MemoryDocumentStore};
    use serde_json::json;

    fn online_state() -> (AppState, Arc<MemoryDocumentStore>) {
        let remote = Arc::new(MemoryDocumentStore::new());
        let mut config = DeviceConfig::default();
        config.limits.boards.count = 1;
        let state = AppState::with_store(
            SqliteRepository::open_in_memory().unwrap(),
            config,
            Some(remote.clone()),
        );
        (state, remote)
    }

    #[tokio::test]
    async fn test_offline_board_creation_is_unlimited() {
        let state = AppState::with_store(
            SqliteRepository::open_in_memory().unwrap(),
            DeviceConfig::default(),
            None,
        );
        state.identity().sign_in("u1").unwrap();
        state.create_board("a").await.unwrap();
        assert!(state.social().is_err());
        assert!(matches!(state.sync_now().await, Err(SyncError::Network(_))));
    }

    #[tokio::test]
    async fn test_board_limit_consulted_when_signed_in() {
        let (state, remote) = online_state();
        state.identity().sign_in("u1").unwrap();
        remote
            .put(
                Collection::Boards,
                "existing",
                json!({ "id": "existing", "ownerId": "u1", "createdAt": Utc::now().to_rfc3339() }),
            )
            .await
            .unwrap();

        let err = state.create_board("second").await.unwrap_err();
        assert!(matches!(err, CoreError::RateLimitExceeded(_)));
    }

    #[tokio::test]
    async fn test_sync_requires_sign_in() {
        let (state, _) = online_state();
        assert!(matches!(state.sync_now().await, Err(SyncError::NotSignedIn)));

        state.identity().sign_in("u1").unwrap();
        state.create_board("a").await.unwrap();
        let stats = state.sync_now().await.unwrap();
        assert_eq!(stats.entities_pushed, 1);
    }

    #[test]
    fn test_device_id_persists() {
        let (state, _) = online_state();
        assert_eq!(state.device_id().unwrap(), state.device_id().unwrap());
    }
}
