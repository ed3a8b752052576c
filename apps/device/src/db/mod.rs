//! Local SQLite database operations.

pub mod date_utils;
pub mod error;
pub mod repository;
pub mod schema;

pub use error::DbError;
pub use repository::{
    AppliedRemote, BoardRepository, CardRepository, KvRepository, LocalSyncState,
    SnapshotRepository, SqliteRepository, SyncRepository,
};

use std::sync::{Arc, Mutex, MutexGuard};

/// Repository handle shared between the managers, the sync engine and the
/// key-value store. Never hold the guard across an `.await`.
pub type SharedRepository = Arc<Mutex<SqliteRepository>>;

pub fn lock(repo: &SharedRepository) -> Result<MutexGuard<'_, SqliteRepository>, DbError> {
    repo.lock().map_err(|_| DbError::Poisoned)
}
