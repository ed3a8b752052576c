//! Local-first device side of rankboard.
//!
//! Boards, cards and snapshots live in a local SQLite database; the shared
//! document store is reached over HTTP for social features and sync.

pub mod commands;
pub mod config;
pub mod db;
pub mod kv;
pub mod ranking;
pub mod remote;
pub mod snapshots;
pub mod state;
pub mod sync;

pub use config::DeviceConfig;
pub use db::{DbError, SharedRepository, SqliteRepository};
pub use kv::{DeviceIdentity, SqliteKeyValueStore};
pub use ranking::RankManager;
pub use remote::HttpDocumentStore;
pub use snapshots::SnapshotEngine;
pub use state::AppState;
pub use sync::{SyncEngine, SyncError, SyncStage, SyncStats, SyncStatus};
