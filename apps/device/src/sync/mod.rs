//! Sync engine reconciling the local store with the shared document store.
//!
//! A sync pulls the user's boards (and their cards and snapshots), merges each
//! collection with the local copies under the local-wins policy, writes
//! remote-only entities locally and pushes every merged entity whose content
//! hash differs from the one recorded at its last push.

use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

use rankboard_core::error::CoreError;
use rankboard_core::merge::{merge_list, Identified};
use rankboard_core::store::{Collection, DocumentStore, Query, StoreError};
use rankboard_core::types::{Board, Card, Snapshot};

use crate::db::{
    lock, BoardRepository, CardRepository, DbError, SharedRepository, SnapshotRepository,
    SyncRepository,
};

/// Sync errors.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Not signed in")]
    NotSignedIn,

    #[error("Sync already in progress")]
    AlreadyInProgress,

    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<StoreError> for SyncError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Unavailable(msg) => SyncError::Network(msg),
            StoreError::Rejected { status, message } => SyncError::Backend { status, message },
            StoreError::Malformed(msg) => SyncError::Parse(msg),
        }
    }
}

impl From<DbError> for SyncError {
    fn from(e: DbError) -> Self {
        SyncError::Database(e.to_string())
    }
}

impl From<SyncError> for CoreError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::NotSignedIn => CoreError::NotSignedIn,
            other => CoreError::Transient(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SyncError {
    fn from(e: serde_json::Error) -> Self {
        SyncError::Parse(e.to_string())
    }
}

/// Sync status for callers polling progress.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum SyncStatus {
    Idle,
    Syncing { stage: SyncStage, progress: f32 },
    Completed { synced_at: String, stats: SyncStats },
    Failed { error: String },
}

/// Current sync stage.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "name")]
pub enum SyncStage {
    PullingBoards,
    PullingCards { current: usize, total: usize },
    ApplyingChanges,
    Pushing { current: usize, total: usize },
}

/// Sync statistics.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub boards_pulled: usize,
    pub cards_pulled: usize,
    pub snapshots_pulled: usize,
    pub entities_applied: usize,
    pub entities_pushed: usize,
    pub entities_unchanged: usize,
}

/// Inner state shared across clones.
struct SyncEngineInner {
    store: Arc<dyn DocumentStore>,
    status: Mutex<SyncStatus>,
}

/// Sync engine for the shared store.
///
/// Clone-able; all state lives behind an `Arc`.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<SyncEngineInner>,
}

/// Merged entities of one collection and the ids that only the remote side had.
struct Merged<T> {
    items: Vec<T>,
    remote_only: Vec<T>,
}

fn merge_collection<T: Identified + Clone>(local: Vec<T>, remote: Vec<T>) -> Merged<T> {
    let local_ids: HashSet<String> = local.iter().map(|e| e.entity_id().to_string()).collect();
    let items = merge_list(local, remote);
    let remote_only = items
        .iter()
        .filter(|e| !local_ids.contains(e.entity_id()))
        .cloned()
        .collect();
    Merged { items, remote_only }
}

/// Hash a board without its sync stamp so re-stamping alone never looks like
/// an edit.
fn board_hash(board: &Board) -> Result<String, SyncError> {
    let mut unstamped = board.clone();
    unstamped.synced_at = None;
    entity_hash(&unstamped)
}

fn entity_hash<T: Serialize>(entity: &T) -> Result<String, SyncError> {
    Ok(hash_content(&serde_json::to_string(entity)?))
}

impl SyncEngine {
    /// Create a new sync engine over the shared store.
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: Arc::new(SyncEngineInner {
                store,
                status: Mutex::new(SyncStatus::Idle),
            }),
        }
    }

    /// Get current sync status.
    pub async fn status(&self) -> SyncStatus {
        self.inner.status.lock().await.clone()
    }

    /// Run a full sync for `user_id`.
    pub async fn sync(
        &self,
        repo: &SharedRepository,
        user_id: Option<&str>,
    ) -> Result<SyncStats, SyncError> {
        let uid = user_id.filter(|u| !u.is_empty()).ok_or(SyncError::NotSignedIn)?;

        {
            let mut current = self.inner.status.lock().await;
            if matches!(*current, SyncStatus::Syncing { .. }) {
                return Err(SyncError::AlreadyInProgress);
            }
            *current = SyncStatus::Syncing {
                stage: SyncStage::PullingBoards,
                progress: 0.0,
            };
        }

        tracing::info!(user = uid, "sync started");
        let result = self.run(repo, uid).await;

        match &result {
            Ok(stats) => {
                tracing::info!(
                    user = uid,
                    pushed = stats.entities_pushed,
                    applied = stats.entities_applied,
                    "sync completed"
                );
                self.set_status(SyncStatus::Completed {
                    synced_at: Utc::now().to_rfc3339(),
                    stats: stats.clone(),
                })
                .await;
            }
            Err(e) => {
                tracing::warn!(user = uid, "sync failed: {}", e);
                self.set_status(SyncStatus::Failed { error: e.to_string() }).await;
            }
        }
        result
    }

    async fn run(&self, repo: &SharedRepository, uid: &str) -> Result<SyncStats, SyncError> {
        let mut stats = SyncStats::default();

        // 1. Pull boards and merge
        let remote_boards: Vec<Board> = self
            .pull(Collection::Boards, &Query::new().eq("ownerId", uid))
            .await?;
        stats.boards_pulled = remote_boards.len();

        let local_boards: Vec<Board> = {
            let repo = lock(repo)?;
            repo.all_boards()?
        }
        .into_iter()
        .filter(|b| b.owner_id.as_deref().map_or(true, |owner| owner == uid))
        .collect();
        let boards = merge_collection(local_boards, remote_boards);

        // 2. Pull cards and snapshots of every merged board
        let total = boards.items.len();
        let mut remote_cards: Vec<Card> = Vec::new();
        let mut remote_snapshots: Vec<Snapshot> = Vec::new();
        let mut local_cards: Vec<Card> = Vec::new();
        let mut local_snapshots: Vec<Snapshot> = Vec::new();

        for (current, board) in boards.items.iter().enumerate() {
            self.set_status(SyncStatus::Syncing {
                stage: SyncStage::PullingCards { current, total },
                progress: 0.1 + 0.4 * current as f32 / total.max(1) as f32,
            })
            .await;

            let by_board = Query::new().eq("boardId", board.id.as_str());
            remote_cards.extend(self.pull::<Card>(Collection::Cards, &by_board).await?);
            remote_snapshots.extend(self.pull::<Snapshot>(Collection::Snapshots, &by_board).await?);

            let repo = lock(repo)?;
            local_cards.extend(repo.get_all_cards(&board.id)?);
            local_snapshots.extend(repo.get_snapshots(&board.id)?);
        }
        stats.cards_pulled = remote_cards.len();
        stats.snapshots_pulled = remote_snapshots.len();

        let cards = merge_collection(local_cards, remote_cards);
        let snapshots = merge_collection(local_snapshots, remote_snapshots);

        // 3. Write remote-only entities locally; they are already in sync
        self.set_status(SyncStatus::Syncing {
            stage: SyncStage::ApplyingChanges,
            progress: 0.6,
        })
        .await;
        let reranked = {
            let repo = lock(repo)?;
            let applied = repo.apply_remote(
                &boards.remote_only,
                &cards.remote_only,
                &snapshots.remote_only,
                Utc::now(),
            )?;
            stats.entities_applied = applied.written;

            let now = Utc::now().to_rfc3339();
            for board in &boards.remote_only {
                let hash = board_hash(board)?;
                repo.record_pushed_hash(Collection::Boards.as_str(), &board.id, &hash, &now)?;
            }
            for card in &cards.remote_only {
                let hash = entity_hash(card)?;
                repo.record_pushed_hash(Collection::Cards.as_str(), &card.id, &hash, &now)?;
            }
            for snapshot in &snapshots.remote_only {
                let hash = entity_hash(snapshot)?;
                repo.record_pushed_hash(
                    Collection::Snapshots.as_str(),
                    &snapshot.id,
                    &hash,
                    &now,
                )?;
            }
            applied.reranked
        };
        if !reranked.is_empty() {
            tracing::debug!(cards = reranked.len(), "re-ranked boards after applying remote cards");
        }

        // Compacted cards replace their merged copies so the new ranks get pushed
        let mut reranked: HashMap<String, Card> =
            reranked.into_iter().map(|c| (c.id.clone(), c)).collect();
        let card_items: Vec<Card> = cards
            .items
            .into_iter()
            .map(|c| reranked.remove(&c.id).unwrap_or(c))
            .collect();

        // 4. Push whatever changed since the last push
        let total = boards.items.len() + card_items.len() + snapshots.items.len();
        let mut current = 0;

        for mut board in boards.items {
            board.owner_id = Some(uid.to_string());
            let hash = board_hash(&board)?;
            if self.unchanged(repo, Collection::Boards, &board.id, &hash)? {
                stats.entities_unchanged += 1;
            } else {
                board.synced_at = Some(Utc::now());
                self.push(Collection::Boards, &board.id, &board).await?;
                let repo = lock(repo)?;
                repo.save_board(&board)?;
                repo.record_pushed_hash(
                    Collection::Boards.as_str(),
                    &board.id,
                    &hash,
                    &Utc::now().to_rfc3339(),
                )?;
                stats.entities_pushed += 1;
            }
            current += 1;
            self.report_push(current, total).await;
        }

        for card in card_items {
            let hash = entity_hash(&card)?;
            if self.unchanged(repo, Collection::Cards, &card.id, &hash)? {
                stats.entities_unchanged += 1;
            } else {
                self.push(Collection::Cards, &card.id, &card).await?;
                lock(repo)?.record_pushed_hash(
                    Collection::Cards.as_str(),
                    &card.id,
                    &hash,
                    &Utc::now().to_rfc3339(),
                )?;
                stats.entities_pushed += 1;
            }
            current += 1;
            self.report_push(current, total).await;
        }

        for snapshot in snapshots.items {
            let hash = entity_hash(&snapshot)?;
            if self.unchanged(repo, Collection::Snapshots, &snapshot.id, &hash)? {
                stats.entities_unchanged += 1;
            } else {
                self.push(Collection::Snapshots, &snapshot.id, &snapshot).await?;
                lock(repo)?.record_pushed_hash(
                    Collection::Snapshots.as_str(),
                    &snapshot.id,
                    &hash,
                    &Utc::now().to_rfc3339(),
                )?;
                stats.entities_pushed += 1;
            }
            current += 1;
            self.report_push(current, total).await;
        }

        // 5. Update sync state
        lock(repo)?.update_sync_state(&Utc::now().to_rfc3339(), uid)?;
        Ok(stats)
    }

    // === Private methods ===

    async fn set_status(&self, status: SyncStatus) {
        *self.inner.status.lock().await = status;
    }

    async fn report_push(&self, current: usize, total: usize) {
        self.set_status(SyncStatus::Syncing {
            stage: SyncStage::Pushing { current, total },
            progress: 0.6 + 0.4 * current as f32 / total.max(1) as f32,
        })
        .await;
    }

    fn unchanged(
        &self,
        repo: &SharedRepository,
        collection: Collection,
        id: &str,
        hash: &str,
    ) -> Result<bool, SyncError> {
        let pushed = lock(repo)?.get_pushed_hash(collection.as_str(), id)?;
        Ok(pushed.as_deref() == Some(hash))
    }

    async fn pull<T: DeserializeOwned>(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<T>, SyncError> {
        self.inner
            .store
            .query(collection, query)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(SyncError::from))
            .collect()
    }

    async fn push<T: Serialize>(
        &self,
        collection: Collection,
        id: &str,
        entity: &T,
    ) -> Result<(), SyncError> {
        let doc = serde_json::to_value(entity)?;
        self.inner.store.put(collection, id, doc).await?;
        tracing::debug!(collection = collection.as_str(), id, "pushed");
        Ok(())
    }
}

/// Calculate SHA256 hash of content.
pub fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteRepository;
    use crate::ranking::RankManager;
    use crate::snapshots::SnapshotEngine;
    use pretty_assertions::assert_eq;
    use rankboard_core::rank;
    use rankboard_core::store::{DocumentStoreExt, MemoryDocumentStore};
    use std::sync::Mutex as StdMutex;

    struct Fixture {
        repo: SharedRepository,
        remote: Arc<MemoryDocumentStore>,
        engine: SyncEngine,
        ranks: RankManager,
    }

    fn fixture() -> Fixture {
        let repo: SharedRepository =
            Arc::new(StdMutex::new(SqliteRepository::open_in_memory().unwrap()));
        let remote = Arc::new(MemoryDocumentStore::new());
        let engine = SyncEngine::new(remote.clone());
        let ranks = RankManager::new(repo.clone());
        Fixture { repo, remote, engine, ranks }
    }

    #[test]
    fn test_hash_content_is_sha256_hex() {
        assert_eq!(
            hash_content("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_signed_out_sync_is_rejected() {
        let f = fixture();
        let err = f.engine.sync(&f.repo, None).await.unwrap_err();
        assert!(matches!(err, SyncError::NotSignedIn));
        assert!(matches!(f.engine.status().await, SyncStatus::Idle));
    }

    #[tokio::test]
    async fn test_local_board_is_pushed_once() {
        let f = fixture();
        let board = f.ranks.create_board("Local").unwrap();
        f.ranks.append(Card::new(&board.id, "A")).unwrap();
        SnapshotEngine::new(f.repo.clone()).capture(&board.id, "Ep", None).unwrap();

        let stats = f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        assert_eq!(stats.entities_pushed, 3);

        let pushed: Board = f.remote.get_doc(Collection::Boards, &board.id).await.unwrap().unwrap();
        assert_eq!(pushed.owner_id.as_deref(), Some("u1"));
        assert!(pushed.synced_at.is_some());
        assert_eq!(f.ranks.get_board(&board.id).unwrap().owner_id.as_deref(), Some("u1"));

        let stats = f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        assert_eq!(stats.entities_pushed, 0);
        assert_eq!(stats.entities_unchanged, 3);
        assert!(matches!(f.engine.status().await, SyncStatus::Completed { .. }));
    }

    #[tokio::test]
    async fn test_remote_only_entities_are_applied_locally() {
        let f = fixture();
        let mut board = Board::new("Remote");
        board.owner_id = Some("u1".to_string());
        let mut card = Card::new(&board.id, "R");
        card.rank = 1;
        f.remote.put_doc(Collection::Boards, &board.id, &board).await.unwrap();
        f.remote.put_doc(Collection::Cards, &card.id, &card).await.unwrap();

        let mut foreign = Board::new("Someone else");
        foreign.owner_id = Some("u2".to_string());
        f.remote.put_doc(Collection::Boards, &foreign.id, &foreign).await.unwrap();

        let stats = f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        assert_eq!(stats.entities_applied, 2);
        assert_eq!(stats.entities_pushed, 0);

        let local = f.ranks.list(&board.id).unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].name, "R");
        assert!(f.ranks.get_board(&foreign.id).is_err());
    }

    #[tokio::test]
    async fn test_local_copy_wins_over_remote() {
        let f = fixture();
        let board = f.ranks.create_board("Mine").unwrap();
        f.engine.sync(&f.repo, Some("u1")).await.unwrap();

        let mut remote_edit: Board = f
            .remote
            .get_doc(Collection::Boards, &board.id)
            .await
            .unwrap()
            .unwrap();
        remote_edit.name = "Edited elsewhere".to_string();
        remote_edit.updated_at = Utc::now() + chrono::Duration::days(1);
        f.remote.put_doc(Collection::Boards, &board.id, &remote_edit).await.unwrap();

        f.ranks.rename_board(&board.id, "Edited here").unwrap();
        f.engine.sync(&f.repo, Some("u1")).await.unwrap();

        let remote: Board = f.remote.get_doc(Collection::Boards, &board.id).await.unwrap().unwrap();
        assert_eq!(remote.name, "Edited here");
        assert_eq!(f.ranks.get_board(&board.id).unwrap().name, "Edited here");
    }

    #[tokio::test]
    async fn test_remote_card_colliding_with_local_rank_is_compacted() {
        let f = fixture();
        let board = f.ranks.create_board("B").unwrap();
        f.ranks.append(Card::new(&board.id, "A")).unwrap();
        f.engine.sync(&f.repo, Some("u1")).await.unwrap();

        f.ranks.append(Card::new(&board.id, "Local")).unwrap();
        let mut remote_card = Card::new(&board.id, "Remote");
        remote_card.rank = 2;
        remote_card.created_at = Utc::now() + chrono::Duration::minutes(1);
        f.remote
            .put_doc(Collection::Cards, &remote_card.id, &remote_card)
            .await
            .unwrap();

        let stats = f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        assert_eq!(stats.entities_applied, 1);
        assert_eq!(stats.entities_pushed, 2);

        let local = f.ranks.list(&board.id).unwrap();
        assert!(rank::is_dense(&local));
        let order: Vec<(&str, u32)> = local.iter().map(|c| (c.name.as_str(), c.rank)).collect();
        assert_eq!(order, vec![("A", 1), ("Local", 2), ("Remote", 3)]);

        for card in &local {
            let shared: Card = f
                .remote
                .get_doc(Collection::Cards, &card.id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(shared.rank, card.rank);
        }

        let again = f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        assert_eq!(again.entities_pushed, 0);
        assert!(rank::is_dense(&f.ranks.list(&board.id).unwrap()));
    }

    #[tokio::test]
    async fn test_ranks_stay_dense_when_both_sides_have_cards() {
        let f = fixture();
        let board = f.ranks.create_board("B").unwrap();
        for name in ["A", "B", "C"] {
            f.ranks.append(Card::new(&board.id, name)).unwrap();
        }
        f.engine.sync(&f.repo, Some("u1")).await.unwrap();

        for (i, name) in ["X", "Y"].into_iter().enumerate() {
            let mut card = Card::new(&board.id, name);
            card.rank = i as u32 + 1;
            f.remote.put_doc(Collection::Cards, &card.id, &card).await.unwrap();
        }
        let doomed = f.ranks.list(&board.id).unwrap()[1].clone();
        f.ranks.soft_delete(&doomed.id).unwrap();

        f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        let local = f.ranks.list(&board.id).unwrap();
        assert_eq!(local.len(), 4);
        assert!(rank::is_dense(&local));

        let shared: Vec<Card> = f
            .remote
            .query_docs(Collection::Cards, &Query::new().eq("boardId", board.id.as_str()))
            .await
            .unwrap();
        let mut shared: Vec<Card> = shared.into_iter().filter(|c| !c.is_deleted()).collect();
        rank::sort_by_rank(&mut shared);
        assert!(rank::is_dense(&shared));
        assert_eq!(
            shared.iter().map(|c| &c.id).collect::<Vec<_>>(),
            local.iter().map(|c| &c.id).collect::<Vec<_>>()
        );
        let again = f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        assert_eq!(again.entities_pushed, 0);

        f.ranks.soft_delete(&local[0].id).unwrap();
        assert!(rank::is_dense(&f.ranks.list(&board.id).unwrap()));
    }

    #[tokio::test]
    async fn test_reorder_after_sync_pushes_changed_cards_only() {
        let f = fixture();
        let board = f.ranks.create_board("B").unwrap();
        let a = f.ranks.append(Card::new(&board.id, "A")).unwrap();
        f.ranks.append(Card::new(&board.id, "B")).unwrap();
        f.ranks.append(Card::new(&board.id, "C")).unwrap();
        f.engine.sync(&f.repo, Some("u1")).await.unwrap();

        f.ranks.reorder(&board.id, &a.id, 0, 1).unwrap();
        let stats = f.engine.sync(&f.repo, Some("u1")).await.unwrap();
        assert_eq!(stats.entities_pushed, 2);

        let pushed: Card = f.remote.get_doc(Collection::Cards, &a.id).await.unwrap().unwrap();
        assert_eq!(pushed.rank, 2);
    }
}
