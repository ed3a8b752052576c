//! Snapshot Engine over the local store.

use chrono::Utc;
use rankboard_core::error::{CoreError, Result};
use rankboard_core::snapshot::build_snapshot;
use rankboard_core::types::Snapshot;

use crate::db::{lock, BoardRepository, CardRepository, SharedRepository, SnapshotRepository};

#[derive(Clone)]
pub struct SnapshotEngine {
    repo: SharedRepository,
}

impl SnapshotEngine {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    /// Capture the board's current ranking as the next episode.
    pub fn capture(
        &self,
        board_id: &str,
        label: &str,
        notes: Option<String>,
    ) -> Result<Snapshot> {
        let repo = lock(&self.repo)?;
        let board = repo
            .get_board(board_id)?
            .filter(|b| !b.is_deleted())
            .ok_or_else(|| CoreError::NotFound(format!("board {}", board_id)))?;

        let snapshot = repo.transaction(|repo| {
            let cards = repo.get_active_cards(&board.id)?;
            let existing = repo.get_snapshots(&board.id)?;
            let snapshot =
                build_snapshot(&board.id, label.trim(), notes, &cards, &existing, Utc::now());
            repo.save_snapshot(&snapshot)?;
            Ok(snapshot)
        })?;

        tracing::info!(
            board = %board_id,
            episode = snapshot.episode_number,
            entries = snapshot.rankings.len(),
            "snapshot captured"
        );
        Ok(snapshot)
    }

    /// Snapshots of a board ascending by episode number. Calling again
    /// restarts from the first episode.
    pub fn list(&self, board_id: &str) -> Result<std::vec::IntoIter<Snapshot>> {
        let repo = lock(&self.repo)?;
        if repo.get_board(board_id)?.filter(|b| !b.is_deleted()).is_none() {
            return Err(CoreError::NotFound(format!("board {}", board_id)));
        }
        Ok(repo.get_snapshots(board_id)?.into_iter())
    }

    pub fn get(&self, snapshot_id: &str) -> Result<Snapshot> {
        lock(&self.repo)?
            .get_snapshot(snapshot_id)?
            .ok_or_else(|| CoreError::NotFound(format!("snapshot {}", snapshot_id)))
    }

    /// Hard-delete a snapshot. Remaining episodes keep their numbers.
    pub fn remove(&self, snapshot_id: &str) -> Result<()> {
        if !lock(&self.repo)?.delete_snapshot(snapshot_id)? {
            return Err(CoreError::NotFound(format!("snapshot {}", snapshot_id)));
        }
        tracing::info!(snapshot = %snapshot_id, "snapshot removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteRepository;
    use crate::ranking::RankManager;
    use pretty_assertions::assert_eq;
    use rankboard_core::types::Card;
    use std::sync::{Arc, Mutex};

    fn engines() -> (RankManager, SnapshotEngine) {
        let repo = Arc::new(Mutex::new(SqliteRepository::open_in_memory().unwrap()));
        (RankManager::new(repo.clone()), SnapshotEngine::new(repo))
    }

    #[test]
    fn test_capture_delete_capture() {
        let (ranks, snapshots) = engines();
        let board = ranks.create_board("Top").unwrap();
        let a = ranks.append(Card::new(&board.id, "A")).unwrap();
        ranks.append(Card::new(&board.id, "B")).unwrap();

        let first = snapshots.capture(&board.id, "Ep 1", None).unwrap();
        assert_eq!(first.episode_number, 1);
        assert_eq!(first.rankings.len(), 2);

        ranks.soft_delete(&a.id).unwrap();
        let second = snapshots.capture(&board.id, "Ep 2", None).unwrap();
        assert_eq!(second.episode_number, 2);
        assert_eq!(second.rankings.len(), 1);

        assert_eq!(snapshots.get(&first.id).unwrap().rankings.len(), 2);
    }

    #[test]
    fn test_rename_does_not_alter_captured_names() {
        let (ranks, snapshots) = engines();
        let board = ranks.create_board("Top").unwrap();
        let a = ranks.append(Card::new(&board.id, "Alpha")).unwrap();
        let snap = snapshots.capture(&board.id, "Ep", None).unwrap();

        ranks.rename(&a.id, "Omega").unwrap();
        let stored = snapshots.get(&snap.id).unwrap();
        assert_eq!(stored.rankings[0].card_name, "Alpha");
    }

    #[test]
    fn test_list_is_ordered_and_restartable() {
        let (ranks, snapshots) = engines();
        let board = ranks.create_board("Top").unwrap();
        ranks.append(Card::new(&board.id, "A")).unwrap();
        for label in ["one", "two", "three"] {
            snapshots.capture(&board.id, label, None).unwrap();
        }

        let episodes: Vec<u32> = snapshots
            .list(&board.id)
            .unwrap()
            .map(|s| s.episode_number)
            .collect();
        assert_eq!(episodes, vec![1, 2, 3]);
        let mut again = snapshots.list(&board.id).unwrap();
        assert_eq!(again.next().map(|s| s.label), Some("one".to_string()));
    }

    #[test]
    fn test_remove_leaves_gap() {
        let (ranks, snapshots) = engines();
        let board = ranks.create_board("Top").unwrap();
        let first = snapshots.capture(&board.id, "one", None).unwrap();
        let second = snapshots.capture(&board.id, "two", None).unwrap();

        snapshots.remove(&second.id).unwrap();
        assert!(matches!(snapshots.remove(&second.id), Err(CoreError::NotFound(_))));
        snapshots.remove(&first.id).unwrap();

        let third = snapshots.capture(&board.id, "three", None).unwrap();
        assert_eq!(third.episode_number, 1);

        let fourth = snapshots.capture(&board.id, "four", None).unwrap();
        snapshots.remove(&third.id).unwrap();
        let fifth = snapshots.capture(&board.id, "five", None).unwrap();
        assert_eq!((fourth.episode_number, fifth.episode_number), (2, 3));
    }

    #[test]
    fn test_deleted_board_has_no_snapshots() {
        let (ranks, snapshots) = engines();
        let board = ranks.create_board("Top").unwrap();
        let snap = snapshots.capture(&board.id, "one", None).unwrap();

        ranks.soft_delete_board(&board.id).unwrap();
        assert!(matches!(snapshots.list(&board.id), Err(CoreError::NotFound(_))));
        assert!(matches!(snapshots.capture(&board.id, "two", None), Err(CoreError::NotFound(_))));
        assert_eq!(snapshots.get(&snap.id).unwrap().label, "one");
    }

    #[test]
    fn test_unknown_board() {
        let (_, snapshots) = engines();
        assert!(matches!(snapshots.capture("nope", "x", None), Err(CoreError::NotFound(_))));
        assert!(matches!(snapshots.list("nope"), Err(CoreError::NotFound(_))));
        assert!(matches!(snapshots.get("nope"), Err(CoreError::NotFound(_))));
    }
}
