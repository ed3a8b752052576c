//! Repository pattern for database access.

use chrono::{DateTime, Utc};
use rankboard_core::rank;
use rankboard_core::types::{Board, Card, Sharing, Snapshot};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use crate::db::date_utils::{from_db, opt_from_db, opt_to_db, to_db};
use crate::db::error::DbError;

type Result<T> = std::result::Result<T, DbError>;

/// Result of [`SqliteRepository::apply_remote`].
#[derive(Debug, Default)]
pub struct AppliedRemote {
    /// Boards, cards and snapshots written.
    pub written: usize,
    /// Local or remote cards whose rank changed when their board was compacted.
    pub reranked: Vec<Card>,
}

/// Repository for board operations.
pub trait BoardRepository {
    fn get_board(&self, id: &str) -> Result<Option<Board>>;
    /// Boards that are not soft-deleted, oldest first.
    fn list_boards(&self) -> Result<Vec<Board>>;
    /// Every board including soft-deleted ones.
    fn all_boards(&self) -> Result<Vec<Board>>;
    fn save_board(&self, board: &Board) -> Result<()>;
}

/// Repository for card operations.
pub trait CardRepository {
    fn get_card(&self, id: &str) -> Result<Option<Card>>;
    /// Non-deleted cards of a board, in rank order.
    fn get_active_cards(&self, board_id: &str) -> Result<Vec<Card>>;
    /// Every card of a board including soft-deleted ones.
    fn get_all_cards(&self, board_id: &str) -> Result<Vec<Card>>;
    fn save_card(&self, card: &Card) -> Result<()>;
    /// Write all cards in one transaction.
    fn save_cards(&self, cards: &[Card]) -> Result<()>;
}

/// Repository for snapshot operations.
pub trait SnapshotRepository {
    fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>>;
    /// Snapshots of a board ascending by episode number.
    fn get_snapshots(&self, board_id: &str) -> Result<Vec<Snapshot>>;
    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()>;
    fn delete_snapshot(&self, id: &str) -> Result<bool>;
}

/// Device-scoped key/value rows.
pub trait KvRepository {
    fn kv_get(&self, key: &str) -> Result<Option<String>>;
    fn kv_set(&self, key: &str, value: &str) -> Result<()>;
    fn kv_remove(&self, key: &str) -> Result<()>;
}

/// Repository for sync bookkeeping.
pub trait SyncRepository {
    fn get_pushed_hash(&self, collection: &str, entity_id: &str) -> Result<Option<String>>;
    fn record_pushed_hash(
        &self,
        collection: &str,
        entity_id: &str,
        hash: &str,
        pushed_at: &str,
    ) -> Result<()>;
    fn get_sync_state(&self) -> Result<LocalSyncState>;
    fn update_sync_state(&self, last_sync_at: &str, user_id: &str) -> Result<()>;
}

/// Local sync metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LocalSyncState {
    pub last_sync_at: Option<String>,
    pub last_user_id: Option<String>,
}

/// SQLite implementation of repositories.
pub struct SqliteRepository {
    conn: Connection,
}

impl SqliteRepository {
    /// Open database at path, creating if necessary.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    /// Open in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let repo = Self { conn };
        repo.initialize()?;
        Ok(repo)
    }

    fn initialize(&self) -> Result<()> {
        self.conn.execute_batch(super::schema::SCHEMA)?;
        self.conn.execute_batch(super::schema::INIT_SYNC_STATE)?;
        self.conn.execute(
            "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
            params![super::schema::SCHEMA_VERSION],
        )?;
        Ok(())
    }

    /// Run `f` inside one transaction; any error rolls everything back.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Self) -> Result<T>,
    {
        let tx = self.conn.unchecked_transaction()?;
        let out = f(self)?;
        tx.commit()?;
        Ok(out)
    }

    /// Soft-delete a board together with its cards.
    pub fn delete_board_cascade(&self, board: &Board, cards: &[Card]) -> Result<()> {
        self.transaction(|repo| {
            repo.write_board(board)?;
            for card in cards {
                repo.write_card(card)?;
            }
            Ok(())
        })
    }

    /// Write entities received from the shared store in one transaction.
    ///
    /// Every board that received cards is compacted in the same transaction,
    /// so remote ranks colliding with local ones never leave duplicates.
    pub fn apply_remote(
        &self,
        boards: &[Board],
        cards: &[Card],
        snapshots: &[Snapshot],
        now: DateTime<Utc>,
    ) -> Result<AppliedRemote> {
        self.transaction(|repo| {
            for board in boards {
                repo.write_board(board)?;
            }
            for card in cards {
                repo.write_card(card)?;
            }
            for snapshot in snapshots {
                repo.write_snapshot(snapshot)?;
            }

            let touched: BTreeSet<&str> = cards.iter().map(|c| c.board_id.as_str()).collect();
            let mut reranked = Vec::new();
            for board_id in touched {
                let active = repo.get_active_cards(board_id)?;
                let before: HashMap<String, u32> =
                    active.iter().map(|c| (c.id.clone(), c.rank)).collect();
                for card in rank::compact(active, now) {
                    if before.get(&card.id) != Some(&card.rank) {
                        repo.write_card(&card)?;
                        reranked.push(card);
                    }
                }
            }

            Ok(AppliedRemote {
                written: boards.len() + cards.len() + snapshots.len(),
                reranked,
            })
        })
    }

    fn write_board(&self, board: &Board) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO boards (id, name, cover_image, created_at, updated_at,
                 deleted_at, owner_id, sharing, synced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                board.id,
                board.name,
                board.cover_image,
                to_db(&board.created_at),
                to_db(&board.updated_at),
                opt_to_db(&board.deleted_at),
                board.owner_id,
                board.sharing.map(sharing_to_db),
                opt_to_db(&board.synced_at),
            ],
        )?;
        Ok(())
    }

    fn write_card(&self, card: &Card) -> Result<()> {
        let crop = card.image_crop.as_ref().map(serde_json::to_string).transpose()?;
        let metadata = serde_json::to_string(&card.metadata)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO cards (id, board_id, name, nickname, image_key, thumbnail_key,
                 image_crop, notes, metadata, rank, created_at, updated_at, deleted_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                card.id,
                card.board_id,
                card.name,
                card.nickname,
                card.image_key,
                card.thumbnail_key,
                crop,
                card.notes,
                metadata,
                card.rank,
                to_db(&card.created_at),
                to_db(&card.updated_at),
                opt_to_db(&card.deleted_at),
            ],
        )?;
        Ok(())
    }

    fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let rankings = serde_json::to_string(&snapshot.rankings)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO snapshots
                 (id, board_id, episode_number, label, notes, rankings, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                snapshot.id,
                snapshot.board_id,
                snapshot.episode_number,
                snapshot.label,
                snapshot.notes,
                rankings,
                to_db(&snapshot.created_at),
            ],
        )?;
        Ok(())
    }

    fn row_to_board(row: &Row) -> rusqlite::Result<Board> {
        Ok(Board {
            id: row.get(0)?,
            name: row.get(1)?,
            cover_image: row.get(2)?,
            created_at: from_db(3, &row.get::<_, String>(3)?)?,
            updated_at: from_db(4, &row.get::<_, String>(4)?)?,
            deleted_at: opt_from_db(5, row.get(5)?)?,
            owner_id: row.get(6)?,
            sharing: row.get::<_, Option<String>>(7)?.map(|s| sharing_from_db(&s)),
            synced_at: opt_from_db(8, row.get(8)?)?,
        })
    }

    fn row_to_card(row: &Row) -> rusqlite::Result<Card> {
        let crop: Option<String> = row.get(6)?;
        Ok(Card {
            id: row.get(0)?,
            board_id: row.get(1)?,
            name: row.get(2)?,
            nickname: row.get(3)?,
            image_key: row.get(4)?,
            thumbnail_key: row.get(5)?,
            image_crop: crop.map(|s| json_column(6, &s)).transpose()?,
            notes: row.get(7)?,
            metadata: json_column(8, &row.get::<_, String>(8)?)?,
            rank: row.get(9)?,
            created_at: from_db(10, &row.get::<_, String>(10)?)?,
            updated_at: from_db(11, &row.get::<_, String>(11)?)?,
            deleted_at: opt_from_db(12, row.get(12)?)?,
        })
    }

    fn row_to_snapshot(row: &Row) -> rusqlite::Result<Snapshot> {
        Ok(Snapshot {
            id: row.get(0)?,
            board_id: row.get(1)?,
            episode_number: row.get(2)?,
            label: row.get(3)?,
            notes: row.get(4)?,
            rankings: json_column(5, &row.get::<_, String>(5)?)?,
            created_at: from_db(6, &row.get::<_, String>(6)?)?,
        })
    }
}

const BOARD_COLUMNS: &str =
    "id, name, cover_image, created_at, updated_at, deleted_at, owner_id, sharing, synced_at";
const CARD_COLUMNS: &str = "id, board_id, name, nickname, image_key, thumbnail_key, image_crop, \
     notes, metadata, rank, created_at, updated_at, deleted_at";
const SNAPSHOT_COLUMNS: &str = "id, board_id, episode_number, label, notes, rankings, created_at";

fn sharing_to_db(sharing: Sharing) -> &'static str {
    match sharing {
        Sharing::Private => "private",
        Sharing::Friends => "friends",
        Sharing::Public => "public",
    }
}

fn sharing_from_db(s: &str) -> Sharing {
    match s {
        "friends" => Sharing::Friends,
        "public" => Sharing::Public,
        _ => Sharing::Private,
    }
}

fn json_column<T: DeserializeOwned>(idx: usize, s: &str) -> rusqlite::Result<T> {
    serde_json::from_str(s)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

impl BoardRepository for SqliteRepository {
    fn get_board(&self, id: &str) -> Result<Option<Board>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM boards WHERE id = ?1", BOARD_COLUMNS),
                params![id],
                Self::row_to_board,
            )
            .optional()
            .map_err(Into::into)
    }

    fn list_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM boards WHERE deleted_at IS NULL ORDER BY created_at, id",
            BOARD_COLUMNS
        ))?;
        let boards = stmt
            .query_map([], Self::row_to_board)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(boards)
    }

    fn all_boards(&self) -> Result<Vec<Board>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {} FROM boards ORDER BY created_at, id", BOARD_COLUMNS))?;
        let boards = stmt
            .query_map([], Self::row_to_board)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(boards)
    }

    fn save_board(&self, board: &Board) -> Result<()> {
        self.write_board(board)
    }
}

impl CardRepository for SqliteRepository {
    fn get_card(&self, id: &str) -> Result<Option<Card>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM cards WHERE id = ?1", CARD_COLUMNS),
                params![id],
                Self::row_to_card,
            )
            .optional()
            .map_err(Into::into)
    }

    fn get_active_cards(&self, board_id: &str) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM cards WHERE board_id = ?1 AND deleted_at IS NULL
             ORDER BY rank, created_at, id",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map(params![board_id], Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    fn get_all_cards(&self, board_id: &str) -> Result<Vec<Card>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM cards WHERE board_id = ?1 ORDER BY created_at, id",
            CARD_COLUMNS
        ))?;
        let cards = stmt
            .query_map(params![board_id], Self::row_to_card)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(cards)
    }

    fn save_card(&self, card: &Card) -> Result<()> {
        self.write_card(card)
    }

    fn save_cards(&self, cards: &[Card]) -> Result<()> {
        self.transaction(|repo| {
            for card in cards {
                repo.write_card(card)?;
            }
            Ok(())
        })
    }
}

impl SnapshotRepository for SqliteRepository {
    fn get_snapshot(&self, id: &str) -> Result<Option<Snapshot>> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM snapshots WHERE id = ?1", SNAPSHOT_COLUMNS),
                params![id],
                Self::row_to_snapshot,
            )
            .optional()
            .map_err(Into::into)
    }

    fn get_snapshots(&self, board_id: &str) -> Result<Vec<Snapshot>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM snapshots WHERE board_id = ?1 ORDER BY episode_number, id",
            SNAPSHOT_COLUMNS
        ))?;
        let snapshots = stmt
            .query_map(params![board_id], Self::row_to_snapshot)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(snapshots)
    }

    fn save_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.write_snapshot(snapshot)
    }

    fn delete_snapshot(&self, id: &str) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM snapshots WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }
}

impl KvRepository for SqliteRepository {
    fn kv_get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()
            .map_err(Into::into)
    }

    fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    fn kv_remove(&self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

impl SyncRepository for SqliteRepository {
    fn get_pushed_hash(&self, collection: &str, entity_id: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT content_hash FROM sync_ledger WHERE collection = ?1 AND entity_id = ?2",
                params![collection, entity_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(Into::into)
    }

    fn record_pushed_hash(
        &self,
        collection: &str,
        entity_id: &str,
        hash: &str,
        pushed_at: &str,
    ) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO sync_ledger (collection, entity_id, content_hash, pushed_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![collection, entity_id, hash, pushed_at],
        )?;
        Ok(())
    }

    fn get_sync_state(&self) -> Result<LocalSyncState> {
        self.conn
            .query_row(
                "SELECT last_sync_at, last_user_id FROM sync_state WHERE id = 1",
                [],
                |row| {
                    Ok(LocalSyncState {
                        last_sync_at: row.get(0)?,
                        last_user_id: row.get(1)?,
                    })
                },
            )
            .map_err(Into::into)
    }

    fn update_sync_state(&self, last_sync_at: &str, user_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE sync_state SET last_sync_at = ?1, last_user_id = ?2 WHERE id = 1",
            params![last_sync_at, user_id],
        )?;
        Ok(())
    }
}
