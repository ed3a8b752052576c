//! Rank Manager: boards and their densely ranked cards on the local store.
//!
//! Every rank rewrite reads the board's active cards, applies the pure
//! algorithm from `rankboard_core::rank` and writes the result back in a
//! single transaction.

use chrono::Utc;
use rankboard_core::error::{CoreError, Result};
use rankboard_core::rank;
use rankboard_core::types::{Board, Card, CardPatch};

use crate::db::{lock, BoardRepository, CardRepository, SharedRepository, SqliteRepository};

#[derive(Clone)]
pub struct RankManager {
    repo: SharedRepository,
}

fn require_name(name: &str, what: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoreError::Validation(format!("{} name cannot be empty", what)));
    }
    Ok(name.to_string())
}

/// The board, provided it exists and is not soft-deleted.
fn active_board(repo: &SqliteRepository, board_id: &str) -> Result<Board> {
    match repo.get_board(board_id)? {
        Some(board) if !board.is_deleted() => Ok(board),
        _ => Err(CoreError::NotFound(format!("board {}", board_id))),
    }
}

impl RankManager {
    pub fn new(repo: SharedRepository) -> Self {
        Self { repo }
    }

    // === Boards ===

    pub fn create_board(&self, name: &str) -> Result<Board> {
        let board = Board::new(require_name(name, "board")?);
        lock(&self.repo)?.save_board(&board)?;
        tracing::info!(board = %board.id, "board created");
        Ok(board)
    }

    pub fn get_board(&self, board_id: &str) -> Result<Board> {
        let repo = lock(&self.repo)?;
        active_board(&repo, board_id)
    }

    pub fn list_boards(&self) -> Result<Vec<Board>> {
        Ok(lock(&self.repo)?.list_boards()?)
    }

    pub fn rename_board(&self, board_id: &str, name: &str) -> Result<Board> {
        let name = require_name(name, "board")?;
        let repo = lock(&self.repo)?;
        let mut board = active_board(&repo, board_id)?;
        board.name = name;
        board.updated_at = Utc::now();
        repo.save_board(&board)?;
        Ok(board)
    }

    /// Soft-delete a board and every card on it.
    pub fn soft_delete_board(&self, board_id: &str) -> Result<Board> {
        let repo = lock(&self.repo)?;
        let mut board = active_board(&repo, board_id)?;
        let now = Utc::now();
        board.deleted_at = Some(now);
        board.updated_at = now;

        let cards: Vec<Card> = repo
            .get_active_cards(board_id)?
            .into_iter()
            .map(|mut c| {
                c.deleted_at = Some(now);
                c.updated_at = now;
                c
            })
            .collect();
        repo.delete_board_cascade(&board, &cards)?;

        tracing::info!(board = %board_id, cards = cards.len(), "board deleted");
        Ok(board)
    }

    // === Cards ===

    /// Add `card` to the bottom of its board.
    pub fn append(&self, mut card: Card) -> Result<Card> {
        card.name = require_name(&card.name, "card")?;
        let repo = lock(&self.repo)?;
        if !matches!(repo.get_board(&card.board_id)?, Some(b) if !b.is_deleted()) {
            return Err(CoreError::Validation(format!(
                "board {} does not exist",
                card.board_id
            )));
        }

        let active = repo.get_active_cards(&card.board_id)?;
        card.rank = rank::next_rank(&active);
        card.deleted_at = None;
        card.updated_at = Utc::now();
        repo.save_card(&card)?;

        tracing::debug!(card = %card.id, rank = card.rank, "card appended");
        Ok(card)
    }

    /// Active cards of a board in rank order.
    pub fn list(&self, board_id: &str) -> Result<Vec<Card>> {
        let repo = lock(&self.repo)?;
        active_board(&repo, board_id)?;
        let mut cards = repo.get_active_cards(board_id)?;
        rank::sort_by_rank(&mut cards);
        Ok(cards)
    }

    pub fn get_card(&self, card_id: &str) -> Result<Card> {
        lock(&self.repo)?
            .get_card(card_id)?
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| CoreError::NotFound(format!("card {}", card_id)))
    }

    /// Move the card at `from_index` to `to_index` and re-rank the board.
    pub fn reorder(
        &self,
        board_id: &str,
        card_id: &str,
        from_index: usize,
        to_index: usize,
    ) -> Result<Vec<Card>> {
        let repo = lock(&self.repo)?;
        let cards = repo.get_active_cards(board_id)?;
        let reordered = rank::reorder(cards, card_id, from_index, to_index, Utc::now())?;
        repo.save_cards(&reordered)?;

        tracing::debug!(board = %board_id, card = %card_id, from_index, to_index, "card reordered");
        Ok(reordered)
    }

    /// Soft-delete a card and close the gap above it.
    pub fn soft_delete(&self, card_id: &str) -> Result<Card> {
        let repo = lock(&self.repo)?;
        let card = repo
            .get_card(card_id)?
            .ok_or_else(|| CoreError::NotFound(format!("card {}", card_id)))?;
        if card.is_deleted() {
            return Err(CoreError::NotFound(format!("card {} already deleted", card_id)));
        }

        let cards = repo.get_active_cards(&card.board_id)?;
        let (deleted, survivors) = rank::soft_delete(cards, card_id, Utc::now())?;

        let mut writes = survivors;
        writes.push(deleted.clone());
        repo.save_cards(&writes)?;

        tracing::info!(card = %card_id, board = %deleted.board_id, "card deleted");
        Ok(deleted)
    }

    /// Re-derive ranks `1..N` from the current order.
    pub fn compact(&self, board_id: &str) -> Result<Vec<Card>> {
        let repo = lock(&self.repo)?;
        let cards = repo.get_active_cards(board_id)?;
        let compacted = rank::compact(cards, Utc::now());
        repo.save_cards(&compacted)?;
        Ok(compacted)
    }

    /// Apply a field patch. Rank is never touched.
    pub fn edit(&self, card_id: &str, patch: CardPatch) -> Result<Card> {
        let repo = lock(&self.repo)?;
        let mut card = repo
            .get_card(card_id)?
            .filter(|c| !c.is_deleted())
            .ok_or_else(|| CoreError::NotFound(format!("card {}", card_id)))?;

        if let Some(name) = patch.name {
            card.name = require_name(&name, "card")?;
        }
        if let Some(nickname) = patch.nickname {
            card.nickname = Some(nickname).filter(|n| !n.trim().is_empty());
        }
        if let Some(image_key) = patch.image_key {
            card.image_key = Some(image_key);
        }
        if let Some(thumbnail_key) = patch.thumbnail_key {
            card.thumbnail_key = Some(thumbnail_key);
        }
        if let Some(crop) = patch.image_crop {
            card.image_crop = Some(crop);
        }
        if let Some(notes) = patch.notes {
            card.notes = Some(notes);
        }
        if let Some(metadata) = patch.metadata {
            card.metadata = metadata;
        }
        card.updated_at = Utc::now();
        repo.save_card(&card)?;
        Ok(card)
    }

    /// Rename a card.
    pub fn rename(&self, card_id: &str, name: &str) -> Result<Card> {
        self.edit(
            card_id,
            CardPatch {
                name: Some(name.to_string()),
                ..CardPatch::default()
            },
        )
    }
}
