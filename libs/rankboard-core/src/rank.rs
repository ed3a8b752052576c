//! Dense rank maintenance for the cards of one board.
//!
//! Every function here is pure: it takes the board's active cards and returns
//! the rewritten list. Persisting the result as one unit is the caller's job.

use chrono::{DateTime, Utc};

use crate::error::{CoreError, Result};
use crate::types::Card;

/// Sort cards by rank, breaking ties by creation time and then id.
pub fn sort_by_rank(cards: &mut [Card]) {
    cards.sort_by(|a, b| {
        a.rank
            .cmp(&b.rank)
            .then_with(|| a.created_at.cmp(&b.created_at))
            .then_with(|| a.id.cmp(&b.id))
    });
}

/// Rank the next appended card receives.
pub fn next_rank(cards: &[Card]) -> u32 {
    cards
        .iter()
        .filter(|c| !c.is_deleted())
        .map(|c| c.rank)
        .max()
        .unwrap_or(0)
        + 1
}

/// True when the non-deleted ranks are exactly `1..=N`.
pub fn is_dense(cards: &[Card]) -> bool {
    let mut ranks: Vec<u32> = cards
        .iter()
        .filter(|c| !c.is_deleted())
        .map(|c| c.rank)
        .collect();
    ranks.sort_unstable();
    ranks.iter().enumerate().all(|(i, &r)| r as usize == i + 1)
}

/// Assign ranks `1..=N` from list position, touching `updated_at` only on
/// cards whose rank actually moved.
fn assign_positions(cards: &mut [Card], now: DateTime<Utc>) {
    for (idx, card) in cards.iter_mut().enumerate() {
        let rank = idx as u32 + 1;
        if card.rank != rank {
            card.rank = rank;
            card.updated_at = now;
        }
    }
}

/// Move the card at `from` to `to` and re-derive ranks from the new order.
///
/// `cards` must be the board's active cards; they are sorted by rank first.
pub fn reorder(
    mut cards: Vec<Card>,
    card_id: &str,
    from: usize,
    to: usize,
    now: DateTime<Utc>,
) -> Result<Vec<Card>> {
    sort_by_rank(&mut cards);
    let n = cards.len();

    if from >= n || to >= n {
        return Err(CoreError::OutOfRange(format!(
            "indices {} -> {} outside board of {} cards",
            from, to, n
        )));
    }
    if cards[from].id != card_id {
        return Err(CoreError::OutOfRange(format!(
            "card {} is not at index {}",
            card_id, from
        )));
    }

    let moved = cards.remove(from);
    cards.insert(to, moved);
    assign_positions(&mut cards, now);
    Ok(cards)
}

/// Soft-delete `card_id` and close the gap it leaves.
///
/// Returns the deleted card (rank unchanged, `deleted_at` set) and the
/// survivors in rank order.
pub fn soft_delete(
    cards: Vec<Card>,
    card_id: &str,
    now: DateTime<Utc>,
) -> Result<(Card, Vec<Card>)> {
    let (mut removed, mut survivors): (Vec<Card>, Vec<Card>) =
        cards.into_iter().partition(|c| c.id == card_id);

    let mut deleted = removed
        .pop()
        .ok_or_else(|| CoreError::NotFound(format!("card {}", card_id)))?;
    if deleted.is_deleted() {
        return Err(CoreError::NotFound(format!("card {} already deleted", card_id)));
    }

    let prior_rank = deleted.rank;
    deleted.deleted_at = Some(now);
    deleted.updated_at = now;

    for card in survivors.iter_mut() {
        if card.rank > prior_rank {
            card.rank -= 1;
            card.updated_at = now;
        }
    }
    sort_by_rank(&mut survivors);
    Ok((deleted, survivors))
}

/// Re-derive `1..=N` from the existing rank order.
pub fn compact(mut cards: Vec<Card>, now: DateTime<Utc>) -> Vec<Card> {
    cards.retain(|c| !c.is_deleted());
    sort_by_rank(&mut cards);
    assign_positions(&mut cards, now);
    cards
}
