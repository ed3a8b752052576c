//! Value capture of a board ranking into an immutable snapshot.

use chrono::{DateTime, Utc};

use crate::rank::sort_by_rank;
use crate::types::{new_id, Card, RankingEntry, Snapshot};

/// Episode number for the next snapshot of a board.
///
/// Gaps left by removed snapshots are not reused.
pub fn next_episode_number(existing: &[Snapshot]) -> u32 {
    existing
        .iter()
        .map(|s| s.episode_number)
        .max()
        .unwrap_or(0)
        + 1
}

/// Copy the active cards into ranking entries, ordered by rank.
pub fn capture_rankings(cards: &[Card]) -> Vec<RankingEntry> {
    let mut active: Vec<Card> = cards.iter().filter(|c| !c.is_deleted()).cloned().collect();
    sort_by_rank(&mut active);
    active
        .into_iter()
        .map(|c| RankingEntry {
            card_id: c.id,
            card_name: c.name,
            rank: c.rank,
            thumbnail_key: c.thumbnail_key,
        })
        .collect()
}

/// Build a new snapshot for `board_id`.
pub fn build_snapshot(
    board_id: &str,
    label: impl Into<String>,
    notes: Option<String>,
    cards: &[Card],
    existing: &[Snapshot],
    now: DateTime<Utc>,
) -> Snapshot {
    Snapshot {
        id: new_id(),
        board_id: board_id.to_string(),
        episode_number: next_episode_number(existing),
        label: label.into(),
        notes,
        rankings: capture_rankings(cards),
        created_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn card(id: &str, rank: u32) -> Card {
        let mut c = Card::new("b1", format!("name-{}", id));
        c.id = id.to_string();
        c.rank = rank;
        c
    }

    #[test]
    fn test_capture_orders_by_rank_and_skips_deleted() {
        let mut gone = card("x", 1);
        gone.deleted_at = Some(Utc::now());
        let cards = vec![card("b", 2), gone, card("a", 1)];
        let entries = capture_rankings(&cards);
        let ids: Vec<&str> = entries.iter().map(|e| e.card_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[test]
    fn test_entries_are_copies() {
        let mut cards = vec![card("a", 1)];
        let snap = build_snapshot("b1", "Week 1", None, &cards, &[], Utc::now());
        cards[0].name = "renamed".to_string();
        assert_eq!(snap.rankings[0].card_name, "name-a");
    }

    #[test]
    fn test_episode_numbers_skip_gaps() {
        let cards = vec![card("a", 1)];
        let first = build_snapshot("b1", "one", None, &cards, &[], Utc::now());
        let second = build_snapshot("b1", "two", None, &cards, &[first.clone()], Utc::now());
        assert_eq!(first.episode_number, 1);
        assert_eq!(second.episode_number, 2);
        assert_eq!(first.rankings, second.rankings);

        // removing episode 1 does not free its number
        let third = build_snapshot("b1", "three", None, &cards, &[second], Utc::now());
        assert_eq!(third.episode_number, 3);
    }
}
