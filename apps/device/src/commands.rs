//! Commands exposed to the UI layer.
//!
//! Each command folds its result into an [`Outcome`] so callers receive a
//! tagged `{success, value | error}` body instead of a Rust error.

use rankboard_core::error::{CoreError, Outcome, Result};
use rankboard_core::types::{
    Board, Card, CardPatch, Friendship, Report, ReportReason, ReportTarget, Snapshot,
};

use crate::state::AppState;
use crate::sync::SyncStats;

fn signed_in(state: &AppState) -> Result<String> {
    state.current_user_id().ok_or(CoreError::NotSignedIn)
}

// === Boards ===

pub async fn create_board(state: &AppState, name: &str) -> Outcome<Board> {
    state.create_board(name).await.into()
}

pub fn list_boards(state: &AppState) -> Outcome<Vec<Board>> {
    state.ranks().list_boards().into()
}

pub fn rename_board(state: &AppState, board_id: &str, name: &str) -> Outcome<Board> {
    state.ranks().rename_board(board_id, name).into()
}

pub fn delete_board(state: &AppState, board_id: &str) -> Outcome<Board> {
    state.ranks().soft_delete_board(board_id).into()
}

// === Cards ===

pub fn list_cards(state: &AppState, board_id: &str) -> Outcome<Vec<Card>> {
    state.ranks().list(board_id).into()
}

/// Add a card with `name` to the bottom of the board.
pub fn add_card(state: &AppState, board_id: &str, name: &str) -> Outcome<Card> {
    state.ranks().append(Card::new(board_id, name)).into()
}

pub fn edit_card(state: &AppState, card_id: &str, patch: CardPatch) -> Outcome<Card> {
    state.ranks().edit(card_id, patch).into()
}

pub fn reorder_card(
    state: &AppState,
    board_id: &str,
    card_id: &str,
    from_index: usize,
    to_index: usize,
) -> Outcome<Vec<Card>> {
    state
        .ranks()
        .reorder(board_id, card_id, from_index, to_index)
        .into()
}

pub fn delete_card(state: &AppState, card_id: &str) -> Outcome<Card> {
    state.ranks().soft_delete(card_id).into()
}

// === Snapshots ===

pub fn capture_snapshot(
    state: &AppState,
    board_id: &str,
    label: &str,
    notes: Option<String>,
) -> Outcome<Snapshot> {
    state.snapshots().capture(board_id, label, notes).into()
}

pub fn list_snapshots(state: &AppState, board_id: &str) -> Outcome<Vec<Snapshot>> {
    state
        .snapshots()
        .list(board_id)
        .map(|snapshots| snapshots.collect::<Vec<_>>())
        .into()
}

pub fn delete_snapshot(state: &AppState, snapshot_id: &str) -> Outcome<()> {
    state.snapshots().remove(snapshot_id).into()
}

// === Social ===

async fn friend_request(state: &AppState, to: &str) -> Result<Friendship> {
    let uid = signed_in(state)?;
    state.social()?.create_friend_request(&uid, to).await
}

pub async fn send_friend_request(state: &AppState, to: &str) -> Outcome<Friendship> {
    friend_request(state, to).await.into()
}

async fn file_report(
    state: &AppState,
    target_type: ReportTarget,
    target_id: &str,
    reason: ReportReason,
    details: &str,
) -> Result<Report> {
    let uid = signed_in(state)?;
    state
        .social()?
        .create_report(&uid, target_type, target_id, reason, details)
        .await
}

pub async fn report(
    state: &AppState,
    target_type: ReportTarget,
    target_id: &str,
    reason: ReportReason,
    details: &str,
) -> Outcome<Report> {
    file_report(state, target_type, target_id, reason, details)
        .await
        .into()
}

// === Sync ===

pub async fn sync_now(state: &AppState) -> Outcome<SyncStats> {
    state.sync_now().await.map_err(CoreError::from).into()
}
