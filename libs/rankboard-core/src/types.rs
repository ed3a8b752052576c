//! Core types for the rankboard engine.
//!
//! Serialized field names are camelCase; any storage binding must keep them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Generate a fresh entity id.
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Visibility of a synced board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sharing {
    Private,
    Friends,
    Public,
}

impl Default for Sharing {
    fn default() -> Self {
        Self::Private
    }
}

/// A named, ordered collection of ranked cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cover_image: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sharing: Option<Sharing>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl Board {
    /// Create a device-owned board that has never been synced.
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            name: name.into(),
            cover_image: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
            owner_id: None,
            sharing: None,
            synced_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Crop rectangle applied to a card image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageCrop {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub zoom: f64,
}

/// A ranked item belonging to exactly one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    pub id: String,
    pub board_id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_crop: Option<ImageCrop>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Dense 1-based position; 0 until the card is appended to its board.
    pub rank: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Card {
    /// Create an unranked card for a board.
    pub fn new(board_id: impl Into<String>, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: new_id(),
            board_id: board_id.into(),
            name: name.into(),
            nickname: None,
            image_key: None,
            thumbnail_key: None,
            image_crop: None,
            notes: None,
            metadata: BTreeMap::new(),
            rank: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

/// Editable card fields. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPatch {
    pub name: Option<String>,
    pub nickname: Option<String>,
    pub image_key: Option<String>,
    pub thumbnail_key: Option<String>,
    pub image_crop: Option<ImageCrop>,
    pub notes: Option<String>,
    pub metadata: Option<BTreeMap<String, String>>,
}

/// Value copy of one card at snapshot time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankingEntry {
    pub card_id: String,
    pub card_name: String,
    pub rank: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_key: Option<String>,
}

/// Immutable, episode-numbered capture of a board's ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub board_id: String,
    pub episode_number: u32,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub rankings: Vec<RankingEntry>,
    pub created_at: DateTime<Utc>,
}

/// Friendship lifecycle status. Absence of a document means "none".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FriendshipStatus {
    Pending,
    Active,
}

/// Symmetric relationship record keyed by a deterministic id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Friendship {
    pub id: String,
    pub users: [String; 2],
    pub status: FriendshipStatus,
    pub requested_by: String,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
}

impl Friendship {
    pub fn involves(&self, uid: &str) -> bool {
        self.users.iter().any(|u| u == uid)
    }

    /// The member of the pair that is not `uid`.
    pub fn other(&self, uid: &str) -> Option<&str> {
        if self.users[0] == uid {
            Some(&self.users[1])
        } else if self.users[1] == uid {
            Some(&self.users[0])
        } else {
            None
        }
    }
}

/// What a report points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportTarget {
    User,
    Board,
}

impl ReportTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Board => "board",
        }
    }
}

/// Enumerated report reasons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Harassment,
    Inappropriate,
    Impersonation,
    Other,
}

/// Moderation status; only moderation tooling moves it past `Pending`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Dismissed,
}

impl Default for ReportStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Moderation request against a user or board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub reporter_id: String,
    pub target_type: ReportTarget,
    pub target_id: String,
    pub reason: ReportReason,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub status: ReportStatus,
    pub created_at: DateTime<Utc>,
}

/// Per-user social state held in the shared store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub blocked_users: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            blocked_users: Vec::new(),
            updated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_card_serializes_camel_case() {
        let mut card = Card::new("b1", "Alpha");
        card.thumbnail_key = Some("thumb/a".to_string());
        card.rank = 1;
        let json = serde_json::to_value(&card).unwrap();
        assert_eq!(json["boardId"], "b1");
        assert_eq!(json["thumbnailKey"], "thumb/a");
        assert!(json.get("deletedAt").is_none());
    }

    #[test]
    fn test_friendship_other() {
        let f = Friendship {
            id: "a_b".to_string(),
            users: ["a".to_string(), "b".to_string()],
            status: FriendshipStatus::Pending,
            requested_by: "a".to_string(),
            created_at: Utc::now(),
            accepted_at: None,
        };
        assert_eq!(f.other("a"), Some("b"));
        assert_eq!(f.other("b"), Some("a"));
        assert_eq!(f.other("c"), None);
        assert!(f.involves("b"));
    }

    #[test]
    fn test_report_enums_wire_names() {
        assert_eq!(serde_json::to_value(ReportTarget::Board).unwrap(), "board");
        assert_eq!(serde_json::to_value(ReportReason::Harassment).unwrap(), "harassment");
        assert_eq!(serde_json::to_value(FriendshipStatus::Active).unwrap(), "active");
    }
}
