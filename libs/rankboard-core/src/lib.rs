//! Core rankboard library shared by the device app and the backend.
//!
//! Provides:
//! - Shared types (Board, Card, Snapshot, Friendship, Report, ...)
//! - Dense rank maintenance and snapshot value capture
//! - Local/remote merge policy
//! - The document store, key-value and identity seams
//! - Rate limiting, report guard and friendship state machine

pub mod error;
pub mod identity;
pub mod merge;
pub mod rank;
pub mod snapshot;
pub mod social;
pub mod store;
pub mod types;

pub use error::{CoreError, ErrorKind, Outcome, OutcomeError, Result};
pub use identity::{
    IdentityProvider, KeyValueStore, MemoryKeyValueStore, StaticIdentity, StoredIdentity,
    CURRENT_USER_KEY, DEVICE_ID_KEY,
};
pub use merge::{merge_entity, merge_list, merge_list_with, Identified, LocalWins, MergePolicy};
pub use social::{
    generate_friendship_id, ActionKind, RateLimit, RateLimitConfig, RateLimitStatus, SocialGuard,
};
pub use store::{
    Collection, DocumentStore, DocumentStoreExt, Filter, FilterOp, FilterValue,
    MemoryDocumentStore, Query, StoreError, StoreResult,
};
pub use types::{
    new_id, Board, Card, CardPatch, Friendship, FriendshipStatus, ImageCrop, RankingEntry, Report,
    ReportReason, ReportStatus, ReportTarget, Sharing, Snapshot, UserProfile,
};
