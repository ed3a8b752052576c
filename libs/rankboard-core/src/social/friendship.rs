//! Friendship state machine: none -> pending -> active, back to none by
//! decline, unfriend or block. Documents are deleted rather than tombstoned.

use chrono::{DateTime, Utc};

use super::rate_limit::ActionKind;
use super::SocialGuard;
use crate::error::{CoreError, Result};
use crate::store::{Collection, DocumentStore, DocumentStoreExt, Query};
use crate::types::{Friendship, FriendshipStatus, UserProfile};

pub const FRIENDSHIP_ID_SEPARATOR: &str = "_";

/// The two user ids in lexicographic order.
pub fn sorted_pair(a: &str, b: &str) -> [String; 2] {
    if a <= b {
        [a.to_string(), b.to_string()]
    } else {
        [b.to_string(), a.to_string()]
    }
}

/// Deterministic, symmetric document id for a user pair.
pub fn generate_friendship_id(a: &str, b: &str) -> String {
    sorted_pair(a, b).join(FRIENDSHIP_ID_SEPARATOR)
}

fn require_user(uid: &str) -> Result<()> {
    if uid.trim().is_empty() {
        Err(CoreError::NotSignedIn)
    } else {
        Ok(())
    }
}

impl<S: DocumentStore + ?Sized> SocialGuard<S> {
    /// Send a friend request from `from` to `to`.
    ///
    /// Re-sending after a lost response yields "already pending" instead of a
    /// second document, since the id is derived from the pair.
    pub async fn create_friend_request(&self, from: &str, to: &str) -> Result<Friendship> {
        self.create_friend_request_at(from, to, Utc::now()).await
    }

    pub async fn create_friend_request_at(
        &self,
        from: &str,
        to: &str,
        now: DateTime<Utc>,
    ) -> Result<Friendship> {
        require_user(from)?;
        if to.trim().is_empty() {
            return Err(CoreError::Validation("missing recipient".to_string()));
        }
        if from == to {
            return Err(CoreError::Validation(
                "cannot send a friend request to yourself".to_string(),
            ));
        }

        let id = generate_friendship_id(from, to);
        if let Some(existing) = self
            .store
            .get_doc::<Friendship>(Collection::Friendships, &id)
            .await?
        {
            return Err(match existing.status {
                FriendshipStatus::Active => CoreError::AlreadyExists("already friends".to_string()),
                FriendshipStatus::Pending => {
                    CoreError::AlreadyExists("friend request already pending".to_string())
                }
            });
        }

        self.enforce(from, ActionKind::FriendRequests, now).await?;

        let friendship = Friendship {
            id: id.clone(),
            users: sorted_pair(from, to),
            status: FriendshipStatus::Pending,
            requested_by: from.to_string(),
            created_at: now,
            accepted_at: None,
        };
        self.store
            .put_doc(Collection::Friendships, &id, &friendship)
            .await?;

        tracing::info!(friendship = %id, requested_by = from, "friend request created");
        Ok(friendship)
    }

    /// Accept a pending request. Accepting an already active friendship
    /// returns it unchanged.
    pub async fn accept_friend_request(&self, id: &str, accepting_uid: &str) -> Result<Friendship> {
        require_user(accepting_uid)?;
        let mut friendship = self.load_friendship(id).await?;

        if friendship.requested_by == accepting_uid {
            return Err(CoreError::Permission(
                "cannot accept your own friend request".to_string(),
            ));
        }
        if !friendship.involves(accepting_uid) {
            return Err(CoreError::Permission(
                "not a participant of this friend request".to_string(),
            ));
        }
        if friendship.status == FriendshipStatus::Active {
            return Ok(friendship);
        }

        friendship.status = FriendshipStatus::Active;
        friendship.accepted_at = Some(Utc::now());
        self.store
            .put_doc(Collection::Friendships, id, &friendship)
            .await?;

        tracing::info!(friendship = %id, "friend request accepted");
        Ok(friendship)
    }

    /// Decline (or, for the requester, withdraw) a pending request.
    pub async fn decline_friend_request(&self, id: &str, declining_uid: &str) -> Result<()> {
        require_user(declining_uid)?;
        let friendship = self.load_friendship(id).await?;

        if !friendship.involves(declining_uid) {
            return Err(CoreError::Permission(
                "not a participant of this friend request".to_string(),
            ));
        }
        if friendship.status != FriendshipStatus::Pending {
            return Err(CoreError::Validation("friend request is not pending".to_string()));
        }

        self.store.delete(Collection::Friendships, id).await?;
        tracing::info!(friendship = %id, "friend request declined");
        Ok(())
    }

    /// Remove the friendship between `uid` and `peer_uid`, whatever its status.
    pub async fn unfriend(&self, uid: &str, peer_uid: &str) -> Result<()> {
        require_user(uid)?;
        let id = generate_friendship_id(uid, peer_uid);
        if !self.store.delete(Collection::Friendships, &id).await? {
            return Err(CoreError::NotFound(format!("friendship {}", id)));
        }
        tracing::info!(friendship = %id, "friendship removed");
        Ok(())
    }

    /// Add `target` to `uid`'s blocked set and drop any friendship between
    /// them. Only the blocker's profile changes; the target can still send
    /// new requests.
    pub async fn block_user(&self, uid: &str, target: &str) -> Result<UserProfile> {
        require_user(uid)?;
        if uid == target {
            return Err(CoreError::Validation("cannot block yourself".to_string()));
        }

        let mut profile = self.load_profile(uid).await?;
        if !profile.blocked_users.iter().any(|b| b == target) {
            profile.blocked_users.push(target.to_string());
        }
        profile.updated_at = Utc::now();
        self.store.put_doc(Collection::Users, uid, &profile).await?;

        let id = generate_friendship_id(uid, target);
        self.store.delete(Collection::Friendships, &id).await?;

        tracing::info!(user = uid, blocked = target, "user blocked");
        Ok(profile)
    }

    pub async fn unblock_user(&self, uid: &str, target: &str) -> Result<UserProfile> {
        require_user(uid)?;
        let mut profile = self.load_profile(uid).await?;
        let before = profile.blocked_users.len();
        profile.blocked_users.retain(|b| b != target);

        if profile.blocked_users.len() != before {
            profile.updated_at = Utc::now();
            self.store.put_doc(Collection::Users, uid, &profile).await?;
        }
        Ok(profile)
    }

    pub async fn is_blocked(&self, uid: &str, target: &str) -> Result<bool> {
        let profile = self.load_profile(uid).await?;
        Ok(profile.blocked_users.iter().any(|b| b == target))
    }

    /// Status of the pair, `None` when no document exists.
    pub async fn friendship_status(&self, a: &str, b: &str) -> Result<Option<FriendshipStatus>> {
        let id = generate_friendship_id(a, b);
        Ok(self
            .store
            .get_doc::<Friendship>(Collection::Friendships, &id)
            .await?
            .map(|f| f.status))
    }

    pub async fn list_friends(&self, uid: &str) -> Result<Vec<Friendship>> {
        let query = Query::new().contains("users", uid).eq("status", "active");
        self.store.query_docs(Collection::Friendships, &query).await
    }

    /// Pending requests addressed to `uid`.
    pub async fn list_incoming_requests(&self, uid: &str) -> Result<Vec<Friendship>> {
        let query = Query::new().contains("users", uid).eq("status", "pending");
        let pending: Vec<Friendship> =
            self.store.query_docs(Collection::Friendships, &query).await?;
        Ok(pending.into_iter().filter(|f| f.requested_by != uid).collect())
    }

    /// Pending requests sent by `uid`.
    pub async fn list_outgoing_requests(&self, uid: &str) -> Result<Vec<Friendship>> {
        let query = Query::new().eq("requestedBy", uid).eq("status", "pending");
        self.store.query_docs(Collection::Friendships, &query).await
    }

    async fn load_friendship(&self, id: &str) -> Result<Friendship> {
        self.store
            .get_doc::<Friendship>(Collection::Friendships, id)
            .await?
            .ok_or_else(|| CoreError::NotFound(format!("friendship {}", id)))
    }

    async fn load_profile(&self, uid: &str) -> Result<UserProfile> {
        Ok(self
            .store
            .get_doc::<UserProfile>(Collection::Users, uid)
            .await?
            .unwrap_or_else(|| UserProfile::new(uid)))
    }
}
