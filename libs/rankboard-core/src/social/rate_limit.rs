//! Sliding-window rate limits counted from the backing collections.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::SocialGuard;
use crate::error::{CoreError, Result};
use crate::store::{Collection, DocumentStore, DocumentStoreExt, Query};

/// One day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Action kinds with a per-user ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    FriendRequests,
    Reports,
    Boards,
}

impl ActionKind {
    /// Collection the action writes to.
    pub fn collection(&self) -> Collection {
        match self {
            Self::FriendRequests => Collection::Friendships,
            Self::Reports => Collection::Reports,
            Self::Boards => Collection::Boards,
        }
    }

    /// Field holding the acting user in that collection.
    pub fn owner_field(&self) -> &'static str {
        match self {
            Self::FriendRequests => "requestedBy",
            Self::Reports => "reporterId",
            Self::Boards => "ownerId",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::FriendRequests => "friend requests",
            Self::Reports => "reports",
            Self::Boards => "boards",
        }
    }
}

/// Ceiling of `count` actions per trailing `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimit {
    pub count: u32,
    pub window_ms: i64,
}

impl RateLimit {
    pub const fn per_day(count: u32) -> Self {
        Self {
            count,
            window_ms: DAY_MS,
        }
    }
}

/// Limits per action kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    pub friend_requests: RateLimit,
    pub reports: RateLimit,
    pub boards: RateLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            friend_requests: RateLimit::per_day(20),
            reports: RateLimit::per_day(10),
            boards: RateLimit::per_day(50),
        }
    }
}

impl RateLimitConfig {
    pub fn limit_for(&self, kind: ActionKind) -> RateLimit {
        match kind {
            ActionKind::FriendRequests => self.friend_requests,
            ActionKind::Reports => self.reports,
            ActionKind::Boards => self.boards,
        }
    }
}

/// Result of a limit check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitStatus {
    pub allowed: bool,
    pub remaining: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

fn describe_window(window_ms: i64) -> String {
    if window_ms == DAY_MS {
        "day".to_string()
    } else if window_ms == 3_600_000 {
        "hour".to_string()
    } else if window_ms % 3_600_000 == 0 {
        format!("{} hours", window_ms / 3_600_000)
    } else {
        format!("{} minutes", (window_ms / 60_000).max(1))
    }
}

impl<S: DocumentStore + ?Sized> SocialGuard<S> {
    /// Check whether `user_id` may perform another `kind` action now.
    pub async fn check(&self, user_id: Option<&str>, kind: ActionKind) -> Result<RateLimitStatus> {
        self.check_at(user_id, kind, Utc::now()).await
    }

    /// [`check`](Self::check) against an explicit clock reading.
    pub async fn check_at(
        &self,
        user_id: Option<&str>,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> Result<RateLimitStatus> {
        let uid = user_id.filter(|u| !u.is_empty()).ok_or(CoreError::NotSignedIn)?;
        let limit = self.limits.limit_for(kind);
        let since = now - Duration::milliseconds(limit.window_ms);

        let query = Query::new()
            .eq(kind.owner_field(), uid)
            .since("createdAt", since);
        let used = self.store.count(kind.collection(), &query).await?;

        let remaining = (limit.count as usize).saturating_sub(used) as u32;
        let allowed = remaining > 0;
        let message = (!allowed).then(|| {
            format!(
                "You can only create {} {} per {}. Please try again later.",
                limit.count,
                kind.label(),
                describe_window(limit.window_ms)
            )
        });

        if !allowed {
            tracing::warn!(user = uid, ?kind, used, "rate limit reached");
        }

        Ok(RateLimitStatus {
            allowed,
            remaining,
            message,
        })
    }

    pub async fn check_friend_request_limit(
        &self,
        user_id: Option<&str>,
    ) -> Result<RateLimitStatus> {
        self.check(user_id, ActionKind::FriendRequests).await
    }

    pub async fn check_report_limit(&self, user_id: Option<&str>) -> Result<RateLimitStatus> {
        self.check(user_id, ActionKind::Reports).await
    }

    pub async fn check_board_creation_limit(
        &self,
        user_id: Option<&str>,
    ) -> Result<RateLimitStatus> {
        self.check(user_id, ActionKind::Boards).await
    }

    /// Fail with `RateLimitExceeded` when the check denies.
    pub(crate) async fn enforce(
        &self,
        user_id: &str,
        kind: ActionKind,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let status = self.check_at(Some(user_id), kind, now).await?;
        if status.allowed {
            Ok(())
        } else {
            Err(CoreError::RateLimitExceeded(status.message.unwrap_or_default()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryDocumentStore;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;

    async fn seed(
        store: &MemoryDocumentStore,
        kind: ActionKind,
        uid: &str,
        n: usize,
        at: DateTime<Utc>,
    ) {
        for i in 0..n {
            let id = format!("{}-{}-{}", uid, i, at.timestamp_millis());
            let mut doc = json!({ "id": id, "createdAt": at.to_rfc3339() });
            doc[kind.owner_field()] = json!(uid);
            store.put(kind.collection(), &id, doc).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_signed_out_is_denied() {
        let guard = SocialGuard::new(Arc::new(MemoryDocumentStore::new()));
        let err = guard.check(None, ActionKind::Reports).await.unwrap_err();
        assert_eq!(err, CoreError::NotSignedIn);
    }

    #[tokio::test]
    async fn test_report_limit_allows_tenth_denies_eleventh() {
        let store = Arc::new(MemoryDocumentStore::new());
        let now = Utc::now();
        seed(&store, ActionKind::Reports, "u", 9, now - Duration::hours(2)).await;
        let guard = SocialGuard::new(store.clone());

        let status = guard.check_report_limit(Some("u")).await.unwrap();
        assert!(status.allowed);
        assert_eq!(status.remaining, 1);

        seed(&store, ActionKind::Reports, "u", 1, now - Duration::minutes(1)).await;
        let status = guard.check_report_limit(Some("u")).await.unwrap();
        assert!(!status.allowed);
        assert_eq!(status.remaining, 0);
        assert!(status.message.unwrap().contains("10 reports"));
    }

    #[tokio::test]
    async fn test_board_limit_reached() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed(&store, ActionKind::Boards, "u", 50, Utc::now() - Duration::hours(1)).await;
        let guard = SocialGuard::new(store);

        let status = guard.check_board_creation_limit(Some("u")).await.unwrap();
        assert_eq!(
            (status.allowed, status.remaining),
            (false, 0)
        );
    }

    #[tokio::test]
    async fn test_window_excludes_old_entries_and_other_users() {
        let store = Arc::new(MemoryDocumentStore::new());
        let now = Utc::now();
        seed(&store, ActionKind::FriendRequests, "u", 20, now - Duration::hours(25)).await;
        seed(&store, ActionKind::FriendRequests, "other", 20, now).await;
        let guard = SocialGuard::new(store);

        let status = guard.check_at(Some("u"), ActionKind::FriendRequests, now).await.unwrap();
        assert!(status.allowed);
        assert_eq!(status.remaining, 20);
    }

    #[tokio::test]
    async fn test_custom_limits() {
        let store = Arc::new(MemoryDocumentStore::new());
        seed(&store, ActionKind::Boards, "u", 2, Utc::now()).await;
        let limits = RateLimitConfig {
            boards: RateLimit { count: 2, window_ms: 3_600_000 },
            ..RateLimitConfig::default()
        };
        let guard = SocialGuard::with_limits(store, limits);
        let status = guard.check(Some("u"), ActionKind::Boards).await.unwrap();
        assert!(!status.allowed);
        assert!(status.message.unwrap().contains("2 boards per hour"));
    }
}
