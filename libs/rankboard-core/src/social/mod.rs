//! Guards for shared, multi-writer collections.
//!
//! Everything here is read-then-write against a [`DocumentStore`] with no
//! isolation: two writers racing past the same check may both succeed. The
//! limits are advisory bounds observed by the client, not guarantees.

pub mod friendship;
pub mod rate_limit;
pub mod report;

use std::sync::Arc;

use crate::store::DocumentStore;

pub use friendship::{generate_friendship_id, sorted_pair, FRIENDSHIP_ID_SEPARATOR};
pub use rate_limit::{ActionKind, RateLimit, RateLimitConfig, RateLimitStatus};

/// Rate limiter, report guard and friendship state machine over one store.
pub struct SocialGuard<S: ?Sized> {
    store: Arc<S>,
    limits: RateLimitConfig,
}

impl<S: ?Sized> Clone for SocialGuard<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            limits: self.limits.clone(),
        }
    }
}

impl<S: DocumentStore + ?Sized> SocialGuard<S> {
    /// Create a guard with the default limits.
    pub fn new(store: Arc<S>) -> Self {
        Self::with_limits(store, RateLimitConfig::default())
    }

    pub fn with_limits(store: Arc<S>, limits: RateLimitConfig) -> Self {
        Self { store, limits }
    }

    pub fn limits(&self) -> &RateLimitConfig {
        &self.limits
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
