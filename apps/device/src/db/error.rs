//! Database error types.

use rankboard_core::CoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("json column error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("repository lock poisoned")]
    Poisoned,
}

impl From<DbError> for CoreError {
    fn from(e: DbError) -> Self {
        CoreError::Transient(e.to_string())
    }
}
