//! Error types for rankboard-core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using CoreError.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors returned by every core operation.
///
/// Store failures never escape as panics; they are folded into `Transient`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("permission denied: {0}")]
    Permission(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("not signed in")]
    NotSignedIn,

    #[error("out of range: {0}")]
    OutOfRange(String),

    #[error("transient error: {0}")]
    Transient(String),
}

/// Stable machine-readable tag for each error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Permission,
    AlreadyExists,
    RateLimitExceeded,
    NotSignedIn,
    OutOfRange,
    Transient,
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Permission(_) => ErrorKind::Permission,
            Self::AlreadyExists(_) => ErrorKind::AlreadyExists,
            Self::RateLimitExceeded(_) => ErrorKind::RateLimitExceeded,
            Self::NotSignedIn => ErrorKind::NotSignedIn,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::Transient(_) => ErrorKind::Transient,
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Transient(format!("malformed document: {}", e))
    }
}

/// Error body carried by a failed [`Outcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeError {
    pub kind: ErrorKind,
    pub message: String,
}

/// Tagged result handed to UI callers.
///
/// Serializes as `{"success": true, "value": ...}` or
/// `{"success": false, "error": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<OutcomeError>,
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self {
                success: true,
                value: Some(value),
                error: None,
            },
            Err(e) => Self {
                success: false,
                value: None,
                error: Some(OutcomeError {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            },
        }
    }
}
