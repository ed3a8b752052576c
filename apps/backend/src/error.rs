//! Backend errors and their HTTP mapping

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    #[error("Document not found: {collection}/{id}")]
    DocumentNotFound { collection: &'static str, id: String },

    #[error("Device not found: {0}")]
    DeviceNotFound(Uuid),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "unauthorized"),
            Self::UnknownCollection(_) => (StatusCode::NOT_FOUND, "unknown_collection"),
            Self::DocumentNotFound { .. } | Self::DeviceNotFound(_) => {
                (StatusCode::NOT_FOUND, "not_found")
            }
            Self::InvalidDocument(_) => (StatusCode::BAD_REQUEST, "invalid_document"),
            Self::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
            Self::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database_error"),
            Self::Migration(_) => (StatusCode::INTERNAL_SERVER_ERROR, "migration_error"),
        }
    }
}

/// `{error, message}` body sent with every failure
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, "{}", self);
        }

        let body = ErrorBody {
            error: code,
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;
