//! Shared document collections
//!
//! Documents are opaque JSON objects keyed by `(collection, id)`. No rate
//! limits are enforced here; clients apply them before writing.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rankboard_core::store::{Collection, Query};
use serde_json::Value;

use crate::error::{ApiError, Result};
use crate::models::DeleteResponse;
use crate::routes::auth::AuthenticatedDevice;
use crate::AppState;

fn parse_collection(name: &str) -> Result<Collection> {
    Collection::from_str(name).ok_or_else(|| ApiError::UnknownCollection(name.to_string()))
}

/// A stored body must be an object whose `id`, when present, matches the path.
fn validate_body(id: &str, body: &Value) -> Result<()> {
    let Some(object) = body.as_object() else {
        return Err(ApiError::InvalidDocument(
            "document must be a JSON object".to_string(),
        ));
    };

    match object.get("id") {
        None => Ok(()),
        Some(Value::String(body_id)) if body_id == id => Ok(()),
        Some(other) => Err(ApiError::InvalidDocument(format!(
            "document id {} does not match path id {}",
            other, id
        ))),
    }
}

/// GET /api/documents/:collection/:id
pub async fn get_document(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let collection = parse_collection(&collection)?;
    let document = state.db.get_document(collection, &id).await?;
    document.map(Json).ok_or(ApiError::DocumentNotFound {
        collection: collection.as_str(),
        id,
    })
}

/// PUT /api/documents/:collection/:id
pub async fn put_document(
    Extension(auth): Extension<AuthenticatedDevice>,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Value>> {
    let collection = parse_collection(&collection)?;
    validate_body(&id, &body)?;

    state.db.put_document(collection, &id, &body).await?;
    tracing::debug!(
        device_id = %auth.device_id,
        collection = collection.as_str(),
        id = %id,
        "stored document"
    );

    Ok(Json(body))
}

/// DELETE /api/documents/:collection/:id
pub async fn delete_document(
    Extension(auth): Extension<AuthenticatedDevice>,
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<DeleteResponse>> {
    let collection = parse_collection(&collection)?;
    let deleted = state.db.delete_document(collection, &id).await?;
    if deleted {
        tracing::info!(
            device_id = %auth.device_id,
            collection = collection.as_str(),
            id = %id,
            "deleted document"
        );
    }

    Ok(Json(DeleteResponse { deleted }))
}

/// POST /api/documents/:collection/query
///
/// Returns every document matching all filters, ordered by id.
pub async fn query_documents(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(query): Json<Query>,
) -> Result<Json<Vec<Value>>> {
    let collection = parse_collection(&collection)?;
    let documents = state.db.query_documents(collection, &query).await?;
    Ok(Json(documents))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_collection() {
        assert_eq!(parse_collection("friendships").unwrap(), Collection::Friendships);
        assert!(matches!(parse_collection("decks"), Err(ApiError::UnknownCollection(_))));
    }

    #[test]
    fn test_body_must_be_object() {
        assert!(validate_body("b1", &json!({ "name": "Films" })).is_ok());
        assert!(matches!(
            validate_body("b1", &json!(["b1"])),
            Err(ApiError::InvalidDocument(_))
        ));
    }

    #[test]
    fn test_body_id_must_match_path() {
        assert!(validate_body("b1", &json!({ "id": "b1" })).is_ok());
        assert!(validate_body("b1", &json!({ "id": "b2" })).is_err());
        assert!(validate_body("b1", &json!({ "id": 1 })).is_err());
    }
}
