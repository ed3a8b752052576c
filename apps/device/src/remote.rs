//! HTTP binding of the shared document store.

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use rankboard_core::store::{Collection, DocumentStore, Query, StoreError};

#[derive(Debug, Serialize)]
struct DeviceRegisterRequest {
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct DeviceRegisterResponse {
    device_id: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct DeleteResponse {
    deleted: bool,
}

/// Client for the backend's `/api/documents` routes.
#[derive(Clone)]
pub struct HttpDocumentStore {
    client: Client,
    backend_url: String,
    token: Option<String>,
}

impl HttpDocumentStore {
    pub fn new(backend_url: &str) -> Self {
        Self {
            client: Client::new(),
            backend_url: backend_url.trim_end_matches('/').to_string(),
            token: None,
        }
    }

    /// Attach the device token sent as a bearer credential.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn backend_url(&self) -> &str {
        &self.backend_url
    }

    /// Check if backend is reachable.
    pub async fn check_connectivity(&self) -> Result<bool, StoreError> {
        let url = self.endpoint_url(&["health"])?;
        match self.client.get(url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(e) => Err(StoreError::Unavailable(e.to_string())),
        }
    }

    /// Register this device; returns `(token, device_id)`.
    pub async fn register_device(
        &self,
        name: Option<String>,
    ) -> Result<(String, String), StoreError> {
        let url = self.endpoint_url(&["api", "device", "register"])?;
        let resp = self
            .client
            .post(url)
            .json(&DeviceRegisterRequest { name })
            .send()
            .await
            .map_err(network)?;

        let response: DeviceRegisterResponse = expect_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;

        Ok((response.token, response.device_id))
    }

    /// Append percent-encoded path segments to the backend URL.
    fn endpoint_url(&self, segments: &[&str]) -> Result<Url, StoreError> {
        let mut url = Url::parse(&self.backend_url)
            .map_err(|e| StoreError::Unavailable(format!("invalid backend url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| StoreError::Unavailable("backend url cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn document_url(&self, collection: Collection, id: &str) -> Result<Url, StoreError> {
        self.endpoint_url(&["api", "documents", collection.as_str(), id])
    }

    fn authorize(
        &self,
        builder: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        match &self.token {
            Some(token) => Ok(builder.bearer_auth(token)),
            None => Err(StoreError::Rejected {
                status: StatusCode::UNAUTHORIZED.as_u16(),
                message: "device not registered".to_string(),
            }),
        }
    }
}

fn network(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

async fn expect_success(resp: Response) -> Result<Response, StoreError> {
    if resp.status().is_success() {
        return Ok(resp);
    }
    let status = resp.status().as_u16();
    let message = resp.text().await.unwrap_or_default();
    Err(StoreError::Rejected { status, message })
}

#[async_trait]
impl DocumentStore for HttpDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> Result<Option<Value>, StoreError> {
        let url = self.document_url(collection, id)?;
        let request = self.authorize(self.client.get(url))?;
        let resp = request.send().await.map_err(network)?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let doc = expect_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(Some(doc))
    }

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> Result<(), StoreError> {
        let url = self.document_url(collection, id)?;
        let request = self.authorize(self.client.put(url))?;
        let resp = request.json(&doc).send().await.map_err(network)?;
        expect_success(resp).await?;
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool, StoreError> {
        let url = self.document_url(collection, id)?;
        let request = self.authorize(self.client.delete(url))?;
        let resp = request.send().await.map_err(network)?;
        let response: DeleteResponse = expect_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))?;
        Ok(response.deleted)
    }

    async fn query(&self, collection: Collection, query: &Query) -> Result<Vec<Value>, StoreError> {
        let url = self.endpoint_url(&["api", "documents", collection.as_str(), "query"])?;
        let request = self.authorize(self.client.post(url))?;
        let resp = request.json(query).send().await.map_err(network)?;
        expect_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| StoreError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_trim_trailing_slash() {
        let store = HttpDocumentStore::new("http://localhost:3000/");
        assert_eq!(store.backend_url(), "http://localhost:3000");
        assert_eq!(
            store.document_url(Collection::Friendships, "u1_u2").unwrap().as_str(),
            "http://localhost:3000/api/documents/friendships/u1_u2"
        );
    }

    #[test]
    fn test_document_ids_are_percent_encoded() {
        let store = HttpDocumentStore::new("http://localhost:3000");
        let url = store.document_url(Collection::Boards, "a/b?c#d e").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:3000/api/documents/boards/a%2Fb%3Fc%23d%20e"
        );
        assert_eq!(url.path_segments().unwrap().count(), 4);
    }

    #[test]
    fn test_backend_url_with_base_path_keeps_prefix() {
        let store = HttpDocumentStore::new("http://localhost:3000/rank/");
        let url = store.endpoint_url(&["api", "documents", "boards", "query"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/rank/api/documents/boards/query");
    }

    #[tokio::test]
    async fn test_invalid_backend_url_is_unavailable() {
        let store = HttpDocumentStore::new("not a url").with_token("t");
        let err = store.get(Collection::Boards, "b1").await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }

    #[tokio::test]
    async fn test_unregistered_device_is_rejected_before_sending() {
        let store = HttpDocumentStore::new("http://127.0.0.1:9");
        let err = store.get(Collection::Boards, "b1").await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { status: 401, .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_unavailable() {
        let store = HttpDocumentStore::new("http://127.0.0.1:9").with_token("t");
        let err = store
            .put(Collection::Boards, "b1", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
    }
}
