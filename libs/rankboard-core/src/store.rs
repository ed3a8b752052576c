//! CRUD-over-named-collections seam for the shared document store.
//!
//! Documents are JSON objects keyed by `(collection, id)`. Queries are a
//! conjunction of simple filters over top-level fields so that every binding
//! (in-memory, HTTP, PostgreSQL JSONB) can evaluate them the same way.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use thiserror::Error;

use crate::error::{CoreError, Result};

/// Named collections of the shared store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Collection {
    Boards,
    Cards,
    Snapshots,
    Friendships,
    Reports,
    Users,
}

impl Collection {
    pub const ALL: [Collection; 6] = [
        Self::Boards,
        Self::Cards,
        Self::Snapshots,
        Self::Friendships,
        Self::Reports,
        Self::Users,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Boards => "boards",
            Self::Cards => "cards",
            Self::Snapshots => "snapshots",
            Self::Friendships => "friendships",
            Self::Reports => "reports",
            Self::Users => "users",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Comparison applied by a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Gte,
    /// Field is an array containing the value.
    Contains,
}

/// Filter operand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Text(String),
    Timestamp(DateTime<Utc>),
}

/// One predicate over a top-level document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: FilterValue,
}

impl Filter {
    pub fn matches(&self, doc: &Value) -> bool {
        let Some(field) = doc.get(&self.field) else {
            return false;
        };

        match (&self.op, &self.value) {
            (FilterOp::Eq, FilterValue::Text(expected)) => {
                field.as_str() == Some(expected.as_str())
            }
            (FilterOp::Contains, FilterValue::Text(expected)) => field
                .as_array()
                .map_or(false, |items| items.iter().any(|v| v.as_str() == Some(expected.as_str()))),
            (FilterOp::Eq, FilterValue::Timestamp(ts)) => parse_timestamp(field) == Some(*ts),
            (FilterOp::Gte, FilterValue::Timestamp(ts)) => {
                parse_timestamp(field).map_or(false, |value| value >= *ts)
            }
            (FilterOp::Gte, FilterValue::Text(expected)) => {
                field.as_str().map_or(false, |value| value >= expected.as_str())
            }
            (FilterOp::Contains, FilterValue::Timestamp(_)) => false,
        }
    }
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    value
        .as_str()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Conjunction of filters. An empty query matches every document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Eq,
            value: FilterValue::Text(value.into()),
        });
        self
    }

    pub fn since(mut self, field: &str, at: DateTime<Utc>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Gte,
            value: FilterValue::Timestamp(at),
        });
        self
    }

    pub fn contains(mut self, field: &str, value: impl Into<String>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            op: FilterOp::Contains,
            value: FilterValue::Text(value.into()),
        });
        self
    }

    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

/// Result of a raw store operation.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Failures of a store binding. Callers see them as `CoreError::Transient`.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected request: {status} - {message}")]
    Rejected { status: u16, message: String },

    #[error("malformed document: {0}")]
    Malformed(String),
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        CoreError::Transient(e.to_string())
    }
}

/// Asynchronous CRUD over named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>>;

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> StoreResult<()>;

    /// Returns whether a document was removed.
    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool>;

    async fn query(&self, collection: Collection, query: &Query) -> StoreResult<Vec<Value>>;
}

/// Typed access on top of any [`DocumentStore`].
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    async fn get_doc<T>(&self, collection: Collection, id: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        match self.get(collection, id).await? {
            Some(doc) => Ok(Some(serde_json::from_value(doc)?)),
            None => Ok(None),
        }
    }

    async fn put_doc<T>(&self, collection: Collection, id: &str, value: &T) -> Result<()>
    where
        T: Serialize + Sync,
    {
        let doc = serde_json::to_value(value)?;
        self.put(collection, id, doc).await.map_err(Into::into)
    }

    async fn query_docs<T>(&self, collection: Collection, query: &Query) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        self.query(collection, query)
            .await?
            .into_iter()
            .map(|doc| serde_json::from_value(doc).map_err(CoreError::from))
            .collect()
    }

    async fn count(&self, collection: Collection, query: &Query) -> Result<usize> {
        Ok(self.query(collection, query).await?.len())
    }
}

impl<S: DocumentStore + ?Sized> DocumentStoreExt for S {}

/// In-process store used by tests and offline sessions.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<Collection, BTreeMap<String, Value>>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> StoreError {
        StoreError::Unavailable("memory store lock poisoned".to_string())
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn get(&self, collection: Collection, id: &str) -> StoreResult<Option<Value>> {
        let guard = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(guard.get(&collection).and_then(|docs| docs.get(id)).cloned())
    }

    async fn put(&self, collection: Collection, id: &str, doc: Value) -> StoreResult<()> {
        if !doc.is_object() {
            return Err(StoreError::Malformed(format!(
                "{}/{} is not a JSON object",
                collection.as_str(),
                id
            )));
        }
        let mut guard = self.collections.write().map_err(|_| Self::poisoned())?;
        guard.entry(collection).or_default().insert(id.to_string(), doc);
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<bool> {
        let mut guard = self.collections.write().map_err(|_| Self::poisoned())?;
        Ok(guard
            .get_mut(&collection)
            .map_or(false, |docs| docs.remove(id).is_some()))
    }

    async fn query(&self, collection: Collection, query: &Query) -> StoreResult<Vec<Value>> {
        let guard = self.collections.read().map_err(|_| Self::poisoned())?;
        Ok(guard
            .get(&collection)
            .map(|docs| docs.values().filter(|d| query.matches(d)).cloned().collect())
            .unwrap_or_default())
    }
}
