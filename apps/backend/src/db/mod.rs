//! PostgreSQL database operations

pub mod query;

use rankboard_core::store::{Collection, Query};
use serde_json::Value;
use sqlx::{postgres::PgPoolOptions, types::Json, PgPool};
use uuid::Uuid;

use crate::error::{ApiError, Result};
use crate::models::Device;

/// Database wrapper with connection pool
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Connect to PostgreSQL and create connection pool
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    /// Pool that connects on first use.
    pub fn connect_lazy(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect_lazy(database_url)?;
        Ok(Self { pool })
    }

    /// Run database migrations
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| ApiError::Migration(e.to_string()))?;
        Ok(())
    }

    /// Get the connection pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    // === Device Repository ===

    /// Create a new device with generated token
    pub async fn create_device(&self, name: Option<&str>) -> Result<Device> {
        let token = Uuid::new_v4().to_string();
        let device = sqlx::query_as::<_, Device>(
            r#"
            INSERT INTO devices (token, name)
            VALUES ($1, $2)
            RETURNING id, token, name, created_at, last_seen_at
            "#,
        )
        .bind(&token)
        .bind(name)
        .fetch_one(&self.pool)
        .await?;

        Ok(device)
    }

    /// Get device by token
    pub async fn get_device_by_token(&self, token: &str) -> Result<Option<Device>> {
        let device = sqlx::query_as::<_, Device>(
            r#"
            SELECT id, token, name, created_at, last_seen_at
            FROM devices
            WHERE token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(device)
    }

    /// Update device last_seen_at timestamp
    pub async fn update_last_seen(&self, device_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE devices
            SET last_seen_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(device_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // === Document Repository ===

    pub async fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Value>> {
        let body = sqlx::query_scalar::<_, Json<Value>>(
            r#"
            SELECT body FROM documents
            WHERE collection = $1 AND id = $2
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(body.map(|Json(v)| v))
    }

    /// Insert or fully replace a document.
    pub async fn put_document(&self, collection: Collection, id: &str, body: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO documents (collection, id, body)
            VALUES ($1, $2, $3)
            ON CONFLICT (collection, id) DO UPDATE SET
                body = EXCLUDED.body,
                updated_at = NOW()
            "#,
        )
        .bind(collection.as_str())
        .bind(id)
        .bind(Json(body))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Delete a document; returns whether one existed.
    pub async fn delete_document(&self, collection: Collection, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.as_str())
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn query_documents(
        &self,
        collection: Collection,
        query: &Query,
    ) -> Result<Vec<Value>> {
        let mut builder = query::build_select(collection, query)?;
        let rows = builder
            .build_query_scalar::<Json<Value>>()
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|Json(v)| v).collect())
    }
}
