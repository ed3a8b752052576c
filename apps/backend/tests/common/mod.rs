//! Shared context for the backend integration tests.
//!
//! Requires a PostgreSQL database reachable through `DATABASE_URL`.

pub mod fixtures;

use std::sync::Arc;

use axum::http::HeaderValue;
use axum::Router;
use rankboard_core::store::Collection;
use uuid::Uuid;

use rankboard_backend::db::Database;
use rankboard_backend::models::Device;
use rankboard_backend::{app, AppState};

/// Migrated database plus the application router.
pub struct TestContext {
    pub db: Arc<Database>,
    app: Router,
}

impl TestContext {
    /// # Panics
    /// Panics if DATABASE_URL is not set or the database is unreachable.
    pub async fn new() -> Self {
        dotenvy::dotenv().ok();

        let database_url =
            std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for integration tests");

        let db = Database::connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        db.run_migrations()
            .await
            .expect("Failed to run migrations");

        let db = Arc::new(db);
        let app = app(AppState { db: db.clone() });

        Self { db, app }
    }

    pub fn router(&self) -> Router {
        self.app.clone()
    }

    /// Create a test device and return its ID and token.
    pub async fn create_test_device(&self, name: Option<&str>) -> (Uuid, String) {
        let device = self
            .db
            .create_device(name)
            .await
            .expect("Failed to create test device");
        (device.id, device.token)
    }

    pub async fn get_device_by_token(&self, token: &str) -> Option<Device> {
        self.db.get_device_by_token(token).await.ok().flatten()
    }

    pub fn auth_header_value(token: &str) -> HeaderValue {
        HeaderValue::from_str(&format!("Bearer {}", token)).expect("valid header value")
    }

    pub async fn cleanup_device(&self, device_id: Uuid) {
        let _ = sqlx::query("DELETE FROM devices WHERE id = $1")
            .bind(device_id)
            .execute(self.db.pool())
            .await;
    }

    pub async fn cleanup_documents(&self, collection: Collection, ids: &[&str]) {
        for id in ids {
            let _ = self.db.delete_document(collection, id).await;
        }
    }
}
