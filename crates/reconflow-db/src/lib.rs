//! Reconflow Database Layer
//!
//! Provides `SQLite` storage for the job store, target records and settings.
//! Uses `SQLx` with embedded migrations.
//!
//! # Example
//!
//! ```ignore
//! use reconflow_db::{jobs, Database};
//!
//! let db = Database::new("reconflow.db").await?;
//! let all = jobs::list_jobs(db.pool()).await?;
//! ```
//!
//! # Design Principles
//!
//! - The job table enforces forward-only status transitions in its UPDATE predicates
//! - Migrations run automatically when a `Database` is opened
//! - `Database` implements [`SettingsProvider`] so adapters can read credentials

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod connection;
pub mod error;
/// Job store for tracking scan invocations.
pub mod jobs;
pub mod migrations;
pub mod settings;
pub mod targets;

// Re-export commonly used types
pub use error::{DatabaseError, Result};
pub use jobs::Job;
pub use targets::Target;

use async_trait::async_trait;
use reconflow_core::{ReconflowError, SettingsProvider};
use std::path::Path;

/// High-level database handle with migrations applied.
#[derive(Debug, Clone)]
pub struct Database {
    pool: sqlx::Pool<sqlx::Sqlite>,
}

impl Database {
    /// Open (creating if needed) the database at `path` and run migrations.
    ///
    /// Pass `:memory:` for an in-memory database.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened or migrated.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    /// Open a fresh in-memory database with the schema applied.
    pub async fn in_memory() -> Result<Self> {
        Self::new(connection::IN_MEMORY).await
    }

    /// Wrap an existing pool without running migrations.
    #[must_use]
    pub fn from_pool(pool: sqlx::Pool<sqlx::Sqlite>) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &sqlx::Pool<sqlx::Sqlite> {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("Database pool closed");
    }
}

#[async_trait]
impl SettingsProvider for Database {
    async fn get_value(&self, key: &str) -> reconflow_core::Result<Option<String>> {
        settings::get_setting(&self.pool, key)
            .await
            .map_err(|e| ReconflowError::Settings(format!("failed to read '{key}': {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reconflow_core::settings::keys;

    #[tokio::test]
    async fn test_database_in_memory() {
        let db = Database::in_memory().await.expect("create database");
        assert_eq!(db.get_schema_version().await.expect("version"), 1);
    }

    #[tokio::test]
    async fn test_database_is_settings_provider() {
        let db = Database::in_memory().await.expect("create database");
        settings::set_setting(db.pool(), keys::WHOIS_API_KEY, "token")
            .await
            .expect("set setting");

        let provider: &dyn SettingsProvider = &db;
        assert_eq!(
            provider.get_value(keys::WHOIS_API_KEY).await.expect("lookup"),
            Some("token".to_string())
        );
        assert_eq!(provider.get_value(keys::HUNTER_API_KEY).await.expect("lookup"), None);
    }

    #[tokio::test]
    async fn test_database_reopen_file() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("reconflow.db");

        let db = Database::new(&path).await.expect("first open");
        targets::create_target(db.pool(), "example.com", None, None)
            .await
            .expect("create target");
        db.close().await;

        let reopened = Database::new(&path).await.expect("second open");
        let all = targets::list_targets(reopened.pool()).await.expect("list");
        assert_eq!(all.len(), 1);
    }
}
