//! Database error types.
//!
//! Provides error handling for job store, target and settings operations using `thiserror`.

use thiserror::Error;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create database connection.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Database record with provided identifier not found.
    #[error("{0}")]
    NotFound(String),

    /// Input rejected before reaching the database.
    #[error("validation error: {0}")]
    Validation(String),

    /// Failed to decode database value.
    #[error("decode error: {0}")]
    Decode(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reconflow_core::ReconflowError> for DatabaseError {
    fn from(err: reconflow_core::ReconflowError) -> Self {
        Self::Validation(err.to_string())
    }
}

impl DatabaseError {
    /// Whether running the same statement again may succeed, as with a busy
    /// database or an exhausted pool.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Sqlx(sqlx::Error::Database(_) | sqlx::Error::PoolTimedOut | sqlx::Error::Io(_))
        )
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
