//! Error types for Hades
//!
//! Provides a unified error type for infrastructure failures. Rollback failures
//! are not errors: they are reported as [`crate::models::RollbackOutcome`] values.

use thiserror::Error;

/// Result type alias for Hades operations
pub type Result<T> = std::result::Result<T, HadesError>;

/// Main error type for Hades operations
#[derive(Debug, Error)]
pub enum HadesError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Database error with context
    #[error("Database error: {0}")]
    Database(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Caller supplied something unusable
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Container runtime command failed or timed out
    #[error("Container runtime error: {0}")]
    Runtime(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// SQL error
    #[error("SQL error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Migration error
    #[error("Migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}
