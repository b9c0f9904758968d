//! Database connection management and migrations
//!
//! Two SQLite pools are used by the agent: the operation log, which carries
//! the `operations` table and its migrations, and the row store, which the
//! SQL operations being tracked actually run against.

use crate::error::{HadesError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Type alias for the database connection pool
pub type DatabasePool = SqlitePool;

/// Database connection wrapper
#[derive(Clone, Debug)]
pub struct Database {
    pub(crate) pool: Arc<DatabasePool>,
}

impl Database {
    /// Connect using a SQLite connection string
    ///
    /// # Arguments
    /// * `database_url` - e.g. "sqlite:hades.db?mode=rwc" or "sqlite::memory:"
    /// * `max_connections` - Maximum number of pooled connections
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        debug!(url = %database_url, "Connecting to database");

        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| HadesError::Database(format!("Invalid database url: {}", e)))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| HadesError::Database(format!("Failed to connect to database: {}", e)))?;

        info!(url = %database_url, "Database connection established");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Open (creating if needed) a SQLite database file
    pub async fn open_file<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    HadesError::Database(format!("Failed to create database directory: {}", e))
                })?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| HadesError::Database(format!("Failed to connect to database: {}", e)))?;

        info!(path = %path.display(), "Database connection established");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Single-connection in-memory database
    ///
    /// The connection is never recycled, since closing it would drop the data.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .map_err(|e| HadesError::Database(format!("Failed to open in-memory database: {}", e)))?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Get a reference to the connection pool
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }

    /// Run the embedded operation log migrations
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("./migrations")
            .run(self.pool.as_ref())
            .await?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Perform a health check by running a simple query
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(self.pool.as_ref())
            .await
            .map_err(|e| HadesError::Database(format!("Health check failed: {}", e)))?;

        Ok(())
    }

    /// Close the database connection
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database connection closed");
    }

    /// Connect and migrate the operation log
    pub async fn initialize(database_url: &str, max_connections: u32) -> Result<Self> {
        let db = Self::connect(database_url, max_connections).await?;
        db.run_migrations().await?;
        Ok(db)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_in_memory_health_check() {
        let db = Database::in_memory().await.unwrap();
        assert!(db.health_check().await.is_ok());
        db.close().await;
    }

    #[tokio::test]
    async fn test_open_file_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("log.db");

        let db = Database::open_file(&path).await.unwrap();
        assert!(path.exists());
        assert!(db.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn test_migrations_create_operations_table() {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations().await.unwrap();

        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM operations")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn test_connect_rejects_garbage_url() {
        let result = Database::connect("postgres://nope", 1).await;
        assert!(result.is_err());
    }
}
