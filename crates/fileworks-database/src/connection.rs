//! SQLite connection pool management.

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::info;

use fileworks_core::config::DatabaseConfig;
use fileworks_core::error::{AppError, ErrorKind};

/// Wrapper around the sqlx SQLite connection pool.
#[derive(Debug, Clone)]
pub struct DatabasePool {
    /// The underlying sqlx connection pool.
    pool: SqlitePool,
}

impl DatabasePool {
    /// Create a new database pool from configuration.
    ///
    /// The database file is created if missing. In-memory URLs are limited
    /// to one connection, since every SQLite connection would otherwise
    /// open its own private database.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, AppError> {
        let in_memory = config.url.contains(":memory:");
        let max_connections = if in_memory { 1 } else { config.max_connections };

        info!(
            url = %config.url,
            max_connections,
            "Connecting to SQLite"
        );

        let mut options = SqliteConnectOptions::from_str(&config.url)
            .map_err(|e| {
                AppError::with_source(
                    ErrorKind::Configuration,
                    format!("Invalid database URL '{}': {e}", config.url),
                    e,
                )
            })?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(config.connect_timeout_seconds));
        if !in_memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        let mut pool_options = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout_seconds));
        if in_memory {
            pool_options = pool_options
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }

        let pool = pool_options.connect_with(options).await.map_err(|e| {
            AppError::with_source(
                ErrorKind::Database,
                format!("Failed to connect to database: {e}"),
                e,
            )
        })?;

        info!("Connected to SQLite");
        Ok(Self { pool })
    }

    /// Open a private in-memory database. Used by tests and dry runs.
    pub async fn connect_in_memory() -> Result<Self, AppError> {
        Self::connect(&DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        })
        .await
    }

    /// Return a reference to the underlying sqlx pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Check database connectivity.
    pub async fn health_check(&self) -> Result<bool, AppError> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .map(|v| v == 1)
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Health check failed", e))
    }

    /// Close all connections in the pool.
    pub async fn close(&self) {
        self.pool.close().await;
        info!("Database pool closed");
    }
}
