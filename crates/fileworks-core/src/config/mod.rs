//! Application configuration schemas.
//!
//! All configuration structs are deserialized from TOML files via the
//! `config` crate. Each sub-module represents a logical configuration
//! section.

pub mod logging;
pub mod processing;
pub mod storage;
pub mod worker;

use serde::{Deserialize, Serialize};

pub use self::logging::LoggingConfig;
pub use self::processing::ProcessingConfig;
pub use self::storage::StorageConfig;
pub use self::worker::WorkerConfig;

use crate::error::AppError;

/// Root application configuration.
///
/// This struct is the top-level deserialization target for the merged
/// TOML configuration files (default.toml + environment overlay).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// File storage settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Background worker settings.
    #[serde(default)]
    pub worker: WorkerConfig,
    /// Processing pipeline settings.
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Database connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite connection URL.
    #[serde(default = "default_database_url")]
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            connect_timeout_seconds: default_connect_timeout(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML files.
    ///
    /// Merges the default configuration with an environment-specific overlay
    /// and environment variables prefixed with `FILEWORKS_`
    /// (e.g. `FILEWORKS_WORKER__CONCURRENCY=8`).
    pub fn load(env: &str) -> Result<Self, AppError> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FILEWORKS")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        self.worker.validate()?;
        self.processing.validate()?;

        if self.worker.visibility_timeout_ms <= self.processing.simulated_delay_max_ms {
            return Err(AppError::configuration(format!(
                "worker.visibility_timeout_ms ({}) must exceed processing.simulated_delay_max_ms ({})",
                self.worker.visibility_timeout_ms, self.processing.simulated_delay_max_ms
            )));
        }

        if self.database.max_connections == 0 {
            return Err(AppError::configuration(
                "database.max_connections must be at least 1",
            ));
        }

        Ok(())
    }
}

fn default_database_url() -> String {
    "sqlite://fileworks.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_connect_timeout() -> u64 {
    10
}
