//! # fileworks-storage
//!
//! Storage provider implementations for FileWorks. The processing pipeline
//! reads uploaded bytes through the [`StorageProvider`] trait; the local
//! filesystem provider is the only backend shipped today.

pub mod providers;

use std::sync::Arc;

use fileworks_core::config::StorageConfig;
use fileworks_core::error::AppError;
use fileworks_core::result::AppResult;
use fileworks_core::traits::storage::StorageProvider;

pub use providers::LocalStorageProvider;

/// Build the provider selected by `storage.provider`.
pub async fn build_provider(config: &StorageConfig) -> AppResult<Arc<dyn StorageProvider>> {
    match config.provider.as_str() {
        "local" => {
            let provider = LocalStorageProvider::new(&config.local.root_path).await?;
            Ok(Arc::new(provider))
        }
        other => Err(AppError::configuration(format!(
            "Unsupported storage provider '{other}'"
        ))),
    }
}
