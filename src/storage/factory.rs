//! Storage factory for creating backend instances

use std::sync::Arc;
use tracing::info;

use super::backends::MemoryBackend;
#[cfg(feature = "mongodb")]
use super::backends::MongoBackend;
#[cfg(feature = "postgres")]
use super::backends::PostgresBackend;
use super::config::{BackendType, StorageConfig};
use super::error::{StorageError, StorageResult};
use super::traits::StatsBackend;

/// Factory for creating storage backends
pub struct StorageFactory;

impl StorageFactory {
    /// Create a backend from environment configuration
    pub async fn from_env() -> StorageResult<Arc<dyn StatsBackend>> {
        let config = StorageConfig::from_env()?;
        Self::from_config(&config).await
    }

    /// Create a backend from explicit configuration
    ///
    /// Called once at startup; the returned handle is shared for the life of
    /// the process.
    pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn StatsBackend>> {
        config.validate()?;
        info!(backend = config.backend.as_str(), "creating storage backend");

        match config.backend {
            BackendType::Memory => Ok(Arc::new(MemoryBackend::new())),
            #[cfg(feature = "mongodb")]
            BackendType::Mongodb => Ok(Arc::new(MongoBackend::new(config).await?)),
            #[cfg(not(feature = "mongodb"))]
            BackendType::Mongodb => Err(StorageError::configuration(
                "MongoDB backend not enabled. Enable with --features mongodb",
            )),
            #[cfg(feature = "postgres")]
            BackendType::Postgres => Ok(Arc::new(PostgresBackend::new(config).await?)),
            #[cfg(not(feature = "postgres"))]
            BackendType::Postgres => Err(StorageError::configuration(
                "PostgreSQL backend not enabled. Enable with --features postgres",
            )),
        }
    }
}
