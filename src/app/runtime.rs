//! Runtime initialization and setup

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{error, info};

use crate::api;
use crate::app::config::AppConfig;
use crate::service::StatsService;
use crate::storage::{AggregateStore, StorageFactory};

/// Build the backend once and wrap it in the shared service
pub async fn build_service(config: &AppConfig) -> Result<StatsService> {
    let backend = StorageFactory::from_config(&config.storage)
        .await
        .context("Failed to initialize storage backend")?;
    let store = Arc::new(AggregateStore::new(backend));

    info!(
        backend = store.backend_type(),
        namespace = %config.namespace,
        "stats store ready"
    );
    Ok(StatsService::new(store, config.namespace.clone()))
}

/// Serve the API until Ctrl-C or SIGTERM
pub async fn run_server(config: AppConfig) -> Result<()> {
    let service = build_service(&config).await?;
    api::serve(config.listen_addr, service, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}
