//! Vellum API Server Entry Point
//!
//! Bootstraps configuration, seeds schemas, starts the background watch and
//! serves the Axum router until ctrl-c.

use std::sync::Arc;

use axum::Router;
use tokio::sync::watch;
use vellum_api::telemetry::{init_tracing, TelemetryConfig};
use vellum_api::{create_api_router, seed_schemas, ApiConfig, ApiError, ApiResult, SchemaService};
use vellum_core::IndexSchema;
use vellum_storage::{schema_watch_task, InMemoryCoordinationStore};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let api_config = ApiConfig::from_env();
    let refresh_config = api_config.to_refresh_config();
    refresh_config.validate()?;

    let store = Arc::new(InMemoryCoordinationStore::<IndexSchema>::new());
    let service = Arc::new(SchemaService::new(store, refresh_config.clone()));

    if let Some(dir) = &api_config.schema_dir {
        let seeded = seed_schemas(&service, dir).await?;
        tracing::info!(count = seeded.len(), dir = %dir.display(), "Schema seeding complete");
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let watch_handle = refresh_config.watch_enabled.then(|| {
        tokio::spawn(schema_watch_task(
            Arc::clone(&service),
            refresh_config.watch_interval,
            shutdown_rx,
        ))
    });

    let app: Router = create_api_router(service, &api_config);

    let addr = api_config.bind_addr()?;
    tracing::info!(%addr, "Starting Vellum API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "Failed to listen for shutdown signal");
            }
            tracing::info!("Shutdown signal received");
        })
        .await
        .map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = watch_handle {
        match handle.await {
            Ok(metrics) => {
                let snapshot = metrics.snapshot();
                tracing::info!(
                    polls = snapshot.polls,
                    keys_refreshed = snapshot.keys_refreshed,
                    errors = snapshot.errors,
                    "Schema watch stopped"
                );
            }
            Err(e) => tracing::warn!(error = %e, "Schema watch task ended abnormally"),
        }
    }

    Ok(())
}
