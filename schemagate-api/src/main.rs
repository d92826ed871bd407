//! SCHEMAGATE API Server Entry Point
//!
//! Bootstraps configuration and tracing, wires the catalog, executor and
//! orchestrator, and starts the Axum HTTP server.

use std::sync::Arc;

use schemagate_api::telemetry::{init_tracing, TelemetryConfig};
use schemagate_api::{create_api_router, ApiConfig, ApiError, ApiResult, AppState, DbClient, DbConfig, PgCatalogSource};
use schemagate_core::{CatalogService, JsonTranslator};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing(&TelemetryConfig::default())?;

    let db_config = DbConfig::from_env();
    let db = DbClient::from_config(&db_config)?;
    let api_config = ApiConfig::from_env();

    let source = PgCatalogSource::new(db.clone(), &api_config.db_schema, &api_config.tenant_column);
    let catalog = Arc::new(CatalogService::new(Arc::new(source)));

    // Warm the catalog; a failure here is not fatal, the first request retries.
    if let Err(e) = catalog.get().await {
        tracing::warn!(error = %e, "Schema catalog not available at startup");
    }

    let addr = api_config.bind_addr()?;
    let state = AppState::new(db, catalog, Arc::new(JsonTranslator), api_config);
    let app = create_api_router(state);

    tracing::info!(%addr, "Starting schemagate API server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| ApiError::internal_error(format!("Failed to bind {}: {}", addr, e)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|e| ApiError::internal_error(format!("Server error: {}", e)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}
