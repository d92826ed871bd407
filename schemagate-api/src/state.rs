//! Shared application state for Axum routers.

use std::sync::Arc;

use schemagate_core::{CatalogService, Translator};
use schemagate_lifecycle::LifecycleOrchestrator;

use crate::config::ApiConfig;
use crate::db::DbClient;
use crate::executor::PseudoExecutor;
use crate::idempotency::IdempotencyStore;

/// Application-wide state shared across all routes.
#[derive(Clone)]
pub struct AppState {
    pub db: DbClient,
    /// Process-wide schema catalog. Built on first use.
    pub catalog: Arc<CatalogService>,
    pub translator: Arc<dyn Translator>,
    pub executor: Arc<PseudoExecutor>,
    pub orchestrator: Arc<LifecycleOrchestrator>,
    pub config: Arc<ApiConfig>,
    pub start_time: std::time::Instant,
}

impl AppState {
    /// Wire the executor and orchestrator from their collaborators.
    pub fn new(
        db: DbClient,
        catalog: Arc<CatalogService>,
        translator: Arc<dyn Translator>,
        config: ApiConfig,
    ) -> Self {
        let idempotency = Arc::new(IdempotencyStore::new(config.idempotency_ttl));
        let executor = PseudoExecutor::new(
            db.clone(),
            Arc::clone(&catalog),
            config.compiler_options(),
            idempotency,
        );

        let mut orchestrator = LifecycleOrchestrator::new(Arc::clone(&translator));
        if let Some(timeout) = config.lifecycle_timeout {
            orchestrator = orchestrator.with_default_timeout(timeout);
        }

        Self {
            db,
            catalog,
            translator,
            executor: Arc::new(executor),
            orchestrator: Arc::new(orchestrator),
            config: Arc::new(config),
            start_time: std::time::Instant::now(),
        }
    }
}

// Use macro to reduce boilerplate for FromRef implementations
crate::impl_from_ref!(DbClient, db);
crate::impl_from_ref!(Arc<CatalogService>, catalog);
crate::impl_from_ref!(Arc<dyn Translator>, translator);
crate::impl_from_ref!(Arc<PseudoExecutor>, executor);
crate::impl_from_ref!(Arc<LifecycleOrchestrator>, orchestrator);
crate::impl_from_ref!(Arc<ApiConfig>, config);
crate::impl_from_ref!(std::time::Instant, start_time);
