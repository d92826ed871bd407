use std::sync::Arc;

use schemagate_api::{ApiConfig, AppState, DbClient, DbConfig};
use schemagate_core::{CatalogService, JsonTranslator, Translator};
use schemagate_test_utils::fixtures::booking_catalog;

/// App state over the fixture catalog.
///
/// The pool is created lazily, so routes that fail before checking out a
/// connection run without a database.
pub fn test_app_state(translator: Arc<dyn Translator>) -> AppState {
    let db = DbClient::from_config(&DbConfig::default()).expect("Failed to create database client");
    let catalog = Arc::new(CatalogService::fixed(booking_catalog()));
    AppState::new(db, catalog, translator, ApiConfig::default())
}

pub fn json_app_state() -> AppState {
    test_app_state(Arc::new(JsonTranslator))
}
