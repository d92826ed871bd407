//! REST API Routes Module
//!
//! Route handlers for the pseudo-API surface, mounted under `/api/v1/pseudo`:
//! - Catalog snapshot
//! - Translate, execute and simulate
//! - Scenario runs (batches of named dry-run items)
//! - Lifecycle runs
//!
//! Health check endpoints live under `/health`.

pub mod catalog;
pub mod execute;
pub mod health;
pub mod lifecycle;
pub mod scenarios;
pub mod translate;

use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::state::AppState;

/// Build the CORS layer from configuration.
///
/// An empty origin list allows every origin (development mode).
pub fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.cors_origins.is_empty() {
        tracing::info!("CORS: Development mode - allowing all origins");
        cors.allow_origin(Any).allow_headers(Any)
    } else {
        tracing::info!("CORS: allowing origins: {:?}", config.cors_origins);
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    }
}

/// Routes mounted under `/api/v1/pseudo`.
pub fn create_pseudo_router() -> Router<AppState> {
    Router::new()
        .merge(catalog::create_router())
        .merge(translate::create_router())
        .merge(execute::create_router())
        .merge(scenarios::create_router())
        .merge(lifecycle::create_router())
}

/// Create the complete API router.
pub fn create_api_router(state: AppState) -> Router {
    let cors = build_cors_layer(&state.config);

    Router::new()
        .nest("/api/v1/pseudo", create_pseudo_router())
        .nest("/health", health::create_router())
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cors_layer_builds_for_both_modes() {
        let _dev = build_cors_layer(&ApiConfig::default());
        let _prod = build_cors_layer(&ApiConfig {
            cors_origins: vec!["https://admin.example.com".into()],
            cors_allow_credentials: true,
            ..ApiConfig::default()
        });
    }
}
