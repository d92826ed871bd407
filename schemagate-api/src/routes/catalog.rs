//! Catalog Snapshot Route

use axum::{
    extract::{Query, State},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use schemagate_core::CatalogService;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogParams {
    /// Focus the snapshot on one table (loose name accepted).
    pub table: Option<String>,
    /// Rebuild from the live schema before answering.
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/v1/pseudo/catalog - Schema catalog snapshot
pub async fn get_catalog(
    State(catalog): State<Arc<CatalogService>>,
    Query(params): Query<CatalogParams>,
) -> ApiResult<impl IntoResponse> {
    let current = if params.refresh {
        catalog.force_refresh().await?
    } else {
        catalog.get().await?
    };

    let focus = params.table.as_deref().map(str::trim).filter(|t| !t.is_empty());
    match current.snapshot(focus) {
        Some(view) => Ok(Json(view)),
        None => Err(ApiError::table_not_found(focus.unwrap_or_default())),
    }
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/catalog", get(get_catalog))
}
