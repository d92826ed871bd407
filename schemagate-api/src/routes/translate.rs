//! Translate Route
//!
//! Forwards caller input to the configured translator. The default
//! translator only accepts JSON commands and envelopes.

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use schemagate_core::{TranslateRequest, Translator};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// POST /api/v1/pseudo/translate - Translate input into a canonical request
pub async fn translate(
    State(translator): State<Arc<dyn Translator>>,
    Json(req): Json<TranslateRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.input.trim().is_empty() {
        return Err(ApiError::missing_field("input"));
    }

    let result = translator.translate(&req);
    tracing::debug!(success = result.success, "Translation request");
    Ok(Json(result))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/translate", post(translate))
}
