//! Scenario Run Route
//!
//! A scenario run is a list of named prompts or literal requests, each
//! executed independently as a dry run in its own transaction.

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use schemagate_core::{PseudoApiResponse, Scope, TranslationResult, Translator};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::executor::PseudoExecutor;
use crate::routes::execute::{prepare_item, run_prepared};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRunRequest {
    pub items: Vec<ScenarioItem>,
    #[serde(default)]
    pub scope: Option<Scope>,
    /// Stop at the first failed item; later items are not run.
    #[serde(default)]
    pub stop_on_error: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioItemResult {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationResult>,
    pub response: PseudoApiResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioRunResponse {
    pub results: Vec<ScenarioItemResult>,
    pub succeeded: usize,
    pub failed: usize,
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/pseudo/scenarios - Run named items as dry runs
pub async fn run_scenarios(
    State(translator): State<Arc<dyn Translator>>,
    State(executor): State<Arc<PseudoExecutor>>,
    Json(req): Json<ScenarioRunRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.items.is_empty() {
        return Err(ApiError::missing_field("items"));
    }

    let scope = req.scope.clone().unwrap_or_default();
    let mut results = Vec::with_capacity(req.items.len());
    let (mut succeeded, mut failed) = (0, 0);

    for item in &req.items {
        let prepared = prepare_item(
            translator.as_ref(),
            item.prompt.as_deref(),
            item.request.as_ref(),
            &scope,
            true,
        );
        let response = run_prepared(&executor, prepared.request, true).await;

        let ok = response.success;
        if ok {
            succeeded += 1;
        } else {
            failed += 1;
        }
        results.push(ScenarioItemResult {
            name: item.name.clone(),
            translation: prepared.translation,
            response,
        });

        if !ok && req.stop_on_error {
            tracing::debug!(item = %item.name, "Scenario run stopped at failed item");
            break;
        }
    }

    tracing::info!(
        items = req.items.len(),
        succeeded,
        failed,
        "Scenario run finished"
    );

    Ok(Json(ScenarioRunResponse {
        results,
        succeeded,
        failed,
    }))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/scenarios", post(run_scenarios))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_defaults() {
        let req: ScenarioRunRequest = serde_json::from_value(json!({
            "items": [{"name": "list queues", "request": {"kind": "query", "table": "queues"}}]
        }))
        .unwrap();
        assert!(!req.stop_on_error);
        assert!(req.scope.is_none());
        assert!(req.items[0].prompt.is_none());
    }
}
