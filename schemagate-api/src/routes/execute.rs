//! Execute and Simulate Routes
//!
//! `POST /execute` runs a canonical request envelope in its own transaction.
//! `POST /simulate` translates free input first and always runs dry.

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use schemagate_core::{
    Command, ErrorKind, PseudoApiResponse, PseudoRequest, ResponseError, Scope, TranslateRequest,
    TranslationResult, Translator, DRY_RUN_WARNING,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::executor::{new_request_id, PseudoExecutor};
use crate::state::AppState;

// ============================================================================
// TYPES
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationResponse {
    pub translation: TranslationResult,
    pub response: PseudoApiResponse,
}

/// A request resolved from either a prompt or a literal payload.
pub(crate) struct PreparedItem {
    pub translation: Option<TranslationResult>,
    pub request: Result<PseudoRequest, ResponseError>,
}

/// Resolve exactly one of `prompt` and `request` into a canonical request.
///
/// A literal `request` is an envelope when it carries `command`, otherwise a
/// bare command. `scope` is the caller's default; envelope scope overrides it.
pub(crate) fn prepare_item(
    translator: &dyn Translator,
    prompt: Option<&str>,
    request: Option<&Value>,
    scope: &Scope,
    dry_run: bool,
) -> PreparedItem {
    match (prompt, request) {
        (Some(prompt), None) => {
            let mut translate = TranslateRequest::new(prompt, scope.clone());
            translate.dry_run = dry_run;
            let translation = translator.translate(&translate);
            let request = match (&translation.pseudo_request, translation.success) {
                (Some(request), true) => Ok(request.clone()),
                _ => Err(ResponseError::new(
                    ErrorKind::TranslationFailed,
                    format!(
                        "translation failed: {}",
                        translation.error.as_deref().unwrap_or("no request produced")
                    ),
                )),
            };
            PreparedItem {
                translation: Some(translation),
                request,
            }
        }
        (None, Some(literal)) => {
            let request = if literal.get("command").is_some() {
                serde_json::from_value::<PseudoRequest>(literal.clone()).map(|mut envelope| {
                    envelope.scope = scope.merged_with(&envelope.scope);
                    envelope
                })
            } else {
                serde_json::from_value::<Command>(literal.clone())
                    .map(|command| PseudoRequest::new(command, scope.clone()))
            };
            PreparedItem {
                translation: None,
                request: request
                    .map_err(|e| ResponseError::new(ErrorKind::InvalidRequest, format!("invalid request: {}", e))),
            }
        }
        _ => PreparedItem {
            translation: None,
            request: Err(ResponseError::new(
                ErrorKind::InvalidRequest,
                "an item must set exactly one of prompt and request",
            )),
        },
    }
}

/// Run a prepared item, or turn its preparation error into a failure response.
pub(crate) async fn run_prepared(
    executor: &PseudoExecutor,
    request: Result<PseudoRequest, ResponseError>,
    dry_run: bool,
) -> PseudoApiResponse {
    match request {
        Ok(mut request) => {
            request.dry_run |= dry_run;
            executor.execute(request).await
        }
        Err(error) => {
            let response = PseudoApiResponse::failed(new_request_id(), dry_run, None, error);
            if dry_run {
                response.with_warning(DRY_RUN_WARNING)
            } else {
                response
            }
        }
    }
}

// ============================================================================
// ROUTE HANDLERS
// ============================================================================

/// POST /api/v1/pseudo/execute - Execute a canonical request envelope
pub async fn execute(
    State(executor): State<Arc<PseudoExecutor>>,
    Json(request): Json<PseudoRequest>,
) -> ApiResult<impl IntoResponse> {
    Ok(Json(executor.execute(request).await))
}

/// POST /api/v1/pseudo/simulate - Translate, then execute as a dry run
pub async fn simulate(
    State(translator): State<Arc<dyn Translator>>,
    State(executor): State<Arc<PseudoExecutor>>,
    Json(req): Json<TranslateRequest>,
) -> ApiResult<impl IntoResponse> {
    if req.input.trim().is_empty() {
        return Err(ApiError::missing_field("input"));
    }

    let prepared = prepare_item(translator.as_ref(), Some(&req.input), None, &req.scope, true);
    let response = run_prepared(&executor, prepared.request, true).await;
    let translation = prepared
        .translation
        .unwrap_or_else(|| TranslationResult::rejected("no translation produced"));

    Ok(Json(SimulationResponse { translation, response }))
}

pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/execute", post(execute))
        .route("/simulate", post(simulate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemagate_core::{CommandKind, JsonTranslator};
    use schemagate_test_utils::fixtures::{tenant_scope, TENANT};
    use serde_json::json;

    #[test]
    fn test_literal_command_takes_caller_scope() {
        let prepared = prepare_item(
            &JsonTranslator,
            None,
            Some(&json!({"kind": "query", "table": "queues"})),
            &tenant_scope(),
            false,
        );
        assert!(prepared.translation.is_none());
        let request = prepared.request.unwrap();
        assert_eq!(request.command.kind(), CommandKind::Query);
        assert_eq!(request.scope.tenant_id(), Some(TENANT));
    }

    #[test]
    fn test_literal_envelope_scope_wins() {
        let prepared = prepare_item(
            &JsonTranslator,
            None,
            Some(&json!({"scope": {"bizId": "biz_9"}, "command": {"kind": "query", "table": "queues"}})),
            &tenant_scope(),
            false,
        );
        assert_eq!(prepared.request.unwrap().scope.tenant_id(), Some("biz_9"));
    }

    #[test]
    fn test_free_text_prompt_fails_translation() {
        let prepared = prepare_item(&JsonTranslator, Some("show me the queues"), None, &tenant_scope(), true);
        let translation = prepared.translation.unwrap();
        assert!(!translation.success);
        assert_eq!(prepared.request.unwrap_err().code, ErrorKind::TranslationFailed);
    }

    #[test]
    fn test_exactly_one_source_required() {
        let both = prepare_item(
            &JsonTranslator,
            Some("{}"),
            Some(&json!({"kind": "query", "table": "queues"})),
            &Scope::default(),
            true,
        );
        assert_eq!(both.request.unwrap_err().code, ErrorKind::InvalidRequest);

        let neither = prepare_item(&JsonTranslator, None, None, &Scope::default(), true);
        assert_eq!(neither.request.unwrap_err().code, ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_malformed_literal_is_invalid_request() {
        let literal = json!({"kind": "drop", "table": "queues"});
        let prepared = prepare_item(&JsonTranslator, None, Some(&literal), &Scope::default(), false);
        assert_eq!(prepared.request.unwrap_err().code, ErrorKind::InvalidRequest);
    }
}
