//! Lifecycle Run Route

use axum::{extract::State, response::IntoResponse, routing::post, Json, Router};
use schemagate_lifecycle::{LifecycleOrchestrator, LifecycleRunRequest};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::executor::PseudoExecutor;
use crate::lifecycle::PgRunSession;
use crate::state::AppState;

/// Reject runs that cannot do anything before a connection is checked out.
fn validate(req: &LifecycleRunRequest) -> ApiResult<()> {
    if req.phases.is_empty() {
        return Err(ApiError::missing_field("phases"));
    }
    if let Some(phase) = req.phases.iter().find(|p| p.name.trim().is_empty()) {
        return Err(ApiError::invalid_input(format!(
            "every phase needs a name ({} step(s) in an unnamed phase)",
            phase.steps.len()
        )));
    }
    Ok(())
}

/// POST /api/v1/pseudo/lifecycle - Run phases of steps in one transaction
pub async fn run_lifecycle(
    State(executor): State<Arc<PseudoExecutor>>,
    State(orchestrator): State<Arc<LifecycleOrchestrator>>,
    Json(req): Json<LifecycleRunRequest>,
) -> ApiResult<impl IntoResponse> {
    validate(&req)?;

    let session = PgRunSession::begin(&executor).await?;
    let result = orchestrator.run(session, &req).await;
    Ok(Json(result))
}

pub fn create_router() -> Router<AppState> {
    Router::new().route("/lifecycle", post(run_lifecycle))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    fn request(value: serde_json::Value) -> LifecycleRunRequest {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_validate_requires_phases() {
        let err = validate(&request(json!({"phases": []}))).unwrap_err();
        assert_eq!(err.code, ErrorCode::MissingField);
    }

    #[test]
    fn test_validate_requires_phase_names() {
        let err = validate(&request(json!({"phases": [{"name": " ", "steps": []}]}))).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);

        assert!(validate(&request(json!({"phases": [{"name": "setup", "steps": []}]}))).is_ok());
    }
}
