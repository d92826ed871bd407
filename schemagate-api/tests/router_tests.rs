//! Router tests for the schemagate HTTP surface
//!
//! Every request here is rejected or answered before a database connection
//! is checked out, so no PostgreSQL instance is needed.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use schemagate_api::create_api_router;
use schemagate_core::{Command, DRY_RUN_WARNING};
use schemagate_test_utils::{fixtures::TENANT, StaticTranslator};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

#[path = "support/app.rs"]
mod test_app_support;

use test_app_support::{json_app_state, test_app_state};

fn app() -> Router {
    create_api_router(json_app_state())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

// ============================================================================
// HEALTH
// ============================================================================

#[tokio::test]
async fn test_ping() {
    let response = app().oneshot(get("/health/ping")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"pong");
}

#[tokio::test]
async fn test_liveness() {
    let (status, body) = send(app(), get("/health/live")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

// ============================================================================
// CATALOG
// ============================================================================

#[tokio::test]
async fn test_catalog_snapshot() {
    let (status, body) = send(app(), get("/api/v1/pseudo/catalog")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenantColumn"], "biz_id");
    assert_eq!(body["tables"].as_array().unwrap().len(), 6);
}

#[tokio::test]
async fn test_catalog_focus_accepts_loose_name() {
    let (status, body) = send(app(), get("/api/v1/pseudo/catalog?table=booking%20orders")).await;
    assert_eq!(status, StatusCode::OK);
    let tables = body["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 1);
    assert_eq!(tables[0]["name"], "booking_orders");
}

#[tokio::test]
async fn test_catalog_unknown_table_is_404() {
    let (status, body) = send(app(), get("/api/v1/pseudo/catalog?table=invoices")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "TABLE_NOT_FOUND");
}

// ============================================================================
// TRANSLATE
// ============================================================================

#[tokio::test]
async fn test_translate_json_command() {
    let input = json!({"kind": "query", "table": "queues"}).to_string();
    let (status, body) = send(
        app(),
        post("/api/v1/pseudo/translate", json!({"input": input, "scope": {"bizId": TENANT}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["pseudoRequest"]["scope"]["bizId"], TENANT);
    assert_eq!(body["pseudoRequest"]["command"]["kind"], "query");
}

#[tokio::test]
async fn test_translate_free_text_is_rejected() {
    let (status, body) = send(
        app(),
        post("/api/v1/pseudo/translate", json!({"input": "show me every open queue"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn test_translate_requires_input() {
    let (status, body) = send(app(), post("/api/v1/pseudo/translate", json!({"input": "  "}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

// ============================================================================
// EXECUTE / SIMULATE
// ============================================================================

#[tokio::test]
async fn test_execute_unknown_table_fails_before_sql() {
    let (status, body) = send(
        app(),
        post(
            "/api/v1/pseudo/execute",
            json!({"scope": {"bizId": TENANT}, "command": {"kind": "query", "table": "invoices"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNKNOWN_TABLE");
    assert!(body["requestId"].as_str().unwrap().starts_with("req_"));
    assert!(body["trace"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_execute_without_tenant_is_rejected() {
    let (status, body) = send(
        app(),
        post("/api/v1/pseudo/execute", json!({"command": {"kind": "query", "table": "queues"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "MISSING_TENANT_SCOPE");
}

#[tokio::test]
async fn test_dry_run_warning_on_compile_failure() {
    let (status, body) = send(
        app(),
        post(
            "/api/v1/pseudo/execute",
            json!({
                "dryRun": true,
                "scope": {"bizId": TENANT},
                "command": {"kind": "mutate", "operation": "delete", "table": "queues", "filters": []}
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNSAFE_MUTATION");
    assert_eq!(body["dryRun"], true);
    assert!(body["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .any(|w| w == DRY_RUN_WARNING));
}

#[tokio::test]
async fn test_committing_failure_has_no_dry_run_warning() {
    let (_, body) = send(
        app(),
        post(
            "/api/v1/pseudo/execute",
            json!({"scope": {"bizId": TENANT}, "command": {"kind": "query", "table": "invoices"}}),
        ),
    )
    .await;
    assert!(body["warnings"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_execute_keeps_caller_request_id() {
    let (_, body) = send(
        app(),
        post(
            "/api/v1/pseudo/execute",
            json!({
                "requestId": "req_caller",
                "scope": {"bizId": TENANT},
                "command": {"kind": "query", "table": "invoices"}
            }),
        ),
    )
    .await;
    assert_eq!(body["requestId"], "req_caller");
}

#[tokio::test]
async fn test_simulate_reports_translation_failure() {
    let (status, body) = send(
        app(),
        post("/api/v1/pseudo/simulate", json!({"input": "cancel tomorrow's bookings"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["translation"]["success"], false);
    assert_eq!(body["response"]["success"], false);
    assert_eq!(body["response"]["dryRun"], true);
    assert_eq!(body["response"]["error"]["code"], "TRANSLATION_FAILED");
    assert_eq!(body["response"]["warnings"][0], DRY_RUN_WARNING);
}

#[tokio::test]
async fn test_simulate_uses_configured_translator() {
    let command: Command = serde_json::from_value(json!({"kind": "query", "table": "invoices"})).unwrap();
    let translator = StaticTranslator::new().with_command("list invoices", command);
    let app = create_api_router(test_app_state(Arc::new(translator)));
    let (_, body) = send(
        app,
        post(
            "/api/v1/pseudo/simulate",
            json!({"input": "list invoices", "scope": {"bizId": TENANT}}),
        ),
    )
    .await;
    assert_eq!(body["translation"]["success"], true);
    assert_eq!(body["response"]["error"]["code"], "UNKNOWN_TABLE");
}

// ============================================================================
// SCENARIOS / LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_scenarios_collect_item_failures() {
    let (status, body) = send(
        app(),
        post(
            "/api/v1/pseudo/scenarios",
            json!({
                "scope": {"bizId": TENANT},
                "items": [
                    {"name": "free text", "prompt": "list the queues"},
                    {"name": "unknown", "request": {"kind": "query", "table": "invoices"}},
                    {"name": "both", "prompt": "x", "request": {"kind": "query", "table": "queues"}}
                ]
            }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["succeeded"], 0);
    assert_eq!(body["failed"], 3);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["response"]["error"]["code"], "TRANSLATION_FAILED");
    assert_eq!(results[1]["response"]["error"]["code"], "UNKNOWN_TABLE");
    assert_eq!(results[2]["response"]["error"]["code"], "INVALID_REQUEST");
    assert!(results.iter().all(|r| r["response"]["dryRun"] == true));
}

#[tokio::test]
async fn test_scenarios_stop_on_error() {
    let (_, body) = send(
        app(),
        post(
            "/api/v1/pseudo/scenarios",
            json!({
                "stopOnError": true,
                "items": [
                    {"name": "first", "request": {"kind": "query", "table": "invoices"}},
                    {"name": "second", "request": {"kind": "query", "table": "invoices"}}
                ]
            }),
        ),
    )
    .await;
    assert_eq!(body["results"].as_array().unwrap().len(), 1);
    assert_eq!(body["failed"], 1);
}

#[tokio::test]
async fn test_scenarios_require_items() {
    let (status, body) = send(app(), post("/api/v1/pseudo/scenarios", json!({"items": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_lifecycle_requires_phases() {
    let (status, body) = send(app(), post("/api/v1/pseudo/lifecycle", json!({"phases": []}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "MISSING_FIELD");
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let response = app().oneshot(get("/api/v1/pseudo/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
