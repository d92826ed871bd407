//! PostgreSQL-backed integration tests
//!
//! Run with `--features db-tests` against the database named by the
//! `SCHEMAGATE_DB_*` environment variables.

#![cfg(feature = "db-tests")]

use std::sync::Arc;
use std::time::{Duration, Instant};

use schemagate_api::{DbClient, IdempotencyStore, PgCatalogSource, PgRunSession, PseudoExecutor};
use schemagate_compiler::CompilerOptions;
use schemagate_core::{CatalogService, ErrorKind, JsonTranslator, PseudoRequest, DRY_RUN_WARNING};
use schemagate_lifecycle::{LifecycleOrchestrator, LifecycleRunRequest, RunStatus};
use schemagate_test_utils::assertions::assert_response_error;
use serde_json::{json, Value};

#[path = "support/db.rs"]
mod test_db_support;

use test_db_support::{test_db_client, test_db_client_with_pool_size};

const TABLE: &str = "sg_it_queues";

async fn ensure_table(db: &DbClient) {
    let conn = db.get_conn().await.unwrap();
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS sg_it_queues (
            id text PRIMARY KEY,
            biz_id text NOT NULL,
            name text NOT NULL,
            position int4,
            is_open bool NOT NULL DEFAULT true
        )",
    )
    .await
    .unwrap();
}

async fn test_executor() -> PseudoExecutor {
    executor_over(test_db_client()).await
}

async fn executor_over(db: DbClient) -> PseudoExecutor {
    ensure_table(&db).await;
    let source = PgCatalogSource::new(db.clone(), "public", "biz_id");
    PseudoExecutor::new(
        db,
        Arc::new(CatalogService::new(Arc::new(source))),
        CompilerOptions::default(),
        Arc::new(IdempotencyStore::new(Duration::from_secs(60))),
    )
}

/// A fresh tenant per test so parallel runs never see each other's rows.
fn tenant() -> String {
    format!("biz_{}", uuid::Uuid::now_v7().simple())
}

fn request(tenant: &str, command: Value) -> PseudoRequest {
    serde_json::from_value(json!({"scope": {"bizId": tenant}, "command": command})).unwrap()
}

fn insert(id: &str) -> Value {
    json!({
        "kind": "mutate",
        "operation": "insert",
        "table": TABLE,
        "values": {"id": id, "name": "Front desk", "position": 1}
    })
}

fn rename(id: &str) -> Value {
    json!({
        "kind": "mutate",
        "operation": "update",
        "table": TABLE,
        "values": {"name": "Renamed"},
        "filters": [{"column": "id", "op": "eq", "value": id}]
    })
}

fn find(id: &str) -> Value {
    json!({"kind": "query", "table": TABLE, "filters": [{"column": "id", "op": "eq", "value": id}]})
}

fn new_id() -> String {
    format!("q_{}", uuid::Uuid::now_v7().simple())
}

/// Hold a row lock from a separate pool until the returned connection rolls back.
async fn lock_row(id: &str) -> deadpool_postgres::Object {
    let locker = test_db_client().get_conn().await.unwrap();
    locker.batch_execute("BEGIN").await.unwrap();
    locker
        .query("SELECT id FROM sg_it_queues WHERE id = $1 FOR UPDATE", &[&id])
        .await
        .unwrap();
    locker
}

fn list() -> Value {
    json!({"kind": "query", "table": TABLE})
}

#[tokio::test]
async fn test_committed_insert_is_visible() {
    let executor = test_executor().await;
    let tenant = tenant();
    let id = format!("q_{}", uuid::Uuid::now_v7().simple());

    let response = executor.execute(request(&tenant, insert(&id))).await;
    assert!(response.success, "{:?}", response.error);
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.trace[0].step, 1);

    let rows = executor.execute(request(&tenant, list())).await;
    assert!(rows.success);
    let result = rows.result.unwrap();
    assert_eq!(result["rowCount"], 1);
    assert_eq!(result["rows"][0]["id"], id.as_str());
    assert_eq!(result["rows"][0]["biz_id"], tenant.as_str());
}

#[tokio::test]
async fn test_dry_run_insert_is_rolled_back() {
    let executor = test_executor().await;
    let tenant = tenant();

    let mut dry = request(&tenant, insert("q_dry"));
    dry.dry_run = true;
    let response = executor.execute(dry).await;
    assert!(response.success, "{:?}", response.error);
    assert!(response.dry_run);
    assert!(response.warnings.iter().any(|w| w == DRY_RUN_WARNING));
    assert_eq!(response.result.unwrap()["rows"][0]["id"], "q_dry");

    let rows = executor.execute(request(&tenant, list())).await;
    assert_eq!(rows.result.unwrap()["rowCount"], 0);
}

#[tokio::test]
async fn test_tenant_isolation() {
    let executor = test_executor().await;
    let (owner, other) = (tenant(), tenant());
    let id = format!("q_{}", uuid::Uuid::now_v7().simple());

    assert!(executor.execute(request(&owner, insert(&id))).await.success);

    let rows = executor.execute(request(&other, list())).await;
    assert_eq!(rows.result.unwrap()["rowCount"], 0);
}

#[tokio::test]
async fn test_failed_batch_rolls_back_earlier_statements() {
    let executor = test_executor().await;
    let tenant = tenant();
    let id = format!("q_{}", uuid::Uuid::now_v7().simple());

    let batch = json!({"kind": "batch", "commands": [insert(&id), insert(&id)]});
    let response = executor.execute(request(&tenant, batch)).await;
    assert_response_error(&response, ErrorKind::DatabaseError);
    assert_eq!(response.trace.len(), 1);
    assert_eq!(response.error.unwrap().details.unwrap()["sqlstate"], "23505");

    let rows = executor.execute(request(&tenant, list())).await;
    assert_eq!(rows.result.unwrap()["rowCount"], 0);
}

#[tokio::test]
async fn test_idempotent_replay() {
    let executor = test_executor().await;
    let tenant = tenant();
    let id = format!("q_{}", uuid::Uuid::now_v7().simple());

    let mut first = request(&tenant, insert(&id));
    first.idempotency_key = Some("create-front-desk".to_string());
    let original = executor.execute(first.clone()).await;
    assert!(original.success);

    let replay = executor.execute(first).await;
    assert!(replay.success);
    assert_eq!(replay.request_id, original.request_id);
    assert_eq!(replay.result, original.result);

    let mut changed = request(&tenant, insert("q_other"));
    changed.idempotency_key = Some("create-front-desk".to_string());
    let conflict = executor.execute(changed).await;
    assert_response_error(&conflict, ErrorKind::IdempotencyConflict);
}

#[tokio::test]
async fn test_lifecycle_run_rolls_back_dry_run() {
    let executor = test_executor().await;
    let tenant = tenant();

    let run: LifecycleRunRequest = serde_json::from_value(json!({
        "defaults": {"scope": {"bizId": tenant}},
        "phases": [{
            "name": "setup",
            "steps": [
                {"name": "create", "request": {
                    "kind": "mutate", "operation": "insert", "table": TABLE,
                    "values": {"id": "{{id:queue}}", "name": "Front desk"}},
                 "captures": [{"name": "queueId", "path": "result.rows[0].id", "required": true}]},
                {"name": "read back", "request": {
                    "kind": "query", "table": TABLE,
                    "filters": [{"column": "id", "op": "eq", "value": "{{queueId}}"}]},
                 "expect": {"rowCount": 1}}
            ]
        }]
    }))
    .unwrap();

    let orchestrator = LifecycleOrchestrator::new(Arc::new(JsonTranslator));
    let session = PgRunSession::begin(&executor).await.unwrap();
    let result = orchestrator.run(session, &run).await;

    assert_eq!(result.status, RunStatus::RolledBack, "{:?}", result.issues);
    assert!(!result.persisted);
    assert_eq!(result.summary.steps.passed, 2);

    let rows = executor.execute(request(&tenant, list())).await;
    assert_eq!(rows.result.unwrap()["rowCount"], 0);
}

#[tokio::test]
async fn test_catalog_introspection_sees_test_table() {
    let executor = test_executor().await;
    let catalog = executor.catalog().force_refresh().await.unwrap();
    let table = catalog.resolve_table("sg it queues").unwrap();
    assert_eq!(table.name(), TABLE);
    assert!(table.has_tenant_column());
    assert_eq!(table.primary_key(), ["id".to_string()]);
}

#[tokio::test]
async fn test_abandoned_dry_run_never_reaches_the_next_commit() {
    // One connection, so the next request reuses whatever the abandoned one left behind.
    let executor = executor_over(test_db_client_with_pool_size(1)).await;
    let tenant = tenant();
    let (locked, orphan) = (new_id(), new_id());
    assert!(executor.execute(request(&tenant, insert(&locked))).await.success);

    let locker = lock_row(&locked).await;
    let mut dry = request(&tenant, json!({"kind": "batch", "commands": [insert(&orphan), rename(&locked)]}));
    dry.dry_run = true;
    let abandoned = tokio::time::timeout(Duration::from_millis(500), executor.execute(dry)).await;
    assert!(abandoned.is_err(), "dry run should still be waiting on the row lock");
    locker.batch_execute("ROLLBACK").await.unwrap();

    let next = executor.execute(request(&tenant, insert(&new_id()))).await;
    assert!(next.success, "{:?}", next.error);

    let leaked = executor.execute(request(&tenant, find(&orphan))).await;
    assert_eq!(leaked.result.unwrap()["rowCount"], 0);
    let renamed = executor.execute(request(&tenant, find(&locked))).await;
    assert_eq!(renamed.result.unwrap()["rows"][0]["name"], "Front desk");
}

#[tokio::test]
async fn test_deadline_bounds_a_stuck_lifecycle_step() {
    let executor = test_executor().await;
    let tenant = tenant();
    let locked = new_id();
    assert!(executor.execute(request(&tenant, insert(&locked))).await.success);

    let run: LifecycleRunRequest = serde_json::from_value(json!({
        "defaults": {"dryRun": false, "scope": {"bizId": tenant}},
        "options": {"timeoutMs": 500},
        "phases": [{"name": "update", "steps": [{"name": "rename", "request": rename(&locked)}]}]
    }))
    .unwrap();

    let locker = lock_row(&locked).await;
    let started = Instant::now();
    let session = PgRunSession::begin(&executor).await.unwrap();
    let result = LifecycleOrchestrator::new(Arc::new(JsonTranslator)).run(session, &run).await;
    let took = started.elapsed();
    locker.batch_execute("ROLLBACK").await.unwrap();

    assert_eq!(result.status, RunStatus::Fatal);
    assert!(result.fatal_error.as_deref().unwrap().contains("500 ms"));
    assert!(took < Duration::from_secs(3), "run took {:?}", took);

    let row = executor.execute(request(&tenant, find(&locked))).await;
    assert_eq!(row.result.unwrap()["rows"][0]["name"], "Front desk");
}
