//! Transactional Executor
//!
//! Runs compiled command trees against PostgreSQL. Two entry points share one
//! execution core:
//!
//! - [`PseudoExecutor::execute`] (owning mode) checks out a connection, opens
//!   a transaction, runs the plan and commits, or rolls back on dry-run, on
//!   any failure, or when the caller stops waiting.
//! - [`execute_in`] (guest mode) runs inside a transaction the caller opened
//!   and never issues transaction control itself.
//!
//! Both return a `PseudoApiResponse` for every statement-level outcome. Compile
//! errors are turned into failure responses before any SQL is sent.

use std::sync::Arc;
use std::time::Instant;

use postgres_types::ToSql;
use schemagate_compiler::{CommandCompiler, CompiledCommand, CompiledPlan, CompilerOptions};
use schemagate_core::{
    CatalogService, CommandKind, ErrorKind, ExecutionTraceStep, PseudoApiResponse, PseudoRequest,
    ResponseError, SchemaCatalog, DRY_RUN_WARNING,
};
use schemagate_lifecycle::SessionError;
use serde_json::{json, Value};
use tokio_postgres::{Client, GenericClient};
use uuid::Uuid;

use crate::db::DbClient;
use crate::idempotency::{fingerprint, IdempotencyStore, Replay, REPLAY_WARNING};
use crate::params::SqlParam;

/// Fresh request id for callers that did not send one.
pub fn new_request_id() -> String {
    format!("req_{}", Uuid::now_v7().simple())
}

/// Wrap a compiled statement so its rows come back as one JSON column.
pub fn wrap_as_json(sql: &str) -> String {
    format!(
        "WITH result_rows AS ({}) SELECT to_jsonb(result_rows) FROM result_rows",
        sql
    )
}

// ============================================================================
// EXECUTION CORE
// ============================================================================

/// A statement the database refused, with the trace up to that point.
struct PlanFailure {
    error: ResponseError,
    trace: Vec<ExecutionTraceStep>,
    closed: bool,
}

/// Map a driver error to a response error, keeping the server's diagnostics.
pub fn database_failure(err: &tokio_postgres::Error) -> ResponseError {
    if let Some(db) = err.as_db_error() {
        let mut details = serde_json::Map::new();
        details.insert("sqlstate".into(), json!(db.code().code()));
        if let Some(constraint) = db.constraint() {
            details.insert("constraint".into(), json!(constraint));
        }
        if let Some(table) = db.table() {
            details.insert("table".into(), json!(table));
        }
        if let Some(column) = db.column() {
            details.insert("column".into(), json!(column));
        }
        if let Some(detail) = db.detail() {
            details.insert("detail".into(), json!(detail));
        }
        return ResponseError::new(ErrorKind::DatabaseError, db.message()).with_details(Value::Object(details));
    }

    if err.is_closed() {
        return ResponseError::new(ErrorKind::ConnectionError, "database connection closed");
    }
    ResponseError::new(ErrorKind::DatabaseError, err.to_string())
}

fn leaf_result(leaf: &CompiledCommand, rows: Vec<Value>) -> Value {
    json!({
        "table": leaf.table,
        "kind": leaf.kind,
        "rowCount": rows.len(),
        "rows": rows,
    })
}

/// Rebuild the caller's batch nesting from the flat leaf results.
fn assemble(plan: &CompiledPlan, leaves: &mut impl Iterator<Item = Value>) -> Value {
    match plan {
        CompiledPlan::Leaf(_) => leaves.next().unwrap_or(Value::Null),
        CompiledPlan::Batch(children) => {
            let results: Vec<Value> = children.iter().map(|child| assemble(child, leaves)).collect();
            let row_count: u64 = results
                .iter()
                .filter_map(|r| r.get("rowCount").and_then(Value::as_u64))
                .sum();
            json!({"rowCount": row_count, "results": results})
        }
    }
}

async fn run_plan<C: GenericClient + Sync>(
    client: &C,
    plan: &CompiledPlan,
    dry_run: bool,
) -> Result<(Value, Vec<ExecutionTraceStep>), PlanFailure> {
    let leaves = plan.leaves();
    let mut trace = Vec::with_capacity(leaves.len());
    let mut results = Vec::with_capacity(leaves.len());

    for leaf in leaves {
        let params = SqlParam::all(&leaf.params);
        let refs: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

        let rows = match client.query(wrap_as_json(&leaf.sql).as_str(), &refs).await {
            Ok(rows) => rows,
            Err(err) => {
                tracing::debug!(table = %leaf.table, kind = %leaf.kind, error = %err, "Statement failed");
                return Err(PlanFailure {
                    error: database_failure(&err),
                    closed: err.is_closed() || client.client().is_closed(),
                    trace,
                });
            }
        };

        let mut values = Vec::with_capacity(rows.len());
        for row in &rows {
            match row.try_get::<_, Value>(0) {
                Ok(value) => values.push(value),
                Err(err) => {
                    return Err(PlanFailure {
                        error: ResponseError::new(ErrorKind::InternalError, format!("unreadable result row: {}", err)),
                        closed: false,
                        trace,
                    })
                }
            }
        }

        trace.push(ExecutionTraceStep {
            step: trace.len() + 1,
            kind: leaf.kind,
            table: leaf.table.clone(),
            sql: leaf.sql.clone(),
            params: leaf.params.clone(),
            row_count: values.len() as u64,
            dry_run,
        });
        results.push(leaf_result(leaf, values));
    }

    let mut results = results.into_iter();
    Ok((assemble(plan, &mut results), trace))
}

// ============================================================================
// GUEST MODE
// ============================================================================

/// Execute inside a transaction the caller owns.
///
/// Statement failures come back as failure responses. `Err` means the
/// connection is gone and the caller's transaction with it.
pub async fn execute_in(
    client: &Client,
    catalog: &SchemaCatalog,
    options: CompilerOptions,
    request: &PseudoRequest,
) -> Result<PseudoApiResponse, SessionError> {
    let request_id = request.request_id.clone().unwrap_or_else(new_request_id);
    let kind = request.command.kind();

    let compilation = match CommandCompiler::with_options(catalog, options).compile(&request.command, &request.scope) {
        Ok(compilation) => compilation,
        Err(err) => return Ok(PseudoApiResponse::failed(request_id, request.dry_run, Some(kind), err.into())),
    };

    match run_plan(client, &compilation.plan, request.dry_run).await {
        Ok((result, trace)) => {
            let mut response = PseudoApiResponse::succeeded(request_id, request.dry_run, kind, result, trace);
            response.warnings.extend(compilation.warnings);
            Ok(response)
        }
        Err(failure) if failure.closed => Err(SessionError::Connection(failure.error.message)),
        Err(failure) => Ok(
            PseudoApiResponse::failed(request_id, request.dry_run, Some(kind), failure.error).with_trace(failure.trace),
        ),
    }
}

// ============================================================================
// OWNING MODE
// ============================================================================

/// Executor that owns its transaction per request.
#[derive(Clone)]
pub struct PseudoExecutor {
    db: DbClient,
    catalog: Arc<CatalogService>,
    options: CompilerOptions,
    idempotency: Arc<IdempotencyStore>,
}

impl PseudoExecutor {
    pub fn new(
        db: DbClient,
        catalog: Arc<CatalogService>,
        options: CompilerOptions,
        idempotency: Arc<IdempotencyStore>,
    ) -> Self {
        Self {
            db,
            catalog,
            options,
            idempotency,
        }
    }

    pub fn db(&self) -> &DbClient {
        &self.db
    }

    pub fn catalog(&self) -> &Arc<CatalogService> {
        &self.catalog
    }

    pub fn options(&self) -> CompilerOptions {
        self.options
    }

    /// Execute one request in its own transaction. Never fails outright.
    pub async fn execute(&self, request: PseudoRequest) -> PseudoApiResponse {
        let started = Instant::now();
        let request_id = request.request_id.clone().unwrap_or_else(new_request_id);
        let kind = request.command.kind();

        let response = self.execute_owned(&request, &request_id, kind).await;

        tracing::info!(
            request_id = %response.request_id,
            kind = ?kind,
            dry_run = request.dry_run,
            success = response.success,
            statements = response.trace.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Pseudo request executed"
        );
        response
    }

    async fn execute_owned(&self, request: &PseudoRequest, request_id: &str, kind: CommandKind) -> PseudoApiResponse {
        let dry_run = request.dry_run;
        let fail = |error: ResponseError| {
            let response = PseudoApiResponse::failed(request_id, dry_run, Some(kind), error);
            if dry_run {
                response.with_warning(DRY_RUN_WARNING)
            } else {
                response
            }
        };

        let catalog = match self.catalog.get().await {
            Ok(catalog) => catalog,
            Err(err) => return fail(ResponseError::new(ErrorKind::CatalogUnavailable, err.to_string())),
        };

        // Dry runs never persist, so they are never replayed either.
        let idempotency = match request.idempotency_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() && !dry_run => Some((key, fingerprint(request))),
            _ => None,
        };
        if let Some((key, print)) = &idempotency {
            match self.idempotency.lookup(request.scope.tenant_id(), key, print) {
                Replay::Fresh => {}
                Replay::Stored(stored) => {
                    tracing::info!(idempotency_key = %key, "Replaying stored response");
                    return (*stored).with_warning(REPLAY_WARNING);
                }
                Replay::Conflict => {
                    return fail(ResponseError::new(
                        ErrorKind::IdempotencyConflict,
                        format!("idempotency key '{}' was already used with a different request", key),
                    ))
                }
            }
        }

        let compilation = match CommandCompiler::with_options(&catalog, self.options).compile(&request.command, &request.scope) {
            Ok(compilation) => compilation,
            Err(err) => {
                tracing::debug!(error = %err, "Command rejected at compile time");
                return fail(err.into());
            }
        };

        let mut conn = match self.db.get_conn().await {
            Ok(conn) => conn,
            Err(err) => return fail(ResponseError::new(ErrorKind::ConnectionError, err.message)),
        };

        // If this future is dropped mid-statement, dropping `tx` queues a
        // ROLLBACK ahead of anything the connection's next user sends.
        let tx = match conn.transaction().await {
            Ok(tx) => tx,
            Err(err) => return fail(database_failure(&err)),
        };
        let executed = run_plan(&*tx, &compilation.plan, dry_run).await;
        let finished = match (&executed, dry_run) {
            (Ok(_), false) => tx.commit().await,
            _ => tx.rollback().await,
        };
        if let Err(err) = &finished {
            // The transaction state is unknown; never hand this connection back to the pool.
            tracing::warn!(error = %err, "Transaction did not finish cleanly");
            drop(deadpool_postgres::Object::take(conn));
        }

        let (result, trace) = match executed {
            Ok(outcome) => outcome,
            Err(failure) => return fail(failure.error).with_trace(failure.trace),
        };
        if let Err(err) = finished {
            return fail(database_failure(&err)).with_trace(trace);
        }

        let mut response = PseudoApiResponse::succeeded(request_id, dry_run, kind, result, trace);
        response.warnings.extend(compilation.warnings);
        if dry_run {
            response = response.with_warning(DRY_RUN_WARNING);
        }

        if let Some((key, print)) = idempotency {
            self.idempotency
                .record(request.scope.tenant_id(), key, print, response.clone());
        }
        response
    }
}
