//! PostgreSQL-backed run session.
//!
//! A lifecycle run checks out one pooled connection, opens one transaction on
//! it and keeps both until `commit` or `rollback`. Steps execute through the
//! guest-mode executor, so nothing here issues SQL outside the run's control.
//! A run that outlives its deadline cancels the in-flight statement and
//! discards the connection instead of queueing a `ROLLBACK` behind it.

use async_trait::async_trait;
use schemagate_compiler::CompilerOptions;
use schemagate_core::{PseudoApiResponse, PseudoRequest, SchemaCatalog};
use schemagate_lifecycle::{RunSession, SessionError, STEP_SAVEPOINT};
use std::sync::Arc;
use tokio_postgres::{Client, NoTls};

use crate::executor::{execute_in, PseudoExecutor};

fn session_error(err: tokio_postgres::Error) -> SessionError {
    if err.is_closed() {
        SessionError::Connection(err.to_string())
    } else {
        SessionError::Transaction(err.to_string())
    }
}

/// One open transaction on one exclusively held connection.
pub struct PgRunSession {
    conn: Option<deadpool_postgres::Object>,
    catalog: Arc<SchemaCatalog>,
    options: CompilerOptions,
}

impl PgRunSession {
    /// Check out a connection and `BEGIN`.
    ///
    /// The catalog snapshot is taken once here and used for every step.
    pub async fn begin(executor: &PseudoExecutor) -> Result<Self, SessionError> {
        let catalog = executor
            .catalog()
            .get()
            .await
            .map_err(|e| SessionError::Catalog(e.to_string()))?;
        let conn = executor
            .db()
            .get_conn()
            .await
            .map_err(|e| SessionError::Connection(e.message))?;

        conn.batch_execute("BEGIN").await.map_err(session_error)?;
        tracing::debug!(tables = catalog.summary().table_count, "Lifecycle transaction opened");

        Ok(Self {
            conn: Some(conn),
            catalog,
            options: executor.options(),
        })
    }

    fn client(&self) -> Result<&Client, SessionError> {
        self.conn
            .as_deref()
            .map(|wrapper| &**wrapper)
            .ok_or_else(|| SessionError::Transaction("session is already closed".into()))
    }

    async fn control(&self, statement: &str) -> Result<(), SessionError> {
        self.client()?.batch_execute(statement).await.map_err(session_error)
    }

    async fn finish(mut self, statement: &str) -> Result<(), SessionError> {
        let Some(conn) = self.conn.take() else {
            return Err(SessionError::Transaction("session is already closed".into()));
        };

        match conn.batch_execute(statement).await {
            Ok(()) => Ok(()),
            Err(err) => {
                // The transaction state is unknown; never hand this connection back to the pool.
                drop(deadpool_postgres::Object::take(conn));
                Err(session_error(err))
            }
        }
    }
}

impl Drop for PgRunSession {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            tracing::warn!("Run session dropped with an open transaction; discarding connection");
            drop(deadpool_postgres::Object::take(conn));
        }
    }
}

#[async_trait]
impl RunSession for PgRunSession {
    async fn execute(&mut self, request: &PseudoRequest) -> Result<PseudoApiResponse, SessionError> {
        let client = self.client()?;
        execute_in(client, &self.catalog, self.options, request).await
    }

    async fn savepoint(&mut self) -> Result<(), SessionError> {
        self.control(&format!("SAVEPOINT {}", STEP_SAVEPOINT)).await
    }

    async fn release_savepoint(&mut self) -> Result<(), SessionError> {
        self.control(&format!("RELEASE SAVEPOINT {}", STEP_SAVEPOINT)).await
    }

    async fn rollback_to_savepoint(&mut self) -> Result<(), SessionError> {
        self.control(&format!("ROLLBACK TO SAVEPOINT {}", STEP_SAVEPOINT)).await
    }

    async fn commit(self) -> Result<(), SessionError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), SessionError> {
        self.finish("ROLLBACK").await
    }

    /// Cancel whatever is still running and discard the connection.
    ///
    /// The server aborts the transaction when the connection goes away, so
    /// nothing here waits on the stuck statement.
    async fn abort(mut self) -> Result<(), SessionError> {
        let Some(conn) = self.conn.take() else {
            return Ok(());
        };
        let cancel = conn.cancel_token();
        drop(deadpool_postgres::Object::take(conn));

        tokio::spawn(async move {
            if let Err(err) = cancel.cancel_query(NoTls).await {
                tracing::warn!(error = %err, "Could not cancel the timed-out lifecycle statement");
            }
        });
        tracing::warn!("Lifecycle transaction abandoned after its deadline");
        Ok(())
    }
}
