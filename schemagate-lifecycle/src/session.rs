//! The transactional scope a lifecycle run executes in.

use async_trait::async_trait;
use schemagate_core::{PseudoApiResponse, PseudoRequest};
use thiserror::Error;

/// Savepoint wrapped around every step.
pub const STEP_SAVEPOINT: &str = "lifecycle_step";

/// Failures of the session itself, as opposed to a failed statement.
///
/// Any of these ends the run as `fatal`.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("catalog unavailable: {0}")]
    Catalog(String),
}

/// One open transaction owned by a run.
///
/// `execute` reports statement failures inside the response. It only
/// returns `Err` when the session can no longer be used.
#[async_trait]
pub trait RunSession: Send + Sized {
    async fn execute(&mut self, request: &PseudoRequest) -> Result<PseudoApiResponse, SessionError>;

    /// Open [`STEP_SAVEPOINT`].
    async fn savepoint(&mut self) -> Result<(), SessionError>;

    async fn release_savepoint(&mut self) -> Result<(), SessionError>;

    async fn rollback_to_savepoint(&mut self) -> Result<(), SessionError>;

    async fn commit(self) -> Result<(), SessionError>;

    async fn rollback(self) -> Result<(), SessionError>;

    /// Give up on the transaction without waiting for the connection.
    ///
    /// Called when the run deadline expires, possibly with a statement still
    /// in flight. Sessions whose `rollback` cannot block may keep the default.
    async fn abort(self) -> Result<(), SessionError> {
        self.rollback().await
    }
}
