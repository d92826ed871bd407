//! SCHEMAGATE API - PostgreSQL Executor & HTTP Surface
//!
//! Runs compiled pseudo-API commands against PostgreSQL and exposes them
//! over Axum routes under `/api/v1/pseudo`.
//!
//! Architecture:
//! ```text
//! HTTP (axum routes)
//!     ↓
//! Translator ──→ PseudoRequest
//!     ↓
//! PseudoExecutor (owning mode: BEGIN … COMMIT | ROLLBACK, idempotency replay)
//!     │
//!     └─ LifecycleOrchestrator → PgRunSession (guest mode, one transaction, savepoints)
//!     ↓
//! deadpool-postgres pool → tokio-postgres
//! ```

pub mod catalog_source;
pub mod config;
pub mod db;
pub mod error;
pub mod executor;
pub mod idempotency;
pub mod lifecycle;
pub mod macros;
pub mod params;
pub mod routes;
pub mod state;
pub mod telemetry;

// Re-export commonly used types
pub use catalog_source::PgCatalogSource;
pub use config::ApiConfig;
pub use db::{DbClient, DbConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use executor::{execute_in, PseudoExecutor};
pub use idempotency::IdempotencyStore;
pub use lifecycle::PgRunSession;
pub use params::SqlParam;
pub use routes::create_api_router;
pub use state::AppState;
