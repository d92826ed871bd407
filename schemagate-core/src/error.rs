//! Error types for schemagate operations

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERROR KIND
// ============================================================================

/// Error codes carried in pseudo-API responses.
///
/// Contract kinds describe a malformed or unsafe request and are always
/// raised before any SQL reaches the database. Runtime kinds describe what
/// went wrong once the request was accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    // ========================================================================
    // Request contract
    // ========================================================================
    InvalidRequest,
    UnknownTable,
    UnknownColumn,
    UnsafeIdentifier,
    MissingTenantScope,
    TenantMismatch,
    UnsafeMutation,
    InvalidFilter,
    EmptyValues,
    DuplicateColumn,
    EmptyBatch,
    TemplateUnresolved,
    TranslationFailed,
    IdempotencyConflict,

    // ========================================================================
    // Runtime
    // ========================================================================
    CatalogUnavailable,
    DatabaseError,
    ConnectionError,
    Timeout,
    InternalError,
}

impl ErrorKind {
    /// Whether this kind is a request-shape problem rather than a runtime one.
    pub fn is_contract(&self) -> bool {
        matches!(
            self,
            ErrorKind::InvalidRequest
                | ErrorKind::UnknownTable
                | ErrorKind::UnknownColumn
                | ErrorKind::UnsafeIdentifier
                | ErrorKind::MissingTenantScope
                | ErrorKind::TenantMismatch
                | ErrorKind::UnsafeMutation
                | ErrorKind::InvalidFilter
                | ErrorKind::EmptyValues
                | ErrorKind::DuplicateColumn
                | ErrorKind::EmptyBatch
                | ErrorKind::TemplateUnresolved
                | ErrorKind::TranslationFailed
                | ErrorKind::IdempotencyConflict
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::InvalidRequest => "INVALID_REQUEST",
            ErrorKind::UnknownTable => "UNKNOWN_TABLE",
            ErrorKind::UnknownColumn => "UNKNOWN_COLUMN",
            ErrorKind::UnsafeIdentifier => "UNSAFE_IDENTIFIER",
            ErrorKind::MissingTenantScope => "MISSING_TENANT_SCOPE",
            ErrorKind::TenantMismatch => "TENANT_MISMATCH",
            ErrorKind::UnsafeMutation => "UNSAFE_MUTATION",
            ErrorKind::InvalidFilter => "INVALID_FILTER",
            ErrorKind::EmptyValues => "EMPTY_VALUES",
            ErrorKind::DuplicateColumn => "DUPLICATE_COLUMN",
            ErrorKind::EmptyBatch => "EMPTY_BATCH",
            ErrorKind::TemplateUnresolved => "TEMPLATE_UNRESOLVED",
            ErrorKind::TranslationFailed => "TRANSLATION_FAILED",
            ErrorKind::IdempotencyConflict => "IDEMPOTENCY_CONFLICT",
            ErrorKind::CatalogUnavailable => "CATALOG_UNAVAILABLE",
            ErrorKind::DatabaseError => "DATABASE_ERROR",
            ErrorKind::ConnectionError => "CONNECTION_ERROR",
            ErrorKind::Timeout => "TIMEOUT",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// COMPILE ERRORS
// ============================================================================

/// Errors raised while turning a command into SQL.
///
/// Every variant is detected from data alone, so none of them ever reaches
/// the database driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("unknown table: '{input}' does not match any catalog table or alias")]
    UnknownTable { input: String },

    #[error("unknown column: '{input}' is not a column of table '{table}'")]
    UnknownColumn { table: String, input: String },

    #[error("unsafe identifier: '{identifier}' must match ^[a-z][a-z0-9_]*$")]
    UnsafeIdentifier { identifier: String },

    #[error("missing tenant scope: table '{table}' is tenant-scoped and requires scope.bizId")]
    MissingTenantScope { table: String },

    #[error("tenant mismatch on table '{table}': scope bizId is '{expected}' but the command targets {actual}")]
    TenantMismatch {
        table: String,
        expected: String,
        actual: String,
    },

    #[error("unsafe mutation: {operation} on '{table}' requires at least one filter")]
    UnsafeMutation { table: String, operation: String },

    #[error("invalid filter on column '{column}': {reason}")]
    InvalidFilter { column: String, reason: String },

    #[error("empty values: {operation} on '{table}' requires at least one column value")]
    EmptyValues { table: String, operation: String },

    #[error("duplicate column: '{column}' is assigned more than once on table '{table}'")]
    DuplicateColumn { table: String, column: String },

    #[error("empty batch: a batch command requires at least one sub-command")]
    EmptyBatch,
}

impl CompileError {
    /// The response error kind for this compile error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CompileError::UnknownTable { .. } => ErrorKind::UnknownTable,
            CompileError::UnknownColumn { .. } => ErrorKind::UnknownColumn,
            CompileError::UnsafeIdentifier { .. } => ErrorKind::UnsafeIdentifier,
            CompileError::MissingTenantScope { .. } => ErrorKind::MissingTenantScope,
            CompileError::TenantMismatch { .. } => ErrorKind::TenantMismatch,
            CompileError::UnsafeMutation { .. } => ErrorKind::UnsafeMutation,
            CompileError::InvalidFilter { .. } => ErrorKind::InvalidFilter,
            CompileError::EmptyValues { .. } => ErrorKind::EmptyValues,
            CompileError::DuplicateColumn { .. } => ErrorKind::DuplicateColumn,
            CompileError::EmptyBatch => ErrorKind::EmptyBatch,
        }
    }
}

pub type CompileResult<T> = Result<T, CompileError>;

// ============================================================================
// CATALOG ERRORS
// ============================================================================

/// Errors raised while building a schema catalog.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("catalog introspection failed: {reason}")]
    Introspection { reason: String },

    #[error("catalog source unavailable: {reason}")]
    Unavailable { reason: String },
}
