//! Pseudo request/response envelope and the execution trace.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::{Command, CommandKind, StatementKind};
use crate::error::{CompileError, ErrorKind};
use crate::scope::Scope;

/// Warning attached to every dry-run response and run.
pub const DRY_RUN_WARNING: &str = "dry run: all writes were rolled back";

// ============================================================================
// REQUEST
// ============================================================================

/// Canonical request envelope accepted by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudoRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idempotency_key: Option<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub scope: Scope,
    pub command: Command,
}

impl PseudoRequest {
    pub fn new(command: Command, scope: Scope) -> Self {
        Self {
            request_id: None,
            idempotency_key: None,
            dry_run: false,
            scope,
            command,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }
}

// ============================================================================
// RESPONSE
// ============================================================================

/// Error payload of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: ErrorKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ResponseError {
    pub fn new(code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&CompileError> for ResponseError {
    fn from(err: &CompileError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

impl From<CompileError> for ResponseError {
    fn from(err: CompileError) -> Self {
        Self::from(&err)
    }
}

/// One executed leaf statement. Append-only, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionTraceStep {
    pub step: usize,
    pub kind: StatementKind,
    pub table: String,
    pub sql: String,
    pub params: Vec<Value>,
    pub row_count: u64,
    pub dry_run: bool,
}

/// Response produced once per top-level request or lifecycle step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PseudoApiResponse {
    pub request_id: String,
    pub dry_run: bool,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CommandKind>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub trace: Vec<ExecutionTraceStep>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}

impl PseudoApiResponse {
    pub fn succeeded(
        request_id: impl Into<String>,
        dry_run: bool,
        kind: CommandKind,
        result: Value,
        trace: Vec<ExecutionTraceStep>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            dry_run,
            success: true,
            kind: Some(kind),
            warnings: Vec::new(),
            trace,
            result: Some(result),
            error: None,
        }
    }

    pub fn failed(
        request_id: impl Into<String>,
        dry_run: bool,
        kind: Option<CommandKind>,
        error: ResponseError,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            dry_run,
            success: false,
            kind,
            warnings: Vec::new(),
            trace: Vec::new(),
            result: None,
            error: Some(error),
        }
    }

    pub fn with_trace(mut self, trace: Vec<ExecutionTraceStep>) -> Self {
        self.trace = trace;
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }

    pub fn error_code(&self) -> Option<ErrorKind> {
        self.error.as_ref().map(|e| e.code)
    }

    /// `result.rowCount`, when the result carries one.
    pub fn row_count(&self) -> Option<u64> {
        self.result.as_ref()?.get("rowCount")?.as_u64()
    }
}
