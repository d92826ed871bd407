//! Lifecycle run request and result types.

use chrono::{DateTime, Utc};
use schemagate_core::{PseudoApiResponse, PseudoRequest, Scope, TranslationResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::classify::Classification;
use crate::evaluate::{Capture, EvaluationFailure, Expectation};

// ============================================================================
// REQUEST
// ============================================================================

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunDefaults {
    #[serde(default = "default_true")]
    pub dry_run: bool,
    #[serde(default)]
    pub continue_on_failure: bool,
    #[serde(default)]
    pub scope: Scope,
}

impl Default for RunDefaults {
    fn default() -> Self {
        Self {
            dry_run: true,
            continue_on_failure: false,
            scope: Scope::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOptions {
    #[serde(default)]
    pub rollback_on_failure: bool,
    #[serde(default)]
    pub include_trace: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

/// One unit of a run. Exactly one of `prompt` and `request` must be set.
///
/// `request` and `scope` stay raw JSON until interpolation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<Value>,
    #[serde(default)]
    pub captures: Vec<Capture>,
    #[serde(default)]
    pub expect: Expectation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phase {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub continue_on_failure: Option<bool>,
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRunRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub defaults: RunDefaults,
    #[serde(default)]
    pub options: RunOptions,
    #[serde(default)]
    pub variables: Map<String, Value>,
    pub phases: Vec<Phase>,
}

impl LifecycleRunRequest {
    pub fn step_count(&self) -> usize {
        self.phases.iter().map(|p| p.steps.len()).sum()
    }
}

// ============================================================================
// RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Committed,
    RolledBack,
    Fatal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Skipped,
}

/// Everything recorded about one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub phase: String,
    pub step: String,
    pub index: usize,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub classification: Option<Classification>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<EvaluationFailure>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation: Option<TranslationResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<PseudoRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<PseudoApiResponse>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub captured: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
    pub duration_ms: u64,
}

impl StepRecord {
    pub fn skipped(phase: &str, step: &str, index: usize, reason: impl Into<String>) -> Self {
        Self {
            phase: phase.to_string(),
            step: step.to_string(),
            index,
            status: StepStatus::Skipped,
            classification: None,
            failures: Vec::new(),
            translation: None,
            request: None,
            response: None,
            captured: Map::new(),
            skip_reason: Some(reason.into()),
            duration_ms: 0,
        }
    }
}

/// Compact per-failure line, independent of the full step records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunIssue {
    pub phase: String,
    pub step: String,
    pub classification: Classification,
    pub message: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepCounts {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl StepCounts {
    pub fn record(&mut self, status: StepStatus) {
        self.total += 1;
        match status {
            StepStatus::Passed => self.passed += 1,
            StepStatus::Failed => self.failed += 1,
            StepStatus::Skipped => self.skipped += 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseSummary {
    pub name: String,
    #[serde(flatten)]
    pub counts: StepCounts,
    /// The phase stopped early after a failure.
    pub stopped: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub phases: usize,
    #[serde(flatten)]
    pub steps: StepCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleRunResult {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: RunStatus,
    pub persisted: bool,
    pub dry_run: bool,
    pub summary: RunSummary,
    pub phase_summaries: Vec<PhaseSummary>,
    pub steps: Vec<StepRecord>,
    pub issues: Vec<RunIssue>,
    pub variables: Map<String, Value>,
    pub warnings: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fatal_error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: u64,
}
