//! Lifecycle Orchestrator - phase/step state machine
//!
//! ```text
//! run:  running ──► committed | rolled_back | fatal
//! step: pending ──► interpolate ──► translate | literal ──► execute ──► evaluate ──► passed | failed
//!                        └────────────── rejected before execution ──────────┘
//! ```
//!
//! One transaction spans the run. Each executed step sits behind a savepoint
//! that is rolled back when the statement failed, so an expected constraint
//! violation leaves the transaction usable for later steps.

use chrono::{DateTime, Utc};
use schemagate_core::{
    Command, ErrorKind, PseudoApiResponse, PseudoRequest, ResponseError, Scope, TranslateRequest,
    TranslationResult, Translator, DRY_RUN_WARNING,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use uuid::Uuid;

use crate::classify::{ClassificationInput, FailureClassifier, HeuristicClassifier};
use crate::evaluate::{apply_captures, evaluate, StepOutcome};
use crate::session::{RunSession, SessionError};
use crate::template::{iso, TemplateContext};
use crate::types::{
    LifecycleRunRequest, LifecycleRunResult, Phase, PhaseSummary, RunDefaults, RunIssue, RunStatus,
    RunSummary, Step, StepCounts, StepRecord, StepStatus,
};

/// Run-level failures outside the per-step guard.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RunFatal {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("run exceeded its deadline of {ms} ms")]
    Timeout { ms: u64 },
}

// ============================================================================
// RUN STATE
// ============================================================================

/// Mutable state of one run. Lives outside the deadline future so a timed-out
/// run still reports what it finished.
struct RunState {
    run_id: String,
    started_at: DateTime<Utc>,
    dry_run: bool,
    templates: TemplateContext,
    variables: Map<String, Value>,
    records: Vec<StepRecord>,
    issues: Vec<RunIssue>,
    stopped_phases: BTreeSet<usize>,
}

impl RunState {
    fn new(request: &LifecycleRunRequest) -> Self {
        let started_at = Utc::now();
        let run_id = request
            .run_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("run_{}", Uuid::now_v7().simple()));

        let mut variables = Map::new();
        variables.insert("runId".into(), Value::String(run_id.clone()));
        variables.insert("runStartedAt".into(), Value::String(iso(started_at)));
        for (key, value) in &request.variables {
            variables.insert(key.clone(), value.clone());
        }

        Self {
            run_id,
            started_at,
            dry_run: request.defaults.dry_run,
            templates: TemplateContext::new(started_at),
            variables,
            records: Vec::with_capacity(request.step_count()),
            issues: Vec::new(),
            stopped_phases: BTreeSet::new(),
        }
    }
}

/// A step ready to execute.
struct Prepared {
    translation: Option<TranslationResult>,
    request: PseudoRequest,
}

/// A step that failed before any SQL could run.
struct Rejected {
    translation: Option<TranslationResult>,
    translation_failed: bool,
    response: PseudoApiResponse,
}

impl Rejected {
    fn new(request_id: &str, dry_run: bool, code: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            translation: None,
            translation_failed: false,
            response: PseudoApiResponse::failed(request_id, dry_run, None, ResponseError::new(code, message)),
        }
    }
}

// ============================================================================
// ORCHESTRATOR
// ============================================================================

/// Sequences lifecycle runs over a [`RunSession`].
#[derive(Clone)]
pub struct LifecycleOrchestrator {
    translator: Arc<dyn Translator>,
    classifier: Arc<dyn FailureClassifier>,
    default_timeout: Option<Duration>,
}

impl LifecycleOrchestrator {
    pub fn new(translator: Arc<dyn Translator>) -> Self {
        Self {
            translator,
            classifier: Arc::new(HeuristicClassifier),
            default_timeout: None,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Deadline for runs that do not set `options.timeoutMs`.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Execute a full run and close `session` exactly once.
    pub async fn run<S: RunSession>(&self, mut session: S, request: &LifecycleRunRequest) -> LifecycleRunResult {
        let mut run = RunState::new(request);
        let clock = Instant::now();
        tracing::info!(
            run_id = %run.run_id,
            phases = request.phases.len(),
            steps = request.step_count(),
            dry_run = run.dry_run,
            "Lifecycle run started"
        );

        let deadline = request
            .options
            .timeout_ms
            .map(Duration::from_millis)
            .or(self.default_timeout);
        let driven = match deadline {
            Some(limit) => tokio::time::timeout(limit, self.drive(&mut session, request, &mut run))
                .await
                .unwrap_or(Err(RunFatal::Timeout {
                    ms: limit.as_millis() as u64,
                })),
            None => self.drive(&mut session, request, &mut run).await,
        };

        let failed = run
            .records
            .iter()
            .filter(|r| r.status == StepStatus::Failed)
            .count();
        let mut warnings = Vec::new();
        let (status, fatal_error) = match &driven {
            Ok(()) => {
                if run.dry_run || (failed > 0 && request.options.rollback_on_failure) {
                    if run.dry_run {
                        warnings.push(DRY_RUN_WARNING.to_string());
                    } else {
                        warnings.push(format!("{} step(s) failed; all writes were rolled back", failed));
                    }
                    if let Err(e) = session.rollback().await {
                        tracing::warn!(run_id = %run.run_id, error = %e, "Lifecycle rollback failed");
                    }
                    (RunStatus::RolledBack, None)
                } else {
                    match session.commit().await {
                        Ok(()) => (RunStatus::Committed, None),
                        Err(e) => (RunStatus::Fatal, Some(format!("commit failed: {}", e))),
                    }
                }
            }
            Err(fatal) => {
                // A timed-out step may still hold the connection; ROLLBACK would queue behind it.
                let closed = match fatal {
                    RunFatal::Timeout { .. } => session.abort().await,
                    RunFatal::Session(_) => session.rollback().await,
                };
                if let Err(e) = closed {
                    tracing::warn!(run_id = %run.run_id, error = %e, "Rollback after fatal run error failed");
                }
                (RunStatus::Fatal, Some(fatal.to_string()))
            }
        };

        let skip_reason = match &fatal_error {
            Some(fatal) => format!("run aborted: {}", fatal),
            None => "not reached".to_string(),
        };
        let phase_summaries = summarize_phases(request, &mut run, &skip_reason);
        let mut steps = StepCounts::default();
        for record in &run.records {
            steps.record(record.status);
        }

        let finished_at = Utc::now();
        let duration_ms = clock.elapsed().as_millis() as u64;
        match &fatal_error {
            Some(fatal) => tracing::warn!(run_id = %run.run_id, error = %fatal, duration_ms, "Lifecycle run failed"),
            None => tracing::info!(
                run_id = %run.run_id,
                status = ?status,
                passed = steps.passed,
                failed = steps.failed,
                skipped = steps.skipped,
                duration_ms,
                "Lifecycle run finished"
            ),
        }

        LifecycleRunResult {
            run_id: run.run_id,
            name: request.name.clone(),
            status,
            persisted: status == RunStatus::Committed,
            dry_run: run.dry_run,
            summary: RunSummary {
                phases: request.phases.len(),
                steps,
            },
            phase_summaries,
            steps: run.records,
            issues: run.issues,
            variables: run.variables,
            warnings,
            fatal_error,
            started_at: run.started_at,
            finished_at,
            duration_ms,
        }
    }

    async fn drive<S: RunSession>(
        &self,
        session: &mut S,
        request: &LifecycleRunRequest,
        run: &mut RunState,
    ) -> Result<(), RunFatal> {
        let mut index = 0;
        let mut run_stopped = false;

        for (phase_index, phase) in request.phases.iter().enumerate() {
            let continue_phase = phase
                .continue_on_failure
                .unwrap_or(request.defaults.continue_on_failure);
            let mut phase_stopped = run_stopped;

            for step in &phase.steps {
                if phase_stopped {
                    let reason = if run_stopped {
                        "run stopped after an earlier failure"
                    } else {
                        "phase stopped after an earlier failure"
                    };
                    run.records
                        .push(StepRecord::skipped(&phase.name, &step.name, index, reason));
                    index += 1;
                    continue;
                }

                let record = self
                    .run_step(session, &request.defaults, request.options.include_trace, phase, step, index, run)
                    .await?;
                index += 1;

                if record.status == StepStatus::Failed {
                    if !continue_phase {
                        phase_stopped = true;
                        run.stopped_phases.insert(phase_index);
                    }
                    if !request.defaults.continue_on_failure {
                        run_stopped = true;
                    }
                }
                run.records.push(record);
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_step<S: RunSession>(
        &self,
        session: &mut S,
        defaults: &RunDefaults,
        include_trace: bool,
        phase: &Phase,
        step: &Step,
        index: usize,
        run: &mut RunState,
    ) -> Result<StepRecord, RunFatal> {
        let started = Instant::now();
        let request_id = format!("{}-step-{}", run.run_id, index + 1);

        let (translation, request, mut response, translation_failed) =
            match self.prepare(defaults, step, &request_id, run) {
                Ok(Prepared { translation, request }) => {
                    session.savepoint().await?;
                    let response = session.execute(&request).await?;
                    if response.success {
                        session.release_savepoint().await?;
                    } else {
                        session.rollback_to_savepoint().await?;
                    }
                    (translation, Some(request), response, false)
                }
                Err(rejected) => (rejected.translation, None, rejected.response, rejected.translation_failed),
            };

        let mut root = json!({
            "translation": translation,
            "request": request,
            "response": response,
            "result": response.result,
            "error": response.error,
            "variables": run.variables,
        });
        let (captured, capture_failures) = apply_captures(&step.captures, &root, &mut run.variables);
        root["variables"] = Value::Object(run.variables.clone());

        let outcome = StepOutcome {
            success: response.success,
            row_count: response.row_count(),
            error_message: response.error_message().map(str::to_string),
        };
        let mut failures = evaluate(&step.expect, &outcome, &root);
        failures.extend(capture_failures);

        let (status, classification) = if failures.is_empty() {
            (StepStatus::Passed, None)
        } else {
            let sqlstate = response
                .error
                .as_ref()
                .and_then(|e| e.details.as_ref())
                .and_then(|d| d.get("sqlstate"))
                .and_then(Value::as_str);
            let classification = self.classifier.classify(&ClassificationInput {
                failures: &failures,
                translation_failed,
                error_code: response.error_code(),
                error_message: response.error_message(),
                sqlstate,
            });
            run.issues.push(RunIssue {
                phase: phase.name.clone(),
                step: step.name.clone(),
                classification,
                message: failures[0].message.clone(),
            });
            (StepStatus::Failed, Some(classification))
        };

        tracing::debug!(
            run_id = %run.run_id,
            phase = %phase.name,
            step = %step.name,
            status = ?status,
            classification = ?classification,
            "Lifecycle step evaluated"
        );

        if !include_trace {
            response.trace.clear();
        }

        Ok(StepRecord {
            phase: phase.name.clone(),
            step: step.name.clone(),
            index,
            status,
            classification,
            failures,
            translation,
            request,
            response: Some(response),
            captured,
            skip_reason: None,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Interpolate and resolve a step into an executable request.
    fn prepare(&self, defaults: &RunDefaults, step: &Step, request_id: &str, run: &mut RunState) -> Result<Prepared, Rejected> {
        let dry_run = run.dry_run;
        let template_error = |e: crate::template::TemplateError| {
            Rejected::new(request_id, dry_run, ErrorKind::TemplateUnresolved, e.to_string())
        };

        let scope = match &step.scope {
            Some(raw) => {
                let value = run.templates.interpolate(raw, &run.variables).map_err(template_error)?;
                let overlay: Scope = serde_json::from_value(value).map_err(|e| {
                    Rejected::new(request_id, dry_run, ErrorKind::InvalidRequest, format!("invalid step scope: {}", e))
                })?;
                defaults.scope.merged_with(&overlay)
            }
            None => defaults.scope.clone(),
        };

        let mut prepared = match (&step.prompt, &step.request) {
            (Some(prompt), None) => {
                let input = match run.templates.interpolate_str(prompt, &run.variables).map_err(template_error)? {
                    Value::String(text) => text,
                    other => other.to_string(),
                };
                let mut translate = TranslateRequest::new(input, scope);
                translate.dry_run = dry_run;
                let translation = self.translator.translate(&translate);
                match (translation.success, translation.pseudo_request.clone()) {
                    (true, Some(request)) => Prepared {
                        translation: Some(translation),
                        request,
                    },
                    _ => {
                        let message = translation
                            .error
                            .clone()
                            .unwrap_or_else(|| "translation produced no request".to_string());
                        let mut rejected = Rejected::new(
                            request_id,
                            dry_run,
                            ErrorKind::TranslationFailed,
                            format!("translation failed: {}", message),
                        );
                        rejected.translation = Some(translation);
                        rejected.translation_failed = true;
                        return Err(rejected);
                    }
                }
            }
            (None, Some(raw)) => {
                let value = run.templates.interpolate(raw, &run.variables).map_err(template_error)?;
                let invalid = |e: serde_json::Error| {
                    Rejected::new(request_id, dry_run, ErrorKind::InvalidRequest, format!("invalid request: {}", e))
                };
                let request = if value.get("command").is_some() {
                    let mut envelope: PseudoRequest = serde_json::from_value(value).map_err(invalid)?;
                    envelope.scope = scope.merged_with(&envelope.scope);
                    envelope
                } else {
                    let command: Command = serde_json::from_value(value).map_err(invalid)?;
                    PseudoRequest::new(command, scope)
                };
                Prepared {
                    translation: None,
                    request,
                }
            }
            _ => {
                return Err(Rejected::new(
                    request_id,
                    dry_run,
                    ErrorKind::InvalidRequest,
                    "a step must set exactly one of prompt and request",
                ))
            }
        };

        prepared.request.dry_run = dry_run;
        if prepared.request.request_id.is_none() {
            prepared.request.request_id = Some(request_id.to_string());
        }
        Ok(prepared)
    }
}

/// Pad unreached steps as skipped and build per-phase summaries.
fn summarize_phases(request: &LifecycleRunRequest, run: &mut RunState, skip_reason: &str) -> Vec<PhaseSummary> {
    let mut cursor = 0;
    let mut summaries = Vec::with_capacity(request.phases.len());
    for (phase_index, phase) in request.phases.iter().enumerate() {
        let mut counts = StepCounts::default();
        for step in &phase.steps {
            if cursor >= run.records.len() {
                run.records
                    .push(StepRecord::skipped(&phase.name, &step.name, cursor, skip_reason));
            }
            counts.record(run.records[cursor].status);
            cursor += 1;
        }
        summaries.push(PhaseSummary {
            name: phase.name.clone(),
            counts,
            stopped: run.stopped_phases.contains(&phase_index),
        });
    }
    summaries
}
