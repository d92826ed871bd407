//! SCHEMAGATE Lifecycle - Multi-Step Scenario Runner
//!
//! Drives ordered phases of steps against one transactional session,
//! threading captured values from step to step and judging each step
//! against its expectations.
//!
//! Architecture:
//! ```text
//! LifecycleRunRequest (phases → steps)
//!     ↓
//! TemplateContext ({{tokens}} → memoized ids, clock, variables)
//!     ↓
//! Translator (prompt) | literal request
//!     ↓
//! RunSession (savepoint → execute → release | rollback to savepoint)
//!     ↓
//! captures → evaluate → FailureClassifier
//!     ↓
//! LifecycleRunResult (commit | rollback | fatal)
//! ```

pub mod classify;
pub mod evaluate;
pub mod orchestrator;
pub mod path;
pub mod session;
pub mod template;
pub mod types;

// Re-export key types for convenience
pub use classify::{Classification, ClassificationInput, FailureClassifier, HeuristicClassifier};
pub use evaluate::{
    apply_captures, evaluate, Assertion, AssertionOp, Capture, EvaluationFailure, Expectation, FailureKind,
    OneOrMany, StepOutcome,
};
pub use orchestrator::{LifecycleOrchestrator, RunFatal};
pub use session::{RunSession, SessionError, STEP_SAVEPOINT};
pub use template::{TemplateContext, TemplateError};
pub use types::{
    LifecycleRunRequest, LifecycleRunResult, Phase, PhaseSummary, RunDefaults, RunIssue, RunOptions, RunStatus,
    RunSummary, Step, StepCounts, StepRecord, StepStatus,
};
