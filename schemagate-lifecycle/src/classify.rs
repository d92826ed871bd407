//! Failure classification.
//!
//! Precedence is fixed:
//! 1. any evaluator failure other than `unexpected_failure` → `expectation_mismatch`
//! 2. a failed translation → `scenario_contract`
//! 3. a contract error code → `scenario_contract`
//! 4. SQLSTATE class 23 → `schema_constraint`
//! 5. identifier/tenant/template vocabulary → `scenario_contract`
//! 6. constraint vocabulary → `schema_constraint`
//! 7. anything else → `execution_error`
//!
//! Server messages name columns and constraints freely, so the SQLSTATE is
//! trusted before any vocabulary match.

use once_cell::sync::Lazy;
use regex::Regex;
use schemagate_core::ErrorKind;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::evaluate::{EvaluationFailure, FailureKind};

static CONTRACT_VOCABULARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)unknown (table|column)|unsafe (identifier|mutation)|tenant|scope|template|unresolved|identifier")
        .expect("Invalid contract vocabulary regex")
});

static CONSTRAINT_VOCABULARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)violates|constraint|not-null|check|foreign key|duplicate key")
        .expect("Invalid constraint vocabulary regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ScenarioContract,
    SchemaConstraint,
    ExpectationMismatch,
    ExecutionError,
}

impl Classification {
    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::ScenarioContract => "scenario_contract",
            Classification::SchemaConstraint => "schema_constraint",
            Classification::ExpectationMismatch => "expectation_mismatch",
            Classification::ExecutionError => "execution_error",
        }
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a classifier may look at for one failed step.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassificationInput<'a> {
    pub failures: &'a [EvaluationFailure],
    pub translation_failed: bool,
    pub error_code: Option<ErrorKind>,
    pub error_message: Option<&'a str>,
    pub sqlstate: Option<&'a str>,
}

/// Maps a failed step to a taxonomy bucket.
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, input: &ClassificationInput<'_>) -> Classification;
}

/// Error-code and message-pattern classifier.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl FailureClassifier for HeuristicClassifier {
    fn classify(&self, input: &ClassificationInput<'_>) -> Classification {
        if input
            .failures
            .iter()
            .any(|f| f.kind != FailureKind::UnexpectedFailure)
        {
            return Classification::ExpectationMismatch;
        }
        if input.translation_failed {
            return Classification::ScenarioContract;
        }

        if input.error_code.is_some_and(|code| code.is_contract()) {
            return Classification::ScenarioContract;
        }
        if input.sqlstate.is_some_and(|state| state.starts_with("23")) {
            return Classification::SchemaConstraint;
        }

        let message = input.error_message.unwrap_or("");
        if CONTRACT_VOCABULARY.is_match(message) {
            Classification::ScenarioContract
        } else if CONSTRAINT_VOCABULARY.is_match(message) {
            Classification::SchemaConstraint
        } else {
            Classification::ExecutionError
        }
    }
}
