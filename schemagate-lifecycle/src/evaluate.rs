//! Expectation evaluation and value capture.
//!
//! Checks are independent: a step can fail several at once, and every failure
//! is reported.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::path;

// ============================================================================
// EXPECTATIONS
// ============================================================================

/// One string or a list of strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    pub fn items(&self) -> Vec<&str> {
        match self {
            OneOrMany::One(one) => vec![one.as_str()],
            OneOrMany::Many(many) => many.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssertionOp {
    Exists,
    Equals,
    Contains,
}

/// A check against the composite step root.
///
/// For `exists`, a `value` of `false` asserts absence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assertion {
    pub path: String,
    pub op: AssertionOp,
    #[serde(default)]
    pub value: Value,
}

/// What a step is expected to do. `success` defaults to `true`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expectation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_row_count: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_includes: Option<OneOrMany>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Assertion>,
}

/// Named value extracted from a step's outcome into the run variables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Capture {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

// ============================================================================
// FAILURES
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    UnexpectedFailure,
    UnexpectedSuccess,
    RowCount,
    ErrorMessage,
    Assertion,
    Capture,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvaluationFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl EvaluationFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// The facts about a finished step the evaluator needs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepOutcome {
    pub success: bool,
    pub row_count: Option<u64>,
    pub error_message: Option<String>,
}

// ============================================================================
// EVALUATION
// ============================================================================

/// Check `outcome` and `root` against `expect`.
pub fn evaluate(expect: &Expectation, outcome: &StepOutcome, root: &Value) -> Vec<EvaluationFailure> {
    let mut failures = Vec::new();
    let error = outcome.error_message.as_deref().unwrap_or("");

    let expected_success = expect.success.unwrap_or(true);
    if expected_success && !outcome.success {
        failures.push(EvaluationFailure::new(
            FailureKind::UnexpectedFailure,
            format!("expected success but the step failed: {}", error),
        ));
    } else if !expected_success && outcome.success {
        failures.push(EvaluationFailure::new(
            FailureKind::UnexpectedSuccess,
            "expected failure but the step succeeded",
        ));
    }

    // A failed step with no row count is already explained by its outcome.
    if outcome.success || outcome.row_count.is_some() {
        check_row_counts(expect, outcome.row_count, &mut failures);
    }

    if let Some(needles) = &expect.error_includes {
        let haystack = error.to_lowercase();
        for needle in needles.items() {
            if outcome.error_message.is_none() {
                failures.push(EvaluationFailure::new(
                    FailureKind::ErrorMessage,
                    format!("expected an error containing '{}' but there was no error", needle),
                ));
            } else if !haystack.contains(&needle.to_lowercase()) {
                failures.push(EvaluationFailure::new(
                    FailureKind::ErrorMessage,
                    format!("expected error to contain '{}' but got: {}", needle, error),
                ));
            }
        }
    }

    for assertion in &expect.assertions {
        if let Some(failure) = check_assertion(assertion, root) {
            failures.push(failure);
        }
    }

    failures
}

fn check_row_counts(expect: &Expectation, actual: Option<u64>, failures: &mut Vec<EvaluationFailure>) {
    let checks: [(Option<u64>, &str, fn(u64, u64) -> bool); 3] = [
        (expect.row_count, "exactly", |a, e| a == e),
        (expect.min_row_count, "at least", |a, e| a >= e),
        (expect.max_row_count, "at most", |a, e| a <= e),
    ];
    for (expected, relation, holds) in checks {
        let Some(expected) = expected else { continue };
        match actual {
            Some(actual) if holds(actual, expected) => {}
            Some(actual) => failures.push(EvaluationFailure::new(
                FailureKind::RowCount,
                format!("expected {} {} rows but got {}", relation, expected, actual),
            )),
            None => failures.push(EvaluationFailure::new(
                FailureKind::RowCount,
                format!("expected {} {} rows but the response has no row count", relation, expected),
            )),
        }
    }
}

fn check_assertion(assertion: &Assertion, root: &Value) -> Option<EvaluationFailure> {
    let actual = path::lookup(root, &assertion.path);
    let failed = |message: String| Some(EvaluationFailure::new(FailureKind::Assertion, message));

    match assertion.op {
        AssertionOp::Exists => {
            let want = assertion.value.as_bool().unwrap_or(true);
            let present = actual.is_some_and(|v| !v.is_null());
            match (want, present) {
                (true, false) => failed(format!("expected '{}' to exist", assertion.path)),
                (false, true) => failed(format!("expected '{}' to be absent", assertion.path)),
                _ => None,
            }
        }
        AssertionOp::Equals => match actual {
            Some(actual) if *actual == assertion.value => None,
            Some(actual) => failed(format!(
                "expected '{}' to equal {} but found {}",
                assertion.path, assertion.value, actual
            )),
            None => failed(format!(
                "expected '{}' to equal {} but it is missing",
                assertion.path, assertion.value
            )),
        },
        AssertionOp::Contains => {
            let holds = match (actual, &assertion.value) {
                (Some(Value::String(text)), Value::String(needle)) => text.contains(needle.as_str()),
                (Some(Value::Array(items)), needle) => items.contains(needle),
                (Some(Value::Object(map)), Value::String(key)) => map.contains_key(key),
                _ => false,
            };
            if holds {
                None
            } else {
                failed(format!(
                    "expected '{}' to contain {}",
                    assertion.path, assertion.value
                ))
            }
        }
    }
}

/// Run captures against `root`, writing hits into `variables` immediately.
///
/// Returns the captured values and one failure per required capture that
/// found neither a value nor a default.
pub fn apply_captures(
    captures: &[Capture],
    root: &Value,
    variables: &mut Map<String, Value>,
) -> (Map<String, Value>, Vec<EvaluationFailure>) {
    let mut captured = Map::new();
    let mut failures = Vec::new();
    for capture in captures {
        let value = path::lookup(root, &capture.path)
            .filter(|v| !v.is_null())
            .cloned()
            .or_else(|| capture.default.clone());
        match value {
            Some(value) => {
                variables.insert(capture.name.clone(), value.clone());
                captured.insert(capture.name.clone(), value);
            }
            None if capture.required => failures.push(EvaluationFailure::new(
                FailureKind::Capture,
                format!("required capture '{}' found no value at '{}'", capture.name, capture.path),
            )),
            None => {}
        }
    }
    (captured, failures)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ok(rows: u64) -> StepOutcome {
        StepOutcome {
            success: true,
            row_count: Some(rows),
            error_message: None,
        }
    }

    fn err(message: &str) -> StepOutcome {
        StepOutcome {
            success: false,
            row_count: None,
            error_message: Some(message.to_string()),
        }
    }

    fn kinds(failures: &[EvaluationFailure]) -> Vec<FailureKind> {
        failures.iter().map(|f| f.kind).collect()
    }

    #[test]
    fn test_default_expectation_is_success() {
        assert!(evaluate(&Expectation::default(), &ok(0), &Value::Null).is_empty());
        assert_eq!(
            kinds(&evaluate(&Expectation::default(), &err("boom"), &Value::Null)),
            [FailureKind::UnexpectedFailure]
        );
    }

    #[test]
    fn test_expected_failure_with_error_substrings() {
        let expect: Expectation = serde_json::from_value(json!({
            "success": false,
            "errorIncludes": ["Unsafe Mutation", "filter"]
        }))
        .expect("expectation");
        let outcome = err("unsafe mutation: delete on 'queues' requires at least one filter");
        assert!(evaluate(&expect, &outcome, &Value::Null).is_empty());

        assert_eq!(kinds(&evaluate(&expect, &ok(1), &Value::Null)), [
            FailureKind::UnexpectedSuccess,
            FailureKind::ErrorMessage,
            FailureKind::ErrorMessage
        ]);
    }

    #[test]
    fn test_row_count_checks_accumulate() {
        let expect = Expectation {
            row_count: Some(2),
            min_row_count: Some(3),
            max_row_count: Some(1),
            ..Expectation::default()
        };
        let failures = evaluate(&expect, &ok(2), &Value::Null);
        assert_eq!(kinds(&failures), [FailureKind::RowCount, FailureKind::RowCount]);
    }

    #[test]
    fn test_failed_step_without_rows_skips_row_checks() {
        let expect = Expectation {
            row_count: Some(1),
            ..Expectation::default()
        };
        assert_eq!(
            kinds(&evaluate(&expect, &err("violates foreign key constraint"), &Value::Null)),
            [FailureKind::UnexpectedFailure]
        );
    }

    #[test]
    fn test_assertions() {
        let root = json!({
            "result": {"rows": [{"id": "bo_1", "status": "confirmed"}], "rowCount": 1},
            "error": null
        });
        let expect: Expectation = serde_json::from_value(json!({
            "assertions": [
                {"path": "result.rows[0].id", "op": "exists"},
                {"path": "error", "op": "exists", "value": false},
                {"path": "result.rows[0].status", "op": "equals", "value": "confirmed"},
                {"path": "result.rows[0].status", "op": "contains", "value": "firm"},
                {"path": "result.rows[0]", "op": "contains", "value": "status"},
                {"path": "result.rows[0].id", "op": "equals", "value": "bo_2"},
                {"path": "result.rows[1]", "op": "exists"}
            ]
        }))
        .expect("expectation");
        let failures = evaluate(&expect, &ok(1), &root);
        assert_eq!(kinds(&failures), [FailureKind::Assertion, FailureKind::Assertion]);
        assert!(failures[0].message.contains("bo_2"));
        assert!(failures[1].message.contains("result.rows[1]"));
    }

    #[test]
    fn test_array_contains_uses_element_equality() {
        let root = json!({"tags": ["a", 2]});
        let contains = |value: Value| Assertion {
            path: "tags".into(),
            op: AssertionOp::Contains,
            value,
        };
        assert!(check_assertion(&contains(json!(2)), &root).is_none());
        assert!(check_assertion(&contains(json!("b")), &root).is_some());
    }

    #[test]
    fn test_captures_write_variables_and_fail_when_required() {
        let root = json!({"result": {"rows": [{"id": "bo_1"}]}});
        let captures: Vec<Capture> = serde_json::from_value(json!([
            {"name": "bookingId", "path": "result.rows[0].id"},
            {"name": "fallback", "path": "result.rows[5].id", "default": "none"},
            {"name": "optional", "path": "result.nothing"},
            {"name": "needed", "path": "result.rows[9].id", "required": true}
        ]))
        .expect("captures");
        let mut variables = Map::new();
        let (captured, failures) = apply_captures(&captures, &root, &mut variables);

        assert_eq!(variables.get("bookingId"), Some(&json!("bo_1")));
        assert_eq!(variables.get("fallback"), Some(&json!("none")));
        assert!(!variables.contains_key("optional"));
        assert_eq!(captured.len(), 2);
        assert_eq!(kinds(&failures), [FailureKind::Capture]);
    }
}
