//! `{{token}}` interpolation for lifecycle steps.
//!
//! Token families, checked in order:
//! 1. `id:<tag>` generates `<tag>_<12 alphanumerics>`
//! 2. `nowIso` and `nowPlusMinutes:<n>` against the run clock
//! 3. a variable key, matched exactly
//! 4. a path into the variables tree (`booking.rows[0].id`)
//!
//! Generated values (families 1 and 2) are memoized for the whole run.
//! Variable and path tokens read the live variable bag, so they always see
//! the latest capture.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use once_cell::sync::Lazy;
use rand::distr::Alphanumeric;
use rand::Rng;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashMap;
use thiserror::Error;

use crate::path;

static TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").expect("Invalid template token regex"));

const ID_SUFFIX_LEN: usize = 12;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    #[error("unresolved template token '{{{{{token}}}}}'")]
    Unresolved { token: String },

    #[error("template produced an invalid {target}: {reason}")]
    InvalidShape { target: String, reason: String },
}

/// Per-run interpolation state.
#[derive(Debug, Clone)]
pub struct TemplateContext {
    clock: DateTime<Utc>,
    memo: HashMap<String, Value>,
}

impl TemplateContext {
    /// Context whose `nowIso` is `clock`.
    pub fn new(clock: DateTime<Utc>) -> Self {
        Self {
            clock,
            memo: HashMap::new(),
        }
    }

    pub fn clock(&self) -> DateTime<Utc> {
        self.clock
    }

    /// Interpolate every string inside `value`, recursing through arrays and
    /// object values. Object keys are left untouched.
    pub fn interpolate(&mut self, value: &Value, variables: &Map<String, Value>) -> Result<Value, TemplateError> {
        match value {
            Value::String(text) => self.interpolate_str(text, variables),
            Value::Array(items) => items
                .iter()
                .map(|item| self.interpolate(item, variables))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            Value::Object(object) => {
                let mut out = Map::with_capacity(object.len());
                for (key, item) in object {
                    out.insert(key.clone(), self.interpolate(item, variables)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    /// Interpolate one string. A string that is exactly one token yields the
    /// token's typed value; embedded tokens are stringified.
    pub fn interpolate_str(&mut self, text: &str, variables: &Map<String, Value>) -> Result<Value, TemplateError> {
        if let Some(caps) = TOKEN.captures(text) {
            let whole = caps.get(0).map(|m| m.as_str() == text).unwrap_or(false);
            if whole {
                return self.resolve(&caps[1], variables);
            }
        } else {
            return Ok(Value::String(text.to_string()));
        }

        let mut out = String::with_capacity(text.len());
        let mut last = 0;
        for caps in TOKEN.captures_iter(text) {
            let Some(token) = caps.get(0) else { continue };
            out.push_str(&text[last..token.start()]);
            match self.resolve(&caps[1], variables)? {
                Value::String(s) => out.push_str(&s),
                other => out.push_str(&other.to_string()),
            }
            last = token.end();
        }
        out.push_str(&text[last..]);
        Ok(Value::String(out))
    }

    fn resolve(&mut self, token: &str, variables: &Map<String, Value>) -> Result<Value, TemplateError> {
        let token = token.trim();
        if let Some(value) = self.memo.get(token) {
            return Ok(value.clone());
        }
        if let Some(value) = self.generate(token) {
            self.memo.insert(token.to_string(), value.clone());
            return Ok(value);
        }
        if let Some(value) = variables.get(token) {
            return Ok(value.clone());
        }
        let tree = Value::Object(variables.clone());
        path::lookup(&tree, token)
            .cloned()
            .ok_or_else(|| TemplateError::Unresolved {
                token: token.to_string(),
            })
    }

    fn generate(&self, token: &str) -> Option<Value> {
        if let Some(tag) = token.strip_prefix("id:") {
            return Some(Value::String(format!("{}_{}", tag.trim(), random_suffix())));
        }
        if token == "nowIso" {
            return Some(Value::String(iso(self.clock)));
        }
        if let Some(minutes) = token.strip_prefix("nowPlusMinutes:") {
            let minutes: i64 = minutes.trim().parse().unwrap_or(0);
            let offset = Duration::try_minutes(minutes).unwrap_or_else(Duration::zero);
            let at = self.clock.checked_add_signed(offset).unwrap_or(self.clock);
            return Some(Value::String(iso(at)));
        }
        None
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub fn iso(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn random_suffix() -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(ID_SUFFIX_LEN)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn context() -> TemplateContext {
        let clock = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).single().expect("valid clock");
        TemplateContext::new(clock)
    }

    fn vars(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("variables must be an object"),
        }
    }

    #[test]
    fn test_id_tokens_are_memoized() -> Result<(), TemplateError> {
        let mut ctx = context();
        let empty = Map::new();
        let first = ctx.interpolate_str("{{id:user}}", &empty)?;
        let second = ctx.interpolate_str("{{ id:user }}", &empty)?;
        let other = ctx.interpolate_str("{{id:queue}}", &empty)?;

        assert_eq!(first, second);
        assert_ne!(first, other);
        let id = first.as_str().expect("string id");
        assert!(id.starts_with("user_"));
        assert_eq!(id.len(), "user_".len() + ID_SUFFIX_LEN);
        assert!(id["user_".len()..].chars().all(|c| c.is_ascii_alphanumeric()));
        Ok(())
    }

    #[test]
    fn test_time_tokens() -> Result<(), TemplateError> {
        let mut ctx = context();
        let empty = Map::new();
        assert_eq!(ctx.interpolate_str("{{nowIso}}", &empty)?, json!("2026-03-01T09:30:00.000Z"));
        assert_eq!(
            ctx.interpolate_str("{{nowPlusMinutes:90}}", &empty)?,
            json!("2026-03-01T11:00:00.000Z")
        );
        assert_eq!(
            ctx.interpolate_str("{{nowPlusMinutes:soon}}", &empty)?,
            json!("2026-03-01T09:30:00.000Z")
        );
        Ok(())
    }

    #[test]
    fn test_whole_token_keeps_type_embedded_token_stringifies() -> Result<(), TemplateError> {
        let mut ctx = context();
        let variables = vars(json!({"count": 3, "booking": {"rows": [{"id": "bo_1"}]}}));

        assert_eq!(ctx.interpolate_str("{{count}}", &variables)?, json!(3));
        assert_eq!(ctx.interpolate_str("n={{count}}", &variables)?, json!("n=3"));
        assert_eq!(ctx.interpolate_str("{{booking.rows[0].id}}", &variables)?, json!("bo_1"));
        assert_eq!(
            ctx.interpolate_str("row {{booking.rows[0]}}", &variables)?,
            json!("row {\"id\":\"bo_1\"}")
        );
        Ok(())
    }

    #[test]
    fn test_unresolved_token_is_an_error() {
        let mut ctx = context();
        let result = ctx.interpolate_str("hello {{missing}}", &Map::new());
        assert_eq!(
            result,
            Err(TemplateError::Unresolved {
                token: "missing".into()
            })
        );
        let message = TemplateError::Unresolved { token: "missing".into() }.to_string();
        assert!(message.contains("{{missing}}"), "{}", message);
    }

    #[test]
    fn test_interpolation_recurses_structurally() -> Result<(), TemplateError> {
        let mut ctx = context();
        let variables = vars(json!({"bizId": "biz_1"}));
        let value = ctx.interpolate(
            &json!({
                "command": {
                    "kind": "query",
                    "filters": [{"column": "biz_id", "op": "eq", "value": "{{bizId}}"}],
                    "limit": 5
                }
            }),
            &variables,
        )?;
        assert_eq!(value["command"]["filters"][0]["value"], json!("biz_1"));
        assert_eq!(value["command"]["limit"], json!(5));
        Ok(())
    }

    #[test]
    fn test_variable_tokens_see_latest_value() -> Result<(), TemplateError> {
        let mut ctx = context();
        let mut variables = vars(json!({"status": "draft"}));
        assert_eq!(ctx.interpolate_str("{{status}}", &variables)?, json!("draft"));
        variables.insert("status".into(), json!("confirmed"));
        assert_eq!(ctx.interpolate_str("{{status}}", &variables)?, json!("confirmed"));
        Ok(())
    }
}
