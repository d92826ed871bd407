//! Translator collaborator interface.
//!
//! Free-text-to-command translation lives outside this workspace. The core
//! only consumes a finished [`TranslationResult`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::command::Command;
use crate::envelope::PseudoRequest;
use crate::scope::Scope;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslateRequest {
    pub input: String,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub dry_run: bool,
}

impl TranslateRequest {
    pub fn new(input: impl Into<String>, scope: Scope) -> Self {
        Self {
            input: input.into(),
            scope,
            dry_run: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pseudo_request: Option<PseudoRequest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TranslationResult {
    pub fn translated(request: PseudoRequest) -> Self {
        Self {
            success: true,
            pseudo_request: Some(request),
            error: None,
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            pseudo_request: None,
            error: Some(message.into()),
        }
    }
}

/// Turns caller input into a canonical request. Synchronous and offline.
pub trait Translator: Send + Sync {
    fn translate(&self, request: &TranslateRequest) -> TranslationResult;
}

/// Default translator: accepts JSON command or envelope text, rejects free text.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonTranslator;

impl Translator for JsonTranslator {
    fn translate(&self, request: &TranslateRequest) -> TranslationResult {
        let input = request.input.trim();
        if input.is_empty() {
            return TranslationResult::rejected("translation input is empty");
        }
        if !input.starts_with('{') {
            return TranslationResult::rejected(
                "free-text translation is not configured; submit a JSON command or request envelope",
            );
        }

        let value: Value = match serde_json::from_str(input) {
            Ok(value) => value,
            Err(e) => return TranslationResult::rejected(format!("input is not valid JSON: {}", e)),
        };

        if value.get("command").is_some() {
            match serde_json::from_value::<PseudoRequest>(value) {
                Ok(mut envelope) => {
                    envelope.scope = request.scope.merged_with(&envelope.scope);
                    envelope.dry_run |= request.dry_run;
                    TranslationResult::translated(envelope)
                }
                Err(e) => TranslationResult::rejected(format!("invalid request envelope: {}", e)),
            }
        } else {
            match serde_json::from_value::<Command>(value) {
                Ok(command) => TranslationResult::translated(
                    PseudoRequest::new(command, request.scope.clone()).with_dry_run(request.dry_run),
                ),
                Err(e) => TranslationResult::rejected(format!("invalid command: {}", e)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandKind;

    #[test]
    fn test_free_text_is_rejected() {
        let result = JsonTranslator.translate(&TranslateRequest::new("show me bookings", Scope::tenant("biz_1")));
        assert!(!result.success);
        assert!(result.pseudo_request.is_none());
        assert!(result.error.is_some_and(|e| e.contains("free-text")));
    }

    #[test]
    fn test_bare_command_inherits_request_scope() {
        let result = JsonTranslator.translate(&TranslateRequest::new(
            r#"{"kind":"query","table":"queues"}"#,
            Scope::tenant("biz_1"),
        ));
        assert!(result.success);
        let request = result.pseudo_request.expect("translated request");
        assert_eq!(request.command.kind(), CommandKind::Query);
        assert_eq!(request.scope.tenant_id(), Some("biz_1"));
    }

    #[test]
    fn test_envelope_scope_overlays_request_scope() {
        let mut translate = TranslateRequest::new(
            r#"{"scope":{"locationId":"loc_1"},"command":{"kind":"query","table":"queues"}}"#,
            Scope::tenant("biz_1"),
        );
        translate.dry_run = true;
        let request = JsonTranslator
            .translate(&translate)
            .pseudo_request
            .expect("translated request");
        assert_eq!(request.scope.tenant_id(), Some("biz_1"));
        assert_eq!(request.scope.location_id.as_deref(), Some("loc_1"));
        assert!(request.dry_run);
    }

    #[test]
    fn test_malformed_json_is_rejected() {
        let result = JsonTranslator.translate(&TranslateRequest::new("{not json", Scope::default()));
        assert!(!result.success);
    }
}
