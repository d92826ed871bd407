//! SCHEMAGATE Test Utilities
//!
//! Shared test infrastructure for the schemagate workspace:
//! - A fixture schema catalog mirroring a small multi-tenant booking schema
//! - A static translator for prompt-driven tests
//! - Proptest generators for scopes, filters and commands
//! - Assertions over compile errors and responses

pub use schemagate_core::{
    CatalogColumn, CatalogTable, Command, CompileError, ErrorKind, Filter, FilterOp,
    PseudoApiResponse, PseudoRequest, SchemaCatalog, Scope, TranslateRequest, TranslationResult,
    Translator, DEFAULT_TENANT_COLUMN,
};

use std::collections::HashMap;

// ============================================================================
// STATIC TRANSLATOR
// ============================================================================

/// Translator answering from a fixed prompt table.
///
/// Unknown prompts are rejected, so tests exercise the translation-failure
/// path by simply not registering a prompt.
#[derive(Debug, Clone, Default)]
pub struct StaticTranslator {
    responses: HashMap<String, TranslationResult>,
}

impl StaticTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a prompt that translates to `command` under the caller's scope.
    pub fn with_command(mut self, prompt: impl Into<String>, command: Command) -> Self {
        let request = PseudoRequest::new(command, Scope::default());
        self.responses
            .insert(prompt.into(), TranslationResult::translated(request));
        self
    }

    /// Register a prompt that fails translation with `message`.
    pub fn with_failure(mut self, prompt: impl Into<String>, message: impl Into<String>) -> Self {
        self.responses
            .insert(prompt.into(), TranslationResult::rejected(message));
        self
    }
}

impl Translator for StaticTranslator {
    fn translate(&self, request: &TranslateRequest) -> TranslationResult {
        match self.responses.get(request.input.trim()) {
            Some(result) => {
                let mut result = result.clone();
                if let Some(pseudo) = result.pseudo_request.as_mut() {
                    pseudo.scope = request.scope.merged_with(&pseudo.scope);
                    pseudo.dry_run |= request.dry_run;
                }
                result
            }
            None => TranslationResult::rejected(format!(
                "no translation registered for prompt '{}'",
                request.input
            )),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for schemagate types.

    use super::*;
    use proptest::prelude::*;
    use serde_json::{json, Value};

    /// Tenant ids as issued by the booking schema.
    pub fn arb_tenant_id() -> impl Strategy<Value = String> {
        "biz_[a-z0-9]{1,12}"
    }

    pub fn arb_scope() -> impl Strategy<Value = Scope> {
        (arb_tenant_id(), proptest::option::of("loc_[a-z0-9]{1,8}")).prop_map(|(biz, location)| Scope {
            biz_id: Some(biz),
            location_id: location,
            actor_user_id: None,
        })
    }

    /// Scalar JSON values that bind to a text column.
    pub fn arb_text_value() -> impl Strategy<Value = Value> {
        "[ -~]{0,24}".prop_map(Value::String)
    }

    /// Strings that must never survive the identifier gate.
    pub fn arb_hostile_name() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("status\"; DROP TABLE bizes; --".to_string()),
            Just("status' OR '1'='1".to_string()),
            Just("booking_orders; DELETE FROM bizes".to_string()),
            Just("\"booking_orders\"".to_string()),
            "[a-z]{1,8}[;'\"()]{1,3}[a-z ]{0,8}",
        ]
    }

    pub fn arb_comparison_op() -> impl Strategy<Value = FilterOp> {
        prop_oneof![
            Just(FilterOp::Eq),
            Just(FilterOp::Neq),
            Just(FilterOp::Gt),
            Just(FilterOp::Gte),
            Just(FilterOp::Lt),
            Just(FilterOp::Lte),
            Just(FilterOp::Like),
            Just(FilterOp::Ilike),
        ]
    }

    /// Filters against text columns of `booking_orders`.
    pub fn arb_booking_filter() -> impl Strategy<Value = Filter> {
        (
            prop_oneof![Just("status"), Just("customer_name"), Just("notes")],
            arb_comparison_op(),
            "[a-z0-9 ]{1,16}",
        )
            .prop_map(|(column, op, value)| Filter::new(column, op, Value::String(value)))
    }

    /// Queries against `booking_orders` using loose table spellings.
    pub fn arb_booking_query() -> impl Strategy<Value = Command> {
        (
            prop_oneof![
                Just("booking_orders"),
                Just("booking orders"),
                Just("Booking Order"),
                Just("bookingorders"),
            ],
            proptest::collection::vec(arb_booking_filter(), 0..4),
            proptest::option::of(0u32..5000),
        )
            .prop_map(|(table, filters, limit)| {
                let command = json!({
                    "kind": "query",
                    "table": table,
                    "filters": filters,
                    "limit": limit,
                });
                serde_json::from_value(command).unwrap_or_else(|e| panic!("generated invalid query: {}", e))
            })
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Fixture catalog for a small multi-tenant booking schema.

    use super::*;

    pub const TENANT: &str = "biz_1";
    pub const OTHER_TENANT: &str = "biz_2";

    /// Scope for the primary fixture tenant.
    pub fn tenant_scope() -> Scope {
        Scope::tenant(TENANT)
    }

    pub fn bizes() -> CatalogTable {
        CatalogTable::new(
            "bizes",
            vec![
                CatalogColumn::new("id", "text").primary_key(),
                CatalogColumn::new("name", "text").not_null(),
                CatalogColumn::new("created_at", "timestamptz").not_null(),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    pub fn booking_orders() -> CatalogTable {
        CatalogTable::new(
            "booking_orders",
            vec![
                CatalogColumn::new("id", "text").primary_key(),
                CatalogColumn::new("biz_id", "text").not_null(),
                CatalogColumn::new("customer_name", "text").not_null(),
                CatalogColumn::new("status", "text").not_null(),
                CatalogColumn::new("starts_at", "timestamptz"),
                CatalogColumn::new("total_minor", "int8"),
                CatalogColumn::new("notes", "text"),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    pub fn queues() -> CatalogTable {
        CatalogTable::new(
            "queues",
            vec![
                CatalogColumn::new("id", "text").primary_key(),
                CatalogColumn::new("biz_id", "text").not_null(),
                CatalogColumn::new("location_id", "text"),
                CatalogColumn::new("name", "text").not_null(),
                CatalogColumn::new("is_open", "bool").not_null(),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    pub fn queue_entries() -> CatalogTable {
        CatalogTable::new(
            "queue_entries",
            vec![
                CatalogColumn::new("id", "text").primary_key(),
                CatalogColumn::new("biz_id", "text").not_null(),
                CatalogColumn::new("queue_id", "text").not_null(),
                CatalogColumn::new("position", "int4").not_null(),
                CatalogColumn::new("status", "text").not_null(),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    pub fn payments() -> CatalogTable {
        CatalogTable::new(
            "payments",
            vec![
                CatalogColumn::new("id", "text").primary_key(),
                CatalogColumn::new("biz_id", "text").not_null(),
                CatalogColumn::new("booking_order_id", "text").not_null(),
                CatalogColumn::new("amount", "numeric").not_null(),
                CatalogColumn::new("currency", "text").not_null(),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    /// Global table without a tenant column.
    pub fn audit_events() -> CatalogTable {
        CatalogTable::new(
            "audit_events",
            vec![
                CatalogColumn::new("id", "int8").primary_key(),
                CatalogColumn::new("message", "text").not_null(),
                CatalogColumn::new("payload", "jsonb"),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    /// The full fixture catalog.
    pub fn booking_catalog() -> SchemaCatalog {
        SchemaCatalog::build(
            DEFAULT_TENANT_COLUMN,
            vec![
                bizes(),
                booking_orders(),
                queues(),
                queue_entries(),
                payments(),
                audit_events(),
            ],
        )
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for schemagate results.

    use super::*;

    /// Assert that `result` failed with a compile error of `kind`.
    pub fn assert_compile_error<T: std::fmt::Debug>(result: &Result<T, CompileError>, kind: ErrorKind) {
        match result {
            Err(err) => assert_eq!(err.kind(), kind, "unexpected compile error: {}", err),
            Ok(value) => panic!("expected {} but compilation succeeded: {:?}", kind, value),
        }
    }

    /// Assert that a response failed with `kind`.
    pub fn assert_response_error(response: &PseudoApiResponse, kind: ErrorKind) {
        assert!(!response.success, "expected failure, got success: {:?}", response.result);
        assert_eq!(response.error_code(), Some(kind), "unexpected error: {:?}", response.error);
    }

    /// Assert that SQL text carries no fragment of `hostile` outside a bound parameter.
    pub fn assert_sql_excludes(sql: &str, hostile: &str) {
        assert!(
            !sql.contains(hostile),
            "SQL text leaked caller input {:?}: {}",
            hostile,
            sql
        );
    }
}
