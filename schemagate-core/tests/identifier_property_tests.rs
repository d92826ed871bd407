//! Property-Based Tests for the Identifier Gate and Alias Index
//!
//! Properties:
//! - Anything accepted by the gate quotes to exactly `"<name>"`.
//! - Anything carrying a quote, semicolon, whitespace or uppercase letter is rejected.
//! - Every alias resolves to a table that exists in the catalog.

use proptest::prelude::*;
use schemagate_core::identifier::{normalize_alias, to_db_identifier};
use schemagate_core::{
    is_safe_identifier, quote_identifier, CatalogColumn, CatalogTable, CompileError, SchemaCatalog,
    DEFAULT_TENANT_COLUMN,
};

fn arb_safe_identifier() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,30}"
}

fn arb_hostile_identifier() -> impl Strategy<Value = String> {
    (arb_safe_identifier(), prop_oneof![
        Just("\"".to_string()),
        Just(";".to_string()),
        Just(" ".to_string()),
        Just("'".to_string()),
        Just("-".to_string()),
        "[A-Z]",
    ])
    .prop_map(|(safe, bad)| format!("{}{}", safe, bad))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_safe_identifiers_quote_verbatim(name in arb_safe_identifier()) {
        prop_assert!(is_safe_identifier(&name));
        let quoted = quote_identifier(&name);
        prop_assert_eq!(quoted, Ok(format!("\"{}\"", name)));
    }

    #[test]
    fn prop_hostile_identifiers_are_rejected(name in arb_hostile_identifier()) {
        prop_assert!(!is_safe_identifier(&name));
        let rejected = matches!(quote_identifier(&name), Err(CompileError::UnsafeIdentifier { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn prop_normalize_alias_is_idempotent(input in "[ a-zA-Z_-]{0,24}") {
        let once = normalize_alias(&input);
        prop_assert_eq!(normalize_alias(&once), once.clone());
        prop_assert_eq!(to_db_identifier(&once), to_db_identifier(&input.to_lowercase()));
    }

    #[test]
    fn prop_every_alias_points_at_a_table(names in prop::collection::btree_set(arb_safe_identifier(), 1..8)) {
        let tables: Vec<CatalogTable> = names
            .iter()
            .map(|name| CatalogTable::new(name.clone(), vec![CatalogColumn::new("id", "text")], DEFAULT_TENANT_COLUMN))
            .collect();
        let catalog = SchemaCatalog::build(DEFAULT_TENANT_COLUMN, tables);

        for (alias, canonical) in catalog.aliases() {
            prop_assert!(catalog.table(canonical).is_some(), "alias {} dangles", alias);
        }
        for name in &names {
            prop_assert_eq!(catalog.resolve_table_name(name), Some(name.as_str()));
        }
    }
}
