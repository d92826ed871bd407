//! Schema catalog: table and column metadata plus the fuzzy alias index.
//!
//! A catalog is built once from introspected metadata and never mutated
//! afterwards. Refreshing means building a new catalog and swapping it in
//! (see [`crate::catalog_service::CatalogService`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::identifier::{camel_to_snake, normalize_alias, pluralize, singularize, to_db_identifier};

/// Default name of the tenant isolation column.
pub const DEFAULT_TENANT_COLUMN: &str = "biz_id";

// ============================================================================
// COLUMNS AND TABLES
// ============================================================================

/// One column as reported by the live schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogColumn {
    pub name: String,
    /// Postgres type name (`udt_name`), e.g. `text`, `int4`, `timestamptz`.
    pub sql_type: String,
    pub nullable: bool,
    pub primary_key: bool,
}

impl CatalogColumn {
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            primary_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }
}

/// Table metadata. Immutable once constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogTable {
    name: String,
    columns: Vec<CatalogColumn>,
    #[serde(skip)]
    column_names: BTreeSet<String>,
    primary_key: Vec<String>,
    has_tenant_column: bool,
}

impl CatalogTable {
    /// Build table metadata, deriving the column-name set, the primary key
    /// list and whether `tenant_column` is present.
    pub fn new(name: impl Into<String>, columns: Vec<CatalogColumn>, tenant_column: &str) -> Self {
        let column_names: BTreeSet<String> = columns.iter().map(|c| c.name.clone()).collect();
        let primary_key = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect();
        let has_tenant_column = column_names.contains(tenant_column);
        Self {
            name: name.into(),
            columns,
            column_names,
            primary_key,
            has_tenant_column,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn columns(&self) -> &[CatalogColumn] {
        &self.columns
    }

    pub fn column_names(&self) -> &BTreeSet<String> {
        &self.column_names
    }

    pub fn primary_key(&self) -> &[String] {
        &self.primary_key
    }

    pub fn has_tenant_column(&self) -> bool {
        self.has_tenant_column
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_names.contains(name)
    }

    pub fn column(&self, name: &str) -> Option<&CatalogColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Resolve a loose column reference to its canonical name.
    ///
    /// Tries the normalized input, then the space/hyphen-to-underscore form,
    /// then the camelCase-to-snake_case form.
    pub fn resolve_column(&self, input: &str) -> Option<&str> {
        let candidates = [
            normalize_alias(input),
            to_db_identifier(input),
            camel_to_snake(input),
        ];
        candidates
            .iter()
            .find_map(|candidate| self.column_names.get(candidate.as_str()))
            .map(String::as_str)
    }
}

// ============================================================================
// SCHEMA CATALOG
// ============================================================================

/// Summary counts reported with every catalog snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSummary {
    pub table_count: usize,
    pub column_count: usize,
    pub tenant_scoped_table_count: usize,
    pub alias_count: usize,
}

/// Process-wide view of the live schema.
///
/// Invariant: every value in the alias map is a key of the table map.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaCatalog {
    generated_at: DateTime<Utc>,
    tenant_column: String,
    tables: BTreeMap<String, CatalogTable>,
    aliases: BTreeMap<String, String>,
    summary: CatalogSummary,
}

impl SchemaCatalog {
    /// Build a catalog from table metadata.
    ///
    /// Aliases are first-writer-wins. Canonical names are registered before
    /// any derived alias so a table's own name always resolves to itself.
    pub fn build(tenant_column: impl Into<String>, tables: impl IntoIterator<Item = CatalogTable>) -> Self {
        let tenant_column = tenant_column.into();
        let ordered: Vec<CatalogTable> = tables.into_iter().collect();

        let mut aliases: BTreeMap<String, String> = BTreeMap::new();
        for table in &ordered {
            register_alias(&mut aliases, table.name(), table.name());
        }
        for table in &ordered {
            for alias in derived_aliases(table.name()) {
                register_alias(&mut aliases, &alias, table.name());
            }
        }

        let mut map = BTreeMap::new();
        for table in ordered {
            map.entry(table.name.clone()).or_insert(table);
        }

        let summary = CatalogSummary {
            table_count: map.len(),
            column_count: map.values().map(|t| t.columns.len()).sum(),
            tenant_scoped_table_count: map.values().filter(|t| t.has_tenant_column).count(),
            alias_count: aliases.len(),
        };

        Self {
            generated_at: Utc::now(),
            tenant_column,
            tables: map,
            aliases,
            summary,
        }
    }

    pub fn generated_at(&self) -> DateTime<Utc> {
        self.generated_at
    }

    pub fn tenant_column(&self) -> &str {
        &self.tenant_column
    }

    pub fn summary(&self) -> CatalogSummary {
        self.summary
    }

    pub fn tables(&self) -> impl Iterator<Item = &CatalogTable> {
        self.tables.values()
    }

    pub fn aliases(&self) -> &BTreeMap<String, String> {
        &self.aliases
    }

    pub fn table(&self, canonical: &str) -> Option<&CatalogTable> {
        self.tables.get(canonical)
    }

    /// Resolve a loose table reference to its canonical name.
    pub fn resolve_table_name(&self, input: &str) -> Option<&str> {
        let normalized = normalize_alias(input);
        if normalized.is_empty() {
            return None;
        }
        self.aliases
            .get(&normalized)
            .or_else(|| self.aliases.get(&to_db_identifier(input)))
            .map(String::as_str)
    }

    /// Resolve a loose table reference to its metadata.
    pub fn resolve_table(&self, input: &str) -> Option<&CatalogTable> {
        self.resolve_table_name(input)
            .and_then(|name| self.tables.get(name))
    }

    /// Resolve a loose column reference on a canonical table.
    pub fn resolve_column_name(&self, table: &str, input: &str) -> Option<&str> {
        self.tables.get(table)?.resolve_column(input)
    }

    /// Serializable view of the catalog, optionally focused on one table.
    ///
    /// Returns `None` when the focus does not resolve.
    pub fn snapshot(&self, focus: Option<&str>) -> Option<CatalogSnapshot> {
        let tables = match focus.map(str::trim).filter(|f| !f.is_empty()) {
            Some(focus) => vec![self.resolve_table(focus)?.clone()],
            None => self.tables.values().cloned().collect(),
        };
        Some(CatalogSnapshot {
            generated_at: self.generated_at,
            tenant_column: self.tenant_column.clone(),
            summary: self.summary,
            tables,
        })
    }
}

/// Catalog snapshot as served to callers.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogSnapshot {
    pub generated_at: DateTime<Utc>,
    pub tenant_column: String,
    pub summary: CatalogSummary,
    pub tables: Vec<CatalogTable>,
}

fn register_alias(aliases: &mut BTreeMap<String, String>, alias: &str, canonical: &str) {
    let key = normalize_alias(alias);
    if key.is_empty() {
        return;
    }
    aliases.entry(key).or_insert_with(|| canonical.to_string());
}

fn derived_aliases(name: &str) -> Vec<String> {
    let spaced = name.replace('_', " ");
    let stripped = name.replace('_', "");
    let mut out = vec![spaced, stripped];

    match singularize(name) {
        Some(singular) => {
            out.push(singular.replace('_', " "));
            out.push(singular.replace('_', ""));
            out.push(singular);
        }
        None => {
            let plural = pluralize(name);
            out.push(plural.replace('_', " "));
            out.push(plural.replace('_', ""));
            out.push(plural);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn booking_orders() -> CatalogTable {
        CatalogTable::new(
            "booking_orders",
            vec![
                CatalogColumn::new("id", "text").primary_key(),
                CatalogColumn::new("biz_id", "text").not_null(),
                CatalogColumn::new("status", "text"),
                CatalogColumn::new("starts_at", "timestamptz"),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    fn audit_events() -> CatalogTable {
        CatalogTable::new(
            "audit_events",
            vec![
                CatalogColumn::new("id", "int8").primary_key(),
                CatalogColumn::new("message", "text"),
            ],
            DEFAULT_TENANT_COLUMN,
        )
    }

    #[test]
    fn test_table_metadata_is_derived() {
        let table = booking_orders();
        assert!(table.has_tenant_column());
        assert_eq!(table.primary_key(), ["id".to_string()]);
        assert!(table.has_column("status"));
        assert!(!audit_events().has_tenant_column());
    }

    #[test]
    fn test_resolve_table_name_variants() {
        let catalog = SchemaCatalog::build(DEFAULT_TENANT_COLUMN, vec![booking_orders(), audit_events()]);
        for input in [
            "booking_orders",
            "booking orders",
            "Booking   Orders",
            "booking-orders",
            "booking order",
            "booking_order",
            "bookingorders",
            "BookingOrders",
        ] {
            assert_eq!(
                catalog.resolve_table_name(input),
                Some("booking_orders"),
                "{} should resolve",
                input
            );
        }
        assert_eq!(catalog.resolve_table_name("audit event"), Some("audit_events"));
        assert_eq!(catalog.resolve_table_name("nothing here"), None);
        assert_eq!(catalog.resolve_table_name("   "), None);
    }

    #[test]
    fn test_singular_table_gets_plural_alias() {
        let queue = CatalogTable::new("queue", vec![CatalogColumn::new("id", "text")], DEFAULT_TENANT_COLUMN);
        let catalog = SchemaCatalog::build(DEFAULT_TENANT_COLUMN, vec![queue]);
        assert_eq!(catalog.resolve_table_name("queues"), Some("queue"));
    }

    #[test]
    fn test_alias_collision_is_first_writer_wins() {
        let plural = CatalogTable::new("orders", vec![CatalogColumn::new("id", "text")], DEFAULT_TENANT_COLUMN);
        let singular = CatalogTable::new("order", vec![CatalogColumn::new("id", "text")], DEFAULT_TENANT_COLUMN);
        let other = CatalogTable::new("order_items", vec![CatalogColumn::new("id", "text")], DEFAULT_TENANT_COLUMN);

        let catalog = SchemaCatalog::build(DEFAULT_TENANT_COLUMN, vec![plural, singular, other]);

        // Canonical names always resolve to themselves.
        assert_eq!(catalog.resolve_table_name("order"), Some("order"));
        assert_eq!(catalog.resolve_table_name("orders"), Some("orders"));
        // "order item" is only produced by order_items.
        assert_eq!(catalog.resolve_table_name("order item"), Some("order_items"));
    }

    #[test]
    fn test_every_alias_points_at_a_table() {
        let catalog = SchemaCatalog::build(DEFAULT_TENANT_COLUMN, vec![booking_orders(), audit_events()]);
        for (alias, canonical) in catalog.aliases() {
            assert!(
                catalog.table(canonical).is_some(),
                "alias {} points at missing table {}",
                alias,
                canonical
            );
        }
        assert_eq!(catalog.summary().alias_count, catalog.aliases().len());
        assert_eq!(catalog.summary().table_count, 2);
        assert_eq!(catalog.summary().column_count, 6);
        assert_eq!(catalog.summary().tenant_scoped_table_count, 1);
    }

    #[test]
    fn test_resolve_column_variants() {
        let table = booking_orders();
        assert_eq!(table.resolve_column("status"), Some("status"));
        assert_eq!(table.resolve_column(" STATUS "), Some("status"));
        assert_eq!(table.resolve_column("starts at"), Some("starts_at"));
        assert_eq!(table.resolve_column("startsAt"), Some("starts_at"));
        assert_eq!(table.resolve_column("bizId"), Some("biz_id"));
        assert_eq!(table.resolve_column("price"), None);
    }

    #[test]
    fn test_snapshot_focus() {
        let catalog = SchemaCatalog::build(DEFAULT_TENANT_COLUMN, vec![booking_orders(), audit_events()]);

        let full = catalog.snapshot(None).expect("full snapshot");
        assert_eq!(full.tables.len(), 2);

        let focused = catalog.snapshot(Some("booking orders")).expect("focused snapshot");
        assert_eq!(focused.tables.len(), 1);
        assert_eq!(focused.tables[0].name(), "booking_orders");

        assert!(catalog.snapshot(Some("unknown")).is_none());
    }
}
