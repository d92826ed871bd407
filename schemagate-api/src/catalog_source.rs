//! Live schema introspection.
//!
//! Reads `information_schema` for one schema and turns it into catalog tables.
//! A table that cannot be described safely (unsafe table or column name, no
//! columns) is skipped with a warning instead of failing the whole catalog.

use async_trait::async_trait;
use schemagate_core::{is_safe_identifier, CatalogColumn, CatalogError, CatalogSource, CatalogTable, SchemaCatalog};
use std::collections::{BTreeMap, BTreeSet};

use crate::db::DbClient;

const COLUMNS_SQL: &str = "\
SELECT c.table_name::text, c.column_name::text, c.udt_name::text, c.is_nullable::text \
FROM information_schema.columns c \
JOIN information_schema.tables t \
  ON t.table_schema = c.table_schema AND t.table_name = c.table_name \
WHERE c.table_schema::text = $1 AND t.table_type = 'BASE TABLE' \
ORDER BY c.table_name, c.ordinal_position";

const PRIMARY_KEYS_SQL: &str = "\
SELECT kcu.table_name::text, kcu.column_name::text \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
  ON kcu.constraint_name = tc.constraint_name \
 AND kcu.table_schema = tc.table_schema \
 AND kcu.table_name = tc.table_name \
WHERE tc.table_schema::text = $1 AND tc.constraint_type = 'PRIMARY KEY' \
ORDER BY kcu.table_name, kcu.ordinal_position";

/// One row of the column listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnRow {
    pub table: String,
    pub column: String,
    pub udt_name: String,
    pub nullable: bool,
}

/// Group column rows into catalog tables, preserving ordinal order.
pub fn build_tables(
    columns: Vec<ColumnRow>,
    primary_keys: &[(String, String)],
    tenant_column: &str,
) -> Vec<CatalogTable> {
    let keys: BTreeSet<(&str, &str)> = primary_keys
        .iter()
        .map(|(table, column)| (table.as_str(), column.as_str()))
        .collect();

    let mut grouped: BTreeMap<String, Vec<ColumnRow>> = BTreeMap::new();
    for row in columns {
        grouped.entry(row.table.clone()).or_default().push(row);
    }

    let mut tables = Vec::with_capacity(grouped.len());
    for (table, rows) in grouped {
        if !is_safe_identifier(&table) {
            tracing::warn!(table = %table, "Skipping table with unsafe name");
            continue;
        }
        if let Some(bad) = rows.iter().find(|r| !is_safe_identifier(&r.column)) {
            tracing::warn!(table = %table, column = %bad.column, "Skipping table with unsafe column name");
            continue;
        }
        if rows.is_empty() {
            continue;
        }

        let columns = rows
            .into_iter()
            .map(|row| {
                let mut column = CatalogColumn::new(row.column, row.udt_name);
                if keys.contains(&(table.as_str(), column.name.as_str())) {
                    column = column.primary_key();
                } else if !row.nullable {
                    column = column.not_null();
                }
                column
            })
            .collect();
        tables.push(CatalogTable::new(table, columns, tenant_column));
    }
    tables
}

/// Catalog source backed by the live database.
#[derive(Clone)]
pub struct PgCatalogSource {
    db: DbClient,
    schema: String,
    tenant_column: String,
}

impl PgCatalogSource {
    pub fn new(db: DbClient, schema: impl Into<String>, tenant_column: impl Into<String>) -> Self {
        Self {
            db,
            schema: schema.into(),
            tenant_column: tenant_column.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for PgCatalogSource {
    async fn load(&self) -> Result<SchemaCatalog, CatalogError> {
        let conn = self.db.get_conn().await.map_err(|e| CatalogError::Unavailable {
            reason: e.message,
        })?;

        let introspection = |e: tokio_postgres::Error| CatalogError::Introspection {
            reason: e.to_string(),
        };

        let column_rows = conn
            .query(COLUMNS_SQL, &[&self.schema])
            .await
            .map_err(introspection)?;
        let key_rows = conn
            .query(PRIMARY_KEYS_SQL, &[&self.schema])
            .await
            .map_err(introspection)?;

        let mut columns = Vec::with_capacity(column_rows.len());
        for row in &column_rows {
            columns.push(ColumnRow {
                table: row.try_get(0).map_err(introspection)?,
                column: row.try_get(1).map_err(introspection)?,
                udt_name: row.try_get(2).map_err(introspection)?,
                nullable: row.try_get::<_, String>(3).map_err(introspection)? == "YES",
            });
        }

        let mut primary_keys: Vec<(String, String)> = Vec::with_capacity(key_rows.len());
        for row in &key_rows {
            primary_keys.push((
                row.try_get(0).map_err(introspection)?,
                row.try_get(1).map_err(introspection)?,
            ));
        }

        tracing::debug!(
            schema = %self.schema,
            columns = columns.len(),
            primary_key_columns = primary_keys.len(),
            "Introspected schema"
        );

        let tables = build_tables(columns, &primary_keys, &self.tenant_column);
        Ok(SchemaCatalog::build(self.tenant_column.clone(), tables))
    }
}
