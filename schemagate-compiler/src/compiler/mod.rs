//! Command Compiler - Transform Commands to PostgreSQL
//!
//! Resolves every table and column through the schema catalog, applies the
//! tenant-scope rule and emits parameterized SQL. The compiler validates rules
//! the command types cannot express on their own.
//!
//! # Tenant-scope rule
//!
//! For a table that has the tenant column:
//! - the scope must carry a tenant id, otherwise `MissingTenantScope`;
//! - the tenant predicate is emitted first in `WHERE` and is bound to `$1`
//!   for queries and deletes;
//! - a caller tenant filter or value must equal the scope's tenant id exactly,
//!   otherwise `TenantMismatch`. Matching duplicates are folded away;
//! - inserts without a tenant value get one injected as the first column.

mod filters;

use schemagate_core::{
    quote_identifier, CatalogTable, Command, CompileError, CompileResult, DeleteCommand, Filter,
    InsertCommand, MutateCommand, QueryCommand, SchemaCatalog, Scope, SortDirection, StatementKind,
    UpdateCommand,
};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

use self::filters::{check_tenant_filter, check_tenant_value, compile_filter};
use crate::builder::SqlBuilder;
use crate::plan::{Compilation, CompiledCommand, CompiledPlan};

/// Row limit applied to queries that do not set one.
pub const DEFAULT_LIMIT: u32 = 100;

/// Largest row limit a query may request.
pub const MAX_LIMIT: u32 = 1000;

// ============================================================================
// OPTIONS
// ============================================================================

/// Compiler tuning knobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompilerOptions {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for CompilerOptions {
    fn default() -> Self {
        Self {
            default_limit: DEFAULT_LIMIT,
            max_limit: MAX_LIMIT,
        }
    }
}

// ============================================================================
// TARGET TABLE
// ============================================================================

/// A resolved target table plus the tenant id it must be scoped to.
struct Target<'a> {
    table: &'a CatalogTable,
    quoted: String,
    tenant_column: &'a str,
    tenant: Option<String>,
}

impl<'a> Target<'a> {
    fn name(&self) -> &'a str {
        self.table.name()
    }

    fn column(&self, input: &str) -> CompileResult<&'a str> {
        self.table
            .resolve_column(input)
            .ok_or_else(|| CompileError::UnknownColumn {
                table: self.table.name().to_string(),
                input: input.to_string(),
            })
    }

    fn is_tenant_column(&self, column: &str) -> bool {
        self.tenant.is_some() && column == self.tenant_column
    }

    /// Column list for `SELECT` / `RETURNING`. Empty input means every column.
    fn projection(&self, requested: &[String]) -> CompileResult<String> {
        let names: Vec<&str> = if requested.is_empty() {
            self.table.columns().iter().map(|c| c.name.as_str()).collect()
        } else {
            let mut seen = BTreeSet::new();
            let mut names = Vec::with_capacity(requested.len());
            for input in requested {
                let name = self.column(input)?;
                if seen.insert(name) {
                    names.push(name);
                }
            }
            names
        };
        let quoted = names
            .into_iter()
            .map(quote_identifier)
            .collect::<CompileResult<Vec<_>>>()?;
        Ok(quoted.join(", "))
    }

    /// Resolve `values` into ordered `(column, value)` pairs.
    fn assignments(&self, values: &Map<String, Value>, kind: StatementKind) -> CompileResult<Vec<(&'a str, Value)>> {
        if values.is_empty() {
            return Err(CompileError::EmptyValues {
                table: self.name().to_string(),
                operation: kind.to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        let mut out = Vec::with_capacity(values.len() + 1);
        for (input, value) in values {
            let column = self.column(input)?;
            if !seen.insert(column) {
                return Err(CompileError::DuplicateColumn {
                    table: self.name().to_string(),
                    column: column.to_string(),
                });
            }
            if let Some(tenant) = self.tenant.as_deref() {
                if column == self.tenant_column {
                    check_tenant_value(self.name(), tenant, value)?;
                }
            }
            out.push((column, value.clone()));
        }
        Ok(out)
    }

    /// `WHERE` predicates with the tenant predicate first.
    fn predicates(&self, filters: &[Filter], builder: &mut SqlBuilder) -> CompileResult<Vec<String>> {
        let mut predicates = Vec::with_capacity(filters.len() + 1);
        if let Some(tenant) = self.tenant.as_deref() {
            let placeholder = builder.bind(Value::String(tenant.to_string()));
            predicates.push(format!("{} = {}", quote_identifier(self.tenant_column)?, placeholder));
        }
        for filter in filters {
            let column = self.column(&filter.column)?;
            if self.is_tenant_column(column) {
                if let Some(tenant) = self.tenant.as_deref() {
                    check_tenant_filter(self.name(), tenant, filter)?;
                }
                continue;
            }
            predicates.push(compile_filter(column, &quote_identifier(column)?, filter, builder)?);
        }
        Ok(predicates)
    }

    /// An update or delete needs a caller filter beyond the tenant predicate.
    /// Filters on the tenant column fold into that predicate and do not count.
    fn require_filters(&self, filters: &[Filter], kind: StatementKind) -> CompileResult<()> {
        let narrowing = filters.iter().any(|filter| match self.column(&filter.column) {
            Ok(column) => !self.is_tenant_column(column),
            // Unknown columns fail later with their own error.
            Err(_) => true,
        });
        if !narrowing {
            return Err(CompileError::UnsafeMutation {
                table: self.name().to_string(),
                operation: kind.to_string(),
            });
        }
        Ok(())
    }
}

fn push_where(sql: &mut String, predicates: &[String]) {
    if !predicates.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicates.join(" AND "));
    }
}

// ============================================================================
// COMPILER
// ============================================================================

/// Compiles commands against one catalog snapshot.
#[derive(Debug, Clone, Copy)]
pub struct CommandCompiler<'a> {
    catalog: &'a SchemaCatalog,
    options: CompilerOptions,
}

impl<'a> CommandCompiler<'a> {
    pub fn new(catalog: &'a SchemaCatalog) -> Self {
        Self::with_options(catalog, CompilerOptions::default())
    }

    pub fn with_options(catalog: &'a SchemaCatalog, options: CompilerOptions) -> Self {
        Self { catalog, options }
    }

    /// Compile a full command tree.
    ///
    /// Fails on the first error anywhere in the tree, so nothing of a
    /// partially valid batch is ever handed to the executor.
    pub fn compile(&self, command: &Command, scope: &Scope) -> CompileResult<Compilation> {
        let mut warnings = Vec::new();
        let plan = self.compile_node(command, scope, &mut warnings)?;
        tracing::debug!(
            kind = ?command.kind(),
            statements = plan.leaf_count(),
            warnings = warnings.len(),
            "Command compiled"
        );
        Ok(Compilation {
            kind: command.kind(),
            plan,
            warnings,
        })
    }

    fn compile_node(&self, command: &Command, scope: &Scope, warnings: &mut Vec<String>) -> CompileResult<CompiledPlan> {
        match command {
            Command::Query(query) => Ok(CompiledPlan::Leaf(self.compile_query(query, scope, warnings)?)),
            Command::Mutate(mutation) => Ok(CompiledPlan::Leaf(self.compile_mutation(mutation, scope)?)),
            Command::Batch(batch) => {
                if batch.commands.is_empty() {
                    return Err(CompileError::EmptyBatch);
                }
                let children = batch
                    .commands
                    .iter()
                    .map(|child| self.compile_node(child, scope, warnings))
                    .collect::<CompileResult<Vec<_>>>()?;
                Ok(CompiledPlan::Batch(children))
            }
        }
    }

    /// Compile a single mutation.
    pub fn compile_mutation(&self, mutation: &MutateCommand, scope: &Scope) -> CompileResult<CompiledCommand> {
        match mutation {
            MutateCommand::Insert(insert) => self.compile_insert(insert, scope),
            MutateCommand::Update(update) => self.compile_update(update, scope),
            MutateCommand::Delete(delete) => self.compile_delete(delete, scope),
        }
    }

    fn target(&self, input: &str, scope: &Scope) -> CompileResult<Target<'a>> {
        let catalog: &'a SchemaCatalog = self.catalog;
        let table = catalog
            .resolve_table(input)
            .ok_or_else(|| CompileError::UnknownTable {
                input: input.to_string(),
            })?;
        let quoted = quote_identifier(table.name())?;
        let tenant = if table.has_tenant_column() {
            let tenant = scope
                .tenant_id()
                .ok_or_else(|| CompileError::MissingTenantScope {
                    table: table.name().to_string(),
                })?;
            Some(tenant.to_string())
        } else {
            None
        };
        Ok(Target {
            table,
            quoted,
            tenant_column: catalog.tenant_column(),
            tenant,
        })
    }

    /// Compile a single query. Limit clamping warnings go to `warnings`.
    pub fn compile_query(
        &self,
        query: &QueryCommand,
        scope: &Scope,
        warnings: &mut Vec<String>,
    ) -> CompileResult<CompiledCommand> {
        let target = self.target(&query.table, scope)?;
        let mut builder = SqlBuilder::new();

        let mut sql = format!("SELECT {} FROM {}", target.projection(&query.select)?, target.quoted);
        let predicates = target.predicates(&query.filters, &mut builder)?;
        push_where(&mut sql, &predicates);

        if !query.sort.is_empty() {
            let order = query
                .sort
                .iter()
                .map(|sort| -> CompileResult<String> {
                    let column = quote_identifier(target.column(&sort.column)?)?;
                    let direction = match sort.direction {
                        SortDirection::Asc => "ASC",
                        SortDirection::Desc => "DESC",
                    };
                    Ok(format!("{} {}", column, direction))
                })
                .collect::<CompileResult<Vec<_>>>()?;
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        let max = self.options.max_limit;
        let limit = match query.limit {
            None => self.options.default_limit.min(max),
            Some(limit) if limit > max => {
                warnings.push(format!(
                    "limit {} on '{}' exceeds the maximum of {}; clamped to {}",
                    limit,
                    target.name(),
                    max,
                    max
                ));
                max
            }
            Some(limit) => limit,
        };
        sql.push_str(&format!(" LIMIT {}", limit));
        if let Some(offset) = query.offset {
            sql.push_str(&format!(" OFFSET {}", offset));
        }

        Ok(CompiledCommand {
            kind: StatementKind::Query,
            table: target.name().to_string(),
            sql,
            params: builder.into_params(),
        })
    }

    fn compile_insert(&self, insert: &InsertCommand, scope: &Scope) -> CompileResult<CompiledCommand> {
        let target = self.target(&insert.table, scope)?;
        let mut assignments = target.assignments(&insert.values, StatementKind::Insert)?;

        if let Some(tenant) = target.tenant.as_deref() {
            let pair = match assignments.iter().position(|(column, _)| *column == target.tenant_column) {
                Some(index) => assignments.remove(index),
                None => (target.tenant_column, Value::String(tenant.to_string())),
            };
            assignments.insert(0, pair);
        }

        let mut builder = SqlBuilder::new();
        let mut columns = Vec::with_capacity(assignments.len());
        let mut placeholders = Vec::with_capacity(assignments.len());
        for (column, value) in assignments {
            columns.push(quote_identifier(column)?);
            placeholders.push(builder.bind(value));
        }

        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            target.quoted,
            columns.join(", "),
            placeholders.join(", "),
            target.projection(&insert.returning)?
        );
        Ok(CompiledCommand {
            kind: StatementKind::Insert,
            table: target.name().to_string(),
            sql,
            params: builder.into_params(),
        })
    }

    fn compile_update(&self, update: &UpdateCommand, scope: &Scope) -> CompileResult<CompiledCommand> {
        let target = self.target(&update.table, scope)?;
        target.require_filters(&update.filters, StatementKind::Update)?;
        let assignments = target.assignments(&update.values, StatementKind::Update)?;

        let mut builder = SqlBuilder::new();
        let set = assignments
            .into_iter()
            .map(|(column, value)| -> CompileResult<String> {
                Ok(format!("{} = {}", quote_identifier(column)?, builder.bind(value)))
            })
            .collect::<CompileResult<Vec<_>>>()?;

        let mut sql = format!("UPDATE {} SET {}", target.quoted, set.join(", "));
        let predicates = target.predicates(&update.filters, &mut builder)?;
        push_where(&mut sql, &predicates);
        sql.push_str(" RETURNING ");
        sql.push_str(&target.projection(&update.returning)?);

        Ok(CompiledCommand {
            kind: StatementKind::Update,
            table: target.name().to_string(),
            sql,
            params: builder.into_params(),
        })
    }

    fn compile_delete(&self, delete: &DeleteCommand, scope: &Scope) -> CompileResult<CompiledCommand> {
        let target = self.target(&delete.table, scope)?;
        target.require_filters(&delete.filters, StatementKind::Delete)?;

        let mut builder = SqlBuilder::new();
        let mut sql = format!("DELETE FROM {}", target.quoted);
        let predicates = target.predicates(&delete.filters, &mut builder)?;
        push_where(&mut sql, &predicates);
        sql.push_str(" RETURNING ");
        sql.push_str(&target.projection(&delete.returning)?);

        Ok(CompiledCommand {
            kind: StatementKind::Delete,
            table: target.name().to_string(),
            sql,
            params: builder.into_params(),
        })
    }
}
