//! Filter predicates and tenant checks.

use schemagate_core::{CompileError, CompileResult, Filter, FilterOp};
use serde_json::Value;

use crate::builder::SqlBuilder;

fn invalid(column: &str, reason: impl Into<String>) -> CompileError {
    CompileError::InvalidFilter {
        column: column.to_string(),
        reason: reason.into(),
    }
}

fn comparison(op: FilterOp) -> Option<&'static str> {
    match op {
        FilterOp::Eq => Some("="),
        FilterOp::Neq => Some("<>"),
        FilterOp::Gt => Some(">"),
        FilterOp::Gte => Some(">="),
        FilterOp::Lt => Some("<"),
        FilterOp::Lte => Some("<="),
        FilterOp::Like => Some("LIKE"),
        FilterOp::Ilike => Some("ILIKE"),
        FilterOp::In | FilterOp::IsNull | FilterOp::NotNull => None,
    }
}

/// Compile one predicate. `column` is the canonical name, `quoted` its SQL form.
pub(crate) fn compile_filter(
    column: &str,
    quoted: &str,
    filter: &Filter,
    builder: &mut SqlBuilder,
) -> CompileResult<String> {
    let value = &filter.value;
    match filter.op {
        FilterOp::IsNull => Ok(format!("{} IS NULL", quoted)),
        FilterOp::NotNull => Ok(format!("{} IS NOT NULL", quoted)),
        FilterOp::Eq if value.is_null() => Ok(format!("{} IS NULL", quoted)),
        FilterOp::Neq if value.is_null() => Ok(format!("{} IS NOT NULL", quoted)),
        FilterOp::In => {
            let Value::Array(items) = value else {
                return Err(invalid(column, "in requires an array value"));
            };
            if items.is_empty() {
                return Ok("FALSE".to_string());
            }
            if items.iter().any(Value::is_null) {
                return Err(invalid(column, "in does not accept null elements"));
            }
            let placeholders: Vec<String> = items.iter().map(|item| builder.bind(item.clone())).collect();
            Ok(format!("{} IN ({})", quoted, placeholders.join(", ")))
        }
        FilterOp::Like | FilterOp::Ilike if !value.is_string() => {
            Err(invalid(column, format!("{} requires a string pattern", filter.op)))
        }
        op => {
            let Some(operator) = comparison(op) else {
                return Err(invalid(column, format!("{} has no comparison form", op)));
            };
            if value.is_null() {
                return Err(invalid(column, format!("{} does not accept null", op)));
            }
            Ok(format!("{} {} {}", quoted, operator, builder.bind(value.clone())))
        }
    }
}

/// A caller-supplied tenant filter is only accepted as `eq` with the scope's tenant.
pub(crate) fn check_tenant_filter(table: &str, tenant: &str, filter: &Filter) -> CompileResult<()> {
    if filter.op == FilterOp::Eq && filter.value.as_str() == Some(tenant) {
        return Ok(());
    }
    Err(CompileError::TenantMismatch {
        table: table.to_string(),
        expected: tenant.to_string(),
        actual: format!("filter {} {}", filter.op, filter.value),
    })
}

/// A caller-supplied tenant value must equal the scope's tenant.
pub(crate) fn check_tenant_value(table: &str, tenant: &str, value: &Value) -> CompileResult<()> {
    if value.as_str() == Some(tenant) {
        return Ok(());
    }
    Err(CompileError::TenantMismatch {
        table: table.to_string(),
        expected: tenant.to_string(),
        actual: format!("value {}", value),
    })
}
