//! Placeholder allocation for statement parameters.

use serde_json::Value;

/// Collects bound values and hands out `$n` placeholders in bind order.
///
/// Statements are assembled left to right, so bind order is text order.
#[derive(Debug, Default)]
pub struct SqlBuilder {
    params: Vec<Value>,
}

impl SqlBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a value and return its placeholder.
    pub fn bind(&mut self, value: Value) -> String {
        self.params.push(value);
        format!("${}", self.params.len())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn into_params(self) -> Vec<Value> {
        self.params
    }
}
