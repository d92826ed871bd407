//! Compiled plan tree.

use schemagate_core::{CommandKind, StatementKind};
use serde::Serialize;
use serde_json::Value;

/// One executable statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompiledCommand {
    pub kind: StatementKind,
    /// Canonical table name.
    pub table: String,
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compiled command tree. Batches keep the caller's nesting so results can be
/// reassembled in the same shape.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledPlan {
    Leaf(CompiledCommand),
    Batch(Vec<CompiledPlan>),
}

impl CompiledPlan {
    /// Leaves in execution order: depth-first, left to right.
    pub fn leaves(&self) -> Vec<&CompiledCommand> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'p>(&'p self, out: &mut Vec<&'p CompiledCommand>) {
        match self {
            CompiledPlan::Leaf(command) => out.push(command),
            CompiledPlan::Batch(children) => {
                for child in children {
                    child.collect_leaves(out);
                }
            }
        }
    }

    pub fn leaf_count(&self) -> usize {
        match self {
            CompiledPlan::Leaf(_) => 1,
            CompiledPlan::Batch(children) => children.iter().map(CompiledPlan::leaf_count).sum(),
        }
    }
}

/// Output of a successful compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub kind: CommandKind,
    pub plan: CompiledPlan,
    pub warnings: Vec<String>,
}
