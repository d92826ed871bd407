//! SCHEMAGATE Compiler - Commands to Parameterized SQL
//!
//! Turns a typed [`Command`](schemagate_core::Command) plus a request
//! [`Scope`](schemagate_core::Scope) into PostgreSQL statements. Every
//! identifier in the emitted text comes from the schema catalog and passes the
//! identifier gate; every caller value becomes a `$n` placeholder.
//!
//! Pipeline:
//! ```text
//! Command + Scope
//!     ↓
//! Resolve tables/columns (SchemaCatalog alias index)
//!     ↓
//! Tenant-scope rule (inject, verify, or reject)
//!     ↓
//! SqlBuilder ($n placeholders, quoted identifiers)
//!     ↓
//! Compilation { plan: Leaf | Batch tree, warnings }
//! ```

pub mod builder;
pub mod compiler;
pub mod plan;

// Re-export key types for convenience
pub use builder::SqlBuilder;
pub use compiler::{CommandCompiler, CompilerOptions, DEFAULT_LIMIT, MAX_LIMIT};
pub use plan::{Compilation, CompiledCommand, CompiledPlan};
