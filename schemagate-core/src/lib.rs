//! SCHEMAGATE Core - Catalog, Identifier Gate & Command Model
//!
//! Pure data and validation for the pseudo-API layer. Everything that decides
//! whether a name or command is acceptable lives here, so every other crate
//! shares one definition of "safe".
//!
//! Architecture:
//! ```text
//! Live schema (information_schema)
//!     ↓
//! CatalogSource → SchemaCatalog (tables, columns, alias index)
//!     ↓
//! Command / PseudoRequest (closed union, deserialized at the boundary)
//!     ↓
//! schemagate-compiler (catalog + identifier gate → parameterized SQL)
//! ```

pub mod catalog;
pub mod catalog_service;
pub mod command;
pub mod envelope;
pub mod error;
pub mod identifier;
pub mod scope;
pub mod translate;

// Re-export key types for convenience
pub use catalog::{CatalogColumn, CatalogSnapshot, CatalogSummary, CatalogTable, SchemaCatalog, DEFAULT_TENANT_COLUMN};
pub use catalog_service::{CatalogService, CatalogSource, StaticCatalogSource};
pub use command::*;
pub use envelope::{ExecutionTraceStep, DRY_RUN_WARNING, PseudoApiResponse, PseudoRequest, ResponseError};
pub use error::{CatalogError, CompileError, CompileResult, ErrorKind};
pub use identifier::{assert_safe_identifier, is_safe_identifier, quote_identifier};
pub use scope::Scope;
pub use translate::{JsonTranslator, TranslateRequest, TranslationResult, Translator};
