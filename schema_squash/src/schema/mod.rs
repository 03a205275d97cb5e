//! Schema module for schema_squash
//!
//! This module reads the catalog into a schema model and turns it into a
//! Laravel migration, and compares structure dumps.

pub mod compare;
pub mod composer;
pub mod constraints;
pub mod generator;
pub mod problems;
pub mod reader;
pub mod rewriter;
pub mod templates;
pub mod typemap;
pub mod types;

// Re-export key types
pub use compare::Comparison;
pub use generator::{GeneratedMigration, MigrationGenerator};
pub use problems::{Problem, ProblemKind, ProblemLog};
pub use reader::SchemaReader;
pub use typemap::TypeMapper;
pub use types::{ColumnSpec, DatabaseSchema, IndexFidelity, IndexKind, TableSchema};
