//! Database module for schema_squash
//!
//! Catalog access, external MySQL tools and migration file handling.

pub mod catalog;
pub mod connection;
pub mod migrations;
pub mod tools;

// Re-export key types
pub use catalog::{CatalogClient, MySqlCatalog};
pub use connection::DatabaseConnection;
pub use tools::{BackupTool, MigrationRunner, MysqlTools, StructureDumper};
