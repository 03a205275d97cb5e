//! Utilities for schema_squash
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use naming::{
    escape_literal, format_name, migration_file_name, migration_file_pattern, quote,
    quoted_array, quoted_list, strip_database_name,
};
