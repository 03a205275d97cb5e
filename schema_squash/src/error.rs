//! Error types for schema_squash

use std::path::PathBuf;

use thiserror::Error;

/// Result type for schema_squash operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for schema_squash
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Unsupported data type \"{data_type}\" for column {table}.{column}")]
    UnsupportedDataType {
        table: String,
        column: String,
        data_type: String,
    },

    #[error("Unsupported column type \"{column_type}\" for column {table}.{column}")]
    UnsupportedColumnType {
        table: String,
        column: String,
        column_type: String,
    },

    #[error("Unable to extract display width from column type \"{column_type}\" of {table}.{column}")]
    AmbiguousDisplayWidth {
        table: String,
        column: String,
        column_type: String,
    },

    #[error("Could not determine binary key type \"{bits}\" for the key \"{key}\" on table \"{table}\"")]
    UnrecognizedActionEncoding { table: String, key: String, bits: u32 },

    #[error("The database \"{0}\" is empty")]
    EmptyDatabase(String),

    #[error("Index metadata unavailable: {0}")]
    IndexMetadataUnavailable(String),

    #[error("Structure dump is empty or unreadable: {}", path.display())]
    DumpEmpty { path: PathBuf },

    #[error("Template error: {0}")]
    TemplateError(String),

    #[error("External tool error: {0}")]
    ToolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("SQLx error: {0}")]
    SqlxError(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// Convert Serde JSON errors to schema_squash errors
impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::SerializationError(error.to_string())
    }
}

/// Convert TOML deserialization errors to schema_squash errors
impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::ConfigError(error.to_string())
    }
}

impl From<regex::Error> for Error {
    fn from(error: regex::Error) -> Self {
        Error::Unknown(error.to_string())
    }
}
