//! Configuration handling for schema_squash

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::schema::templates::Templates;

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "schema_squash.toml";

/// Load configuration from a TOML file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let config_str = fs::read_to_string(path).map_err(|e| {
        Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
    })?;

    let config = parse(&config_str)?;
    config.validate()?;

    Ok(config)
}

/// Parse configuration from a TOML string
pub fn parse(config_str: &str) -> Result<Config> {
    toml::from_str(config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))
}

/// Represents the complete schema_squash configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub migration: MigrationConfig,
    #[serde(default)]
    pub testrun: TestrunConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub type_mapping: TypeMappingConfig,
    #[serde(default)]
    pub templates: Templates,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Reject configurations that cannot produce a usable run
    pub fn validate(&self) -> Result<()> {
        if self.database.database.trim().is_empty() {
            return Err(Error::ConfigError("database.database must not be empty".into()));
        }
        if self.migration.name.trim().is_empty() {
            return Err(Error::ConfigError("migration.name must not be empty".into()));
        }
        if self.testrun.apply_command.is_empty() {
            return Err(Error::ConfigError("testrun.apply_command must name a program".into()));
        }
        Ok(())
    }
}

/// MySQL connection configuration
///
/// The data connection points at the analysed database, the schema connection
/// at the same server's `information_schema`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub database: String,
    #[serde(default = "default_schema_database")]
    pub schema_database: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3306
}

fn default_schema_database() -> String {
    "information_schema".to_string()
}

/// Where and under which name the consolidated migration is written
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MigrationConfig {
    pub folder: PathBuf,
    pub name: String,
    /// Source description recorded in the migration's header comment
    pub comment: String,
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("database/migrations"),
            name: "schema_squash".to_string(),
            comment: "This Migration sums up the database structure for all past Migrations.\n     *\n     * On migrate:fresh, framework and package tables will not be changed if they exist when this runs!\n     * Be sure to keep migration files which alter these!".to_string(),
        }
    }
}

/// Structure comparison test run settings
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TestrunConfig {
    pub folder: PathBuf,
    pub backup_file_name: String,
    pub before_structure_file_name: String,
    pub after_structure_file_name: String,
    pub excluded_tables: Vec<String>,
    pub mysqldump_binary: String,
    pub mysql_binary: String,
    /// Program and arguments that apply the migrations to an emptied database
    pub apply_command: Vec<String>,
}

impl Default for TestrunConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("storage"),
            backup_file_name: "squashTestrunBackup.sql".to_string(),
            before_structure_file_name: "squashStructureBefore.sql".to_string(),
            after_structure_file_name: "squashStructureAfter.sql".to_string(),
            excluded_tables: Vec::new(),
            mysqldump_binary: "mysqldump".to_string(),
            mysql_binary: "mysql".to_string(),
            apply_command: vec![
                "php".to_string(),
                "artisan".to_string(),
                "migrate:fresh".to_string(),
                "--force".to_string(),
            ],
        }
    }
}

impl TestrunConfig {
    pub fn backup_path(&self) -> PathBuf {
        self.folder.join(&self.backup_file_name)
    }

    pub fn before_path(&self) -> PathBuf {
        self.folder.join(&self.before_structure_file_name)
    }

    pub fn after_path(&self) -> PathBuf {
        self.folder.join(&self.after_structure_file_name)
    }
}

/// Generation behaviour, each flag can also be switched on from the command line
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct GenerationConfig {
    /// Record classification failures instead of aborting
    pub ignore_problems: bool,
    /// Emit foreign keys in trailing alteration blocks
    pub separate_foreign_keys: bool,
    /// Treat foreign keys lacking the explicit "no action" bits as unrecognized
    pub require_no_action_bits: bool,
}

/// Additions and replacements for the built-in type tables
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TypeMappingConfig {
    /// MySQL `DATA_TYPE` to Laravel column method
    pub fluent: IndexMap<String, String>,
    /// MySQL `DATA_TYPE` to the literal type used in a raw `ALTER TABLE ... ADD`
    pub raw: IndexMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [database]
        username = "homestead"
        password = "secret"
        database = "app"
    "#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config = parse(MINIMAL).unwrap();

        assert_eq!(config.database.host, "127.0.0.1");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.database.schema_database, "information_schema");
        assert_eq!(config.migration.name, "schema_squash");
        assert_eq!(
            config.testrun.backup_path(),
            PathBuf::from("storage/squashTestrunBackup.sql")
        );
        assert!(!config.generation.ignore_problems);
        assert!(config.type_mapping.fluent.is_empty());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_migration_name_is_rejected() {
        let mut config = parse(MINIMAL).unwrap();
        config.migration.name = " ".to_string();

        assert!(matches!(config.validate(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn missing_database_section_fails_to_parse() {
        assert!(matches!(parse("[migration]\nname = \"x\""), Err(Error::ConfigError(_))));
    }
}
