//! schema_squash: collapses a Laravel project's migration history into one migration
//!
//! schema_squash reads a live MySQL database's catalog and writes a single
//! consolidated Laravel schema migration reproducing its structure. An optional
//! test run applies the migration to an emptied database and compares
//! structure dumps taken before and after.

pub mod config;
pub mod db;
pub mod error;
pub mod schema;
pub mod testrun;
pub mod utils;

use std::path::PathBuf;

use chrono::{Local, NaiveDateTime};

// Re-export main types for easier access
pub use config::Config;
pub use db::connection::DatabaseConnection;
pub use error::{Error, Result};
pub use schema::generator::{GeneratedMigration, MigrationGenerator};
pub use schema::reader::SchemaReader;
pub use testrun::TestrunReport;

use db::catalog::{CatalogClient, MySqlCatalog};
use db::tools::MysqlTools;
use schema::compare;
use schema::generator::ALL_TYPES_TABLE;
use schema::types::DatabaseSchema;

/// Initialize schema_squash with the specified configuration file
pub fn init(config_path: &str) -> Result<SquashClient> {
    let config = config::load_from_file(config_path)?;
    Ok(SquashClient::new(config))
}

/// A generated migration and where it was written
#[derive(Debug, Clone)]
pub struct WrittenMigration {
    pub migration: GeneratedMigration,
    pub path: PathBuf,
}

/// The main client for interacting with schema_squash
pub struct SquashClient {
    config: Config,
}

impl SquashClient {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access, used to apply command line overrides
    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Read the configured database's structure from its catalog
    pub async fn read_schema(&self) -> Result<DatabaseSchema> {
        let connection = DatabaseConnection::connect(&self.config.database).await?;
        let catalog = MySqlCatalog::new(connection.pool());
        let schema = SchemaReader::new(&catalog)
            .read(connection.database())
            .await;
        connection.close().await;
        schema
    }

    /// Read a schema through any catalog client and generate the migration code
    pub async fn generate_from(&self, catalog: &dyn CatalogClient, generated_at: NaiveDateTime) -> Result<GeneratedMigration> {
        let schema = SchemaReader::new(catalog)
            .read(&self.config.database.database)
            .await?;
        MigrationGenerator::new(&self.config).generate(&schema, generated_at)
    }

    /// Generate the migration from the live database and write it to the migrations folder
    pub async fn generate(&self) -> Result<WrittenMigration> {
        let now = Local::now().naive_local();
        let schema = self.read_schema().await?;
        let migration = MigrationGenerator::new(&self.config).generate(&schema, now)?;

        let path = db::migrations::write_migration(
            &self.config.migration.folder,
            &self.config.migration.name,
            &migration.code,
            now,
        )?;

        Ok(WrittenMigration { migration, path })
    }

    /// Apply the migrations to an emptied database and compare structures
    pub async fn testrun(&self) -> Result<TestrunReport> {
        let tools = MysqlTools::new(&self.config.database, &self.config.testrun);
        testrun::run_testrun(&self.config.testrun, &tools, &tools, &tools).await
    }

    /// Whether an aborted test run left a backup behind
    pub fn backup_exists(&self) -> bool {
        testrun::backup_exists(&self.config.testrun)
    }

    /// Restore the test run backup
    pub async fn restore(&self) -> Result<()> {
        let tools = MysqlTools::new(&self.config.database, &self.config.testrun);
        testrun::restore_backup(&tools, &self.config.testrun.backup_path()).await
    }

    /// Unified diff of the test run dumps, `None` when they are identical
    pub fn diff(&self) -> Result<Option<String>> {
        let before_path = self.config.testrun.before_path();
        let after_path = self.config.testrun.after_path();
        let before = compare::read_and_clean(&before_path)?;
        let after = compare::read_and_clean(&after_path)?;

        Ok(compare::unified_diff(
            &before,
            &after,
            &before_path.to_string_lossy(),
            &after_path.to_string_lossy(),
        ))
    }

    /// Write a migration for one table holding a column of every supported type
    pub fn write_test_migration(&self) -> Result<PathBuf> {
        let now = Local::now().naive_local();
        let mut config = self.config.clone();
        config.migration.comment = "Test migration with all supported data types. Used for testing and development.".to_string();

        let generator = MigrationGenerator::new(&config);
        let migration = generator.generate(&generator.all_types_schema(), now)?;

        db::migrations::write_migration(&config.migration.folder, ALL_TYPES_TABLE, &migration.code, now)
    }
}
