//! External tools used by the test run
//!
//! Structure dumps and backups are taken with the MySQL client programs, the
//! generated migration is applied with the configured command.

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tokio::process::Command;
use tracing::{debug, info};

use crate::config::{DatabaseConfig, TestrunConfig};
use crate::error::{Error, Result};

static AUTO_INCREMENT_COUNTER: Lazy<std::result::Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r" AUTO_INCREMENT=\d+"));

/// Remove table `AUTO_INCREMENT=n` counters, which differ between otherwise identical structures
pub fn strip_auto_increment(dump: &str) -> Result<String> {
    let regex = AUTO_INCREMENT_COUNTER
        .as_ref()
        .map_err(|e| Error::Unknown(format!("Invalid dump pattern: {}", e)))?;
    Ok(regex.replace_all(dump, "").into_owned())
}

/// Writes a structure-only dump of the database
#[async_trait]
pub trait StructureDumper: Send + Sync {
    async fn dump_structure(&self, path: &Path) -> Result<()>;
}

/// Full database export and import
#[async_trait]
pub trait BackupTool: Send + Sync {
    async fn export(&self, path: &Path) -> Result<()>;
    async fn import(&self, path: &Path) -> Result<()>;
}

/// Applies all migrations to an emptied database
#[async_trait]
pub trait MigrationRunner: Send + Sync {
    async fn apply_fresh(&self) -> Result<()>;
}

/// `mysqldump`, `mysql` and the configured migration command
pub struct MysqlTools<'a> {
    database: &'a DatabaseConfig,
    testrun: &'a TestrunConfig,
}

impl<'a> MysqlTools<'a> {
    pub fn new(database: &'a DatabaseConfig, testrun: &'a TestrunConfig) -> Self {
        Self { database, testrun }
    }

    /// A client program with connection arguments. The password travels in `MYSQL_PWD`.
    fn client(&self, program: &str) -> Command {
        let mut command = Command::new(program);
        command
            .arg(format!("--host={}", self.database.host))
            .arg(format!("--port={}", self.database.port))
            .arg(format!("--user={}", self.database.username))
            .env("MYSQL_PWD", &self.database.password)
            .kill_on_drop(true);
        command
    }

    fn excluded_tables(&self) -> impl Iterator<Item = String> + '_ {
        self.testrun
            .excluded_tables
            .iter()
            .map(move |table| format!("--ignore-table={}.{}", self.database.database, table))
    }
}

/// Run a command to completion, failing on a non-zero exit status
async fn run(mut command: Command, description: &str) -> Result<Output> {
    debug!("Running {}", description);

    let output = command
        .output()
        .await
        .map_err(|e| Error::ToolError(format!("Could not start {}: {}", description, e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ToolError(format!(
            "{} failed with {}: {}",
            description,
            output.status,
            stderr.trim()
        )));
    }

    Ok(output)
}

#[async_trait]
impl<'a> StructureDumper for MysqlTools<'a> {
    async fn dump_structure(&self, path: &Path) -> Result<()> {
        let mut command = self.client(&self.testrun.mysqldump_binary);
        command
            .arg("--no-data")
            .arg("--no-tablespaces")
            .args(self.excluded_tables())
            .arg(&self.database.database);

        let output = run(command, "structure dump").await?;
        let dump = strip_auto_increment(&String::from_utf8_lossy(&output.stdout))?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, dump).await?;

        info!(path = %path.display(), "Wrote structure dump");
        Ok(())
    }
}

#[async_trait]
impl<'a> BackupTool for MysqlTools<'a> {
    async fn export(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut command = self.client(&self.testrun.mysqldump_binary);
        command
            .arg("--single-transaction")
            .arg("--routines")
            .arg("--triggers")
            .arg(format!("--result-file={}", path.display()))
            .arg(&self.database.database);

        run(command, "database export").await?;
        info!(path = %path.display(), "Exported database backup");
        Ok(())
    }

    async fn import(&self, path: &Path) -> Result<()> {
        let backup = std::fs::File::open(path).map_err(|e| {
            Error::ToolError(format!("Could not open backup {}: {}", path.display(), e))
        })?;

        let mut command = self.client(&self.testrun.mysql_binary);
        command.arg(&self.database.database).stdin(Stdio::from(backup));

        run(command, "database import").await?;
        info!(path = %path.display(), "Imported database backup");
        Ok(())
    }
}

#[async_trait]
impl<'a> MigrationRunner for MysqlTools<'a> {
    async fn apply_fresh(&self) -> Result<()> {
        let (program, args) = self
            .testrun
            .apply_command
            .split_first()
            .ok_or_else(|| Error::ConfigError("testrun.apply_command must name a program".into()))?;

        let mut command = Command::new(program);
        command.args(args).kill_on_drop(true);

        let output = run(command, &self.testrun.apply_command.join(" ")).await?;
        debug!("{}", String::from_utf8_lossy(&output.stdout).trim());
        Ok(())
    }
}
