//! Structure comparison test run
//!
//! Dumps the structure, backs the database up, applies the migrations to an
//! emptied database, dumps again, compares both dumps and restores the backup.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::TestrunConfig;
use crate::db::tools::{BackupTool, MigrationRunner, StructureDumper};
use crate::error::Result;
use crate::schema::compare::{compare_files, Comparison};

/// Result of a completed test run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestrunReport {
    pub comparison: Comparison,
    pub before_path: PathBuf,
    pub after_path: PathBuf,
}

/// Whether an earlier test run left its backup behind
pub fn backup_exists(config: &TestrunConfig) -> bool {
    config.backup_path().is_file()
}

/// Import the backup and delete it afterwards
pub async fn restore_backup(backup: &dyn BackupTool, path: &Path) -> Result<()> {
    info!(path = %path.display(), "Restoring database backup");
    backup.import(path).await?;
    tokio::fs::remove_file(path).await?;
    Ok(())
}

/// Run the comparison.
///
/// A failure before the second dump leaves the backup file in place for an
/// explicit restore. Once both dumps exist the backup is restored even when
/// the comparison fails.
pub async fn run_testrun(
    config: &TestrunConfig,
    dumper: &dyn StructureDumper,
    backup: &dyn BackupTool,
    runner: &dyn MigrationRunner,
) -> Result<TestrunReport> {
    let before_path = config.before_path();
    let after_path = config.after_path();
    let backup_path = config.backup_path();

    info!("Performing structure comparison test run");
    dumper.dump_structure(&before_path).await?;

    info!("Backing up database before applying temporary changes");
    backup.export(&backup_path).await?;

    info!("Running consolidated migration");
    if let Err(e) = runner.apply_fresh().await {
        warn!(
            backup = %backup_path.display(),
            "Applying the migration failed, the backup is kept for a restore"
        );
        return Err(e);
    }

    dumper.dump_structure(&after_path).await?;

    info!("Comparing structure dumps");
    let comparison = compare_files(&before_path, &after_path);

    restore_backup(backup, &backup_path).await?;

    Ok(TestrunReport {
        comparison: comparison?,
        before_path,
        after_path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Writes `before` on the first dump and `after` on the second
    struct FakeTools {
        dumps: Mutex<Vec<&'static str>>,
        log: Mutex<Vec<String>>,
        fail_apply: bool,
    }

    impl FakeTools {
        fn new(before: &'static str, after: &'static str) -> Self {
            Self {
                dumps: Mutex::new(vec![after, before]),
                log: Mutex::new(Vec::new()),
                fail_apply: false,
            }
        }

        fn log(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl StructureDumper for FakeTools {
        async fn dump_structure(&self, path: &Path) -> Result<()> {
            let dump = self.dumps.lock().unwrap().pop().unwrap_or_default();
            std::fs::write(path, dump)?;
            self.log.lock().unwrap().push("dump".to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl BackupTool for FakeTools {
        async fn export(&self, path: &Path) -> Result<()> {
            std::fs::write(path, "backup")?;
            self.log.lock().unwrap().push("export".to_string());
            Ok(())
        }

        async fn import(&self, _path: &Path) -> Result<()> {
            self.log.lock().unwrap().push("import".to_string());
            Ok(())
        }
    }

    #[async_trait]
    impl MigrationRunner for FakeTools {
        async fn apply_fresh(&self) -> Result<()> {
            self.log.lock().unwrap().push("apply".to_string());
            if self.fail_apply {
                return Err(Error::ToolError("migrate failed".into()));
            }
            Ok(())
        }
    }

    fn config(dir: &TempDir) -> TestrunConfig {
        TestrunConfig {
            folder: dir.path().to_path_buf(),
            ..TestrunConfig::default()
        }
    }

    #[tokio::test]
    async fn identical_structures() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let tools = FakeTools::new(
            "CREATE TABLE a;\n-- Dump completed on 2024-01-01 10:00:00\n",
            "CREATE TABLE a;\n-- Dump completed on 2024-01-01 10:00:09\n",
        );

        let report = run_testrun(&config, &tools, &tools, &tools).await.unwrap();

        assert_eq!(report.comparison, Comparison::Identical);
        assert_eq!(tools.log(), vec!["dump", "export", "apply", "dump", "import"]);
        assert!(!backup_exists(&config));
    }

    #[tokio::test]
    async fn empty_dump_still_restores() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let tools = FakeTools::new("CREATE TABLE a;", "");

        let result = run_testrun(&config, &tools, &tools, &tools).await;

        assert!(matches!(result, Err(Error::DumpEmpty { .. })));
        assert_eq!(tools.log().last().map(String::as_str), Some("import"));
    }

    #[tokio::test]
    async fn failed_apply_keeps_the_backup() {
        let dir = TempDir::new().unwrap();
        let config = config(&dir);
        let mut tools = FakeTools::new("a", "b");
        tools.fail_apply = true;

        assert!(run_testrun(&config, &tools, &tools, &tools).await.is_err());
        assert!(backup_exists(&config));
        assert!(!tools.log().contains(&"import".to_string()));
    }
}
