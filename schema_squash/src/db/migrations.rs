//! Migration file management
//!
//! The consolidated migration is written as `<timestamp>_<name>.php`; earlier
//! files of the same name are removed first so the folder keeps a single copy.

use chrono::NaiveDateTime;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::naming::{migration_file_name, migration_file_pattern};

/// Remove previously generated migrations of the same name
pub fn remove_migrations(folder: &Path, migration_name: &str) -> Result<Vec<PathBuf>> {
    let pattern = Path::new(&glob::Pattern::escape(&folder.to_string_lossy()))
        .join(migration_file_pattern(migration_name))
        .to_string_lossy()
        .into_owned();
    let mut removed = Vec::new();

    let entries = glob::glob(&pattern)
        .map_err(|e| Error::ConfigError(format!("Invalid migration name pattern {}: {}", pattern, e)))?;

    for entry in entries {
        let path = entry.map_err(|e| Error::IoError(e.into_error()))?;
        fs::remove_file(&path)?;
        tracing::info!(path = %path.display(), "Removed previous migration");
        removed.push(path);
    }

    Ok(removed)
}

/// Write the migration code, replacing earlier versions. Returns the new file's path.
pub fn write_migration(
    folder: &Path,
    migration_name: &str,
    code: &str,
    created_at: NaiveDateTime,
) -> Result<PathBuf> {
    fs::create_dir_all(folder)?;
    remove_migrations(folder, migration_name)?;

    let path = folder.join(migration_file_name(created_at, migration_name));
    fs::write(&path, code)?;
    tracing::info!(path = %path.display(), "Wrote migration");

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn at(second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 2, 29)
            .unwrap()
            .and_hms_opt(23, 59, second)
            .unwrap()
    }

    #[test]
    fn replaces_earlier_migrations_of_the_same_name() {
        let dir = TempDir::new().unwrap();
        let unrelated = dir.path().join("2014_10_12_000000_create_users_table.php");
        fs::write(&unrelated, "<?php").unwrap();

        let first = write_migration(dir.path(), "schema_squash", "first", at(1)).unwrap();
        let second = write_migration(dir.path(), "schema_squash", "second", at(2)).unwrap();

        assert!(!first.exists());
        assert_eq!(fs::read_to_string(&second).unwrap(), "second");
        assert!(second.ends_with("2024_02_29_235902_schema_squash.php"));
        assert!(unrelated.exists());
    }

    #[test]
    fn removing_from_an_empty_folder_is_fine() {
        let dir = TempDir::new().unwrap();
        assert!(remove_migrations(dir.path(), "schema_squash").unwrap().is_empty());
    }
}
