use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};
use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::TempDir;

use schema_squash::config;
use schema_squash::db::catalog::{
    CatalogClient, ColumnRow, ForeignKeyRow, GenericIndexRow, IndexFieldRow, UniqueKeyRow,
};
use schema_squash::schema::{IndexFidelity, IndexKind};
use schema_squash::{Config, Error, Result, SquashClient};

/// In-memory catalog of a small shop database
#[derive(Default)]
struct MockCatalog {
    columns: Vec<ColumnRow>,
    unique_keys: Vec<UniqueKeyRow>,
    foreign_keys: Vec<ForeignKeyRow>,
    innodb_indexes: Vec<IndexFieldRow>,
    innodb_unavailable: bool,
    generic_indexes: HashMap<String, Vec<GenericIndexRow>>,
}

#[async_trait]
impl CatalogClient for MockCatalog {
    async fn columns(&self, _database: &str) -> Result<Vec<ColumnRow>> {
        Ok(self.columns.clone())
    }

    async fn unique_key_columns(&self, _database: &str) -> Result<Vec<UniqueKeyRow>> {
        Ok(self.unique_keys.clone())
    }

    async fn foreign_key_columns(&self, _database: &str) -> Result<Vec<ForeignKeyRow>> {
        Ok(self.foreign_keys.clone())
    }

    async fn innodb_index_fields(&self, _database: &str, kind: IndexKind) -> Result<Vec<IndexFieldRow>> {
        if self.innodb_unavailable {
            return Err(Error::IndexMetadataUnavailable("access denied".to_string()));
        }
        Ok(match kind {
            IndexKind::Secondary => self.innodb_indexes.clone(),
            IndexKind::Spatial => Vec::new(),
        })
    }

    async fn generic_indexes(&self, _database: &str, table: &str) -> Result<Vec<GenericIndexRow>> {
        Ok(self.generic_indexes.get(table).cloned().unwrap_or_default())
    }
}

fn column(table: &str, name: &str, position: u64, data_type: &str, column_type: &str) -> ColumnRow {
    ColumnRow {
        table_name: table.to_string(),
        column_name: name.to_string(),
        ordinal_position: position,
        data_type: data_type.to_string(),
        column_type: column_type.to_string(),
        is_nullable: "NO".to_string(),
        character_set_name: None,
        collation_name: None,
        column_comment: String::new(),
        column_default: None,
        extra: String::new(),
        srs_id: None,
    }
}

fn nullable(mut row: ColumnRow) -> ColumnRow {
    row.is_nullable = "YES".to_string();
    row
}

fn auto_increment(mut row: ColumnRow) -> ColumnRow {
    row.extra = "auto_increment".to_string();
    row
}

fn shop_catalog() -> MockCatalog {
    MockCatalog {
        columns: vec![
            auto_increment(column("users", "id", 1, "bigint", "bigint unsigned")),
            column("users", "email", 2, "varchar", "varchar(255)"),
            nullable(column("users", "created_at", 3, "timestamp", "timestamp")),
            nullable(column("users", "updated_at", 4, "timestamp", "timestamp")),
            auto_increment(column("posts", "id", 1, "bigint", "bigint unsigned")),
            column("posts", "user_id", 2, "bigint", "bigint unsigned"),
            column("posts", "title", 3, "varchar", "varchar(255)"),
        ],
        unique_keys: vec![UniqueKeyRow {
            table_name: "users".to_string(),
            index_name: "users_email_unique".to_string(),
            column_name: "email".to_string(),
            seq_in_index: 1,
            sub_part: None,
        }],
        foreign_keys: vec![ForeignKeyRow {
            table_name: "posts".to_string(),
            constraint_name: "posts_user_id_foreign".to_string(),
            column_name: "user_id".to_string(),
            referenced_table_name: "users".to_string(),
            referenced_column_name: "id".to_string(),
            action_bits: 1,
        }],
        innodb_indexes: vec![IndexFieldRow {
            table_name: "shop/posts".to_string(),
            index_name: "posts_title_index".to_string(),
            field_name: "title".to_string(),
            position: 0,
        }],
        ..MockCatalog::default()
    }
}

fn test_config(extra: &str) -> Config {
    config::parse(&format!(
        "[database]\nusername = \"root\"\ndatabase = \"shop\"\n{}",
        extra
    ))
    .unwrap()
}

fn at() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 3, 1)
        .unwrap()
        .and_hms_opt(12, 30, 0)
        .unwrap()
}

#[tokio::test]
async fn generates_a_consolidated_migration() {
    let client = SquashClient::new(test_config(""));
    let migration = client.generate_from(&shop_catalog(), at()).await.unwrap();

    assert_eq!(migration.tables, 2);
    assert!(migration.problems.is_empty());
    assert_eq!(migration.index_fidelity, IndexFidelity::Precise);

    let code = &migration.code;
    assert!(code.contains("2024-03-01 12:30:00"));
    assert!(code.contains("Schema::create('users'"));
    assert!(code.contains("$table->id();"));
    assert!(code.contains("$table->timestamps();"));
    assert!(code.contains("$table->unique('email', 'users_email_unique');"));
    assert!(code.contains("$table->unsignedBigInteger('user_id');"));
    assert!(code.contains("$table->index('title', 'posts_title_index');"));
    assert!(code.contains(
        "$table->foreign(['user_id'], 'posts_user_id_foreign')->references(['id'])->on('users')->cascadeOnDelete();"
    ));
    assert!(!code.contains("primary("));
    assert!(!code.contains("// Foreign Keys"));
    assert!(code.find("Schema::create('users'").unwrap() < code.find("Schema::create('posts'").unwrap());
}

#[tokio::test]
async fn empty_database_is_reported() {
    let client = SquashClient::new(test_config(""));
    let result = client.generate_from(&MockCatalog::default(), at()).await;

    assert!(matches!(result, Err(Error::EmptyDatabase(name)) if name == "shop"));
}

#[rstest]
#[case(false)]
#[case(true)]
#[tokio::test]
async fn unknown_column_type(#[case] ignore_problems: bool) {
    let mut catalog = shop_catalog();
    catalog.columns.push(column("users", "legacy", 5, "vector", "vector(3)"));
    catalog.unique_keys.push(UniqueKeyRow {
        table_name: "users".to_string(),
        index_name: "users_legacy_unique".to_string(),
        column_name: "legacy".to_string(),
        seq_in_index: 1,
        sub_part: None,
    });

    let client = SquashClient::new(test_config(&format!(
        "[generation]\nignore_problems = {}\n",
        ignore_problems
    )));
    let result = client.generate_from(&catalog, at()).await;

    if !ignore_problems {
        assert!(matches!(result, Err(Error::UnsupportedDataType { ref column, .. }) if column == "legacy"));
        return;
    }

    let migration = result.unwrap();
    assert_eq!(migration.problems.len(), 1);
    assert!(!migration.code.contains("$table->vector("));
    let unique = migration
        .code
        .lines()
        .find(|line| line.contains("$table->unique('legacy', 'users_legacy_unique');"))
        .unwrap();
    assert!(unique.starts_with("//"));
    assert!(migration
        .warnings
        .iter()
        .any(|warning| warning.contains("users_legacy_unique")));
}

#[tokio::test]
async fn unreadable_innodb_metadata_falls_back_to_statistics() {
    let mut catalog = shop_catalog();
    catalog.innodb_unavailable = true;
    catalog.generic_indexes.insert(
        "posts".to_string(),
        vec![
            GenericIndexRow {
                index_name: "PRIMARY".to_string(),
                column_name: "id".to_string(),
                seq_in_index: 1,
                non_unique: 0,
                index_type: "BTREE".to_string(),
            },
            GenericIndexRow {
                index_name: "posts_title_index".to_string(),
                column_name: "title".to_string(),
                seq_in_index: 1,
                non_unique: 1,
                index_type: "BTREE".to_string(),
            },
        ],
    );

    let client = SquashClient::new(test_config(""));
    let migration = client.generate_from(&catalog, at()).await.unwrap();

    assert!(matches!(migration.index_fidelity, IndexFidelity::Degraded { ref reason } if reason == "access denied"));
    assert!(migration.code.contains("$table->index('title', 'posts_title_index');"));
}

#[tokio::test]
async fn separated_foreign_keys_follow_all_tables() {
    let client = SquashClient::new(test_config("[generation]\nseparate_foreign_keys = true\n"));
    let migration = client.generate_from(&shop_catalog(), at()).await.unwrap();
    let code = &migration.code;

    let title = code.find("// Foreign Keys").unwrap();
    assert!(code.find("Schema::create('posts'").unwrap() < title);
    assert!(title < code.find("Schema::table('posts'").unwrap());
    assert!(title < code.find("$table->foreign(").unwrap());
}

#[tokio::test]
async fn raw_types_are_added_after_the_create_block() {
    let mut catalog = shop_catalog();
    catalog.columns.push(column("users", "avatar", 5, "mediumblob", "mediumblob"));

    let client = SquashClient::new(test_config(""));
    let code = client.generate_from(&catalog, at()).await.unwrap().code;

    let statement = code
        .find("DB::statement('ALTER TABLE `users` ADD `avatar` MEDIUMBLOB');")
        .unwrap();
    assert!(code.find("Schema::create('users'").unwrap() < statement);
    assert!(statement < code.find("Schema::create('posts'").unwrap());
}

#[test]
fn test_migration_is_written_to_the_migrations_folder() {
    let dir = TempDir::new().unwrap();
    let client = SquashClient::new(test_config(&format!(
        "[migration]\nfolder = {:?}\n",
        dir.path().to_string_lossy()
    )));

    let path = client.write_test_migration().unwrap();
    let code = std::fs::read_to_string(&path).unwrap();

    assert!(path.starts_with(dir.path()));
    assert!(path.to_string_lossy().ends_with("_squash_all_types_test.php"));
    assert!(code.contains("Schema::create('squash_all_types_test'"));
    assert!(code.contains("Test migration with all supported data types"));
}
