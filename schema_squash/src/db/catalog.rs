//! Catalog queries
//!
//! Every query is bound by the analysed database's name only.

use async_trait::async_trait;
use sqlx::{FromRow, MySqlPool};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::types::IndexKind;

/// One `COLUMNS` row
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ColumnRow {
    pub table_name: String,
    pub column_name: String,
    pub ordinal_position: u64,
    pub data_type: String,
    pub column_type: String,
    pub is_nullable: String,
    pub character_set_name: Option<String>,
    pub collation_name: Option<String>,
    pub column_comment: String,
    pub column_default: Option<String>,
    pub extra: String,
    pub srs_id: Option<u64>,
}

/// One column of a unique key, from `STATISTICS` joined with `TABLE_CONSTRAINTS`
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UniqueKeyRow {
    pub table_name: String,
    pub index_name: String,
    pub column_name: String,
    pub seq_in_index: u64,
    /// Indexed prefix length, `None` for whole-column keys
    pub sub_part: Option<u64>,
}

/// One column pair of a foreign key with the `INNODB_FOREIGN.TYPE` bitmask
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct ForeignKeyRow {
    pub table_name: String,
    pub constraint_name: String,
    pub column_name: String,
    pub referenced_table_name: String,
    pub referenced_column_name: String,
    pub action_bits: u64,
}

/// One field of an InnoDB index. `table_name` is qualified as `database/table`.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct IndexFieldRow {
    pub table_name: String,
    pub index_name: String,
    pub field_name: String,
    pub position: u64,
}

/// One `STATISTICS` row of a single table
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct GenericIndexRow {
    pub index_name: String,
    pub column_name: String,
    pub seq_in_index: u64,
    pub non_unique: u64,
    pub index_type: String,
}

impl GenericIndexRow {
    pub fn is_unique(&self) -> bool {
        self.non_unique == 0
    }

    pub fn is_primary(&self) -> bool {
        self.index_name == "PRIMARY"
    }

    pub fn is_spatial(&self) -> bool {
        self.index_type.eq_ignore_ascii_case("SPATIAL")
    }
}

/// Source of catalog rows
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// All columns, ordered by table and ordinal position
    async fn columns(&self, database: &str) -> Result<Vec<ColumnRow>>;

    /// Unique key columns, ordered by table, key and position in the key
    async fn unique_key_columns(&self, database: &str) -> Result<Vec<UniqueKeyRow>>;

    /// Foreign key column pairs, ordered by table, constraint and position
    async fn foreign_key_columns(&self, database: &str) -> Result<Vec<ForeignKeyRow>>;

    /// InnoDB index fields of one index kind, in index creation order.
    ///
    /// Fails with [`Error::IndexMetadataUnavailable`] when the internal tables
    /// cannot be read.
    async fn innodb_index_fields(&self, database: &str, kind: IndexKind) -> Result<Vec<IndexFieldRow>>;

    /// Index rows of one table from the generic statistics view
    async fn generic_indexes(&self, database: &str, table: &str) -> Result<Vec<GenericIndexRow>>;
}

/// [`CatalogClient`] over a pool connected to `information_schema`
pub struct MySqlCatalog<'a> {
    pool: &'a MySqlPool,
}

impl<'a> MySqlCatalog<'a> {
    pub fn new(pool: &'a MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl<'a> CatalogClient for MySqlCatalog<'a> {
    async fn columns(&self, database: &str) -> Result<Vec<ColumnRow>> {
        let sql = r#"
            SELECT
                CAST(TABLE_NAME AS CHAR) AS table_name,
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(ORDINAL_POSITION AS UNSIGNED) AS ordinal_position,
                CAST(DATA_TYPE AS CHAR) AS data_type,
                CAST(COLUMN_TYPE AS CHAR) AS column_type,
                CAST(IS_NULLABLE AS CHAR) AS is_nullable,
                CAST(CHARACTER_SET_NAME AS CHAR) AS character_set_name,
                CAST(COLLATION_NAME AS CHAR) AS collation_name,
                CAST(COLUMN_COMMENT AS CHAR) AS column_comment,
                CAST(COLUMN_DEFAULT AS CHAR) AS column_default,
                CAST(EXTRA AS CHAR) AS extra,
                CAST(SRS_ID AS UNSIGNED) AS srs_id
            FROM COLUMNS
            WHERE TABLE_SCHEMA = ?
            ORDER BY TABLE_NAME, ORDINAL_POSITION
        "#;

        let rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(database)
            .fetch_all(self.pool)
            .await?;

        debug!(database, count = rows.len(), "Read column rows");
        Ok(rows)
    }

    async fn unique_key_columns(&self, database: &str) -> Result<Vec<UniqueKeyRow>> {
        let sql = r#"
            SELECT
                CAST(stat.TABLE_NAME AS CHAR) AS table_name,
                CAST(stat.INDEX_NAME AS CHAR) AS index_name,
                CAST(stat.COLUMN_NAME AS CHAR) AS column_name,
                CAST(stat.SEQ_IN_INDEX AS UNSIGNED) AS seq_in_index,
                CAST(stat.SUB_PART AS UNSIGNED) AS sub_part
            FROM STATISTICS stat
            JOIN TABLE_CONSTRAINTS table_constraints
              ON stat.TABLE_SCHEMA = table_constraints.TABLE_SCHEMA
             AND stat.TABLE_NAME = table_constraints.TABLE_NAME
             AND stat.INDEX_NAME = table_constraints.CONSTRAINT_NAME
            WHERE stat.NON_UNIQUE = 0
              AND stat.TABLE_SCHEMA = ?
              AND table_constraints.CONSTRAINT_TYPE = 'UNIQUE'
            ORDER BY stat.TABLE_NAME, stat.INDEX_NAME, stat.SEQ_IN_INDEX
        "#;

        Ok(sqlx::query_as::<_, UniqueKeyRow>(sql)
            .bind(database)
            .fetch_all(self.pool)
            .await?)
    }

    async fn foreign_key_columns(&self, database: &str) -> Result<Vec<ForeignKeyRow>> {
        let sql = r#"
            SELECT
                CAST(usages.TABLE_NAME AS CHAR) AS table_name,
                CAST(usages.CONSTRAINT_NAME AS CHAR) AS constraint_name,
                CAST(usages.COLUMN_NAME AS CHAR) AS column_name,
                CAST(usages.REFERENCED_TABLE_NAME AS CHAR) AS referenced_table_name,
                CAST(usages.REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column_name,
                CAST(foreigns.TYPE AS UNSIGNED) AS action_bits
            FROM KEY_COLUMN_USAGE usages
            JOIN INNODB_FOREIGN foreigns
              ON foreigns.ID = CONCAT(usages.CONSTRAINT_SCHEMA, '/', usages.CONSTRAINT_NAME)
            WHERE usages.REFERENCED_TABLE_SCHEMA = ?
            ORDER BY usages.TABLE_NAME, usages.CONSTRAINT_NAME, usages.ORDINAL_POSITION
        "#;

        Ok(sqlx::query_as::<_, ForeignKeyRow>(sql)
            .bind(database)
            .fetch_all(self.pool)
            .await?)
    }

    async fn innodb_index_fields(&self, database: &str, kind: IndexKind) -> Result<Vec<IndexFieldRow>> {
        let sql = r#"
            SELECT
                CAST(innodb_table.NAME AS CHAR) AS table_name,
                CAST(innodb_index.NAME AS CHAR) AS index_name,
                CAST(innodb_field.NAME AS CHAR) AS field_name,
                CAST(innodb_field.POS AS UNSIGNED) AS position
            FROM INNODB_TABLES innodb_table
            JOIN INNODB_INDEXES innodb_index ON innodb_table.TABLE_ID = innodb_index.TABLE_ID
            JOIN INNODB_FIELDS innodb_field ON innodb_index.INDEX_ID = innodb_field.INDEX_ID
            WHERE innodb_table.NAME LIKE ?
              AND innodb_index.TYPE = ?
            ORDER BY innodb_index.INDEX_ID, innodb_field.POS
        "#;

        let prefix = format!("{}/", database);
        let rows = sqlx::query_as::<_, IndexFieldRow>(sql)
            .bind(format!("{}%", prefix.replace('_', "\\_").replace('%', "\\%")))
            .bind(kind.innodb_type())
            .fetch_all(self.pool)
            .await
            .map_err(|e| Error::IndexMetadataUnavailable(e.to_string()))?;

        Ok(rows
            .into_iter()
            .filter(|row| row.table_name.starts_with(&prefix))
            .collect())
    }

    async fn generic_indexes(&self, database: &str, table: &str) -> Result<Vec<GenericIndexRow>> {
        let sql = r#"
            SELECT
                CAST(INDEX_NAME AS CHAR) AS index_name,
                CAST(COLUMN_NAME AS CHAR) AS column_name,
                CAST(SEQ_IN_INDEX AS UNSIGNED) AS seq_in_index,
                CAST(NON_UNIQUE AS UNSIGNED) AS non_unique,
                CAST(INDEX_TYPE AS CHAR) AS index_type
            FROM STATISTICS
            WHERE TABLE_SCHEMA = ?
              AND TABLE_NAME = ?
            ORDER BY INDEX_NAME, SEQ_IN_INDEX
        "#;

        Ok(sqlx::query_as::<_, GenericIndexRow>(sql)
            .bind(database)
            .bind(table)
            .fetch_all(self.pool)
            .await?)
    }
}
