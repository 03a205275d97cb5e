//! Type definitions for the catalog-derived schema model

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// MySQL integer family. Display widths of these types are never carried forward.
pub const INTEGER_TYPES: &[&str] = &["bigint", "int", "mediumint", "smallint", "tinyint"];

/// Whether a native `DATA_TYPE` belongs to the integer family
pub fn is_integer_type(data_type: &str) -> bool {
    INTEGER_TYPES.contains(&data_type)
}

/// Default value of a column as reported by the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnDefault {
    CurrentTimestamp,
    Numeric(i64),
    Text(String),
}

impl ColumnDefault {
    /// Classify a raw `COLUMN_DEFAULT` value of a column with the given native type
    pub fn from_catalog(raw: &str, data_type: &str) -> Self {
        if raw == "CURRENT_TIMESTAMP" {
            return ColumnDefault::CurrentTimestamp;
        }

        if is_integer_type(data_type) {
            if let Ok(value) = raw.trim().parse::<i64>() {
                return ColumnDefault::Numeric(value);
            }
        }

        ColumnDefault::Text(raw.to_string())
    }
}

/// Flags decoded from the `EXTRA` column
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtraFlags {
    pub auto_increment: bool,
    pub on_update_current_timestamp: bool,
}

impl ExtraFlags {
    pub fn parse(extra: &str) -> Self {
        Self {
            auto_increment: extra.contains("auto_increment"),
            on_update_current_timestamp: extra.contains("on update CURRENT_TIMESTAMP"),
        }
    }
}

/// One table column as read from the catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub table_name: String,
    pub column_name: String,
    pub ordinal_position: u32,
    pub data_type: String,
    pub column_type: String,
    pub nullable: bool,
    pub character_set: Option<String>,
    pub collation: Option<String>,
    pub comment: Option<String>,
    pub default: Option<ColumnDefault>,
    pub extra: ExtraFlags,
    pub srs_id: Option<u32>,
}

impl ColumnSpec {
    /// Create a non-nullable column without modifiers
    pub fn new(
        table_name: &str,
        column_name: &str,
        ordinal_position: u32,
        data_type: &str,
        column_type: &str,
    ) -> Self {
        Self {
            table_name: table_name.to_string(),
            column_name: column_name.to_string(),
            ordinal_position,
            data_type: data_type.to_lowercase(),
            column_type: column_type.to_string(),
            nullable: false,
            character_set: None,
            collation: None,
            comment: None,
            default: None,
            extra: ExtraFlags::default(),
            srs_id: None,
        }
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn charset(mut self, character_set: &str, collation: &str) -> Self {
        self.character_set = Some(character_set.to_string());
        self.collation = Some(collation.to_string());
        self
    }

    pub fn comment(mut self, comment: &str) -> Self {
        self.comment = Some(comment.to_string());
        self
    }

    pub fn default(mut self, default: ColumnDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn extra(mut self, extra: &str) -> Self {
        self.extra = ExtraFlags::parse(extra);
        self
    }

    pub fn srs_id(mut self, srs_id: u32) -> Self {
        self.srs_id = Some(srs_id);
        self
    }

    pub fn is_unsigned(&self) -> bool {
        self.column_type.contains("unsigned")
    }

    /// An unsigned auto-incrementing `bigint`/`int` named `id`, which implies the primary key
    pub fn is_id_shortcut(&self) -> bool {
        self.column_name == "id"
            && matches!(self.data_type.as_str(), "bigint" | "int")
            && self.is_unsigned()
            && self.extra.auto_increment
    }
}

/// A unique key and its optional per-column prefix lengths
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UniqueKeySpec {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub prefix_lengths: Vec<Option<u32>>,
}

/// The two index kinds read from InnoDB's index metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndexKind {
    Secondary,
    Spatial,
}

impl IndexKind {
    /// `INNODB_INDEXES.TYPE` value of this kind
    pub fn innodb_type(self) -> i32 {
        match self {
            IndexKind::Secondary => 0,
            IndexKind::Spatial => 64,
        }
    }

    /// Whether the generic, order-losing source may stand in for InnoDB metadata
    pub fn allows_fallback(self) -> bool {
        matches!(self, IndexKind::Secondary)
    }
}

/// A non-unique secondary or spatial index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub table: String,
    pub name: String,
    pub columns: Vec<String>,
    pub kind: IndexKind,
}

/// A primary key not implied by an id column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimaryKeySpec {
    pub table: String,
    pub columns: Vec<String>,
}

/// A foreign key with its InnoDB action bitmask
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForeignKeySpec {
    pub table: String,
    pub name: String,
    /// (local column, referenced column), in key order
    pub column_pairs: Vec<(String, String)>,
    pub referenced_table: String,
    pub action_bits: u32,
}

impl ForeignKeySpec {
    pub fn columns(&self) -> Vec<&str> {
        self.column_pairs.iter().map(|(local, _)| local.as_str()).collect()
    }

    pub fn referenced_columns(&self) -> Vec<&str> {
        self.column_pairs.iter().map(|(_, referenced)| referenced.as_str()).collect()
    }
}

/// Everything known about one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSpec>,
    pub unique_keys: Vec<UniqueKeySpec>,
    pub indexes: Vec<IndexSpec>,
    pub spatial_indexes: Vec<IndexSpec>,
    pub primary_key: Option<PrimaryKeySpec>,
    pub foreign_keys: Vec<ForeignKeySpec>,
}

impl TableSchema {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            columns: Vec::new(),
            unique_keys: Vec::new(),
            indexes: Vec::new(),
            spatial_indexes: Vec::new(),
            primary_key: None,
            foreign_keys: Vec::new(),
        }
    }

    /// Add a column, keeping columns ordered by ordinal position
    pub fn add_column(&mut self, column: ColumnSpec) {
        let position = self
            .columns
            .partition_point(|existing| existing.ordinal_position <= column.ordinal_position);
        self.columns.insert(position, column);
    }

    pub fn has_id_shortcut(&self) -> bool {
        self.columns.iter().any(ColumnSpec::is_id_shortcut)
    }
}

/// How faithfully index order could be read
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IndexFidelity {
    #[default]
    Precise,
    /// InnoDB metadata was unreachable; index order within tables may differ
    Degraded { reason: String },
}

/// Ordered tables of one database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub database_name: String,
    pub tables: IndexMap<String, TableSchema>,
    pub index_fidelity: IndexFidelity,
}

impl DatabaseSchema {
    pub fn new(database_name: &str) -> Self {
        Self {
            database_name: database_name.to_string(),
            tables: IndexMap::new(),
            index_fidelity: IndexFidelity::Precise,
        }
    }

    /// Add a table, replacing any table of the same name in place
    pub fn add_table(&mut self, table: TableSchema) {
        self.tables.insert(table.name.clone(), table);
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_classified_by_type_family() {
        assert_eq!(
            ColumnDefault::from_catalog("CURRENT_TIMESTAMP", "timestamp"),
            ColumnDefault::CurrentTimestamp
        );
        assert_eq!(ColumnDefault::from_catalog("42", "int"), ColumnDefault::Numeric(42));
        assert_eq!(
            ColumnDefault::from_catalog("42", "varchar"),
            ColumnDefault::Text("42".to_string())
        );
        assert_eq!(
            ColumnDefault::from_catalog("abc", "tinyint"),
            ColumnDefault::Text("abc".to_string())
        );
    }

    #[test]
    fn extra_flags_from_mysql8_values() {
        let flags = ExtraFlags::parse("DEFAULT_GENERATED on update CURRENT_TIMESTAMP");
        assert!(flags.on_update_current_timestamp);
        assert!(!flags.auto_increment);

        assert!(ExtraFlags::parse("auto_increment").auto_increment);
    }

    #[test]
    fn columns_stay_in_ordinal_order() {
        let mut table = TableSchema::new("users");
        table.add_column(ColumnSpec::new("users", "email", 3, "varchar", "varchar(255)"));
        table.add_column(ColumnSpec::new("users", "id", 1, "bigint", "bigint unsigned"));
        table.add_column(ColumnSpec::new("users", "name", 2, "varchar", "varchar(255)"));

        let names: Vec<_> = table.columns.iter().map(|c| c.column_name.as_str()).collect();
        assert_eq!(names, vec!["id", "name", "email"]);
    }

    #[test]
    fn id_shortcut_needs_every_condition() {
        let id = ColumnSpec::new("users", "id", 1, "bigint", "bigint unsigned").extra("auto_increment");
        assert!(id.is_id_shortcut());

        let signed = ColumnSpec::new("users", "id", 1, "bigint", "bigint").extra("auto_increment");
        assert!(!signed.is_id_shortcut());

        let not_incrementing = ColumnSpec::new("users", "id", 1, "int", "int unsigned");
        assert!(!not_incrementing.is_id_shortcut());

        let other_name =
            ColumnSpec::new("users", "user_id", 1, "bigint", "bigint unsigned").extra("auto_increment");
        assert!(!other_name.is_id_shortcut());
    }
}
