//! Builds the [`DatabaseSchema`] from catalog rows

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::db::catalog::{CatalogClient, ColumnRow, ForeignKeyRow, GenericIndexRow, IndexFieldRow, UniqueKeyRow};
use crate::error::{Error, Result};
use crate::schema::types::{
    ColumnDefault, ColumnSpec, DatabaseSchema, ForeignKeySpec, IndexFidelity, IndexKind, IndexSpec,
    PrimaryKeySpec, TableSchema, UniqueKeySpec,
};
use crate::utils::naming::strip_database_name;

/// Reads the structure of one database through a [`CatalogClient`]
pub struct SchemaReader<'a> {
    catalog: &'a dyn CatalogClient,
}

impl<'a> SchemaReader<'a> {
    pub fn new(catalog: &'a dyn CatalogClient) -> Self {
        Self { catalog }
    }

    /// Read every table with at least one column. Any query failure is fatal,
    /// except unavailable InnoDB index metadata which degrades index fidelity.
    pub async fn read(&self, database: &str) -> Result<DatabaseSchema> {
        let mut schema = DatabaseSchema::new(database);

        for row in self.catalog.columns(database).await? {
            let column = column_spec(row);
            if !schema.tables.contains_key(&column.table_name) {
                schema.add_table(TableSchema::new(&column.table_name));
            }
            if let Some(table) = schema.tables.get_mut(&column.table_name) {
                table.add_column(column);
            }
        }

        if schema.is_empty() {
            return Ok(schema);
        }
        info!(database, tables = schema.tables.len(), "Read table structure");

        for key in unique_keys(self.catalog.unique_key_columns(database).await?) {
            match schema.tables.get_mut(&key.table) {
                Some(table) => table.unique_keys.push(key),
                None => debug!(table = %key.table, "Unique key of unknown table ignored"),
            }
        }

        for key in foreign_keys(self.catalog.foreign_key_columns(database).await?) {
            match schema.tables.get_mut(&key.table) {
                Some(table) => table.foreign_keys.push(key),
                None => debug!(table = %key.table, "Foreign key of unknown table ignored"),
            }
        }

        self.load_indexes(database, IndexKind::Secondary, &mut schema).await?;
        self.load_indexes(database, IndexKind::Spatial, &mut schema).await?;

        for table in schema.tables.values_mut() {
            if table.has_id_shortcut() {
                continue;
            }
            let rows = self.catalog.generic_indexes(database, &table.name).await?;
            table.primary_key = primary_key(&table.name, &rows);
        }

        Ok(schema)
    }

    /// Load one index kind from InnoDB metadata, falling back to the statistics
    /// view when the kind allows it.
    async fn load_indexes(&self, database: &str, kind: IndexKind, schema: &mut DatabaseSchema) -> Result<()> {
        let reason = match self.catalog.innodb_index_fields(database, kind).await {
            Ok(rows) => {
                for index in innodb_indexes(rows, kind) {
                    match schema.tables.get_mut(&index.table) {
                        Some(table) => push_index(table, index),
                        None => debug!(table = %index.table, "Index of unknown table ignored"),
                    }
                }
                return Ok(());
            }
            Err(Error::IndexMetadataUnavailable(reason)) => reason,
            Err(e) => return Err(e),
        };

        warn!("Could not read {:?} indexes via information_schema: {}", kind, reason);
        if schema.index_fidelity == IndexFidelity::Precise {
            schema.index_fidelity = IndexFidelity::Degraded { reason };
        }

        if !kind.allows_fallback() {
            warn!("{:?} indexes are left out of the migration", kind);
            return Ok(());
        }

        info!("Reading indexes from the statistics view instead, index order within tables may differ");
        for table in schema.tables.values_mut() {
            let rows = self.catalog.generic_indexes(database, &table.name).await?;
            for index in fallback_indexes(&table.name, &rows) {
                push_index(table, index);
            }
        }

        Ok(())
    }
}

fn column_spec(row: ColumnRow) -> ColumnSpec {
    let ordinal = u32::try_from(row.ordinal_position).unwrap_or(u32::MAX);
    let mut column = ColumnSpec::new(
        &row.table_name,
        &row.column_name,
        ordinal,
        &row.data_type,
        &row.column_type,
    )
    .nullable(row.is_nullable == "YES")
    .extra(&row.extra);

    column.character_set = row.character_set_name;
    column.collation = row.collation_name;
    if !row.column_comment.is_empty() {
        column.comment = Some(row.column_comment);
    }
    column.default = row
        .column_default
        .map(|raw| ColumnDefault::from_catalog(&raw, &column.data_type));
    column.srs_id = row.srs_id.and_then(|id| u32::try_from(id).ok());

    column
}

fn unique_keys(rows: Vec<UniqueKeyRow>) -> Vec<UniqueKeySpec> {
    let mut keys: IndexMap<(String, String), UniqueKeySpec> = IndexMap::new();

    for row in rows {
        let key = keys
            .entry((row.table_name.clone(), row.index_name.clone()))
            .or_insert_with(|| UniqueKeySpec {
                table: row.table_name.clone(),
                name: row.index_name.clone(),
                columns: Vec::new(),
                prefix_lengths: Vec::new(),
            });
        key.columns.push(row.column_name);
        key.prefix_lengths
            .push(row.sub_part.and_then(|length| u32::try_from(length).ok()));
    }

    keys.into_values().collect()
}

fn foreign_keys(rows: Vec<ForeignKeyRow>) -> Vec<ForeignKeySpec> {
    let mut keys: IndexMap<(String, String), ForeignKeySpec> = IndexMap::new();

    for row in rows {
        let key = keys
            .entry((row.table_name.clone(), row.constraint_name.clone()))
            .or_insert_with(|| ForeignKeySpec {
                table: row.table_name.clone(),
                name: row.constraint_name.clone(),
                column_pairs: Vec::new(),
                referenced_table: row.referenced_table_name.clone(),
                action_bits: u32::try_from(row.action_bits).unwrap_or(u32::MAX),
            });
        key.column_pairs
            .push((row.column_name, row.referenced_column_name));
    }

    keys.into_values().collect()
}

fn innodb_indexes(rows: Vec<IndexFieldRow>, kind: IndexKind) -> Vec<IndexSpec> {
    let mut indexes: IndexMap<(String, String), Vec<(u64, String)>> = IndexMap::new();

    for row in rows {
        let table = strip_database_name(&row.table_name).to_string();
        indexes
            .entry((table, row.index_name))
            .or_default()
            .push((row.position, row.field_name));
    }

    indexes
        .into_iter()
        .map(|((table, name), mut fields)| {
            fields.sort_by_key(|(position, _)| *position);
            IndexSpec {
                table,
                name,
                columns: fields.into_iter().map(|(_, field)| field).collect(),
                kind,
            }
        })
        .collect()
}

/// Non-unique, non-spatial indexes from the statistics view, ordered by index name
fn fallback_indexes(table: &str, rows: &[GenericIndexRow]) -> Vec<IndexSpec> {
    let mut indexes: IndexMap<&str, Vec<(u64, &str)>> = IndexMap::new();

    for row in rows
        .iter()
        .filter(|row| !row.is_unique() && !row.is_primary() && !row.is_spatial())
    {
        indexes
            .entry(row.index_name.as_str())
            .or_default()
            .push((row.seq_in_index, row.column_name.as_str()));
    }
    indexes.sort_keys();

    indexes
        .into_iter()
        .map(|(name, mut columns)| {
            columns.sort_by_key(|(seq, _)| *seq);
            IndexSpec {
                table: table.to_string(),
                name: name.to_string(),
                columns: columns.into_iter().map(|(_, column)| column.to_string()).collect(),
                kind: IndexKind::Secondary,
            }
        })
        .collect()
}

fn primary_key(table: &str, rows: &[GenericIndexRow]) -> Option<PrimaryKeySpec> {
    let mut columns: Vec<(u64, &str)> = rows
        .iter()
        .filter(|row| row.is_primary())
        .map(|row| (row.seq_in_index, row.column_name.as_str()))
        .collect();

    if columns.is_empty() {
        return None;
    }
    columns.sort_by_key(|(seq, _)| *seq);

    Some(PrimaryKeySpec {
        table: table.to_string(),
        columns: columns.into_iter().map(|(_, column)| column.to_string()).collect(),
    })
}

fn push_index(table: &mut TableSchema, index: IndexSpec) {
    match index.kind {
        IndexKind::Secondary => table.indexes.push(index),
        IndexKind::Spatial => table.spatial_indexes.push(index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn generic(index: &str, column: &str, seq: u64, non_unique: u64, index_type: &str) -> GenericIndexRow {
        GenericIndexRow {
            index_name: index.to_string(),
            column_name: column.to_string(),
            seq_in_index: seq,
            non_unique,
            index_type: index_type.to_string(),
        }
    }

    #[test]
    fn innodb_rows_are_grouped_and_stripped() {
        let field = |table: &str, index: &str, name: &str, position| IndexFieldRow {
            table_name: table.to_string(),
            index_name: index.to_string(),
            field_name: name.to_string(),
            position,
        };
        let rows = vec![
            field("shop/orders", "orders_b_a_index", "a", 1),
            field("shop/orders", "orders_b_a_index", "b", 0),
            field("shop/orders", "orders_c_index", "c", 0),
        ];

        let indexes = innodb_indexes(rows, IndexKind::Secondary);
        assert_eq!(indexes.len(), 2);
        assert_eq!(indexes[0].table, "orders");
        assert_eq!(indexes[0].columns, vec!["b", "a"]);
        assert_eq!(indexes[1].name, "orders_c_index");
    }

    #[test]
    fn fallback_skips_unique_primary_and_spatial() {
        let rows = vec![
            generic("PRIMARY", "id", 1, 0, "BTREE"),
            generic("t_email_unique", "email", 1, 0, "BTREE"),
            generic("t_shape_spatialindex", "shape", 1, 1, "SPATIAL"),
            generic("t_z_index", "z", 1, 1, "BTREE"),
            generic("t_a_b_index", "b", 2, 1, "BTREE"),
            generic("t_a_b_index", "a", 1, 1, "BTREE"),
        ];

        let names: Vec<_> = fallback_indexes("t", &rows)
            .into_iter()
            .map(|index| (index.name, index.columns))
            .collect();

        assert_eq!(
            names,
            vec![
                ("t_a_b_index".to_string(), vec!["a".to_string(), "b".to_string()]),
                ("t_z_index".to_string(), vec!["z".to_string()]),
            ]
        );
    }

    #[test]
    fn primary_key_from_statistics() {
        let rows = vec![
            generic("PRIMARY", "b", 2, 0, "BTREE"),
            generic("PRIMARY", "a", 1, 0, "BTREE"),
            generic("t_c_index", "c", 1, 1, "BTREE"),
        ];

        assert_eq!(
            primary_key("t", &rows).unwrap().columns,
            vec!["a".to_string(), "b".to_string()]
        );
        assert!(primary_key("t", &rows[2..]).is_none());
    }

    #[test]
    fn foreign_key_pairs_stay_together() {
        let row = |constraint: &str, column: &str, referenced: &str| ForeignKeyRow {
            table_name: "lines".to_string(),
            constraint_name: constraint.to_string(),
            column_name: column.to_string(),
            referenced_table_name: "orders".to_string(),
            referenced_column_name: referenced.to_string(),
            action_bits: 1,
        };

        let keys = foreign_keys(vec![
            row("lines_order_foreign", "order_id", "id"),
            row("lines_order_foreign", "order_version", "version"),
        ]);

        assert_eq!(keys.len(), 1);
        assert_eq!(keys[0].columns(), vec!["order_id", "order_version"]);
        assert_eq!(keys[0].referenced_columns(), vec!["id", "version"]);
    }
}
