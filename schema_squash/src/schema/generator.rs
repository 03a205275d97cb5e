//! Migration generator
//!
//! This module turns a [`DatabaseSchema`] into the consolidated Laravel migration.

use chrono::NaiveDateTime;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::schema::composer::{DefinitionComposer, Statement, TableDefinition};
use crate::schema::constraints::ConstraintComposer;
use crate::schema::problems::ProblemLog;
use crate::schema::rewriter::beautify;
use crate::schema::typemap::{ColumnOutcome, TypeMapper};
use crate::schema::types::{ColumnSpec, DatabaseSchema, IndexFidelity, TableSchema};

/// Table of the synthetic migration holding one column per supported type
pub const ALL_TYPES_TABLE: &str = "squash_all_types_test";

/// The migration code and everything worth reporting about how it was produced
#[derive(Debug, Clone, Serialize)]
pub struct GeneratedMigration {
    #[serde(skip)]
    pub code: String,
    pub tables: usize,
    pub problems: ProblemLog,
    pub warnings: Vec<String>,
    /// Some column is a FLOAT, which Laravel may turn into DOUBLE
    pub warn_about_float: bool,
    pub index_fidelity: IndexFidelity,
}

#[derive(Debug, Default)]
struct Accumulator {
    problems: ProblemLog,
    warnings: Vec<String>,
    warn_about_float: bool,
}

/// Migration code generator
pub struct MigrationGenerator<'a> {
    config: &'a Config,
    mapper: TypeMapper,
    constraints: ConstraintComposer,
}

impl<'a> MigrationGenerator<'a> {
    /// Create a new migration generator
    pub fn new(config: &'a Config) -> Self {
        Self {
            config,
            mapper: TypeMapper::new(&config.type_mapping),
            constraints: ConstraintComposer::new(
                config.generation.ignore_problems,
                config.generation.require_no_action_bits,
            ),
        }
    }

    /// Generate the migration code for a schema.
    ///
    /// Classification failures abort the run unless `ignore_problems` is set,
    /// in which case they are collected in the returned problem log.
    pub fn generate(&self, schema: &DatabaseSchema, generated_at: NaiveDateTime) -> Result<GeneratedMigration> {
        if schema.is_empty() {
            return Err(Error::EmptyDatabase(schema.database_name.clone()));
        }

        let composer = DefinitionComposer::new(&self.config.templates)?;
        let mut acc = Accumulator::default();

        // Classify every column before composing keys, foreign keys may reference later tables
        let columns = schema
            .tables
            .values()
            .map(|table| self.column_definitions(table, &mut acc))
            .collect::<Result<Vec<_>>>()?;

        let definitions = schema
            .tables
            .values()
            .zip(columns)
            .map(|(table, (definition, primary_key_implied))| {
                self.add_constraints(table, definition, primary_key_implied, &mut acc)
            })
            .collect::<Result<Vec<_>>>()?;

        let code = composer.compose(&definitions, &self.config.migration.comment, generated_at);
        let code = beautify(&code)?;

        info!(
            tables = definitions.len(),
            problems = acc.problems.len(),
            "Generated migration code"
        );

        Ok(GeneratedMigration {
            code,
            tables: definitions.len(),
            problems: acc.problems,
            warnings: acc.warnings,
            warn_about_float: acc.warn_about_float,
            index_fidelity: schema.index_fidelity.clone(),
        })
    }

    /// A schema with one non-null `<type>_field` column per builder-mapped native type
    pub fn all_types_schema(&self) -> DatabaseSchema {
        let mut table = TableSchema::new(ALL_TYPES_TABLE);

        for (position, (native, _)) in self.mapper.fluent_types().enumerate() {
            table.add_column(ColumnSpec::new(
                ALL_TYPES_TABLE,
                &format!("{}_field", native),
                position as u32 + 1,
                native,
                native,
            ));
        }

        let mut schema = DatabaseSchema::new(ALL_TYPES_TABLE);
        schema.add_table(table);
        schema
    }

    /// Column statements of one table, and whether one of them creates the primary key
    fn column_definitions(&self, table: &TableSchema, acc: &mut Accumulator) -> Result<(TableDefinition, bool)> {
        let tolerant = self.config.generation.ignore_problems;
        let mut definition = TableDefinition::new(&table.name);
        let mut primary_key_implied = false;

        for column in &table.columns {
            if column.data_type == "float" {
                acc.warn_about_float = true;
            }

            match self.mapper.map(column, tolerant)? {
                ColumnOutcome::Build(expr) => {
                    primary_key_implied |= expr.implies_primary_key();
                    definition.statements.push(Statement::new(expr.render()));
                }
                ColumnOutcome::Raw(raw) => definition.raw_statements.push(raw),
                ColumnOutcome::Skipped(problem) => {
                    acc.warnings.push(format!(
                        "Column \"{}.{}\" of type {} could not be generated",
                        table.name, column.column_name, column.data_type
                    ));
                    acc.problems.record(problem);
                }
            }
        }

        Ok((definition, primary_key_implied))
    }

    /// Key statements in order: unique keys, indexes, primary key, spatial
    /// indexes and foreign keys. Keys naming a skipped column are commented out.
    fn add_constraints(
        &self,
        table: &TableSchema,
        mut definition: TableDefinition,
        primary_key_implied: bool,
        acc: &mut Accumulator,
    ) -> Result<TableDefinition> {
        let mut keys = Vec::new();

        for key in &table.unique_keys {
            keys.push(self.constraints.unique_key(key, &acc.problems));
        }

        for index in &table.indexes {
            keys.push(self.constraints.index_key(index, &acc.problems));
        }

        if let Some(primary_key) = table.primary_key.as_ref().filter(|_| !primary_key_implied) {
            keys.push(self.constraints.primary_key(primary_key, &acc.problems));
        }

        for index in &table.spatial_indexes {
            keys.push(self.constraints.index_key(index, &acc.problems));
        }

        for (statement, warning) in keys {
            definition.statements.push(statement);
            acc.warnings.extend(warning);
        }

        for key in &table.foreign_keys {
            let (statement, problem) = self.constraints.foreign_key(key)?;
            if let Some(problem) = problem {
                warn!(table = %table.name, "{}", problem.message);
                acc.warnings.push(problem.message.clone());
                acc.problems.record(problem);
            }

            let (statement, warning) = self.constraints.suppress_foreign_key(key, statement, &acc.problems);
            acc.warnings.extend(warning);

            if self.config.generation.separate_foreign_keys {
                definition.deferred_foreign_keys.push(statement);
            } else {
                definition.statements.push(statement);
            }
        }

        Ok(definition)
    }
}
