//! Constraint expressions: unique keys, indexes, primary keys and foreign keys

use tracing::warn;

use crate::error::{Error, Result};
use crate::schema::composer::Statement;
use crate::schema::problems::{Problem, ProblemLog};
use crate::schema::types::{ForeignKeySpec, IndexKind, IndexSpec, PrimaryKeySpec, UniqueKeySpec};
use crate::utils::naming::{quote, quoted_array, quoted_list};

/// `INNODB_FOREIGN.TYPE` flags and the clause each one produces
pub const ACTION_BITS: &[(u32, Option<&str>)] = &[
    (1, Some("cascadeOnDelete()")),
    (2, Some("nullOnDelete()")),
    (4, Some("cascadeOnUpdate()")),
    (8, Some("onUpdate('SET NULL')")),
    // ON DELETE NO ACTION
    (16, None),
    // ON UPDATE NO ACTION
    (32, None),
];

const DELETE_BITS: u32 = 1 | 2 | 16;
const UPDATE_BITS: u32 = 4 | 8 | 32;

/// Decoded action clauses and whether the bitmask was fully understood
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedActions {
    pub clauses: Vec<&'static str>,
    pub recognized: bool,
}

/// Decode an action bitmask.
///
/// The mask is recognized when the known bits add up to it. With
/// `require_no_action_bits` each side (delete, update) must also carry one of
/// its bits, so an implicit RESTRICT counts as unrecognized.
pub fn decode_actions(bits: u32, require_no_action_bits: bool) -> DecodedActions {
    let mut clauses = Vec::new();
    let mut checksum = 0;

    for (bit, clause) in ACTION_BITS {
        if bits & bit != 0 {
            if let Some(clause) = clause {
                clauses.push(*clause);
            }
            checksum += bit;
        }
    }

    let mut recognized = checksum == bits;
    if require_no_action_bits {
        recognized &= bits & DELETE_BITS != 0 && bits & UPDATE_BITS != 0;
    }

    DecodedActions { clauses, recognized }
}

/// Builds constraint statements for one generation run
#[derive(Debug, Clone, Copy, Default)]
pub struct ConstraintComposer {
    tolerant: bool,
    require_no_action_bits: bool,
}

impl ConstraintComposer {
    pub fn new(tolerant: bool, require_no_action_bits: bool) -> Self {
        Self {
            tolerant,
            require_no_action_bits,
        }
    }

    /// `unique([...], 'name')`, commented out with a warning when it names a skipped column
    pub fn unique_key(&self, key: &UniqueKeySpec, problems: &ProblemLog) -> (Statement, Option<String>) {
        let columns: Vec<String> = key
            .columns
            .iter()
            .enumerate()
            .map(|(i, column)| match key.prefix_lengths.get(i).copied().flatten() {
                Some(length) => format!("DB::raw('{}({})')", column, length),
                None => quote(column),
            })
            .collect();

        let body = format!("unique([{}], {})", columns.join(", "), quote(&key.name));
        let skipped = names_skipped_column(problems, &key.table, &key.columns);
        suppress_if(skipped, Statement::new(body), "Unique index", &key.name, &key.table)
    }

    /// `index(...)` or `spatialIndex(...)`, commented out when it names a skipped column
    pub fn index_key(&self, index: &IndexSpec, problems: &ProblemLog) -> (Statement, Option<String>) {
        let (method, label) = match index.kind {
            IndexKind::Secondary => ("index", "Index"),
            IndexKind::Spatial => ("spatialIndex", "Spatial index"),
        };

        let statement = Statement::new(format!(
            "{}({}, {})",
            method,
            quoted_list(&index.columns),
            quote(&index.name)
        ));
        let skipped = names_skipped_column(problems, &index.table, &index.columns);
        suppress_if(skipped, statement, label, &index.name, &index.table)
    }

    pub fn primary_key(&self, key: &PrimaryKeySpec, problems: &ProblemLog) -> (Statement, Option<String>) {
        let statement = Statement::new(format!("primary({})", quoted_list(&key.columns)));
        let skipped = names_skipped_column(problems, &key.table, &key.columns);
        suppress_if(skipped, statement, "Primary key", "PRIMARY", &key.table)
    }

    /// Comment out a foreign key whose own or referenced columns were skipped
    pub fn suppress_foreign_key(
        &self,
        key: &ForeignKeySpec,
        statement: Statement,
        problems: &ProblemLog,
    ) -> (Statement, Option<String>) {
        let skipped = names_skipped_column(problems, &key.table, &key.columns())
            || names_skipped_column(problems, &key.referenced_table, &key.referenced_columns());
        suppress_if(skipped, statement, "Foreign key", &key.name, &key.table)
    }

    /// Foreign key clause chain.
    ///
    /// An unrecognized action bitmask fails, or in tolerant mode yields the
    /// best-effort clause together with the problem to record.
    pub fn foreign_key(&self, key: &ForeignKeySpec) -> Result<(Statement, Option<Problem>)> {
        let mut parts = vec![
            format!("foreign({}, {})", quoted_array(&key.columns()), quote(&key.name)),
            format!("references({})", quoted_array(&key.referenced_columns())),
            format!("on({})", quote(&key.referenced_table)),
        ];

        let decoded = decode_actions(key.action_bits, self.require_no_action_bits);
        parts.extend(decoded.clauses.iter().map(|clause| clause.to_string()));
        let statement = Statement::new(parts.join("->"));

        if decoded.recognized {
            return Ok((statement, None));
        }

        let error = Error::UnrecognizedActionEncoding {
            table: key.table.clone(),
            key: key.name.clone(),
            bits: key.action_bits,
        };

        match Problem::from_error(&error) {
            Some(problem) if self.tolerant => {
                warn!(table = %key.table, "{}", error);
                Ok((statement, Some(problem)))
            }
            _ => Err(error),
        }
    }
}

fn names_skipped_column<S: AsRef<str>>(problems: &ProblemLog, table: &str, columns: &[S]) -> bool {
    columns
        .iter()
        .any(|column| problems.is_column_skipped(table, column.as_ref()))
}

fn suppress_if(
    skipped: bool,
    statement: Statement,
    label: &str,
    name: &str,
    table: &str,
) -> (Statement, Option<String>) {
    if !skipped {
        return (statement, None);
    }

    let message = format!(
        "{} \"{}\" left commented due to an unprocessed column in table \"{}\"",
        label, name, table
    );
    warn!(table = %table, "{}", message);
    (Statement::commented(statement.body), Some(message))
}
