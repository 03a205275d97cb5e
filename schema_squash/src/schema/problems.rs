//! Problems recorded while running with `--ignore-problems`

use serde::Serialize;

use crate::error::Error;

/// What kind of classification failure was tolerated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProblemKind {
    UnsupportedDataType,
    UnsupportedColumnType,
    AmbiguousDisplayWidth,
    UnrecognizedActionEncoding,
}

/// A tolerated failure. `column` is the skipped column, or the key name for key problems.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Problem {
    pub table: String,
    pub column: String,
    pub kind: ProblemKind,
    pub message: String,
}

impl Problem {
    /// Convert a classification error into a problem record
    pub fn from_error(error: &Error) -> Option<Self> {
        let (table, column, kind) = match error {
            Error::UnsupportedDataType { table, column, .. } => {
                (table, column, ProblemKind::UnsupportedDataType)
            }
            Error::UnsupportedColumnType { table, column, .. } => {
                (table, column, ProblemKind::UnsupportedColumnType)
            }
            Error::AmbiguousDisplayWidth { table, column, .. } => {
                (table, column, ProblemKind::AmbiguousDisplayWidth)
            }
            Error::UnrecognizedActionEncoding { table, key, .. } => {
                (table, key, ProblemKind::UnrecognizedActionEncoding)
            }
            _ => return None,
        };

        Some(Self {
            table: table.clone(),
            column: column.clone(),
            kind,
            message: error.to_string(),
        })
    }

    /// Whether the problem removed a column from the output
    pub fn skips_column(&self) -> bool {
        !matches!(self.kind, ProblemKind::UnrecognizedActionEncoding)
    }
}

/// Append-only log of tolerated problems of one generation run
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProblemLog {
    problems: Vec<Problem>,
}

impl ProblemLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, problem: Problem) {
        self.problems.push(problem);
    }

    /// Whether `column` of `table` was left out of the generated definition
    pub fn is_column_skipped(&self, table: &str, column: &str) -> bool {
        self.problems
            .iter()
            .any(|p| p.skips_column() && p.table == table && p.column == column)
    }

    pub fn for_table<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a Problem> + 'a {
        self.problems.iter().filter(move |p| p.table == table)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Problem> {
        self.problems.iter()
    }

    pub fn len(&self) -> usize {
        self.problems.len()
    }

    pub fn is_empty(&self) -> bool {
        self.problems.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_problems_do_not_skip_columns() {
        let mut log = ProblemLog::new();
        log.record(
            Problem::from_error(&Error::UnsupportedDataType {
                table: "t".into(),
                column: "shape".into(),
                data_type: "enum".into(),
            })
            .unwrap(),
        );
        log.record(
            Problem::from_error(&Error::UnrecognizedActionEncoding {
                table: "t".into(),
                key: "t_owner_foreign".into(),
                bits: 128,
            })
            .unwrap(),
        );

        assert!(log.is_column_skipped("t", "shape"));
        assert!(!log.is_column_skipped("t", "t_owner_foreign"));
        assert!(!log.is_column_skipped("other", "shape"));
        assert_eq!(log.for_table("t").count(), 2);
    }

    #[test]
    fn non_classification_errors_are_not_problems() {
        assert!(Problem::from_error(&Error::ConfigError("x".into())).is_none());
    }
}
