//! Column type mapping
//!
//! Turns one catalog column into a Laravel column builder expression, a raw
//! `ALTER TABLE` statement for types the builder cannot express, or a
//! tolerated problem.

use indexmap::IndexMap;
use regex::Regex;
use tracing::{debug, warn};

use crate::config::TypeMappingConfig;
use crate::error::{Error, Result};
use crate::schema::problems::Problem;
use crate::schema::types::{is_integer_type, ColumnDefault, ColumnSpec};
use crate::utils::naming::{escape_literal, quote};

/// MySQL `DATA_TYPE` to Laravel column method.
///
/// `tinyint(1)` is mapped to `boolean` before this table is consulted.
pub const FLUENT_TYPES: &[(&str, &str)] = &[
    ("bigint", "bigInteger"),
    ("int", "integer"),
    ("mediumint", "mediumInteger"),
    ("smallint", "smallInteger"),
    ("tinyint", "tinyInteger"),
    ("boolean", "boolean"),
    ("decimal", "decimal"),
    ("float", "float"),
    ("double", "double"),
    ("date", "date"),
    ("datetime", "dateTime"),
    ("timestamp", "timestamp"),
    ("time", "time"),
    ("year", "year"),
    ("char", "char"),
    ("varchar", "string"),
    ("tinytext", "tinyText"),
    ("text", "text"),
    ("mediumtext", "mediumText"),
    ("longtext", "longText"),
    ("blob", "binary"),
    ("json", "json"),
    ("geometry", "geometry"),
    ("point", "point"),
    ("linestring", "lineString"),
    ("polygon", "polygon"),
    ("multipoint", "multiPoint"),
    ("multilinestring", "multiLineString"),
    ("multipolygon", "multiPolygon"),
    ("geomcollection", "geometryCollection"),
];

/// MySQL `DATA_TYPE`s without a builder method, added with a raw statement instead
pub const RAW_TYPES: &[(&str, &str)] = &[
    ("tinyblob", "TINYBLOB"),
    ("mediumblob", "MEDIUMBLOB"),
    ("longblob", "LONGBLOB"),
    ("bit", "BIT"),
];

/// Ordered builder calls for one column, joined with `->` when rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnExpr {
    modifiers: Vec<String>,
}

impl ColumnExpr {
    fn new(modifiers: Vec<String>) -> Self {
        Self { modifiers }
    }

    pub fn modifiers(&self) -> &[String] {
        &self.modifiers
    }

    pub fn render(&self) -> String {
        self.modifiers.join("->")
    }

    /// `id()` and `increments('id')` create the primary key themselves
    pub fn implies_primary_key(&self) -> bool {
        matches!(
            self.modifiers.as_slice(),
            [only] if only == "id()" || only.starts_with("increments(")
        )
    }
}

/// Column added with `DB::statement` after the table is created
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawStatement {
    pub table: String,
    pub column: String,
    pub native_type: String,
}

/// Result of mapping one column
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnOutcome {
    Build(ColumnExpr),
    Raw(RawStatement),
    /// Left out of the migration; only produced in tolerant mode
    Skipped(Problem),
}

/// Maps catalog columns to Laravel column definitions
#[derive(Debug, Clone)]
pub struct TypeMapper {
    fluent: IndexMap<String, String>,
    raw: IndexMap<String, String>,
}

impl Default for TypeMapper {
    fn default() -> Self {
        Self::new(&TypeMappingConfig::default())
    }
}

impl TypeMapper {
    /// Built-in tables with the configured additions and replacements applied
    pub fn new(config: &TypeMappingConfig) -> Self {
        let mut fluent: IndexMap<String, String> = FLUENT_TYPES
            .iter()
            .map(|(native, method)| (native.to_string(), method.to_string()))
            .collect();
        let mut raw: IndexMap<String, String> = RAW_TYPES
            .iter()
            .map(|(native, literal)| (native.to_string(), literal.to_string()))
            .collect();

        for (native, method) in &config.fluent {
            fluent.insert(native.to_lowercase(), method.clone());
        }
        for (native, literal) in &config.raw {
            raw.insert(native.to_lowercase(), literal.clone());
        }

        Self { fluent, raw }
    }

    /// Laravel method configured for a native type
    pub fn fluent_type(&self, data_type: &str) -> Option<&str> {
        self.fluent.get(data_type).map(String::as_str)
    }

    /// All native types with a builder method, in table order
    pub fn fluent_types(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fluent.iter().map(|(native, method)| (native.as_str(), method.as_str()))
    }

    /// Map a column. In tolerant mode classification failures become [`ColumnOutcome::Skipped`].
    pub fn map(&self, column: &ColumnSpec, tolerant: bool) -> Result<ColumnOutcome> {
        match self.classify(column) {
            Ok(outcome) => Ok(outcome),
            Err(error) => match Problem::from_error(&error) {
                Some(problem) if tolerant => {
                    warn!(
                        table = %column.table_name,
                        column = %column.column_name,
                        "{}",
                        error
                    );
                    Ok(ColumnOutcome::Skipped(problem))
                }
                _ => Err(error),
            },
        }
    }

    fn classify(&self, column: &ColumnSpec) -> Result<ColumnOutcome> {
        let method = if column.column_type == "tinyint(1)" {
            self.fluent_type("boolean").unwrap_or("boolean")
        } else if let Some(method) = self.fluent_type(&column.data_type) {
            method
        } else if let Some(literal) = self.raw.get(&column.data_type) {
            debug!(
                table = %column.table_name,
                column = %column.column_name,
                "Adding {} column with a raw statement",
                literal
            );
            return Ok(ColumnOutcome::Raw(RawStatement {
                table: column.table_name.clone(),
                column: column.column_name.clone(),
                native_type: literal.clone(),
            }));
        } else {
            return Err(Error::UnsupportedDataType {
                table: column.table_name.clone(),
                column: column.column_name.clone(),
                data_type: column.data_type.clone(),
            });
        };

        validate_column_type(column)?;
        let display_width = display_width(column)?;

        if column.is_id_shortcut() {
            let shortcut = match column.data_type.as_str() {
                "bigint" => "id()".to_string(),
                _ => format!("increments({})", quote("id")),
            };
            return Ok(ColumnOutcome::Build(ColumnExpr::new(vec![shortcut])));
        }

        Ok(ColumnOutcome::Build(ColumnExpr::new(modifier_chain(
            column,
            method,
            display_width,
        ))))
    }
}

/// The full column type must start with the native type, optionally followed by
/// a size and the unsigned marker.
fn validate_column_type(column: &ColumnSpec) -> Result<()> {
    let pattern = format!(r"^{}(?:\(\d+\))?(?:\sunsigned)?", regex::escape(&column.data_type));
    let regex = Regex::new(&pattern)?;

    if regex.is_match(&column.column_type) {
        Ok(())
    } else {
        Err(Error::UnsupportedColumnType {
            table: column.table_name.clone(),
            column: column.column_name.clone(),
            column_type: column.column_type.clone(),
        })
    }
}

/// Display width of non-integer types, e.g. the 255 of `varchar(255)`
pub fn display_width(column: &ColumnSpec) -> Result<Option<u32>> {
    if is_integer_type(&column.data_type) {
        return Ok(None);
    }

    let Some(open) = column.column_type.find('(') else {
        return Ok(None);
    };
    let inner = &column.column_type[open + 1..];
    let Some(close) = inner.find(')') else {
        return Ok(None);
    };
    let digits = &inner[..close];

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Ok(None);
    }

    match digits.parse::<u32>() {
        Ok(width) if width.to_string() == digits => Ok(Some(width)),
        _ => Err(Error::AmbiguousDisplayWidth {
            table: column.table_name.clone(),
            column: column.column_name.clone(),
            column_type: column.column_type.clone(),
        }),
    }
}

/// Builder calls in their fixed order: type, unsigned, charset, collation,
/// default, comment, nullable, on-update.
fn modifier_chain(column: &ColumnSpec, method: &str, display_width: Option<u32>) -> Vec<String> {
    let mut parts = Vec::new();
    let name = quote(&column.column_name);

    match column.srs_id.filter(|id| *id > 0).or(display_width) {
        Some(argument) => parts.push(format!("{}({}, {})", method, name, argument)),
        None => parts.push(format!("{}({})", method, name)),
    }

    if column.is_unsigned() {
        parts.push("unsigned()".to_string());
    }

    if let Some(charset) = non_empty(&column.character_set) {
        parts.push(format!("charset({})", quote(charset)));
    }

    if let Some(collation) = non_empty(&column.collation) {
        parts.push(format!("collation({})", quote(collation)));
    }

    match &column.default {
        Some(ColumnDefault::CurrentTimestamp) => parts.push("useCurrent()".to_string()),
        Some(ColumnDefault::Numeric(value)) => parts.push(format!("default({})", value)),
        Some(ColumnDefault::Text(value)) => {
            parts.push(format!("default({})", quote(&escape_literal(value))))
        }
        None => {}
    }

    if let Some(comment) = non_empty(&column.comment) {
        parts.push(format!("comment({})", quote(&escape_literal(comment))));
    }

    if column.nullable {
        parts.push("nullable()".to_string());
    }

    if column.extra.on_update_current_timestamp {
        parts.push("useCurrent()".to_string());
        parts.push("useCurrentOnUpdate()".to_string());
    }

    parts
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}
