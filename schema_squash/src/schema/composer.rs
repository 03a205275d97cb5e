//! Assembles per-table statements into the migration document

use chrono::NaiveDateTime;

use crate::error::{Error, Result};
use crate::schema::templates::Templates;
use crate::schema::typemap::RawStatement;
use crate::utils::naming::format_name;

/// One `$table->...` builder call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    pub body: String,
    /// Rendered behind `// ` so it is kept for review but not executed
    pub commented: bool,
}

impl Statement {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            commented: false,
        }
    }

    pub fn commented(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            commented: true,
        }
    }
}

/// Everything emitted for one table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableDefinition {
    pub name: String,
    /// Columns, then unique keys, indexes, primary key, spatial indexes and inline foreign keys
    pub statements: Vec<Statement>,
    pub raw_statements: Vec<RawStatement>,
    /// Foreign keys emitted in a trailing `Schema::table` block
    pub deferred_foreign_keys: Vec<Statement>,
}

impl TableDefinition {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}

/// Renders table definitions through the configured templates
#[derive(Debug, Clone)]
pub struct DefinitionComposer<'a> {
    templates: &'a Templates,
}

impl<'a> DefinitionComposer<'a> {
    /// Fails when a template lacks the placeholder its content goes into
    pub fn new(templates: &'a Templates) -> Result<Self> {
        let required = [
            ("migration", &templates.migration, "{tables}"),
            ("create_table", &templates.create_table, "{columns}"),
            ("alter_table", &templates.alter_table, "{columns}"),
            ("column", &templates.column, "{body}"),
            ("column_raw", &templates.column_raw, "{type}"),
        ];

        for (name, template, placeholder) in required {
            if !template.contains(placeholder) {
                return Err(Error::TemplateError(format!(
                    "template \"{}\" is missing the {} placeholder",
                    name, placeholder
                )));
            }
        }

        Ok(Self { templates })
    }

    pub fn compose(&self, tables: &[TableDefinition], comment: &str, generated_at: NaiveDateTime) -> String {
        let created: String = tables.iter().map(|table| self.create_table(table)).collect();

        let altered: String = tables
            .iter()
            .filter(|table| !table.deferred_foreign_keys.is_empty())
            .map(|table| {
                format_name(
                    &self.templates.alter_table,
                    &[
                        ("table", table.name.as_str()),
                        ("columns", self.column_lines(&table.deferred_foreign_keys).as_str()),
                    ],
                )
            })
            .collect();

        let title = if altered.is_empty() {
            ""
        } else {
            self.templates.constraints_title.as_str()
        };

        let generated_at = generated_at.format("%Y-%m-%d %H:%M:%S").to_string();

        format_name(
            &self.templates.migration,
            &[
                ("generated_at", generated_at.as_str()),
                ("comment", comment),
                ("tables", created.as_str()),
                ("constraints_title", title),
                ("constraints", altered.as_str()),
            ],
        )
    }

    fn create_table(&self, table: &TableDefinition) -> String {
        let raw = if table.raw_statements.is_empty() {
            String::new()
        } else {
            let lines: Vec<String> = table
                .raw_statements
                .iter()
                .map(|raw| {
                    format_name(
                        &self.templates.column_raw,
                        &[
                            ("table", raw.table.as_str()),
                            ("column", raw.column.as_str()),
                            ("type", raw.native_type.as_str()),
                        ],
                    )
                })
                .collect();
            format!("\n{}", lines.join("\n"))
        };

        format_name(
            &self.templates.create_table,
            &[
                ("table", table.name.as_str()),
                ("columns", self.column_lines(&table.statements).as_str()),
                ("raw", raw.as_str()),
            ],
        )
    }

    fn column_lines(&self, statements: &[Statement]) -> String {
        statements
            .iter()
            .map(|statement| {
                let line = format_name(&self.templates.column, &[("body", statement.body.as_str())]);
                if statement.commented {
                    format!("// {}", line)
                } else {
                    line
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn at() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    #[test]
    fn create_block_with_raw_statements() {
        let templates = Templates::default();
        let composer = DefinitionComposer::new(&templates).unwrap();

        let mut table = TableDefinition::new("files");
        table.statements.push(Statement::new("id()"));
        table.statements.push(Statement::commented("unique(['x'], 'files_x_unique')"));
        table.raw_statements.push(RawStatement {
            table: "files".to_string(),
            column: "content".to_string(),
            native_type: "LONGBLOB".to_string(),
        });

        assert_eq!(
            composer.create_table(&table),
            "\n        if (!Schema::hasTable('files')) {\n            Schema::create('files', function (Blueprint $table) {\n                $table->id();\n//                 $table->unique(['x'], 'files_x_unique');\n            });\n            DB::statement('ALTER TABLE `files` ADD `content` LONGBLOB');\n        }\n"
        );
    }

    #[test]
    fn deferred_foreign_keys_get_their_own_section() {
        let templates = Templates::default();
        let composer = DefinitionComposer::new(&templates).unwrap();

        let users = TableDefinition::new("users");
        let mut posts = TableDefinition::new("posts");
        posts
            .deferred_foreign_keys
            .push(Statement::new("foreign(['user_id'], 'posts_user_id_foreign')->references(['id'])->on('users')"));

        let document = composer.compose(&[users, posts], "Squashed", at());

        assert!(document.contains("2024-03-01 12:00:00: Squashed"));
        assert!(document.contains("// Foreign Keys"));
        assert!(document.contains("Schema::table('posts', function (Blueprint $table) {"));
        assert!(!document.contains("Schema::table('users'"));
        assert!(document.find("Schema::create('users'") < document.find("Schema::create('posts'"));
    }

    #[test]
    fn no_constraint_title_without_deferred_keys() {
        let templates = Templates::default();
        let composer = DefinitionComposer::new(&templates).unwrap();

        let document = composer.compose(&[TableDefinition::new("users")], "c", at());
        assert!(!document.contains("// Foreign Keys"));
        assert!(!document.contains("{constraints}"));
    }

    #[test]
    fn templates_missing_placeholders_are_rejected() {
        let templates = Templates {
            column: "$table->x;".to_string(),
            ..Templates::default()
        };

        assert!(matches!(
            DefinitionComposer::new(&templates),
            Err(Error::TemplateError(_))
        ));
    }
}
