//! Output templates of the generated Laravel migration
//!
//! Placeholders are `{name}` markers filled by [`crate::utils::format_name`].
//! Every template can be overridden from the `[templates]` config section.

use serde::{Deserialize, Serialize};

/// Whole migration file. Placeholders: `generated_at`, `comment`, `tables`,
/// `constraints_title`, `constraints`.
pub const MIGRATION: &str = r#"<?php

use Illuminate\Database\Migrations\Migration;
use Illuminate\Database\Schema\Blueprint;
use Illuminate\Support\Facades\DB;
use Illuminate\Support\Facades\Schema;

return new class extends Migration
{
    /**
     * {generated_at}: {comment}
     *
     * @return void
     */
    public function up()
    {
        DB::statement('/*!40014 SET @OLD_FOREIGN_KEY_CHECKS=@@FOREIGN_KEY_CHECKS, FOREIGN_KEY_CHECKS=0 */;');
        DB::statement('/*!40101 SET @OLD_SQL_MODE=@@SQL_MODE, SQL_MODE="NO_AUTO_VALUE_ON_ZERO" */;');

        // Tables:
        {tables}

        {constraints_title}
        {constraints}

        DB::statement('/*!40101 SET SQL_MODE=IFNULL(@OLD_SQL_MODE, "") */;');
        DB::statement('/*!40014 SET FOREIGN_KEY_CHECKS=IF(@OLD_FOREIGN_KEY_CHECKS IS NULL, 1, @OLD_FOREIGN_KEY_CHECKS) */;');
    }
};
"#;

/// Guarded table creation. Placeholders: `table`, `columns`, `raw`.
pub const CREATE_TABLE: &str = r#"
        if (!Schema::hasTable('{table}')) {
            Schema::create('{table}', function (Blueprint $table) {
{columns}
            });{raw}
        }
"#;

/// Alteration block for deferred foreign keys. Placeholders: `table`, `columns`.
pub const ALTER_TABLE: &str = r#"
        Schema::table('{table}', function (Blueprint $table) {
{columns}
        });
"#;

/// One builder call. Placeholder: `body`.
pub const COLUMN: &str = "                $table->{body};";

/// Raw column for types the builder cannot express. Placeholders: `table`, `column`, `type`.
pub const COLUMN_RAW: &str = "            DB::statement('ALTER TABLE `{table}` ADD `{column}` {type}');";

/// Heading above the deferred foreign key blocks
pub const CONSTRAINTS_TITLE: &str = "// Foreign Keys";

/// The complete template set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Templates {
    pub migration: String,
    pub create_table: String,
    pub alter_table: String,
    pub column: String,
    pub column_raw: String,
    pub constraints_title: String,
}

impl Default for Templates {
    fn default() -> Self {
        Self {
            migration: MIGRATION.to_string(),
            create_table: CREATE_TABLE.to_string(),
            alter_table: ALTER_TABLE.to_string(),
            column: COLUMN.to_string(),
            column_raw: COLUMN_RAW.to_string(),
            constraints_title: CONSTRAINTS_TITLE.to_string(),
        }
    }
}
