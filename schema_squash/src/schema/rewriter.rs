//! Consolidating rewrite pass over the generated migration code

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Error, Result};

struct Rule {
    pattern: Regex,
    replacement: &'static str,
}

fn rule(pattern: &str, replacement: &'static str) -> std::result::Result<Rule, regex::Error> {
    Ok(Rule {
        pattern: Regex::new(pattern)?,
        replacement,
    })
}

static RULES: Lazy<std::result::Result<Vec<Rule>, regex::Error>> = Lazy::new(|| {
    Ok(vec![
        rule(
            r"\$table->timestamp\('created_at'\)->nullable\(\);\s+\$table->timestamp\('updated_at'\)->nullable\(\);",
            "$$table->timestamps();",
        )?,
        rule(
            r"\$table->bigInteger\('([^']+)'\)->unsigned\(\)",
            "$$table->unsignedBigInteger('${1}')",
        )?,
        rule(
            r"\$table->integer\('([^']+)'\)->unsigned\(\)",
            "$$table->unsignedInteger('${1}')",
        )?,
        rule(
            r"\$table->tinyInteger\('([^']+)'\)->unsigned\(\)",
            "$$table->unsignedTinyInteger('${1}')",
        )?,
        rule(
            r"\$table->unique\(\['(\w+)'\], '(\w+)'\);",
            "$$table->unique('${1}', '${2}');",
        )?,
    ])
});

/// Apply the consolidation rules in order. Applying twice changes nothing.
pub fn beautify(code: &str) -> Result<String> {
    let rules = RULES
        .as_ref()
        .map_err(|e| Error::TemplateError(format!("Invalid rewrite rule: {}", e)))?;

    Ok(rules.iter().fold(code.to_string(), |code, rule| {
        rule.pattern.replace_all(&code, rule.replacement).into_owned()
    }))
}
