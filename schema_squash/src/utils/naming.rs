//! Naming utilities for schema_squash
//!
//! Identifier clean-up, literal escaping and migration file naming.

use chrono::NaiveDateTime;

/// Fill `{placeholder}` markers of a pattern in a single pass.
///
/// Replacement values are never rescanned, so generated code containing
/// braces or placeholder-like text is inserted verbatim. Unknown markers are
/// kept as they are.
pub fn format_name(pattern: &str, replacements: &[(&str, &str)]) -> String {
    let mut result = String::with_capacity(pattern.len());
    let mut rest = pattern;

    while let Some(open) = rest.find('{') {
        result.push_str(&rest[..open]);
        let candidate = &rest[open + 1..];

        let replaced = candidate.find('}').and_then(|close| {
            let key = &candidate[..close];
            replacements
                .iter()
                .find(|(placeholder, _)| *placeholder == key)
                .map(|(_, value)| (*value, close))
        });

        match replaced {
            Some((value, close)) => {
                result.push_str(value);
                rest = &candidate[close + 1..];
            }
            None => {
                result.push('{');
                rest = candidate;
            }
        }
    }

    result.push_str(rest);
    result
}

/// Strip the leading `database/` from a name read from InnoDB metadata
pub fn strip_database_name(name: &str) -> &str {
    match name.rfind('/') {
        Some(position) => &name[position + 1..],
        None => name,
    }
}

/// Escape text for a single-quoted literal in the generated migration
pub fn escape_literal(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());

    for c in value.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\0' => escaped.push_str("\\0"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\'' => escaped.push_str("\\'"),
            '"' => escaped.push_str("\\\""),
            '\u{1a}' => escaped.push_str("\\Z"),
            _ => escaped.push(c),
        }
    }

    escaped
}

/// `'name'`
pub fn quote(name: &str) -> String {
    format!("'{}'", name)
}

/// `['a', 'b']` for any number of names
pub fn quoted_array<S: AsRef<str>>(names: &[S]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| quote(n.as_ref())).collect();
    format!("[{}]", quoted.join(", "))
}

/// `'a'` for a single name, `['a', 'b']` otherwise
pub fn quoted_list<S: AsRef<str>>(names: &[S]) -> String {
    match names {
        [single] => quote(single.as_ref()),
        _ => quoted_array(names),
    }
}

/// Laravel migration file name, e.g. `2024_01_31_120000_schema_squash.php`
pub fn migration_file_name(created_at: NaiveDateTime, migration_name: &str) -> String {
    format!("{}_{}.php", created_at.format("%Y_%m_%d_%H%M%S"), migration_name)
}

/// Glob pattern matching any earlier migration file of the same name
pub fn migration_file_pattern(migration_name: &str) -> String {
    format!("????_??_??_??????_{}.php", glob::Pattern::escape(migration_name))
}
