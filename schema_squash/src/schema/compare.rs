//! Structural dump comparison
//!
//! Both dumps are normalized before comparing: the `Dump completed on` footer
//! loses its timestamp, and column `CHARACTER SET x` declarations are dropped
//! when the same statement declares `DEFAULT CHARSET=x` for the table.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Replacement of the dump footer timestamp
pub const TIMESTAMP_PLACEHOLDER: &str = "Dump completed on (removed for comparison)";

const CONTEXT_LINES: usize = 3;

struct Patterns {
    timestamp: Regex,
    column_charset: Regex,
    table_charset: Regex,
}

static PATTERNS: Lazy<std::result::Result<Patterns, regex::Error>> = Lazy::new(|| {
    Ok(Patterns {
        timestamp: Regex::new(r"Dump completed on [\d\-\s:]+")?,
        column_charset: Regex::new(r"CHARACTER SET (\w+)[\s,]")?,
        table_charset: Regex::new(r"DEFAULT CHARSET=(\w+)\s[^;]+;")?,
    })
});

fn patterns() -> Result<&'static Patterns> {
    PATTERNS
        .as_ref()
        .map_err(|e| Error::Unknown(format!("Invalid dump pattern: {}", e)))
}

/// Remove comparison noise from a structure dump
pub fn normalize(dump: &str) -> Result<String> {
    let patterns = patterns()?;
    let dump = patterns.timestamp.replace_all(dump, TIMESTAMP_PLACEHOLDER);
    Ok(remove_redundant_charsets(patterns, &dump))
}

fn remove_redundant_charsets(patterns: &Patterns, dump: &str) -> String {
    let mut cleaned = String::with_capacity(dump.len());

    for statement in dump.split_inclusive(';') {
        if !statement.ends_with(';') {
            cleaned.push_str(statement);
            continue;
        }

        let declared: Vec<(usize, &str)> = patterns
            .table_charset
            .captures_iter(statement)
            .filter_map(|caps| Some((caps.get(0)?.start(), caps.get(1)?.as_str())))
            .collect();

        let mut last = 0;
        for caps in patterns.column_charset.captures_iter(statement) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
                continue;
            };

            let redundant = declared
                .iter()
                .any(|(start, charset)| *charset == name.as_str() && *start > whole.end());

            if redundant {
                cleaned.push_str(&statement[last..whole.start()]);
                last = whole.end();
            }
        }
        cleaned.push_str(&statement[last..]);
    }

    cleaned
}

/// Read a dump and normalize it. Missing, unreadable or empty dumps are [`Error::DumpEmpty`].
pub fn read_and_clean(path: &Path) -> Result<String> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) if !raw.is_empty() => raw,
        Ok(_) | Err(_) => {
            return Err(Error::DumpEmpty {
                path: path.to_path_buf(),
            })
        }
    };

    normalize(&raw)
}

/// Outcome of comparing two normalized dumps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Identical,
    /// A structural mismatch; reported, not an error
    Differing,
}

impl Comparison {
    pub fn of(before: &str, after: &str) -> Self {
        if before == after {
            Comparison::Identical
        } else {
            Comparison::Differing
        }
    }
}

/// Normalize both dump files, write the cleaned text back, and compare them
pub fn compare_files(before: &Path, after: &Path) -> Result<Comparison> {
    let cleaned_before = read_and_clean(before)?;
    let cleaned_after = read_and_clean(after)?;

    fs::write(before, &cleaned_before)?;
    fs::write(after, &cleaned_after)?;
    debug!(before = %before.display(), after = %after.display(), "Wrote cleaned structure dumps");

    let comparison = Comparison::of(&cleaned_before, &cleaned_after);
    info!("Structure comparison: {:?}", comparison);

    Ok(comparison)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Equal,
    Delete,
    Insert,
}

/// Line based unified diff with three lines of context, `None` when identical
pub fn unified_diff(before: &str, after: &str, before_label: &str, after_label: &str) -> Option<String> {
    if before == after {
        return None;
    }

    let old: Vec<&str> = before.lines().collect();
    let new: Vec<&str> = after.lines().collect();
    let ops = line_ops(&old, &new);

    let mut output = format!("--- {}\n+++ {}\n", before_label, after_label);
    for hunk in hunks(&ops) {
        render_hunk(&mut output, &ops[hunk.0..hunk.1], &old, &new, position(&ops, hunk.0));
    }

    Some(output)
}

/// Edit script over lines, trimming the common prefix and suffix before the LCS table
fn line_ops(old: &[&str], new: &[&str]) -> Vec<Op> {
    let prefix = old.iter().zip(new).take_while(|(a, b)| a == b).count();
    let suffix = old[prefix..]
        .iter()
        .rev()
        .zip(new[prefix..].iter().rev())
        .take_while(|(a, b)| a == b)
        .count();

    let a = &old[prefix..old.len() - suffix];
    let b = &new[prefix..new.len() - suffix];
    let width = b.len() + 1;
    let mut lcs = vec![0u32; (a.len() + 1) * width];

    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            lcs[i * width + j] = if a[i] == b[j] {
                lcs[(i + 1) * width + j + 1] + 1
            } else {
                lcs[(i + 1) * width + j].max(lcs[i * width + j + 1])
            };
        }
    }

    let mut ops = vec![Op::Equal; prefix];
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        if a[i] == b[j] {
            ops.push(Op::Equal);
            i += 1;
            j += 1;
        } else if lcs[(i + 1) * width + j] >= lcs[i * width + j + 1] {
            ops.push(Op::Delete);
            i += 1;
        } else {
            ops.push(Op::Insert);
            j += 1;
        }
    }
    ops.extend(std::iter::repeat(Op::Delete).take(a.len() - i));
    ops.extend(std::iter::repeat(Op::Insert).take(b.len() - j));
    ops.extend(std::iter::repeat(Op::Equal).take(suffix));

    ops
}

/// Ranges of `ops` forming hunks, changes closer than twice the context are merged
fn hunks(ops: &[Op]) -> Vec<(usize, usize)> {
    let mut ranges: Vec<(usize, usize)> = Vec::new();

    for (index, op) in ops.iter().enumerate() {
        if *op == Op::Equal {
            continue;
        }
        let start = index.saturating_sub(CONTEXT_LINES);
        let end = (index + 1 + CONTEXT_LINES).min(ops.len());

        match ranges.last_mut() {
            Some(last) if start <= last.1 => last.1 = end,
            _ => ranges.push((start, end)),
        }
    }

    ranges
}

/// Line positions in the old and new text where op `index` starts
fn position(ops: &[Op], index: usize) -> (usize, usize) {
    ops[..index].iter().fold((0, 0), |(old, new), op| match op {
        Op::Equal => (old + 1, new + 1),
        Op::Delete => (old + 1, new),
        Op::Insert => (old, new + 1),
    })
}

fn render_hunk(output: &mut String, ops: &[Op], old: &[&str], new: &[&str], start: (usize, usize)) {
    let old_count = ops.iter().filter(|op| **op != Op::Insert).count();
    let new_count = ops.iter().filter(|op| **op != Op::Delete).count();

    output.push_str(&format!(
        "@@ -{},{} +{},{} @@\n",
        start.0 + 1,
        old_count,
        start.1 + 1,
        new_count
    ));

    let (mut i, mut j) = start;
    for op in ops {
        match op {
            Op::Equal => {
                output.push_str(&format!(" {}\n", old[i]));
                i += 1;
                j += 1;
            }
            Op::Delete => {
                output.push_str(&format!("-{}\n", old[i]));
                i += 1;
            }
            Op::Insert => {
                output.push_str(&format!("+{}\n", new[j]));
                j += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    const USERS: &str = "CREATE TABLE `users` (\n  `name` varchar(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci NOT NULL,\n  `code` char(2) CHARACTER SET latin1 NOT NULL\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;\n";

    #[test]
    fn removes_footer_timestamp() {
        let cleaned = normalize("-- Dump completed on 2024-03-01  9:05:07\n").unwrap();
        assert_eq!(cleaned, format!("-- {}", TIMESTAMP_PLACEHOLDER));
    }

    #[test]
    fn removes_only_charsets_matching_the_table() {
        let cleaned = normalize(USERS).unwrap();

        assert!(cleaned.contains("`name` varchar(255) COLLATE utf8mb4_unicode_ci NOT NULL"));
        assert!(cleaned.contains("`code` char(2) CHARACTER SET latin1 NOT NULL"));
        assert!(cleaned.contains("DEFAULT CHARSET=utf8mb4"));
    }

    #[test]
    fn charset_removal_stays_within_one_statement() {
        let dump = "SET NAMES x CHARACTER SET utf8mb4 ;\nCREATE TABLE `t` (`a` int) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_bin;";
        assert_eq!(normalize(dump).unwrap(), dump);
    }

    #[test]
    fn normalized_dumps_compare_identical() {
        let before = format!("{}-- Dump completed on 2024-03-01 10:00:00\n", USERS);
        let after = format!(
            "{}-- Dump completed on 2024-03-02 11:30:00\n",
            USERS.replace(" CHARACTER SET utf8mb4 COLLATE", " COLLATE")
        );

        assert_eq!(
            Comparison::of(&normalize(&before).unwrap(), &normalize(&after).unwrap()),
            Comparison::Identical
        );
    }

    #[test]
    fn compare_files_writes_cleaned_dumps_back() {
        let dir = TempDir::new().unwrap();
        let before = dir.path().join("before.sql");
        let after = dir.path().join("after.sql");
        fs::write(&before, "-- Dump completed on 2024-03-01 10:00:00\n").unwrap();
        fs::write(&after, "CREATE TABLE x;\n-- Dump completed on 2024-03-01 10:00:01\n").unwrap();

        assert_eq!(compare_files(&before, &after).unwrap(), Comparison::Differing);
        assert_eq!(
            fs::read_to_string(&before).unwrap(),
            format!("-- {}", TIMESTAMP_PLACEHOLDER)
        );
    }

    #[test]
    fn empty_or_missing_dumps_fail() {
        let dir = TempDir::new().unwrap();
        let empty = dir.path().join("empty.sql");
        fs::write(&empty, "").unwrap();

        assert!(matches!(read_and_clean(&empty), Err(Error::DumpEmpty { .. })));
        assert!(matches!(
            read_and_clean(&dir.path().join("missing.sql")),
            Err(Error::DumpEmpty { .. })
        ));
    }

    #[test]
    fn unified_diff_of_changed_line() {
        let before = "a\nb\nc\nd\ne\nf\ng\nh\n";
        let after = "a\nb\nc\nd\nE\nf\ng\nh\n";

        assert_eq!(
            unified_diff(before, after, "before.sql", "after.sql").unwrap(),
            "--- before.sql\n+++ after.sql\n@@ -2,7 +2,7 @@\n b\n c\n d\n-e\n+E\n f\n g\n h\n"
        );
    }

    #[test]
    fn unified_diff_with_insertions_and_identical_input() {
        assert_eq!(unified_diff("x\n", "x\n", "a", "b"), None);

        let diff = unified_diff("a\n", "a\nb\n", "a", "b").unwrap();
        assert!(diff.ends_with("@@ -1,1 +1,2 @@\n a\n+b\n"));
    }
}
