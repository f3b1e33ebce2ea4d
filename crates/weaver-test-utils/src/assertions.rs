//! Assertion helpers for files and action outcomes.

use std::path::Path;
use weaver_core::{ActionRegistry, ActionStatus};

/// Assert that a file contains specific text.
///
/// # Example
///
/// ```rust
/// use weaver_test_utils::assertions::assert_file_contains;
/// use std::fs;
/// use tempfile::TempDir;
///
/// let dir = TempDir::new().unwrap();
/// let path = dir.path().join("index.js");
/// fs::write(&path, "console.log('hi');").unwrap();
///
/// assert_file_contains(&path, "console.log");
/// ```
pub fn assert_file_contains(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));

    assert!(
        content.contains(expected),
        "File {} does not contain expected text.\nExpected to find: {}\nActual content:\n{}",
        path.display(),
        expected,
        content
    );
}

/// Assert that a file's content equals expected text exactly.
pub fn assert_file_equals(path: &Path, expected: &str) {
    let content = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("Failed to read file {}: {}", path.display(), e));

    if content != expected {
        panic!(
            "File {} content does not match expected.\nDiff:\n{}",
            path.display(),
            line_diff(expected, &content)
        );
    }
}

/// Assert that two strings are equal, with a line diff on failure.
pub fn assert_strings_equal(actual: &str, expected: &str) {
    if actual != expected {
        panic!("Strings are not equal.\nDiff:\n{}", line_diff(expected, actual));
    }
}

/// Assert that every recorded action completed.
pub fn assert_all_complete(registry: &ActionRegistry) {
    let unfinished: Vec<String> = registry
        .snapshot()
        .into_iter()
        .filter(|record| record.status != ActionStatus::Complete)
        .map(|record| format!("{} {} ({:?})", record.id, record.action.summary(), record.status))
        .collect();

    assert!(
        unfinished.is_empty(),
        "Actions did not complete:\n{}",
        unfinished.join("\n")
    );
}

fn line_diff(expected: &str, actual: &str) -> String {
    let diff = similar::TextDiff::from_lines(expected, actual);
    let mut output = String::new();
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            similar::ChangeTag::Delete => "-",
            similar::ChangeTag::Insert => "+",
            similar::ChangeTag::Equal => " ",
        };
        output.push_str(&format!("{}{}", sign, change));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strings_equal_passes_on_match() {
        assert_strings_equal("a\nb\n", "a\nb\n");
    }

    #[test]
    #[should_panic(expected = "-b")]
    fn test_strings_equal_shows_diff() {
        assert_strings_equal("a\nc\n", "a\nb\n");
    }
}
