//! Generated-file detection.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

/// Common patterns indicating generated files
static GENERATED_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        Regex::new(r"(?i)auto-?generated").expect("valid generated regex"),
        Regex::new(r"(?i)do not edit").expect("valid do-not-edit regex"),
        Regex::new(r"(?i)machine generated").expect("valid machine regex"),
        Regex::new(r"(?i)generated by").expect("valid generated-by regex"),
    ]
});

const GENERATED_NAME_HINTS: &[&str] = &[".min.", ".bundle.", "_pb2.py", "_pb2_grpc.py"];

/// Check if a file appears to be generated.
///
/// Uses filename hints, directory location, and the first 2000 characters of content.
pub fn is_likely_generated(path: &Path, content_sample: &str) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("").to_lowercase();
    if GENERATED_NAME_HINTS.iter().any(|hint| name.contains(hint)) {
        return true;
    }

    let path_normalized = path.to_string_lossy().to_lowercase().replace('\\', "/");
    for dir in ["generated/", "gen/", "migrations/"] {
        if path_normalized.starts_with(dir) || path_normalized.contains(&format!("/{dir}")) {
            return true;
        }
    }

    if content_sample.is_empty() {
        return false;
    }
    let head: String = content_sample.chars().take(2000).collect();
    if GENERATED_PATTERNS.iter().any(|pattern| pattern.is_match(&head)) {
        return true;
    }

    // Extremely long first line is typical of minified output
    content_sample.lines().next().is_some_and(|first| first.len() > 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_likely_generated() {
        assert!(is_likely_generated(Path::new("generated/api.py"), ""));
        assert!(is_likely_generated(Path::new("proto/user_pb2.py"), ""));
        assert!(is_likely_generated(
            Path::new("src/file.py"),
            "# This file is auto-generated. Do not edit."
        ));
        assert!(!is_likely_generated(Path::new("core/graph.py"), "def build():\n    pass\n"));
    }

    #[test]
    fn gen_segment_must_be_a_directory() {
        assert!(!is_likely_generated(Path::new("core/regen/x.py"), ""));
        assert!(is_likely_generated(Path::new("core/gen/x.py"), ""));
    }
}
