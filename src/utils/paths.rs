//! Path normalization

use std::path::{Component, Path};

pub fn normalize_path(path: &str) -> String {
    // Convert backslashes to forward slashes and drop a leading "./"
    let normalized = path.trim().replace('\\', "/");
    normalized.strip_prefix("./").map(str::to_string).unwrap_or(normalized)
}

/// Project-relative, forward-slash form of `path`, or `None` if it lies outside `root`.
pub fn relative_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(normalize_path(&rel.to_string_lossy()))
}

/// True when `rel` names something strictly inside the directory it is
/// joined onto: not empty, not absolute, no `..` and no drive prefix.
pub fn is_contained_path(rel: &str) -> bool {
    let rel = normalize_path(rel);
    if rel.is_empty() || rel.starts_with('/') || rel.contains(':') {
        return false;
    }
    let mut normal = 0;
    for component in Path::new(&rel).components() {
        match component {
            Component::Normal(_) => normal += 1,
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return false,
        }
    }
    normal > 0
}
