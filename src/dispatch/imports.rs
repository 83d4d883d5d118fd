//! Relative import statements for symbols moved between Python files.

const MAX_SINGLE_LINE: usize = 80;

/// `from <relative module> import <names>` pointing from `source_file` at
/// `target_file`. Names are sorted and de-duplicated; long statements are
/// wrapped in parentheses, one name per line.
pub fn build_import_statement(entities: &[String], source_file: &str, target_file: &str) -> String {
    let source = source_file.replace('\\', "/");
    let target = target_file.replace('\\', "/");
    let source_parts: Vec<&str> = source.split('/').collect();
    let target_parts: Vec<&str> = target.split('/').collect();

    let source_dir = &source_parts[..source_parts.len().saturating_sub(1)];
    let target_dir = &target_parts[..target_parts.len().saturating_sub(1)];
    let common = source_dir.iter().zip(target_dir).take_while(|(a, b)| a == b).count();
    let up_levels = source_dir.len() - common;

    let mut module = ".".repeat(up_levels + 1);
    for part in &target_dir[common..] {
        module.push_str(part);
        module.push('.');
    }
    let filename = target_parts.last().copied().unwrap_or_default();
    module.push_str(filename.strip_suffix(".py").unwrap_or(filename));

    format_import(&module, entities)
}

fn format_import(module: &str, entities: &[String]) -> String {
    let mut names: Vec<&str> = entities.iter().map(String::as_str).collect();
    names.sort_unstable();
    names.dedup();

    let single = format!("from {} import {}", module, names.join(", "));
    if single.len() <= MAX_SINGLE_LINE {
        return single;
    }
    let mut out = format!("from {} import (\n", module);
    for name in names {
        out.push_str(&format!("    {},\n", name));
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn sibling_module() {
        assert_eq!(
            build_import_statement(&names(&["b", "a", "b"]), "pkg/utils.py", "pkg/dates.py"),
            "from .dates import a, b"
        );
    }

    #[test]
    fn nested_and_parent_modules() {
        assert_eq!(
            build_import_statement(&names(&["X"]), "pkg/app.py", "pkg/core/models.py"),
            "from .core.models import X"
        );
        assert_eq!(
            build_import_statement(&names(&["Y"]), "pkg/web/views.py", "pkg/shared/util.py"),
            "from ..shared.util import Y"
        );
        assert_eq!(build_import_statement(&names(&["Z"]), "main.py", "helpers.py"), "from .helpers import Z");
    }

    #[test]
    fn long_imports_wrap() {
        let entities = names(&[
            "parse_iso8601_timestamp",
            "format_relative_duration",
            "normalize_timezone_offset",
        ]);
        let statement = build_import_statement(&entities, "a/b.py", "a/dates.py");
        assert_eq!(
            statement,
            "from .dates import (\n    format_relative_duration,\n    normalize_timezone_offset,\n    parse_iso8601_timestamp,\n)"
        );
    }
}
