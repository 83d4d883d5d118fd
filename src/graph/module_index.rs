//! Dotted module names for indexed files, with peel-back lookup.

use std::collections::BTreeMap;

const PACKAGE_ROOT: &str = "__init__";

/// Canonical module name → file path.
#[derive(Debug, Clone, Default)]
pub struct ModuleIndex {
    modules: BTreeMap<String, String>,
}

const SOURCE_EXTENSIONS: &[&str] = &[".py", ".pyi"];

/// `pkg/sub/mod.py` → `pkg.sub.mod`. Only Python sources and stubs get a
/// module name.
pub fn module_name(path: &str) -> Option<String> {
    let path = path.trim_start_matches("./");
    let stem = SOURCE_EXTENSIONS.iter().find_map(|ext| path.strip_suffix(ext))?;
    if stem.is_empty() || stem.ends_with('/') {
        return None;
    }
    Some(stem.replace('/', "."))
}

/// `pkg/sub/__init__.py` → `pkg.sub`.
pub fn package_alias(module: &str) -> Option<String> {
    if module == PACKAGE_ROOT {
        return None;
    }
    module.strip_suffix(PACKAGE_ROOT)?.strip_suffix('.').map(str::to_string)
}

impl ModuleIndex {
    pub fn build<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut modules = BTreeMap::new();
        let mut aliases = Vec::new();
        let mut stubs = Vec::new();
        for path in paths {
            let path = path.as_ref();
            let Some(module) = module_name(path) else {
                continue;
            };
            if let Some(alias) = package_alias(&module) {
                aliases.push((alias, path.to_string()));
            }
            if path.ends_with(".pyi") {
                stubs.push((module, path.to_string()));
                continue;
            }
            modules.entry(module).or_insert_with(|| path.to_string());
        }
        // Stubs only fill names no `.py` file claimed.
        for (module, path) in stubs {
            modules.entry(module).or_insert(path);
        }
        // A real `pkg.py` beats the alias of `pkg/__init__.py`.
        for (alias, path) in aliases {
            modules.entry(alias).or_insert(path);
        }
        Self { modules }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn get(&self, module: &str) -> Option<&str> {
        self.modules.get(module).map(String::as_str)
    }

    /// Resolve an import string through its longest indexed prefix, so
    /// `pkg.mod.ClassName` lands on `pkg.mod` rather than `pkg`.
    pub fn resolve(&self, import: &str) -> Option<&str> {
        let parts: Vec<&str> = import.split('.').filter(|p| !p.is_empty()).collect();
        (1..=parts.len()).rev().find_map(|n| self.get(&parts[..n].join(".")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_module_names() {
        assert_eq!(module_name("pkg/sub/mod.py").as_deref(), Some("pkg.sub.mod"));
        assert_eq!(module_name("./top.py").as_deref(), Some("top"));
        assert_eq!(module_name("bin/tool"), None);
        assert_eq!(module_name("config.json"), None);
        assert_eq!(module_name("types/api.pyi").as_deref(), Some("types.api"));
        assert_eq!(package_alias("pkg.sub.__init__").as_deref(), Some("pkg.sub"));
        assert_eq!(package_alias("__init__"), None);
    }

    #[test]
    fn peel_back_prefers_most_specific_prefix() {
        let index = ModuleIndex::build(["pkg/__init__.py", "pkg/mod.py"]);
        assert_eq!(index.resolve("pkg.mod.Class"), Some("pkg/mod.py"));
        assert_eq!(index.resolve("pkg.other"), Some("pkg/__init__.py"));
        assert_eq!(index.resolve("elsewhere.thing"), None);
    }

    #[test]
    fn only_python_sources_claim_module_names() {
        let index = ModuleIndex::build(["app.py", "config.json", "config.py", "config.pyi", "README.md"]);
        assert_eq!(index.get("config"), Some("config.py"));
        assert_eq!(index.get("README"), None);
        assert_eq!(index.len(), 2);

        let stub_only = ModuleIndex::build(["api.pyi"]);
        assert_eq!(stub_only.get("api"), Some("api.pyi"));
    }

    #[test]
    fn real_module_beats_package_alias() {
        let index = ModuleIndex::build(["pkg/__init__.py", "pkg.py"]);
        assert_eq!(index.get("pkg"), Some("pkg.py"));
        assert_eq!(index.get("pkg.__init__"), Some("pkg/__init__.py"));
    }
}
