//! Config file loading

use crate::domain::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

const SECTION: &str = "splice";

pub fn load_config(project_root: &Path, config_path: Option<&Path>) -> Result<Config> {
    let config_path_provided = config_path.is_some();

    let discovered = match config_path {
        Some(path) => Some(path.to_path_buf()),
        None => discover_config(project_root),
    };

    let Some(config_file) = discovered else {
        return Ok(Config::default());
    };

    let content = fs::read_to_string(&config_file)
        .with_context(|| format!("Failed reading config file: {}", config_file.display()))?;

    let ext = config_file.extension().and_then(|e| e.to_str()).unwrap_or("").to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "toml" => parse_toml_config(&content, &config_file),
        "yaml" | "yml" => parse_yaml_config(&content, &config_file),
        other => Err(anyhow::anyhow!(
            "Unsupported config extension '.{}' for file {}",
            other,
            config_file.display()
        )),
    };

    match parsed {
        Ok(cfg) => Ok(cfg),
        Err(e) if config_path_provided => Err(e),
        Err(e) => {
            // Auto-discovered files never block a run.
            tracing::warn!(
                "Failed to parse auto-discovered config {}: {:#}",
                config_file.display(),
                e
            );
            Ok(Config::default())
        }
    }
}

/// Parse TOML config, supporting a nested `[splice]` section.
fn parse_toml_config(content: &str, config_file: &Path) -> Result<Config> {
    let raw: toml::Value = toml::from_str(content)
        .with_context(|| format!("Invalid TOML syntax: {}", config_file.display()))?;

    let config_val = match raw.get(SECTION) {
        Some(nested) => nested.clone(),
        None => raw,
    };

    config_val.try_into().with_context(|| format!("Invalid TOML config: {}", config_file.display()))
}

/// Parse YAML config, supporting a nested `splice:` section.
fn parse_yaml_config(content: &str, config_file: &Path) -> Result<Config> {
    let raw: serde_yaml::Value = serde_yaml::from_str(content)
        .with_context(|| format!("Invalid YAML syntax: {}", config_file.display()))?;

    let config_val = match raw.get(SECTION) {
        Some(nested) => nested.clone(),
        None => raw,
    };

    serde_yaml::from_value(config_val)
        .with_context(|| format!("Invalid YAML config: {}", config_file.display()))
}

fn discover_config(project_root: &Path) -> Option<std::path::PathBuf> {
    let candidates = ["splice.toml", ".splice.toml", "splice.yml", ".splice.yml", "splice.yaml"];

    candidates.iter().map(|candidate| project_root.join(candidate)).find(|path| path.exists())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{PatchPolicy, ProviderSpec, RemovalBackend};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_defaults_when_missing() {
        let tmp = TempDir::new().expect("tmp");
        let cfg = load_config(tmp.path(), None).expect("config");
        assert_eq!(cfg, Config::default());
        assert_eq!(cfg.rewrite_line_threshold, 600);
        assert_eq!(cfg.max_syntax_retries, 3);
    }

    #[test]
    fn test_load_toml_config() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join("splice.toml"),
            "rewrite_line_threshold = 120\npatch_policy = 'atomic'\nremoval_backend = 'abstract'\n",
        )
        .expect("write");

        let cfg = load_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.rewrite_line_threshold, 120);
        assert_eq!(cfg.patch_policy, PatchPolicy::Atomic);
        assert_eq!(cfg.removal_backend, RemovalBackend::Abstract);
    }

    #[test]
    fn test_nested_section_and_generator() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(
            tmp.path().join(".splice.toml"),
            "[splice]\nsuspicious_ratio = 0.5\n\n[splice.generator]\nkind = 'command'\nprogram = 'llm'\nargs = ['--raw']\n",
        )
        .expect("write");

        let cfg = load_config(tmp.path(), None).expect("config");
        assert!((cfg.suspicious_ratio - 0.5).abs() < f64::EPSILON);
        assert_eq!(
            cfg.generator,
            Some(ProviderSpec::Command { program: "llm".into(), args: vec!["--raw".into()] })
        );
    }

    #[test]
    fn test_yaml_config_with_comma_separated_denylist() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("splice.yml"), "stdlib_denylist: \"os, sys ,  json\"\n")
            .expect("write");

        let cfg = load_config(tmp.path(), None).expect("config");
        assert_eq!(cfg.stdlib_denylist, vec!["os", "sys", "json"]);
    }

    #[test]
    fn test_explicit_config_invalid_type_returns_err() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("bad.toml");
        fs::write(&path, "rewrite_line_threshold = 'many'\n").expect("write");

        assert!(load_config(tmp.path(), Some(&path)).is_err());
    }

    #[test]
    fn test_auto_discovered_invalid_type_returns_default() {
        let tmp = TempDir::new().expect("tmp");
        fs::write(tmp.path().join("splice.toml"), "patch_policy = 42\n").expect("write");

        let cfg = load_config(tmp.path(), None).expect("should not error on auto-discovery");
        assert_eq!(cfg.patch_policy, PatchPolicy::Partial);
    }

    #[test]
    fn test_explicit_unsupported_extension_errors() {
        let tmp = TempDir::new().expect("tmp");
        let path = tmp.path().join("splice.ini");
        fs::write(&path, "x=1\n").expect("write");

        let err = load_config(tmp.path(), Some(&path)).expect_err("unsupported");
        assert!(err.to_string().contains("Unsupported config extension"));
    }
}
