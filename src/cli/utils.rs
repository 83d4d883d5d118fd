//! Shared CLI plumbing: project location, layered config, index access.

use anyhow::{Context, Result};
use clap::Args;
use std::path::{Path, PathBuf};

use repo_splice::config::{load_config, merge_cli_with_config, merge_env, CliOverrides};
use repo_splice::domain::Config;
use repo_splice::index::IndexStore;

#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project root directory
    #[arg(short, long, value_name = "PATH", default_value = ".")]
    pub path: PathBuf,

    /// Path to config file (splice.toml or splice.yml)
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// A resolved project root plus its fully layered configuration.
pub struct Project {
    pub root: PathBuf,
    pub config: Config,
}

impl Project {
    pub fn load(args: &ProjectArgs, overrides: &CliOverrides) -> Result<Self> {
        let root = args
            .path
            .canonicalize()
            .with_context(|| format!("Project path not found: {}", args.path.display()))?;
        if !root.is_dir() {
            anyhow::bail!("Path is not a directory: {}", root.display());
        }
        let file_config = load_config(&root, args.config.as_deref())?;
        let config = merge_cli_with_config(merge_env(file_config)?, overrides);
        Ok(Self { root, config })
    }

    pub fn index_path(&self) -> PathBuf {
        resolve(&self.root, &self.config.index_path)
    }

    /// Open the index, creating it if needed.
    pub fn open_index(&self) -> Result<IndexStore> {
        let path = self.index_path();
        IndexStore::open(&path).with_context(|| format!("Failed to open index at {}", path.display()))
    }

    /// Open the index only if a scan already created it.
    pub fn existing_index(&self) -> Result<Option<IndexStore>> {
        if !self.index_path().is_file() {
            return Ok(None);
        }
        self.open_index().map(Some)
    }

    pub fn require_index(&self) -> Result<IndexStore> {
        match self.existing_index()? {
            Some(store) => Ok(store),
            None => anyhow::bail!(
                "No source index at {}. Run `repo-splice scan` first.",
                self.index_path().display()
            ),
        }
    }
}

fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}

/// Parse a comma-separated string into a `Vec<String>`, trimming whitespace and
/// discarding empty segments.  Returns `None` when `value` is `None`.
pub fn parse_csv(value: &Option<String>) -> Option<Vec<String>> {
    value.as_ref().map(|s| {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| part.to_string())
            .collect::<Vec<_>>()
    })
}

pub fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
