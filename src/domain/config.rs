//! Run configuration.

use serde::{Deserialize, Deserializer, Serialize};
use std::path::PathBuf;

/// What to do when only some blocks of a patch apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchPolicy {
    /// Accept the call if at least one block applied; report the rest.
    #[default]
    Partial,
    /// Reject the call, leaving the text untouched, if any block failed.
    Atomic,
}

/// Which tree backend removes named definitions during MODIFY-with-removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemovalBackend {
    /// Lossless tree; keeps every surrounding comment and blank line.
    #[default]
    Concrete,
    /// Abstract tree; re-renders the file with normalized spacing.
    Abstract,
}

/// Generator selection, resolved once by `generate::build_generator`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderSpec {
    /// Replays canned responses in order.
    Scripted {
        #[serde(default)]
        responses: Vec<String>,
    },
    /// Pipes the prompt into an external program and reads its stdout.
    Command {
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index_path: PathBuf,
    pub stage_dir: PathBuf,
    pub backup_dir: PathBuf,
    pub history_dir: PathBuf,
    /// Files with more lines than this are patched instead of regenerated.
    pub rewrite_line_threshold: usize,
    /// Output shorter than this share of the original is flagged suspicious.
    pub suspicious_ratio: f64,
    /// Originals shorter than this (chars) are never judged by length.
    pub suspicious_min_len: usize,
    pub max_syntax_retries: usize,
    pub temperature: f64,
    pub patch_policy: PatchPolicy,
    pub removal_backend: RemovalBackend,
    #[serde(deserialize_with = "deserialize_string_list")]
    pub stdlib_denylist: Vec<String>,
    #[serde(deserialize_with = "deserialize_string_list")]
    pub exclude_globs: Vec<String>,
    pub max_file_bytes: u64,
    pub generator: Option<ProviderSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_path: PathBuf::from(".splice/index.db"),
            stage_dir: PathBuf::from(".splice/stage"),
            backup_dir: PathBuf::from(".splice/backups"),
            history_dir: PathBuf::from(".splice/history"),
            rewrite_line_threshold: 600,
            suspicious_ratio: 0.3,
            suspicious_min_len: 500,
            max_syntax_retries: 3,
            temperature: 0.0,
            patch_policy: PatchPolicy::Partial,
            removal_backend: RemovalBackend::Concrete,
            stdlib_denylist: default_stdlib_denylist().iter().map(|s| s.to_string()).collect(),
            exclude_globs: default_exclude_globs().iter().map(|s| s.to_string()).collect(),
            max_file_bytes: 1_048_576,
            generator: None,
        }
    }
}

pub fn default_stdlib_denylist() -> &'static [&'static str] {
    &[
        "typing", "os", "sys", "pathlib", "json", "sqlite3", "networkx", "hashlib", "abc", "enum",
        "re", "collections", "dataclasses", "functools", "itertools", "logging",
    ]
}

pub fn default_exclude_globs() -> &'static [&'static str] {
    &[
        "**/.git/**",
        "**/.splice/**",
        "**/__pycache__/**",
        "**/venv/**",
        "**/.venv/**",
        "**/node_modules/**",
    ]
}

/// Accept either a list or a comma-separated string, trimming each entry.
fn deserialize_string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrList {
        One(String),
        Many(Vec<String>),
    }

    let values = match StringOrList::deserialize(deserializer)? {
        StringOrList::One(s) => s.split(',').map(str::to_string).collect::<Vec<_>>(),
        StringOrList::Many(list) => list,
    };
    Ok(values.into_iter().map(|v| v.trim().to_string()).filter(|v| !v.is_empty()).collect())
}
