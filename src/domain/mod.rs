//! Core data model shared by the index, graph, engines, and dispatcher.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod config;
pub mod plan;

pub use config::{Config, PatchPolicy, ProviderSpec, RemovalBackend};
pub use plan::{ActionType, ChangeStep, Plan};

/// One indexed project file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    pub path: String,
    pub hash: String,
    pub size_bytes: u64,
    pub line_count: usize,
    pub preview: String,
    pub docstring: String,
    pub is_generated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Function,
    Method,
    Class,
    Variable,
}

impl SymbolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolKind::Function => "function",
            SymbolKind::Method => "method",
            SymbolKind::Class => "class",
            SymbolKind::Variable => "variable",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "function" => Some(SymbolKind::Function),
            "method" => Some(SymbolKind::Method),
            "class" => Some(SymbolKind::Class),
            "variable" => Some(SymbolKind::Variable),
            _ => None,
        }
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named definition owned by exactly one [`SourceFile`]. Lines are 1-based
/// and inclusive; functions start at their first decorator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub kind: SymbolKind,
    pub line_start: usize,
    pub line_end: usize,
    pub doc: String,
}

/// A raw import string as written by the importer, e.g. `pkg.mod.ClassName`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub module: String,
    pub alias: Option<String>,
}

/// Import relationship recomputed at every graph build.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportEdge {
    pub source_path: String,
    pub raw: String,
    pub resolved: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStrategy {
    Exact,
    Suffix,
    Filename,
    Fuzzy,
}

impl MatchStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStrategy::Exact => "exact",
            MatchStrategy::Suffix => "suffix",
            MatchStrategy::Filename => "filename",
            MatchStrategy::Fuzzy => "fuzzy",
        }
    }
}

/// A resolved path candidate with its confidence in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileMatch {
    pub path: String,
    pub score: f64,
    pub strategy: MatchStrategy,
}

/// One search/replace instruction parsed from the patch wire format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchBlock {
    pub search: String,
    pub replace: String,
    /// Search fragment carries the elision marker and asks for a structural delete.
    pub elided: bool,
}
