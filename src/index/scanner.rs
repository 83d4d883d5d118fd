//! Incremental project scanner that keeps the source index current.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use ignore::WalkBuilder;
use rayon::prelude::*;

use crate::domain::{Config, SourceFile};
use crate::index::store::{FileRecord, IndexStore};
use crate::syntax::structural;
use crate::utils::{content_hash, is_binary_file, is_likely_generated, normalize_path, read_source};

const PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub files_seen: usize,
    pub files_unchanged: usize,
    pub files_indexed: usize,
    pub files_removed: usize,
    pub files_skipped_size: usize,
    pub files_skipped_binary: usize,
    pub files_skipped_glob: usize,
    /// Files whose content could not be parsed; still indexed without symbols.
    pub parse_failures: usize,
    pub files_unreadable: usize,
}

enum Scanned {
    Unchanged,
    Changed(Box<FileRecord>, bool),
    Failed,
}

pub struct Scanner {
    root: PathBuf,
    exclude_globs: Vec<String>,
    max_file_bytes: u64,
    respect_gitignore: bool,
}

impl Scanner {
    pub fn new(root: PathBuf) -> Self {
        let defaults = Config::default();
        Self {
            root,
            exclude_globs: defaults.exclude_globs,
            max_file_bytes: defaults.max_file_bytes,
            respect_gitignore: true,
        }
    }

    pub fn from_config(root: PathBuf, config: &Config) -> Self {
        Self::new(root)
            .exclude_globs(config.exclude_globs.clone())
            .max_file_bytes(config.max_file_bytes)
    }

    pub fn exclude_globs(mut self, globs: Vec<String>) -> Self {
        self.exclude_globs = globs;
        self
    }

    pub fn max_file_bytes(mut self, max_bytes: u64) -> Self {
        self.max_file_bytes = max_bytes;
        self
    }

    pub fn respect_gitignore(mut self, respect: bool) -> Self {
        self.respect_gitignore = respect;
        self
    }

    fn build_exclude_globset(&self) -> Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.exclude_globs {
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                }
                Err(e) => tracing::warn!("Ignoring invalid exclude glob '{}': {}", pattern, e),
            }
        }
        Ok(builder.build()?)
    }

    /// Candidate files as (absolute path, project-relative path), sorted.
    pub fn discover(&self, stats: &mut ScanStats) -> Result<Vec<(PathBuf, String)>> {
        let excludes = self.build_exclude_globset()?;
        let mut builder = WalkBuilder::new(&self.root);
        builder
            .git_ignore(self.respect_gitignore)
            .git_global(self.respect_gitignore)
            .git_exclude(self.respect_gitignore)
            .require_git(false)
            .hidden(false)
            .filter_entry(|entry| {
                let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
                let name = entry.file_name().to_str().unwrap_or("");
                !(is_dir
                    && matches!(
                        name,
                        ".git" | ".splice" | "__pycache__" | "venv" | ".venv" | "node_modules"
                    ))
            });

        let mut files = Vec::new();
        for entry in builder.build().flatten() {
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let path = entry.path();
            let Ok(rel) = path.strip_prefix(&self.root) else {
                continue;
            };
            let rel = normalize_path(&rel.to_string_lossy());
            stats.files_seen += 1;

            if excludes.is_match(&rel) {
                stats.files_skipped_glob += 1;
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.max_file_bytes {
                stats.files_skipped_size += 1;
                continue;
            }
            if is_binary_file(path) {
                stats.files_skipped_binary += 1;
                continue;
            }
            files.push((path.to_path_buf(), rel));
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));
        Ok(files)
    }

    /// Bring `store` in line with the files on disk. Unchanged hashes are
    /// skipped; changed files are reparsed; vanished files are deleted.
    pub fn scan(&self, store: &mut IndexStore) -> Result<ScanStats> {
        self.scan_with_progress(store, |_| {})
    }

    pub fn scan_with_progress<F>(&self, store: &mut IndexStore, on_file: F) -> Result<ScanStats>
    where
        F: Fn(&str) + Sync,
    {
        let mut stats = ScanStats::default();
        let files = self.discover(&mut stats)?;
        self.index_files(store, &files, &mut stats, on_file)?;
        tracing::info!(
            "Scan complete: {} indexed, {} unchanged, {} removed",
            stats.files_indexed,
            stats.files_unchanged,
            stats.files_removed
        );
        Ok(stats)
    }

    /// Reconcile `store` with `files`; anything indexed but absent from
    /// `files` is pruned.
    fn index_files<F>(
        &self,
        store: &mut IndexStore,
        files: &[(PathBuf, String)],
        stats: &mut ScanStats,
        on_file: F,
    ) -> Result<()>
    where
        F: Fn(&str) + Sync,
    {
        let known = store.known_hashes().context("Failed to read indexed hashes")?;

        let scanned: Vec<(String, Scanned)> = files
            .par_iter()
            .map(|(abs, rel)| {
                on_file(rel);
                (rel.clone(), scan_file(abs, rel, &known))
            })
            .collect();

        let mut present = HashSet::with_capacity(scanned.len());
        for (rel, outcome) in scanned {
            match outcome {
                Scanned::Unchanged => {
                    stats.files_unchanged += 1;
                    present.insert(rel);
                }
                Scanned::Changed(record, parsed) => {
                    if !parsed {
                        stats.parse_failures += 1;
                    }
                    store
                        .record_file(&record)
                        .with_context(|| format!("Failed to index {rel}"))?;
                    tracing::debug!("Indexed {} ({} symbols)", rel, record.symbols.len());
                    stats.files_indexed += 1;
                    present.insert(rel);
                }
                Scanned::Failed => {
                    // Still on disk, so keep whatever the index already has.
                    stats.files_unreadable += 1;
                    present.insert(rel);
                }
            }
        }

        stats.files_removed = store.remove_missing(&present).context("Failed to prune index")?;
        Ok(())
    }
}

fn scan_file(abs: &Path, rel: &str, known: &HashMap<String, String>) -> Scanned {
    let (text, bytes) = match read_source(abs) {
        Ok(read) => read,
        Err(e) => {
            tracing::warn!("Skipping unreadable file {}: {:#}", rel, e);
            return Scanned::Failed;
        }
    };
    let hash = content_hash(&bytes);
    if known.get(rel) == Some(&hash) {
        return Scanned::Unchanged;
    }

    let file_type = file_type_for(rel);
    let (symbols, imports, docstring, parsed) = if file_type == "python" {
        match (structural::index_symbols(&text), structural::import_records(&text, rel)) {
            (Ok((symbols, doc)), Ok(imports)) => (symbols, imports, doc, true),
            _ => {
                tracing::debug!("Could not parse {}; indexing without symbols", rel);
                (Vec::new(), Vec::new(), String::new(), false)
            }
        }
    } else {
        (Vec::new(), Vec::new(), String::new(), true)
    };

    let last_modified = std::fs::metadata(abs)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0);

    let record = FileRecord {
        file: SourceFile {
            path: rel.to_string(),
            hash,
            size_bytes: bytes.len() as u64,
            line_count: text.lines().count(),
            preview: text.chars().take(PREVIEW_CHARS).collect(),
            docstring,
            is_generated: is_likely_generated(abs, &text),
        },
        file_type: file_type.to_string(),
        last_modified,
        symbols,
        imports,
    };
    Scanned::Changed(Box::new(record), parsed)
}

/// Coarse file type recorded in the index.
pub fn file_type_for(path: &str) -> &'static str {
    let ext = Path::new(path).extension().and_then(|e| e.to_str()).unwrap_or("");
    match ext.to_ascii_lowercase().as_str() {
        "py" | "pyi" => "python",
        "rs" => "rust",
        "js" | "jsx" | "mjs" | "cjs" => "javascript",
        "ts" | "tsx" => "typescript",
        "go" => "go",
        "md" | "rst" | "txt" => "doc",
        "toml" | "yaml" | "yml" | "json" | "ini" | "cfg" => "config",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
        fs::write(path, content).expect("write");
    }

    #[test]
    fn indexes_python_symbols_and_imports() {
        let tmp = TempDir::new().expect("tmp");
        write(
            tmp.path(),
            "pkg/core.py",
            "\"\"\"Core.\"\"\"\nfrom pkg.util import helper\n\nclass Engine:\n    def run(self):\n        pass\n",
        );
        write(tmp.path(), "pkg/util.py", "def helper():\n    return 1\n");
        write(tmp.path(), "__pycache__/core.cpython.pyc", "junk");

        let mut store = IndexStore::open_in_memory().expect("store");
        let stats = Scanner::new(tmp.path().to_path_buf()).scan(&mut store).expect("scan");

        assert_eq!(stats.files_indexed, 2);
        assert_eq!(store.file_paths().expect("paths"), vec!["pkg/core.py", "pkg/util.py"]);
        let symbols = store.symbols_for("pkg/core.py").expect("symbols");
        let names: Vec<&str> = symbols.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Engine", "run"]);
        assert_eq!(store.dependents_of("pkg.util").expect("deps"), vec!["pkg/core.py"]);
        let files = store.files().expect("files");
        assert_eq!(files[0].docstring, "Core.");
    }

    #[test]
    fn rescan_skips_unchanged_and_prunes_deleted() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a.py", "import b\n");
        write(tmp.path(), "b.py", "x = 1\n");

        let mut store = IndexStore::open_in_memory().expect("store");
        let scanner = Scanner::new(tmp.path().to_path_buf());
        scanner.scan(&mut store).expect("first scan");

        fs::remove_file(tmp.path().join("b.py")).expect("rm");
        write(tmp.path(), "a.py", "import c\n");
        let stats = scanner.scan(&mut store).expect("second scan");

        assert_eq!(stats.files_indexed, 1);
        assert_eq!(stats.files_removed, 1);
        assert_eq!(store.imports().expect("imports")[0].1.module, "c");

        let stats = scanner.scan(&mut store).expect("third scan");
        assert_eq!(stats.files_unchanged, 1);
        assert_eq!(stats.files_indexed, 0);
    }

    #[test]
    fn unreadable_file_keeps_its_index_entry() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "a.py", "def keep():\n    pass\n");
        let mut store = IndexStore::open_in_memory().expect("store");
        let scanner = Scanner::new(tmp.path().to_path_buf());
        scanner.scan(&mut store).expect("first scan");

        // Discovered, but the read fails.
        let files = vec![(tmp.path().join("vanished-mid-scan.py"), "a.py".to_string())];
        let mut stats = ScanStats::default();
        scanner.index_files(&mut store, &files, &mut stats, |_| {}).expect("rescan");

        assert_eq!(stats.files_unreadable, 1);
        assert_eq!(stats.files_removed, 0);
        assert_eq!(store.file_paths().expect("paths"), vec!["a.py"]);
        assert_eq!(store.symbols_for("a.py").expect("symbols").len(), 1);
    }

    #[test]
    fn unparsable_python_is_indexed_without_symbols() {
        let tmp = TempDir::new().expect("tmp");
        write(tmp.path(), "broken.py", "def broken(:\n");
        let mut store = IndexStore::open_in_memory().expect("store");
        let stats = Scanner::new(tmp.path().to_path_buf()).scan(&mut store).expect("scan");
        assert_eq!(stats.parse_failures, 1);
        assert!(store.symbols_for("broken.py").expect("symbols").is_empty());
    }

    #[test]
    fn classifies_file_types() {
        assert_eq!(file_type_for("a/b.py"), "python");
        assert_eq!(file_type_for("README.md"), "doc");
        assert_eq!(file_type_for("Makefile"), "other");
    }
}
