//! Staging area for drafted changes.
//!
//! Drafts land in a hidden directory that mirrors project-relative paths.
//! Nothing touches the project until [`StageArea::commit`], which backs up
//! every original into a per-transaction directory first.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::domain::Config;
use crate::utils::{is_contained_path, normalize_path, relative_path};

pub mod audit;
pub mod working;

pub use audit::{write_audit_log, AuditRecord};
pub use working::WorkingSet;

/// Pending whole-file deletions, stored beside the staged copies.
const DELETIONS_FILE: &str = ".splice-deletions.json";

#[derive(Debug, Default, Serialize, Deserialize)]
struct DeletionManifest {
    paths: BTreeSet<String>,
}

/// What a commit did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    pub transaction: String,
    pub backup_dir: PathBuf,
    pub written: Vec<String>,
    pub deleted: Vec<String>,
    /// Deletions left staged because they were not confirmed.
    pub skipped_deletions: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StageArea {
    project_root: PathBuf,
    stage_dir: PathBuf,
    backup_dir: PathBuf,
}

impl StageArea {
    pub fn new(project_root: &Path, config: &Config) -> Self {
        Self {
            project_root: project_root.to_path_buf(),
            stage_dir: resolve_dir(project_root, &config.stage_dir),
            backup_dir: resolve_dir(project_root, &config.backup_dir),
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn stage_dir(&self) -> &Path {
        &self.stage_dir
    }

    /// Where `rel` is staged. Paths that would leave the stage are refused.
    pub fn staged_path(&self, rel: &str) -> Result<PathBuf> {
        if !is_contained_path(rel) {
            anyhow::bail!("Refusing to stage a path outside the project: {}", rel);
        }
        Ok(self.stage_dir.join(normalize_path(rel)))
    }

    fn project_path(&self, rel: &str) -> Result<PathBuf> {
        if !is_contained_path(rel) {
            anyhow::bail!("Refusing to touch a path outside the project: {}", rel);
        }
        Ok(self.project_root.join(normalize_path(rel)))
    }

    pub fn read_staged(&self, rel: &str) -> Result<Option<String>> {
        let path = self.staged_path(rel)?;
        if !path.is_file() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed reading staged file: {}", path.display()))?;
        Ok(Some(content))
    }

    /// Stage new content for `rel`, cancelling any pending deletion of it.
    pub fn write(&self, rel: &str, content: &str) -> Result<()> {
        let path = self.staged_path(rel)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed creating stage directory: {}", parent.display()))?;
        }
        fs::write(&path, content).with_context(|| format!("Failed writing staged file: {}", path.display()))?;

        let mut manifest = self.load_deletions()?;
        if manifest.paths.remove(&normalize_path(rel)) {
            self.save_deletions(&manifest)?;
        }
        Ok(())
    }

    /// Stage a whole-file deletion, dropping any staged content for it.
    pub fn mark_deleted(&self, rel: &str) -> Result<()> {
        let path = self.staged_path(rel)?;
        if path.is_file() {
            fs::remove_file(&path).with_context(|| format!("Failed removing staged file: {}", path.display()))?;
        }
        let mut manifest = self.load_deletions()?;
        if manifest.paths.insert(normalize_path(rel)) {
            self.save_deletions(&manifest)?;
        }
        Ok(())
    }

    pub fn is_pending_deletion(&self, rel: &str) -> Result<bool> {
        Ok(self.load_deletions()?.paths.contains(&normalize_path(rel)))
    }

    pub fn pending_deletions(&self) -> Result<Vec<String>> {
        Ok(self.load_deletions()?.paths.into_iter().collect())
    }

    /// Every staged file as a project-relative path, sorted.
    pub fn staged_files(&self) -> Result<Vec<String>> {
        if !self.stage_dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.stage_dir).into_iter().filter_map(Result::ok) {
            if !entry.file_type().is_file() || entry.file_name() == DELETIONS_FILE {
                continue;
            }
            if let Some(rel) = relative_path(&self.stage_dir, entry.path()) {
                files.push(rel);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.staged_files()?.is_empty() && self.pending_deletions()?.is_empty())
    }

    /// Move staged content into the project. Originals are copied to
    /// `<backup_dir>/<transaction>/` before being overwritten or removed.
    pub fn commit(&self, apply_deletions: bool) -> Result<CommitReport> {
        let transaction = chrono::Local::now().format("%Y%m%d_%H%M%S_%3f").to_string();
        let backup_root = self.backup_dir.join(&transaction);
        let mut report =
            CommitReport { transaction, backup_dir: backup_root.clone(), ..CommitReport::default() };

        for rel in self.staged_files()? {
            let target = self.project_path(&rel)?;
            self.backup(&backup_root, &rel, &target)?;
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed creating directory: {}", parent.display()))?;
            }
            let staged = self.staged_path(&rel)?;
            fs::copy(&staged, &target)
                .with_context(|| format!("Failed writing {} from stage", target.display()))?;
            fs::remove_file(&staged)
                .with_context(|| format!("Failed clearing staged file: {}", staged.display()))?;
            tracing::info!("Committed {}", rel);
            report.written.push(rel);
        }

        let mut manifest = self.load_deletions()?;
        if apply_deletions {
            for rel in std::mem::take(&mut manifest.paths) {
                let target = self.project_path(&rel)?;
                if target.is_file() {
                    self.backup(&backup_root, &rel, &target)?;
                    fs::remove_file(&target)
                        .with_context(|| format!("Failed deleting {}", target.display()))?;
                    tracing::info!("Deleted {}", rel);
                }
                report.deleted.push(rel);
            }
        } else {
            report.skipped_deletions = manifest.paths.iter().cloned().collect();
        }
        self.save_deletions(&manifest)?;
        self.prune_empty_dirs();
        Ok(report)
    }

    /// Drop everything staged without touching the project.
    pub fn discard(&self) -> Result<()> {
        if self.stage_dir.is_dir() {
            fs::remove_dir_all(&self.stage_dir)
                .with_context(|| format!("Failed clearing stage: {}", self.stage_dir.display()))?;
        }
        Ok(())
    }

    fn backup(&self, backup_root: &Path, rel: &str, original: &Path) -> Result<()> {
        if !original.is_file() {
            return Ok(());
        }
        let destination = backup_root.join(rel);
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed creating backup directory: {}", parent.display()))?;
        }
        fs::copy(original, &destination)
            .with_context(|| format!("Failed backing up {}", original.display()))?;
        Ok(())
    }

    fn load_deletions(&self) -> Result<DeletionManifest> {
        let path = self.stage_dir.join(DELETIONS_FILE);
        if !path.is_file() {
            return Ok(DeletionManifest::default());
        }
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed reading deletion manifest: {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Corrupt deletion manifest: {}", path.display()))
    }

    fn save_deletions(&self, manifest: &DeletionManifest) -> Result<()> {
        let path = self.stage_dir.join(DELETIONS_FILE);
        if manifest.paths.is_empty() {
            if path.is_file() {
                fs::remove_file(&path)?;
            }
            return Ok(());
        }
        fs::create_dir_all(&self.stage_dir)?;
        fs::write(&path, serde_json::to_string_pretty(manifest)?)
            .with_context(|| format!("Failed writing deletion manifest: {}", path.display()))
    }

    fn prune_empty_dirs(&self) {
        let mut dirs: Vec<PathBuf> = WalkDir::new(&self.stage_dir)
            .min_depth(1)
            .into_iter()
            .filter_map(Result::ok)
            .filter(|e| e.file_type().is_dir())
            .map(|e| e.into_path())
            .collect();
        // Deepest first so parents empty out after their children.
        dirs.sort_by_key(|d| std::cmp::Reverse(d.components().count()));
        for dir in dirs {
            let _ = fs::remove_dir(&dir);
        }
    }
}

fn resolve_dir(root: &Path, dir: &Path) -> PathBuf {
    if dir.is_absolute() {
        dir.to_path_buf()
    } else {
        root.join(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn stage(root: &Path) -> StageArea {
        StageArea::new(root, &Config::default())
    }

    #[test]
    fn write_then_list_and_read() {
        let tmp = TempDir::new().expect("tempdir");
        let area = stage(tmp.path());
        area.write("pkg/a.py", "x = 1\n").expect("write");
        area.write("b.py", "y = 2\n").expect("write");

        assert_eq!(area.staged_files().expect("list"), vec!["b.py".to_string(), "pkg/a.py".to_string()]);
        assert_eq!(area.read_staged("pkg/a.py").expect("read").as_deref(), Some("x = 1\n"));
        assert_eq!(area.read_staged("missing.py").expect("read"), None);
    }

    #[test]
    fn commit_backs_up_then_overwrites() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join("a.py"), "old\n").expect("seed");
        let area = stage(tmp.path());
        area.write("a.py", "new\n").expect("write");
        area.write("fresh/b.py", "b\n").expect("write");

        let report = area.commit(true).expect("commit");
        assert_eq!(report.written, vec!["a.py".to_string(), "fresh/b.py".to_string()]);
        assert_eq!(fs::read_to_string(tmp.path().join("a.py")).expect("read"), "new\n");
        assert_eq!(fs::read_to_string(tmp.path().join("fresh/b.py")).expect("read"), "b\n");
        assert_eq!(fs::read_to_string(report.backup_dir.join("a.py")).expect("backup"), "old\n");
        assert!(!report.backup_dir.join("fresh/b.py").exists());
        assert!(area.is_empty().expect("empty"));
    }

    #[test]
    fn deletions_wait_for_confirmation() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join("gone.py"), "bye\n").expect("seed");
        let area = stage(tmp.path());
        area.mark_deleted("gone.py").expect("mark");
        assert!(area.is_pending_deletion("gone.py").expect("pending"));
        assert!(area.staged_files().expect("list").is_empty());

        let report = area.commit(false).expect("commit");
        assert_eq!(report.skipped_deletions, vec!["gone.py".to_string()]);
        assert!(tmp.path().join("gone.py").exists());

        let report = area.commit(true).expect("commit");
        assert_eq!(report.deleted, vec!["gone.py".to_string()]);
        assert!(!tmp.path().join("gone.py").exists());
        assert_eq!(fs::read_to_string(report.backup_dir.join("gone.py")).expect("backup"), "bye\n");
    }

    #[test]
    fn writing_cancels_a_pending_deletion() {
        let tmp = TempDir::new().expect("tempdir");
        let area = stage(tmp.path());
        area.mark_deleted("a.py").expect("mark");
        area.write("a.py", "back\n").expect("write");
        assert!(area.pending_deletions().expect("pending").is_empty());
    }

    #[test]
    fn paths_outside_the_project_are_refused() {
        let tmp = TempDir::new().expect("tempdir");
        let area = stage(tmp.path());
        assert!(area.write("../escaped.py", "x\n").is_err());
        assert!(area.write("../../../escaped.py", "x\n").is_err());
        assert!(area.mark_deleted("/etc/hosts").is_err());
        assert!(area.read_staged("pkg/../../a.py").is_err());
        assert!(!area.stage_dir().parent().expect("parent").join("escaped.py").exists());
        assert!(area.is_empty().expect("empty"));
    }

    #[test]
    fn commit_refuses_a_tampered_deletion_manifest() {
        let tmp = TempDir::new().expect("tempdir");
        let outside = TempDir::new().expect("outside");
        fs::write(outside.path().join("keep.py"), "keep\n").expect("seed");
        let area = stage(tmp.path());
        fs::create_dir_all(area.stage_dir()).expect("mkdir");
        let manifest = serde_json::json!({ "paths": [outside.path().join("keep.py")] });
        fs::write(area.stage_dir().join(DELETIONS_FILE), manifest.to_string()).expect("manifest");

        assert!(area.commit(true).is_err());
        assert!(outside.path().join("keep.py").exists());
    }
}
