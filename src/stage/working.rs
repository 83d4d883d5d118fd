//! In-memory working copy for one run.
//!
//! Reads fall through memory, then the stage area (drafts left by a previous
//! run), then the project on disk. Step results only ever land in memory
//! until [`WorkingSet::flush`] writes them to the stage area.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fs;
use std::io;

use super::StageArea;
use crate::dispatch::{FileChange, FileSource, StepResult};
use crate::error::SpliceResult;
use crate::utils::normalize_path;

/// Files written and deleted by a flush.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: Vec<String>,
    pub deleted: Vec<String>,
}

pub struct WorkingSet<'a> {
    stage: &'a StageArea,
    /// `None` marks a file deleted during this run.
    memory: BTreeMap<String, Option<String>>,
    touched: Vec<String>,
}

impl<'a> WorkingSet<'a> {
    pub fn new(stage: &'a StageArea) -> Self {
        Self { stage, memory: BTreeMap::new(), touched: Vec::new() }
    }

    /// Fold a step's file changes into the working copy.
    pub fn apply(&mut self, result: &StepResult) {
        for (path, change) in &result.changes {
            let path = normalize_path(path);
            let value = match change {
                FileChange::Write(content) => Some(content.clone()),
                FileChange::Delete => None,
            };
            if !self.touched.contains(&path) {
                self.touched.push(path.clone());
            }
            self.memory.insert(path, value);
        }
    }

    /// Paths changed during this run, in first-touched order.
    pub fn touched(&self) -> &[String] {
        &self.touched
    }

    /// Write every touched file to the stage area once.
    pub fn flush(&self) -> Result<FlushReport> {
        let mut report = FlushReport::default();
        for path in &self.touched {
            match self.memory.get(path) {
                Some(Some(content)) => {
                    self.stage.write(path, content)?;
                    report.written.push(path.clone());
                }
                Some(None) => {
                    self.stage.mark_deleted(path)?;
                    report.deleted.push(path.clone());
                }
                None => {}
            }
        }
        tracing::info!("Staged {} file(s), {} deletion(s)", report.written.len(), report.deleted.len());
        Ok(report)
    }

    /// Content from the stage area or disk, and whether it came from the stage.
    fn load(&self, path: &str) -> Result<(Option<String>, bool)> {
        if self.stage.is_pending_deletion(path)? {
            return Ok((None, true));
        }
        if let Some(staged) = self.stage.read_staged(path)? {
            tracing::debug!("Using staged version of {}", path);
            return Ok((Some(staged), true));
        }
        let on_disk = self.stage.project_root().join(path);
        if on_disk.is_file() {
            return Ok((Some(fs::read_to_string(&on_disk)?), false));
        }
        Ok((None, false))
    }
}

impl FileSource for WorkingSet<'_> {
    fn current(&mut self, path: &str) -> SpliceResult<Option<String>> {
        let path = normalize_path(path);
        if let Some(cached) = self.memory.get(&path) {
            return Ok(cached.clone());
        }
        let (loaded, staged) =
            self.load(&path).map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{:#}", e)))?;
        if staged {
            // Pin staged drafts so every later step in the run sees the same version.
            self.memory.insert(path, loaded.clone());
        }
        Ok(loaded)
    }
}
