//! One JSON audit record per run.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::domain::Plan;

#[derive(Debug, Serialize)]
pub struct AuditRecord<'a, R: Serialize> {
    pub timestamp: DateTime<Utc>,
    pub task: &'a str,
    pub plan: &'a Plan,
    pub result: &'a R,
}

impl<'a, R: Serialize> AuditRecord<'a, R> {
    pub fn new(plan: &'a Plan, result: &'a R) -> Self {
        Self { timestamp: Utc::now(), task: &plan.task, plan, result }
    }
}

/// Write `record` as `<history_dir>/run_<timestamp>.json` and return the path.
pub fn write_audit_log<R: Serialize>(history_dir: &Path, record: &AuditRecord<'_, R>) -> Result<PathBuf> {
    fs::create_dir_all(history_dir)
        .with_context(|| format!("Failed creating history directory: {}", history_dir.display()))?;
    let name = format!("run_{}.json", record.timestamp.format("%Y%m%d_%H%M%S_%3f"));
    let path = history_dir.join(name);
    let json = serde_json::to_string_pretty(record).context("Failed serializing audit record")?;
    fs::write(&path, json).with_context(|| format!("Failed writing audit log: {}", path.display()))?;
    tracing::debug!("Audit log written to {}", path.display());
    Ok(path)
}
