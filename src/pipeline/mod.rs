//! Sequential plan execution.
//!
//! Steps run one at a time against a shared working copy so that each sees
//! what the previous ones produced. A failing step is recorded and skipped;
//! the run carries on and reports an aggregate status.

use anyhow::Result;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::dispatch::{Dispatcher, ExtractionMap, FileChange, StepResult, StrategyKind, Warning};
use crate::domain::{ActionType, ChangeStep, Config, Plan};
use crate::error::SpliceError;
use crate::generate::Generator;
use crate::graph::{DependencyGraph, ImpactSummary};
use crate::patch::PatchReport;
use crate::stage::{write_audit_log, AuditRecord, StageArea, WorkingSet};
use crate::syntax::ParserRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Partial,
    Failure,
}

impl RunStatus {
    fn from_counts(total: usize, failed: usize) -> Self {
        if failed == 0 {
            RunStatus::Success
        } else if failed == total {
            RunStatus::Failure
        } else {
            RunStatus::Partial
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Success => "success",
            RunStatus::Partial => "partial",
            RunStatus::Failure => "failure",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Staged,
    Error,
}

/// Per-step entry of a [`RunReport`].
#[derive(Debug, Clone, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: ActionType,
    pub target: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyKind>,
    pub written: Vec<String>,
    pub deleted: Vec<String>,
    pub warnings: Vec<Warning>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_extractions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<PatchReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub impact: Option<ImpactSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepOutcome {
    fn staged(index: usize, step: &ChangeStep, result: StepResult) -> Self {
        let mut written = Vec::new();
        let mut deleted = Vec::new();
        for (path, change) in &result.changes {
            match change {
                FileChange::Write(_) => written.push(path.clone()),
                FileChange::Delete => deleted.push(path.clone()),
            }
        }
        Self {
            index,
            action: step.action,
            target: step.target_file.clone(),
            status: StepStatus::Staged,
            strategy: Some(result.strategy),
            written,
            deleted,
            warnings: result.warnings,
            failed_extractions: result.failed_extractions,
            patch: result.patch,
            impact: None,
            error: None,
        }
    }

    fn failed(index: usize, step: &ChangeStep, error: &SpliceError) -> Self {
        Self {
            index,
            action: step.action,
            target: step.target_file.clone(),
            status: StepStatus::Error,
            strategy: None,
            written: Vec::new(),
            deleted: Vec::new(),
            warnings: Vec::new(),
            failed_extractions: Vec::new(),
            patch: None,
            impact: None,
            error: Some(error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub task: String,
    pub status: RunStatus,
    pub total: usize,
    pub drafted: usize,
    pub failed: usize,
    pub steps: Vec<StepOutcome>,
    pub staged: Vec<String>,
    pub staged_deletions: Vec<String>,
    pub extraction_map: ExtractionMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_log: Option<PathBuf>,
}

impl RunReport {
    pub fn warning_count(&self) -> usize {
        self.steps.iter().map(|s| s.warnings.len()).sum()
    }
}

pub struct Pipeline<'a> {
    root: &'a Path,
    config: &'a Config,
    generator: Arc<dyn Generator>,
    parsers: ParserRegistry,
    graph: DependencyGraph,
}

impl<'a> Pipeline<'a> {
    pub fn new(root: &'a Path, config: &'a Config, generator: Arc<dyn Generator>) -> Self {
        Self {
            root,
            config,
            generator,
            parsers: ParserRegistry::with_builtin(),
            graph: DependencyGraph::empty(),
        }
    }

    /// Attach a dependency graph so each step reports what it may impact.
    pub fn with_graph(mut self, graph: DependencyGraph) -> Self {
        self.graph = graph;
        self
    }

    pub fn with_parsers(mut self, parsers: ParserRegistry) -> Self {
        self.parsers = parsers;
        self
    }

    pub fn run(&self, plan: &Plan) -> Result<RunReport> {
        self.run_with_progress(plan, |_, _| {})
    }

    /// Execute every step in order, stage the results, and write the audit
    /// log. `on_step` sees each finished step with the plan's step count.
    pub fn run_with_progress<F>(&self, plan: &Plan, mut on_step: F) -> Result<RunReport>
    where
        F: FnMut(&StepOutcome, usize),
    {
        let stage = StageArea::new(self.root, self.config);
        let mut working = WorkingSet::new(&stage);
        let mut dispatcher = Dispatcher::new(Arc::clone(&self.generator), &self.parsers, self.config);
        let total = plan.changes.len();
        tracing::info!("Starting execution of {} step(s)", total);

        let mut steps = Vec::with_capacity(total);
        for (index, step) in plan.changes.iter().enumerate() {
            let mut outcome = match dispatcher.dispatch(step, &mut working) {
                Ok(result) => {
                    working.apply(&result);
                    StepOutcome::staged(index, step, result)
                }
                Err(e) => {
                    tracing::warn!("Step {} ({} {}) failed: {}", index + 1, step.action, step.target_file, e);
                    StepOutcome::failed(index, step, &e)
                }
            };
            if self.graph.is_built() {
                outcome.impact = Some(self.graph.impact(&step.target_file));
            }
            on_step(&outcome, total);
            steps.push(outcome);
        }

        let flushed = working.flush()?;
        let failed = steps.iter().filter(|s| s.status == StepStatus::Error).count();
        let mut report = RunReport {
            task: plan.task.clone(),
            status: RunStatus::from_counts(total, failed),
            total,
            drafted: total - failed,
            failed,
            steps,
            staged: flushed.written,
            staged_deletions: flushed.deleted,
            extraction_map: dispatcher.extraction_map().clone(),
            audit_log: None,
        };

        let history_dir = if self.config.history_dir.is_absolute() {
            self.config.history_dir.clone()
        } else {
            self.root.join(&self.config.history_dir)
        };
        match write_audit_log(&history_dir, &AuditRecord::new(plan, &report)) {
            Ok(path) => report.audit_log = Some(path),
            Err(e) => tracing::warn!("Could not write audit log: {:#}", e),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ProviderSpec;
    use crate::generate::build_generator;
    use std::fs;
    use tempfile::TempDir;

    const UTILS: &str = "import re\n\n\ndef parse_date(s):\n    return re.match(r'\\d+', s)\n\n\ndef other():\n    return 1\n";

    fn generator(responses: &[&str]) -> Arc<dyn Generator> {
        build_generator(&ProviderSpec::Scripted { responses: responses.iter().map(|s| s.to_string()).collect() })
            .expect("scripted")
    }

    #[test]
    fn move_then_cleanup_stages_both_files() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join("utils.py"), UTILS).expect("seed");
        let config = Config::default();
        let plan = Plan {
            task: "split dates".into(),
            changes: vec![
                ChangeStep::new(ActionType::Create, "dates.py")
                    .with_source("utils.py")
                    .with_entities(["parse_date"]),
                ChangeStep::new(ActionType::Modify, "utils.py").with_description("Remove the moved function"),
            ],
        };
        let pipeline = Pipeline::new(
            tmp.path(),
            &config,
            generator(&["import re\n\n\ndef parse_date(s):\n    return re.match(r'\\d+', s)"]),
        );

        let mut seen = Vec::new();
        let report = pipeline.run_with_progress(&plan, |step, total| seen.push((step.index, total))).expect("run");
        assert_eq!(report.status, RunStatus::Success);
        assert_eq!(seen, vec![(0, 2), (1, 2)]);
        assert_eq!(report.staged, vec!["dates.py".to_string(), "utils.py".to_string()]);

        let stage = StageArea::new(tmp.path(), &config);
        let staged_utils = stage.read_staged("utils.py").expect("read").expect("staged");
        assert!(!staged_utils.contains("parse_date"));
        // The project itself is untouched until commit.
        assert_eq!(fs::read_to_string(tmp.path().join("utils.py")).expect("read"), UTILS);
        assert!(report.audit_log.as_ref().is_some_and(|p| p.is_file()));
    }

    #[test]
    fn failing_step_makes_the_run_partial() {
        let tmp = TempDir::new().expect("tempdir");
        let config = Config::default();
        let plan = Plan {
            task: String::new(),
            changes: vec![
                ChangeStep::new(ActionType::Create, "a.py").with_description("add A"),
                ChangeStep::new(ActionType::ExtractAndModify, "b.py"),
            ],
        };
        let report = Pipeline::new(tmp.path(), &config, generator(&["A = 1"])).run(&plan).expect("run");
        assert_eq!(report.status, RunStatus::Partial);
        assert_eq!((report.drafted, report.failed), (1, 1));
        assert_eq!(report.steps[1].status, StepStatus::Error);
        assert!(report.steps[1].error.is_some());
    }

    #[test]
    fn move_out_of_the_project_fails_without_writing() {
        let tmp = TempDir::new().expect("tempdir");
        let root = tmp.path().join("project");
        fs::create_dir_all(&root).expect("mkdir");
        fs::write(root.join("a.py"), "x = 1\n").expect("seed");
        let config = Config::default();
        let plan = Plan {
            task: String::new(),
            changes: vec![ChangeStep::new(ActionType::Move, "../../../escaped.py").with_source("a.py")],
        };
        let report = Pipeline::new(&root, &config, generator(&[])).run(&plan).expect("run");

        assert_eq!(report.status, RunStatus::Failure);
        assert_eq!(report.steps[0].status, StepStatus::Error);
        assert!(report.steps[0].error.as_deref().is_some_and(|e| e.contains("escapes the project")));
        assert!(report.staged.is_empty() && report.staged_deletions.is_empty());
        assert!(!tmp.path().join("escaped.py").exists());
        assert!(!root.join(".splice/escaped.py").exists());
        assert!(root.join("a.py").is_file());
        assert!(StageArea::new(&root, &config).is_empty().expect("empty"));
    }

    #[test]
    fn all_steps_failing_is_a_failure() {
        let tmp = TempDir::new().expect("tempdir");
        let config = Config::default();
        let plan = Plan { task: String::new(), changes: vec![ChangeStep::new(ActionType::Move, "x.py")] };
        let report = Pipeline::new(tmp.path(), &config, generator(&[])).run(&plan).expect("run");
        assert_eq!(report.status, RunStatus::Failure);
        assert!(report.staged.is_empty());
    }

    #[test]
    fn impact_is_attached_when_a_graph_is_available() {
        let tmp = TempDir::new().expect("tempdir");
        fs::write(tmp.path().join("b.py"), "B = 1\n").expect("seed");
        let config = Config::default();
        let mut artifacts = std::collections::BTreeMap::new();
        artifacts.insert("a.py".to_string(), "import b\n".to_string());
        artifacts.insert("b.py".to_string(), "B = 1\n".to_string());
        let graph = DependencyGraph::from_artifacts(&artifacts, &config.stdlib_denylist);

        let plan = Plan {
            task: String::new(),
            changes: vec![ChangeStep::new(ActionType::Modify, "b.py").with_description("bump B")],
        };
        let report = Pipeline::new(tmp.path(), &config, generator(&["B = 2"]))
            .with_graph(graph)
            .run(&plan)
            .expect("run");
        let impact = report.steps[0].impact.as_ref().expect("impact");
        assert_eq!(impact.callers, vec!["a.py".to_string()]);
    }
}
