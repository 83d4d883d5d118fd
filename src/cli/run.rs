//! Run command implementation

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use super::utils::{print_json, Project, ProjectArgs};
use repo_splice::config::CliOverrides;
use repo_splice::domain::{PatchPolicy, Plan, ProviderSpec, RemovalBackend};
use repo_splice::generate::GeneratorRegistry;
use repo_splice::graph::DependencyGraph;
use repo_splice::pipeline::{Pipeline, RunReport, RunStatus, StepStatus};

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PolicyArg {
    /// Keep the blocks that applied, report the rest
    Partial,
    /// Reject the patch if any block fails
    Atomic,
}

impl From<PolicyArg> for PatchPolicy {
    fn from(value: PolicyArg) -> Self {
        match value {
            PolicyArg::Partial => PatchPolicy::Partial,
            PolicyArg::Atomic => PatchPolicy::Atomic,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum BackendArg {
    /// Lossless tree, keeps comments and spacing
    Concrete,
    /// Abstract tree, re-renders spacing
    Abstract,
}

impl From<BackendArg> for RemovalBackend {
    fn from(value: BackendArg) -> Self {
        match value {
            BackendArg::Concrete => RemovalBackend::Concrete,
            BackendArg::Abstract => RemovalBackend::Abstract,
        }
    }
}

#[derive(Args)]
pub struct RunArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Plan JSON file (`-` reads stdin)
    #[arg(value_name = "PLAN")]
    pub plan: PathBuf,

    /// External generator command; the prompt is piped to its stdin
    #[arg(long, value_name = "CMD", conflicts_with = "script")]
    pub generator_command: Option<String>,

    /// JSON list of canned generator responses, replayed in order
    #[arg(long, value_name = "FILE")]
    pub script: Option<PathBuf>,

    /// Files with more lines than this are patched instead of regenerated
    #[arg(long, value_name = "LINES")]
    pub rewrite_threshold: Option<usize>,

    /// Generator attempts per file when the output does not parse
    #[arg(long, value_name = "N")]
    pub max_retries: Option<usize>,

    /// How partially applied patches are treated
    #[arg(long, value_enum)]
    pub patch_policy: Option<PolicyArg>,

    /// Tree backend used to remove definitions
    #[arg(long, value_enum)]
    pub removal_backend: Option<BackendArg>,

    /// Skip impact analysis even if an index exists
    #[arg(long)]
    pub no_graph: bool,

    /// Print the run report as JSON
    #[arg(long)]
    pub json: bool,

    /// Suppress the progress bar
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: RunArgs) -> Result<()> {
    let overrides = CliOverrides {
        rewrite_line_threshold: args.rewrite_threshold,
        max_syntax_retries: args.max_retries,
        patch_policy: args.patch_policy.map(Into::into),
        removal_backend: args.removal_backend.map(Into::into),
        generator_command: args
            .generator_command
            .as_deref()
            .map(|cmd| cmd.split_whitespace().map(str::to_string).collect()),
    };
    let mut project = Project::load(&args.project, &overrides)?;
    if let Some(script) = args.script.as_ref() {
        let text = fs::read_to_string(script)
            .with_context(|| format!("Failed reading script: {}", script.display()))?;
        let responses: Vec<String> = serde_json::from_str(&text)
            .with_context(|| format!("Script must be a JSON list of strings: {}", script.display()))?;
        project.config.generator = Some(ProviderSpec::Scripted { responses });
    }

    let plan = load_plan(&args.plan)?;
    let Some(spec) = project.config.generator.as_ref() else {
        anyhow::bail!("No generator configured. Pass --generator-command or --script, or set `generator` in splice.toml.");
    };
    let generator = GeneratorRegistry::from_spec(spec)?.default_generator()?;
    tracing::info!("Using generator {}", generator.id());

    let mut pipeline = Pipeline::new(&project.root, &project.config, generator);
    if !args.no_graph {
        if let Some(store) = project.existing_index()? {
            pipeline = pipeline.with_graph(DependencyGraph::from_index(&store, &project.config.stdlib_denylist));
        }
    }

    let progress = if args.quiet || args.json {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(plan.changes.len() as u64)
    };
    progress.set_style(ProgressStyle::with_template("{bar:30} {pos}/{len} {wide_msg}")?);
    let report = pipeline.run_with_progress(&plan, |step, _| {
        progress.inc(1);
        progress.set_message(format!("{} {}", step.action, step.target));
    })?;
    progress.finish_and_clear();

    if args.json {
        print_json(&report)?;
    } else {
        print_summary(&report);
    }
    if report.status == RunStatus::Failure {
        anyhow::bail!("Every step failed");
    }
    Ok(())
}

fn load_plan(path: &Path) -> Result<Plan> {
    let text = if path.as_os_str() == "-" {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer).context("Failed reading plan from stdin")?;
        buffer
    } else {
        fs::read_to_string(path).with_context(|| format!("Failed reading plan: {}", path.display()))?
    };
    Plan::from_json(&text).context("Invalid plan JSON")
}

fn print_summary(report: &RunReport) {
    let status = match report.status {
        RunStatus::Success => style(report.status.as_str()).green(),
        RunStatus::Partial => style(report.status.as_str()).yellow(),
        RunStatus::Failure => style(report.status.as_str()).red(),
    };
    if !report.task.is_empty() {
        println!("Task: {}", report.task);
    }
    println!("Status: {} ({}/{} steps drafted)", status.bold(), report.drafted, report.total);

    for step in &report.steps {
        let marker = match step.status {
            StepStatus::Staged => style("ok").green(),
            StepStatus::Error => style("err").red(),
        };
        let strategy = step.strategy.map(|s| s.as_str()).unwrap_or("-");
        println!("  [{}] {} {} via {}", marker, step.action, step.target, strategy);
        if let Some(error) = step.error.as_ref() {
            println!("      {}", style(error).red());
        }
        for warning in &step.warnings {
            println!("      {} {}", style("warning:").yellow(), warning);
        }
        if let Some(impact) = step.impact.as_ref() {
            if !impact.impacted.is_empty() {
                println!("      impact: {} file(s), risk {}", impact.impacted.len(), impact.risk.as_str());
            }
        }
    }

    if !report.staged.is_empty() {
        println!("Staged:");
        for path in &report.staged {
            println!("  {}", path);
        }
    }
    if !report.staged_deletions.is_empty() {
        println!("Staged deletions:");
        for path in &report.staged_deletions {
            println!("  {}", path);
        }
    }
    if let Some(log) = report.audit_log.as_ref() {
        println!("Audit log: {}", log.display());
    }
    println!("Review with `repo-splice commit` to apply.");
}
