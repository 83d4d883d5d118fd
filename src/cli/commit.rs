//! Commit command implementation

use anyhow::Result;
use clap::Args;
use console::style;
use dialoguer::{theme::ColorfulTheme, Confirm};

use super::utils::{print_json, Project, ProjectArgs};
use repo_splice::config::CliOverrides;
use repo_splice::stage::StageArea;

#[derive(Args)]
pub struct CommitArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Apply staged deletions without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Only list what is staged
    #[arg(long, conflicts_with = "discard")]
    pub dry_run: bool,

    /// Throw away everything staged instead of committing
    #[arg(long)]
    pub discard: bool,

    /// Print the commit report as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: CommitArgs) -> Result<()> {
    let project = Project::load(&args.project, &CliOverrides::default())?;
    let stage = StageArea::new(&project.root, &project.config);

    if stage.is_empty()? {
        println!("Nothing staged.");
        return Ok(());
    }
    if args.discard {
        stage.discard()?;
        println!("Discarded staged changes in {}", stage.stage_dir().display());
        return Ok(());
    }

    let files = stage.staged_files()?;
    let deletions = stage.pending_deletions()?;
    if !args.json {
        for path in &files {
            println!("  {} {}", style("M").green(), path);
        }
        for path in &deletions {
            println!("  {} {}", style("D").red(), path);
        }
    }
    if args.dry_run {
        return Ok(());
    }

    let apply_deletions = deletions.is_empty() || args.yes || confirm_deletions(deletions.len())?;
    let report = stage.commit(apply_deletions)?;

    if args.json {
        return print_json(&report);
    }
    println!(
        "Committed {} file(s), deleted {} (transaction {})",
        report.written.len(),
        report.deleted.len(),
        report.transaction
    );
    println!("Backups: {}", report.backup_dir.display());
    if !report.skipped_deletions.is_empty() {
        println!(
            "{} {} deletion(s) left staged; rerun with --yes to apply.",
            style("note:").yellow(),
            report.skipped_deletions.len()
        );
    }
    Ok(())
}

/// Ask before removing files. Without a terminal the answer is no.
fn confirm_deletions(count: usize) -> Result<bool> {
    if !console::user_attended() {
        tracing::warn!("Not attached to a terminal; leaving {} deletion(s) staged", count);
        return Ok(false);
    }
    Ok(Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Delete {} file(s) from the project?", count))
        .default(false)
        .interact()?)
}
