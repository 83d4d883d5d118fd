//! Scan command implementation

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use super::utils::{parse_csv, Project, ProjectArgs};
use repo_splice::config::CliOverrides;
use repo_splice::index::Scanner;

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Exclude paths matching these globs (comma-separated, added to config)
    #[arg(short = 'e', long, value_name = "GLOBS")]
    pub exclude_glob: Option<String>,

    /// Skip files larger than this (bytes)
    #[arg(long, value_name = "BYTES")]
    pub max_file_bytes: Option<u64>,

    /// Ignore .gitignore rules
    #[arg(long)]
    pub no_gitignore: bool,

    /// Suppress the progress spinner
    #[arg(short, long)]
    pub quiet: bool,
}

pub fn run(args: ScanArgs) -> Result<()> {
    let project = Project::load(&args.project, &CliOverrides::default())?;
    let config = &project.config;

    let mut globs = config.exclude_globs.clone();
    if let Some(extra) = parse_csv(&args.exclude_glob) {
        globs.extend(extra);
    }
    let scanner = Scanner::from_config(project.root.clone(), config)
        .exclude_globs(globs)
        .max_file_bytes(args.max_file_bytes.unwrap_or(config.max_file_bytes))
        .respect_gitignore(!args.no_gitignore);

    let mut store = project.open_index()?;
    let spinner = if args.quiet { ProgressBar::hidden() } else { ProgressBar::new_spinner() };
    spinner.set_style(ProgressStyle::with_template("{spinner} {pos} files {wide_msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));

    let stats = scanner.scan_with_progress(&mut store, |path| {
        spinner.inc(1);
        spinner.set_message(path.to_string());
    })?;
    spinner.finish_and_clear();

    let counts = store.counts()?;
    println!("Index: {}", project.index_path().display());
    println!("Statistics:");
    println!("  Files seen: {}", stats.files_seen);
    println!("  Files indexed: {}", stats.files_indexed);
    println!("  Files unchanged: {}", stats.files_unchanged);
    println!("  Files removed: {}", stats.files_removed);
    println!("  Files skipped (size): {}", stats.files_skipped_size);
    println!("  Files skipped (binary): {}", stats.files_skipped_binary);
    println!("  Files skipped (glob): {}", stats.files_skipped_glob);
    println!("  Parse failures: {}", stats.parse_failures);
    if stats.files_unreadable > 0 {
        println!("  Unreadable (kept as indexed): {}", stats.files_unreadable);
    }
    println!("Totals: {} files, {} symbols, {} imports", counts.files, counts.symbols, counts.imports);
    Ok(())
}
