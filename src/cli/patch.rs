//! Patch command implementation

use anyhow::{Context, Result};
use clap::Args;
use std::fs;
use std::io::Read;
use std::path::PathBuf;

use super::utils::print_json;
use repo_splice::domain::PatchPolicy;
use repo_splice::patch::PatchEngine;
use repo_splice::syntax::ParserRegistry;
use repo_splice::utils::read_source;

#[derive(Args)]
pub struct PatchArgs {
    /// File to patch
    #[arg(value_name = "FILE")]
    pub file: PathBuf,

    /// File holding SEARCH/REPLACE blocks (reads stdin when omitted)
    #[arg(value_name = "PATCH")]
    pub patch: Option<PathBuf>,

    /// Reject the whole patch if any block fails to apply
    #[arg(long)]
    pub atomic: bool,

    /// Overwrite FILE with the patched content
    #[arg(short = 'i', long, conflicts_with = "output")]
    pub in_place: bool,

    /// Write the patched content here instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Print the block report as JSON instead of the patched content
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: PatchArgs) -> Result<()> {
    let (original, _) = read_source(&args.file)?;
    let response = match args.patch.as_ref() {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed reading patch: {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            std::io::stdin().read_to_string(&mut buffer).context("Failed reading patch from stdin")?;
            buffer
        }
    };

    let policy = if args.atomic { PatchPolicy::Atomic } else { PatchPolicy::Partial };
    let report = PatchEngine::new(policy).apply(&original, &response)?;

    for failure in &report.failed {
        eprintln!("Block {} not applied: {}", failure.index + 1, failure.reason);
    }
    let path_str = args.file.to_string_lossy();
    if let Err(issue) = ParserRegistry::with_builtin().validate(&path_str, &report.content) {
        tracing::warn!("Patched {} no longer parses: {}", path_str, issue);
    }

    if args.in_place {
        fs::write(&args.file, &report.content)
            .with_context(|| format!("Failed writing {}", args.file.display()))?;
    } else if let Some(output) = args.output.as_ref() {
        fs::write(output, &report.content).with_context(|| format!("Failed writing {}", output.display()))?;
    } else if !args.json {
        print!("{}", report.content);
    }

    if args.json {
        print_json(&report)?;
    }
    Ok(())
}
