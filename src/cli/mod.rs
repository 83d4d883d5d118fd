//! Command-line interface for repo-splice
//!
//! Index a project, inspect its dependency graph, and run change plans
//! through the staging area.

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod commit;
mod graph;
mod patch;
mod resolve;
mod run;
mod scan;
mod utils;

/// Apply imprecise, generator-proposed code changes to a repository safely
#[derive(Parser)]
#[command(name = "repo-splice")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (sets log level to DEBUG)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build or refresh the source index
    Scan(scan::ScanArgs),

    /// Query the import dependency graph
    Graph(graph::GraphArgs),

    /// Resolve a loose path fragment to an indexed file
    Resolve(resolve::ResolveArgs),

    /// Apply a SEARCH/REPLACE patch to a single file
    Patch(patch::PatchArgs),

    /// Execute a change plan into the staging area
    Run(Box<run::RunArgs>),

    /// Move staged changes into the project
    Commit(commit::CommitArgs),

    /// Print shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG in the environment always takes precedence; --verbose falls back to DEBUG.
    let filter = if cli.verbose {
        EnvFilter::from_default_env().add_directive(Level::DEBUG.into())
    } else {
        EnvFilter::from_default_env().add_directive(Level::WARN.into())
    };
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .try_init();

    match cli.command {
        Commands::Scan(args) => scan::run(args),
        Commands::Graph(args) => graph::run(args),
        Commands::Resolve(args) => resolve::run(args),
        Commands::Patch(args) => patch::run(args),
        Commands::Run(args) => run::run(*args),
        Commands::Commit(args) => commit::run(args),
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "repo-splice", &mut std::io::stdout());
            Ok(())
        }
    }
}
