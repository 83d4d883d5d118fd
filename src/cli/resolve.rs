//! Resolve command implementation

use anyhow::Result;
use clap::Args;

use super::utils::{print_json, Project, ProjectArgs};
use repo_splice::config::CliOverrides;
use repo_splice::resolve::FileResolver;

#[derive(Args)]
pub struct ResolveArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Path fragment to resolve, e.g. `models/user` or `utils.py`
    #[arg(value_name = "FRAGMENT")]
    pub fragment: String,

    /// Treat FRAGMENT as a symbol name and list where it is defined
    #[arg(short, long)]
    pub symbol: bool,

    /// Print the match as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: ResolveArgs) -> Result<()> {
    let project = Project::load(&args.project, &CliOverrides::default())?;
    let store = project.require_index()?;

    if args.symbol {
        let locations = store.find_symbol(&args.fragment)?;
        if locations.is_empty() {
            anyhow::bail!("No indexed definition named '{}'", args.fragment);
        }
        if args.json {
            return print_json(&locations);
        }
        for found in locations {
            println!(
                "{}:{}-{} ({})",
                found.path,
                found.symbol.line_start,
                found.symbol.line_end,
                found.symbol.kind.as_str()
            );
        }
        return Ok(());
    }

    let resolver = FileResolver::from_store(&store)?;
    let Some(found) = resolver.resolve(&args.fragment) else {
        anyhow::bail!("No indexed file matches '{}'", args.fragment);
    };
    if args.json {
        return print_json(&found);
    }
    println!("{} ({}, {:.2})", found.path, found.strategy.as_str(), found.score);
    Ok(())
}
