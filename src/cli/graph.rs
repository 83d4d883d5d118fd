//! Graph command implementation

use anyhow::Result;
use clap::{Args, ValueEnum};
use std::collections::BTreeMap;

use super::utils::{print_json, Project, ProjectArgs};
use repo_splice::config::CliOverrides;
use repo_splice::graph::DependencyGraph;
use repo_splice::index::IndexStore;
use repo_splice::resolve::FileResolver;
use repo_splice::stage::StageArea;
use repo_splice::utils::read_source;

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum GraphQuery {
    /// Files that import the target
    Callers,
    /// Files the target imports
    Deps,
    /// Transitive importers and risk level
    Impact,
    /// Files ordered by import centrality
    Rank,
}

#[derive(Args)]
pub struct GraphArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// What to ask the graph
    #[arg(value_enum, value_name = "QUERY")]
    pub query: GraphQuery,

    /// Target file (fuzzy-resolved against the index); not used by `rank`
    #[arg(value_name = "FILE")]
    pub target: Option<String>,

    /// Overlay staged drafts on the indexed files before building the graph
    #[arg(long)]
    pub staged: bool,

    /// Maximum rows for `rank`
    #[arg(short = 'n', long, value_name = "N", default_value_t = 20)]
    pub limit: usize,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(args: GraphArgs) -> Result<()> {
    let project = Project::load(&args.project, &CliOverrides::default())?;
    let store = project.require_index()?;
    let denylist = &project.config.stdlib_denylist;

    let graph = if args.staged {
        let stage = StageArea::new(&project.root, &project.config);
        DependencyGraph::from_artifacts(&staged_artifacts(&project, &store, &stage)?, denylist)
    } else {
        DependencyGraph::try_from_index(&store, denylist)?
    };
    tracing::debug!("Graph: {} nodes, {} edges", graph.node_count(), graph.edge_count());

    if let GraphQuery::Rank = args.query {
        let ranked: Vec<(String, f64)> = graph.rank().into_iter().take(args.limit).collect();
        if args.json {
            return print_json(&ranked);
        }
        for (path, score) in ranked {
            println!("{:.4}  {}", score, path);
        }
        return Ok(());
    }

    let Some(fragment) = args.target.as_deref() else {
        anyhow::bail!("A target file is required for this query");
    };
    let target = FileResolver::from_store(&store)?.resolve_required(fragment)?.path;

    match args.query {
        GraphQuery::Callers => print_paths(&graph.callers(&target), args.json),
        GraphQuery::Deps => print_paths(&graph.dependencies(&target), args.json),
        GraphQuery::Impact => {
            let impact = graph.impact(&target);
            if args.json {
                return print_json(&impact);
            }
            println!("Target: {}", impact.target);
            println!("Risk: {}", impact.risk.as_str());
            println!("Direct callers: {}", impact.callers.len());
            for path in &impact.callers {
                println!("  {}", path);
            }
            println!("Transitively impacted: {}", impact.impacted.len());
            for path in &impact.impacted {
                println!("  {}", path);
            }
            Ok(())
        }
        GraphQuery::Rank => Ok(()),
    }
}

/// Indexed paths mapped to their staged draft if one exists, else disk
/// content. Staged files the index does not know yet are included too.
fn staged_artifacts(project: &Project, store: &IndexStore, stage: &StageArea) -> Result<BTreeMap<String, String>> {
    let pending = stage.pending_deletions()?;
    let mut artifacts = BTreeMap::new();
    for path in store.file_paths()?.into_iter().chain(stage.staged_files()?) {
        if artifacts.contains_key(&path) || pending.contains(&path) {
            continue;
        }
        let content = match stage.read_staged(&path)? {
            Some(staged) => staged,
            None => {
                let on_disk = project.root.join(&path);
                if !on_disk.is_file() {
                    continue;
                }
                read_source(&on_disk)?.0
            }
        };
        artifacts.insert(path, content);
    }
    Ok(artifacts)
}

fn print_paths(paths: &[String], json: bool) -> Result<()> {
    if json {
        return print_json(&paths);
    }
    for path in paths {
        println!("{}", path);
    }
    Ok(())
}
