//! repo-splice: apply generator-proposed code changes to a repository
//!
//! This binary scans a project into a source index, answers dependency and
//! path-resolution queries, and executes change plans through the transformation
//! engines, staging the results for review before they are committed.

use anyhow::Result;

mod cli;

fn main() -> Result<()> {
    cli::run()
}
