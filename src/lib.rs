//! repo-splice: turn imprecise, generator-proposed code changes into safe file edits
//!
//! The crate holds the deterministic transformation substrate: a source index,
//! a dependency graph with import resolution, a fuzzy file resolver, two
//! definition-level tree engines, a three-tier patch engine, and the strategy
//! dispatcher that sequences them for every planned change.

pub mod config;
pub mod dispatch;
pub mod domain;
pub mod error;
pub mod generate;
pub mod graph;
pub mod index;
pub mod patch;
pub mod pipeline;
pub mod prompts;
pub mod resolve;
pub mod stage;
pub mod syntax;
pub mod utils;

pub use error::{SpliceError, SpliceResult};
