//! Dependency graph: module naming, import resolution, and graph queries.

pub mod dependency;
pub mod module_index;
pub mod rank;

pub use dependency::{DependencyGraph, ImpactSummary, RiskLevel};
pub use module_index::ModuleIndex;
