//! File-to-file import graph and the caller/dependency/impact queries on it.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use serde::Serialize;

use crate::domain::{ImportEdge, ImportRecord};
use crate::error::{SpliceError, SpliceResult};
use crate::graph::module_index::ModuleIndex;
use crate::graph::rank;
use crate::index::IndexStore;
use crate::syntax::structural;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_impacted(count: usize) -> Self {
        match count {
            0..=2 => RiskLevel::Low,
            3..=9 => RiskLevel::Medium,
            _ => RiskLevel::High,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

/// Everything a change to `target` could touch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImpactSummary {
    pub target: String,
    pub callers: Vec<String>,
    pub dependencies: Vec<String>,
    pub impacted: Vec<String>,
    pub risk: RiskLevel,
    pub graph_built: bool,
}

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    edges: Vec<ImportEdge>,
    unresolved: Vec<ImportEdge>,
    built: bool,
}

impl DependencyGraph {
    /// A graph that was never built; every query answers empty.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from file paths plus (importer, raw import) pairs. Imports of
    /// modules on `denylist` are dropped from the unresolved diagnostics.
    pub fn build<P, S>(paths: P, imports: &[(String, ImportRecord)], denylist: &[String]) -> Self
    where
        P: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let paths: Vec<String> = paths.into_iter().map(|p| p.as_ref().to_string()).collect();
        let modules = ModuleIndex::build(&paths);

        let mut graph = DiGraph::new();
        let mut nodes = HashMap::with_capacity(paths.len());
        for path in &paths {
            nodes.entry(path.clone()).or_insert_with(|| graph.add_node(path.clone()));
        }

        let mut edges = Vec::new();
        let mut unresolved = Vec::new();
        for (source, record) in imports {
            let resolved = modules.resolve(&record.module).map(str::to_string);
            let edge = ImportEdge {
                source_path: source.clone(),
                raw: record.module.clone(),
                resolved: resolved.clone(),
            };
            match resolved {
                Some(target) if &target == source => {
                    tracing::trace!("Dropping self-import {} in {}", record.module, source);
                }
                Some(target) => {
                    let (Some(&from), Some(&to)) = (nodes.get(source), nodes.get(&target)) else {
                        continue;
                    };
                    graph.update_edge(from, to, ());
                    edges.push(edge);
                }
                None => {
                    let root = record.module.split('.').next().unwrap_or("");
                    if !denylist.iter().any(|d| d == root) {
                        unresolved.push(edge);
                    }
                }
            }
        }

        tracing::debug!(
            "Dependency graph: {} files, {} edges, {} unresolved imports",
            graph.node_count(),
            graph.edge_count(),
            unresolved.len()
        );
        Self { graph, nodes, edges, unresolved, built: true }
    }

    pub fn try_from_index(store: &IndexStore, denylist: &[String]) -> SpliceResult<Self> {
        let paths = store.file_paths().map_err(|e| SpliceError::GraphBuild(e.to_string()))?;
        let imports = store.imports().map_err(|e| SpliceError::GraphBuild(e.to_string()))?;
        Ok(Self::build(paths, &imports, denylist))
    }

    /// Build from the persisted index, degrading to an unbuilt graph when the
    /// index cannot be read.
    pub fn from_index(store: &IndexStore, denylist: &[String]) -> Self {
        match Self::try_from_index(store, denylist) {
            Ok(graph) => graph,
            Err(e) => {
                tracing::warn!("{}; impact analysis disabled for this run", e);
                Self::empty()
            }
        }
    }

    /// Build from draft content (path → source) that is not in the index yet.
    /// Files that fail to parse contribute a node but no edges.
    pub fn from_artifacts(artifacts: &BTreeMap<String, String>, denylist: &[String]) -> Self {
        let mut imports = Vec::new();
        for (path, content) in artifacts {
            if !path.ends_with(".py") {
                continue;
            }
            match structural::import_records(content, path) {
                Ok(records) => imports.extend(records.into_iter().map(|r| (path.clone(), r))),
                Err(e) => tracing::debug!("Skipping imports of {}: {}", path, e),
            }
        }
        Self::build(artifacts.keys(), &imports, denylist)
    }

    pub fn is_built(&self) -> bool {
        self.built
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.nodes.contains_key(path)
    }

    pub fn edges(&self) -> &[ImportEdge] {
        &self.edges
    }

    pub fn unresolved(&self) -> &[ImportEdge] {
        &self.unresolved
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.nodes.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<String> =
            self.graph.neighbors_directed(idx, direction).map(|n| self.graph[n].clone()).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Files that import `path` directly.
    pub fn callers(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    /// Files `path` imports directly.
    pub fn dependencies(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Every file that reaches `path` through imports, excluding `path`.
    pub fn ancestors(&self, path: &str) -> BTreeSet<String> {
        let mut seen = BTreeSet::new();
        let Some(&start) = self.nodes.get(path) else {
            return seen;
        };
        let mut queue = VecDeque::from([start]);
        let mut visited = vec![false; self.graph.node_count()];
        visited[start.index()] = true;
        while let Some(node) = queue.pop_front() {
            for caller in self.graph.neighbors_directed(node, Direction::Incoming) {
                if !visited[caller.index()] {
                    visited[caller.index()] = true;
                    seen.insert(self.graph[caller].clone());
                    queue.push_back(caller);
                }
            }
        }
        seen
    }

    pub fn impact(&self, path: &str) -> ImpactSummary {
        let impacted: Vec<String> = self.ancestors(path).into_iter().collect();
        ImpactSummary {
            target: path.to_string(),
            callers: self.callers(path),
            dependencies: self.dependencies(path),
            risk: RiskLevel::from_impacted(impacted.len()),
            impacted,
            graph_built: self.built,
        }
    }

    /// Files by structural importance, most central first.
    pub fn rank(&self) -> Vec<(String, f64)> {
        rank::ranked(&self.graph)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn imports(pairs: &[(&str, &str)]) -> Vec<(String, ImportRecord)> {
        pairs
            .iter()
            .map(|(src, module)| {
                (src.to_string(), ImportRecord { module: module.to_string(), alias: None })
            })
            .collect()
    }

    fn denylist() -> Vec<String> {
        vec!["os".to_string(), "typing".to_string()]
    }

    #[test]
    fn peel_back_never_falls_through_to_package() {
        let graph = DependencyGraph::build(
            ["pkg/__init__.py", "pkg/mod.py", "app.py"],
            &imports(&[("app.py", "pkg.mod.Class")]),
            &denylist(),
        );
        assert_eq!(graph.dependencies("app.py"), vec!["pkg/mod.py"]);
    }

    #[test]
    fn imports_resolve_to_python_source_not_same_stem_data_file() {
        let graph = DependencyGraph::build(
            ["app.py", "config.json", "config.py"],
            &imports(&[("app.py", "config")]),
            &denylist(),
        );
        assert_eq!(graph.dependencies("app.py"), vec!["config.py"]);
        assert!(graph.callers("config.json").is_empty());
    }

    #[test]
    fn self_imports_never_become_edges() {
        let graph = DependencyGraph::build(
            ["pkg/mod.py"],
            &imports(&[("pkg/mod.py", "pkg.mod.helper")]),
            &denylist(),
        );
        assert_eq!(graph.edge_count(), 0);
        assert!(graph.callers("pkg/mod.py").is_empty());
    }

    #[test]
    fn ancestors_are_transitive() {
        let graph = DependencyGraph::build(
            ["a.py", "b.py", "c.py"],
            &imports(&[("a.py", "b"), ("b.py", "c"), ("c.py", "os.path")]),
            &denylist(),
        );
        let expected: BTreeSet<String> = ["a.py", "b.py"].iter().map(|s| s.to_string()).collect();
        assert_eq!(graph.ancestors("c.py"), expected);
        assert_eq!(graph.callers("c.py"), vec!["b.py"]);
        assert!(graph.unresolved().is_empty());

        let impact = graph.impact("c.py");
        assert_eq!(impact.impacted, vec!["a.py", "b.py"]);
        assert_eq!(impact.risk, RiskLevel::Low);
    }

    #[test]
    fn unresolved_imports_outside_denylist_are_reported() {
        let graph = DependencyGraph::build(
            ["a.py"],
            &imports(&[("a.py", "requests.get"), ("a.py", "typing.List")]),
            &denylist(),
        );
        let raw: Vec<&str> = graph.unresolved().iter().map(|e| e.raw.as_str()).collect();
        assert_eq!(raw, vec!["requests.get"]);
    }

    #[test]
    fn unbuilt_graph_answers_empty() {
        let graph = DependencyGraph::empty();
        assert!(!graph.is_built());
        let impact = graph.impact("anything.py");
        assert!(impact.impacted.is_empty());
        assert!(!impact.graph_built);
    }

    #[test]
    fn artifact_map_builds_from_draft_content() {
        let mut artifacts = BTreeMap::new();
        artifacts.insert("pkg/__init__.py".to_string(), String::new());
        artifacts.insert("pkg/models.py".to_string(), "from .util import slug\n".to_string());
        artifacts.insert("pkg/util.py".to_string(), "def slug():\n    pass\n".to_string());
        artifacts.insert("broken.py".to_string(), "def (:\n".to_string());

        let graph = DependencyGraph::from_artifacts(&artifacts, &denylist());
        assert_eq!(graph.callers("pkg/util.py"), vec!["pkg/models.py"]);
        assert!(graph.contains("broken.py"));
    }

    #[test]
    fn risk_thresholds() {
        assert_eq!(RiskLevel::from_impacted(2), RiskLevel::Low);
        assert_eq!(RiskLevel::from_impacted(3), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_impacted(10), RiskLevel::High);
    }
}
