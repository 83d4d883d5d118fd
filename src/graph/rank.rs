//! PageRank over the file dependency graph.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

pub const DEFAULT_DAMPING: f64 = 0.85;
pub const DEFAULT_EPSILON: f64 = 1e-6;
const MAX_ITERATIONS: usize = 200;

/// Power iteration with dangling-node redistribution. Scores sum to 1 and are
/// returned in node-index order.
pub fn pagerank<N, E>(graph: &DiGraph<N, E>, damping: f64, epsilon: f64) -> Vec<f64> {
    let count = graph.node_count();
    if count == 0 {
        return Vec::new();
    }
    let n = count as f64;
    let out_degree: Vec<usize> = graph
        .node_indices()
        .map(|node| graph.neighbors_directed(node, Direction::Outgoing).count())
        .collect();

    let mut scores = vec![1.0 / n; count];
    for _ in 0..MAX_ITERATIONS {
        let dangling_mass: f64 =
            (0..count).filter(|&i| out_degree[i] == 0).map(|i| scores[i]).sum();
        let base = (1.0 - damping) / n + damping * dangling_mass / n;
        let mut next = vec![base; count];

        for edge in graph.raw_edges() {
            let source = edge.source().index();
            let target = edge.target().index();
            next[target] += damping * scores[source] / out_degree[source] as f64;
        }

        let delta: f64 = next.iter().zip(&scores).map(|(a, b)| (a - b).abs()).sum();
        scores = next;
        if delta <= epsilon {
            break;
        }
    }
    scores
}

/// Node weights paired with their score, highest first; ties keep node order.
pub fn ranked<N: Clone, E>(graph: &DiGraph<N, E>) -> Vec<(N, f64)> {
    let scores = pagerank(graph, DEFAULT_DAMPING, DEFAULT_EPSILON);
    let mut out: Vec<(NodeIndex, f64)> =
        graph.node_indices().map(|idx| (idx, scores[idx.index()])).collect();
    out.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    out.into_iter().map(|(idx, score)| (graph[idx].clone(), score)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shared_dependency_ranks_highest() {
        let mut graph: DiGraph<&str, ()> = DiGraph::new();
        let a = graph.add_node("a");
        let b = graph.add_node("b");
        let core = graph.add_node("core");
        graph.add_edge(a, core, ());
        graph.add_edge(b, core, ());

        let scores = pagerank(&graph, DEFAULT_DAMPING, DEFAULT_EPSILON);
        let total: f64 = scores.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(scores[core.index()] > scores[a.index()]);

        let ranked = ranked(&graph);
        assert_eq!(ranked[0].0, "core");
    }

    #[test]
    fn empty_graph_has_no_scores() {
        let graph: DiGraph<String, ()> = DiGraph::new();
        assert!(pagerank(&graph, DEFAULT_DAMPING, DEFAULT_EPSILON).is_empty());
    }
}
