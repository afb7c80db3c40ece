//! Coupling scores and the project coupling summary.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::round2;
use crate::config::CouplingWeights;
use crate::graph::DependencyGraph;

/// Files listed in the stability rankings.
pub const RANKED_FILES: usize = 5;

/// Density above which the project counts as tightly coupled.
pub const DENSITY_PENALTY_THRESHOLD: f64 = 0.3;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CouplingSummary {
    /// Edges over the `n * (n - 1)` possible edges.
    pub density: f64,
    pub avg_fan_in: f64,
    pub avg_fan_out: f64,
    pub max_fan_in: usize,
    pub total_dependencies: usize,
    pub assessment: String,
    /// `fan_out / (fan_in + fan_out)` per file, 0.5 for isolated files.
    pub instability: BTreeMap<String, f64>,
    pub most_unstable: Vec<String>,
    pub most_stable: Vec<String>,
}

/// Weighted coupling score per graph node. `cycle_counts` holds the number
/// of complete cycles each file sits in.
pub fn coupling_scores(
    graph: &DependencyGraph,
    cycle_counts: &BTreeMap<&str, usize>,
    weights: &CouplingWeights,
) -> BTreeMap<String, f64> {
    graph
        .nodes
        .iter()
        .map(|node| {
            let (fan_in, fan_out) = graph.fan(node);
            let cycles = cycle_counts.get(node.as_str()).copied().unwrap_or(0);
            let score = weights.fan_in * fan_in as f64
                + weights.fan_out * fan_out as f64
                + weights.cycle * cycles as f64;
            (node.clone(), round2(score))
        })
        .collect()
}

fn instability(fan_in: usize, fan_out: usize) -> f64 {
    match fan_in + fan_out {
        0 => 0.5,
        total => round2(fan_out as f64 / total as f64),
    }
}

fn assessment(nodes: usize, density: f64) -> &'static str {
    if nodes == 0 {
        "No files to analyze"
    } else if density > 0.5 {
        "Highly coupled: modules are tightly interconnected"
    } else if density > DENSITY_PENALTY_THRESHOLD {
        "Moderately coupled: consider reducing dependencies"
    } else if density > 0.1 {
        "Loosely coupled: good separation"
    } else {
        "Very loosely coupled: modules are independent"
    }
}

pub fn summarize(graph: &DependencyGraph) -> CouplingSummary {
    let n = graph.node_count();
    let edges = graph.edge_count();
    let density = if n > 1 {
        ((edges as f64 / (n * (n - 1)) as f64) * 1000.0).round() / 1000.0
    } else {
        0.0
    };

    let fans: Vec<(&String, usize, usize)> = graph
        .nodes
        .iter()
        .map(|node| {
            let (fan_in, fan_out) = graph.fan(node);
            (node, fan_in, fan_out)
        })
        .collect();
    let (sum_in, sum_out) = fans
        .iter()
        .fold((0, 0), |(i, o), (_, fan_in, fan_out)| (i + fan_in, o + fan_out));
    let average = |sum: usize| if n == 0 { 0.0 } else { round2(sum as f64 / n as f64) };

    let by_file: BTreeMap<String, f64> = fans
        .iter()
        .map(|(node, fan_in, fan_out)| ((*node).clone(), instability(*fan_in, *fan_out)))
        .collect();

    // Isolated files have no meaningful stability.
    let mut connected: Vec<(&String, f64)> = fans
        .iter()
        .filter(|(_, fan_in, fan_out)| fan_in + fan_out > 0)
        .map(|(node, fan_in, fan_out)| (*node, instability(*fan_in, *fan_out)))
        .collect();
    connected.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    let most_unstable = connected
        .iter()
        .take(RANKED_FILES)
        .map(|(node, _)| (*node).clone())
        .collect();
    connected.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    let most_stable = connected
        .iter()
        .take(RANKED_FILES)
        .map(|(node, _)| (*node).clone())
        .collect();

    CouplingSummary {
        density,
        avg_fan_in: average(sum_in),
        avg_fan_out: average(sum_out),
        max_fan_in: fans.iter().map(|(_, fan_in, _)| *fan_in).max().unwrap_or(0),
        total_dependencies: edges,
        assessment: assessment(n, density).to_string(),
        instability: by_file,
        most_unstable,
        most_stable,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        DependencyGraph::from_edges(
            nodes.iter().map(|s| s.to_string()).collect(),
            edges
                .iter()
                .map(|(s, t)| Edge {
                    source: s.to_string(),
                    target: t.to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_summary() {
        let g = graph(
            &["a.py", "b.py", "c.py", "d.py"],
            &[("a.py", "c.py"), ("b.py", "c.py"), ("c.py", "a.py")],
        );
        let summary = summarize(&g);
        // 3 of 12 possible edges
        assert_eq!(summary.density, 0.25);
        assert_eq!(summary.avg_fan_in, 0.75);
        assert_eq!(summary.max_fan_in, 2);
        assert_eq!(summary.total_dependencies, 3);
        assert_eq!(summary.instability["b.py"], 1.0);
        assert_eq!(summary.instability["c.py"], 0.33);
        assert_eq!(summary.instability["d.py"], 0.5);
        assert_eq!(summary.most_unstable, vec!["b.py", "a.py", "c.py"]);
        assert_eq!(summary.most_stable, vec!["c.py", "a.py", "b.py"]);
        assert!(summary.assessment.starts_with("Loosely coupled"));
    }

    #[test]
    fn test_empty_graph() {
        let summary = summarize(&DependencyGraph::default());
        assert_eq!(summary.density, 0.0);
        assert_eq!(summary.avg_fan_out, 0.0);
        assert_eq!(summary.assessment, "No files to analyze");
    }

    #[test]
    fn test_coupling_scores_weight_cycle_membership() {
        let g = graph(&["a.py", "b.py", "c.py"], &[("a.py", "b.py"), ("b.py", "a.py"), ("c.py", "a.py")]);
        let counts: BTreeMap<&str, usize> = [("a.py", 1), ("b.py", 1)].into_iter().collect();
        let scores = coupling_scores(&g, &counts, &CouplingWeights::default());
        assert_eq!(scores["a.py"], 5.0);
        assert_eq!(scores["b.py"], 4.0);
        assert_eq!(scores["c.py"], 1.0);
    }

    #[test]
    fn test_coupling_scores_count_every_cycle() {
        let g = graph(
            &["a.py", "b.py", "c.py", "d.py", "e.py"],
            &[
                ("a.py", "b.py"),
                ("b.py", "a.py"),
                ("a.py", "c.py"),
                ("c.py", "a.py"),
                ("d.py", "e.py"),
                ("e.py", "d.py"),
            ],
        );
        let counts: BTreeMap<&str, usize> =
            [("a.py", 2), ("b.py", 1), ("c.py", 1), ("d.py", 1), ("e.py", 1)].into_iter().collect();
        let scores = coupling_scores(&g, &counts, &CouplingWeights::default());
        // 2 in + 2 out + 2 * 2 cycles
        assert_eq!(scores["a.py"], 8.0);
        assert_eq!(scores["d.py"], 4.0);
        assert_eq!(scores["b.py"], 4.0);
    }
}
