//! File-level dependency graph and fan-in/fan-out metrics.
//!
//! Nodes are project-relative file paths; an edge `A -> B` exists iff a
//! file imports a module that resolves to another project file. Imports of
//! external packages, or of paths that do not exist, never become edges.
//! Every collection here is ordered, so the graph is identical for the same
//! set of facts regardless of the order they were produced in.

mod resolve;

pub use resolve::ModuleIndex;

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::analysis::FileFact;

/// A directed dependency between two project files.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

/// Degree information for one node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FanMetrics {
    pub fan_in: usize,
    pub fan_out: usize,
    /// Files this file imports.
    pub depends_on: Vec<String>,
    /// Files importing this file.
    pub depended_by: Vec<String>,
}

/// The project dependency graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencyGraph {
    pub nodes: Vec<String>,
    pub edges: Vec<Edge>,
    pub fan_metrics: BTreeMap<String, FanMetrics>,
    /// Top-level names of absolute imports that did not resolve.
    pub external_modules: Vec<String>,
    /// Import statements that produced no internal edge.
    pub unresolved_count: usize,
}

impl DependencyGraph {
    /// Resolve every import in `files` and build the graph.
    ///
    /// This is the last step of the extraction run that owns `files`: the
    /// `resolved` field of each import is filled in here, before the facts
    /// are handed to any other stage.
    pub fn build(files: &mut [FileFact]) -> Self {
        let index = ModuleIndex::build(files);

        let mut adjacency: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        let mut external = BTreeSet::new();
        let mut unresolved = 0;

        for i in 0..files.len() {
            let resolutions: Vec<Vec<String>> = files[i]
                .imports
                .iter()
                .map(|import| index.resolve(&files[i], import))
                .collect();

            let file = &mut files[i];
            let targets = adjacency.entry(file.path.clone()).or_default();
            for (import, resolved) in file.imports.iter_mut().zip(resolutions) {
                if resolved.is_empty() {
                    unresolved += 1;
                    if !import.is_relative() {
                        if let Some(top) = import.module.split('.').next() {
                            external.insert(top.to_string());
                        }
                    }
                }
                targets.extend(resolved.iter().cloned());
                import.resolved = resolved;
            }
        }

        let edges: Vec<Edge> = adjacency
            .iter()
            .flat_map(|(source, targets)| {
                targets.iter().filter(move |t| *t != source).map(move |target| Edge {
                    source: source.clone(),
                    target: target.clone(),
                })
            })
            .collect();

        Self::from_parts(adjacency.keys().cloned().collect(), edges, external, unresolved)
    }

    /// Assemble a graph from nodes and edges, deriving fan metrics.
    pub fn from_edges(nodes: Vec<String>, edges: Vec<Edge>) -> Self {
        Self::from_parts(nodes, edges, BTreeSet::new(), 0)
    }

    fn from_parts(
        nodes: Vec<String>,
        edges: Vec<Edge>,
        external: BTreeSet<String>,
        unresolved_count: usize,
    ) -> Self {
        let mut node_set: BTreeSet<String> = nodes.into_iter().collect();
        let edge_set: BTreeSet<Edge> = edges.into_iter().filter(|e| e.source != e.target).collect();
        for edge in &edge_set {
            node_set.insert(edge.source.clone());
            node_set.insert(edge.target.clone());
        }

        let mut fan_metrics: BTreeMap<String, FanMetrics> = node_set
            .iter()
            .map(|n| (n.clone(), FanMetrics::default()))
            .collect();
        for edge in &edge_set {
            if let Some(m) = fan_metrics.get_mut(&edge.source) {
                m.depends_on.push(edge.target.clone());
            }
            if let Some(m) = fan_metrics.get_mut(&edge.target) {
                m.depended_by.push(edge.source.clone());
            }
        }
        for m in fan_metrics.values_mut() {
            m.depends_on.sort();
            m.depended_by.sort();
            m.fan_out = m.depends_on.len();
            m.fan_in = m.depended_by.len();
        }

        Self {
            nodes: node_set.into_iter().collect(),
            edges: edge_set.into_iter().collect(),
            fan_metrics,
            external_modules: external.into_iter().collect(),
            unresolved_count,
        }
    }

    pub fn successors(&self, path: &str) -> &[String] {
        self.fan_metrics
            .get(path)
            .map(|m| m.depends_on.as_slice())
            .unwrap_or(&[])
    }

    pub fn predecessors(&self, path: &str) -> &[String] {
        self.fan_metrics
            .get(path)
            .map(|m| m.depended_by.as_slice())
            .unwrap_or(&[])
    }

    /// (fan-in, fan-out) of a node; zero for unknown paths.
    pub fn fan(&self, path: &str) -> (usize, usize) {
        self.fan_metrics
            .get(path)
            .map(|m| (m.fan_in, m.fan_out))
            .unwrap_or((0, 0))
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::ImportRef;

    fn file(path: &str, imports: &[(&str, &[&str])]) -> FileFact {
        let mut f = FileFact::empty(path);
        f.imports = imports
            .iter()
            .enumerate()
            .map(|(i, (module, names))| ImportRef {
                module: module.to_string(),
                names: names.iter().map(|s| s.to_string()).collect(),
                level: module.chars().take_while(|c| *c == '.').count(),
                line: i + 1,
                resolved: Vec::new(),
            })
            .collect();
        f
    }

    #[test]
    fn test_build_graph_collapses_duplicates_and_self_edges() {
        let mut files = vec![
            file("app/models.py", &[("app.models", &[]), ("json", &[])]),
            file(
                "app/routes.py",
                &[("app.models", &["Task"]), ("app.models", &["Status"]), (".models", &["Priority"])],
            ),
            file("app/utils.py", &[("os.path", &[])]),
        ];
        let graph = DependencyGraph::build(&mut files);

        assert_eq!(graph.nodes, vec!["app/models.py", "app/routes.py", "app/utils.py"]);
        assert_eq!(
            graph.edges,
            vec![Edge {
                source: "app/routes.py".to_string(),
                target: "app/models.py".to_string()
            }]
        );
        assert_eq!(graph.fan("app/models.py"), (1, 0));
        assert_eq!(graph.fan("app/routes.py"), (0, 1));
        assert_eq!(graph.fan("app/utils.py"), (0, 0));
        assert_eq!(graph.external_modules, vec!["json", "os"]);
        assert_eq!(files[1].imports[0].resolved, vec!["app/models.py"]);
        assert!(files[0].imports[1].resolved.is_empty());
    }

    #[test]
    fn test_build_is_order_independent() {
        let make = || {
            vec![
                file("a.py", &[("b", &[]), ("c", &[])]),
                file("b.py", &[("c", &[])]),
                file("c.py", &[("a", &[])]),
            ]
        };
        let mut forward = make();
        let mut reversed = make();
        reversed.reverse();

        let g1 = DependencyGraph::build(&mut forward);
        let g2 = DependencyGraph::build(&mut reversed);
        assert_eq!(g1, g2);
        assert_eq!(g1.edge_count(), 4);
    }

    #[test]
    fn test_from_edges_drops_self_loops() {
        let graph = DependencyGraph::from_edges(
            vec!["a.py".to_string()],
            vec![
                Edge { source: "a.py".to_string(), target: "a.py".to_string() },
                Edge { source: "a.py".to_string(), target: "b.py".to_string() },
                Edge { source: "a.py".to_string(), target: "b.py".to_string() },
            ],
        );
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.successors("a.py"), ["b.py".to_string()]);
        assert_eq!(graph.predecessors("b.py"), ["a.py".to_string()]);
    }
}
