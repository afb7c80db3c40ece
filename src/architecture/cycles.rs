//! Bounded simple-cycle enumeration over the file graph.
//!
//! For each start node `s`, in path order, the search only walks nodes that
//! sort after `s` and can reach `s` again through such nodes. Every simple
//! cycle is therefore found exactly once, from its smallest path, which is
//! also the rotation it is reported in.

use serde::{Deserialize, Serialize};

use crate::detect::Severity;
use crate::graph::DependencyGraph;

/// A dependency cycle between project files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cycle {
    /// Files in import order, starting at the smallest path. The edge from
    /// the last file back to the first is implied.
    pub files: Vec<String>,
    pub length: usize,
    /// The walk hit the length limit before closing; `files` is a prefix.
    #[serde(default)]
    pub truncated: bool,
    pub severity: Severity,
}

impl Cycle {
    fn new(files: Vec<String>, truncated: bool) -> Self {
        let length = files.len();
        let severity = if truncated {
            Severity::Low
        } else {
            cycle_severity(length)
        };
        Self {
            files,
            length,
            truncated,
            severity,
        }
    }

    /// `a.py -> b.py -> a.py`, or an open chain for truncated walks.
    pub fn chain(&self) -> String {
        let mut parts: Vec<&str> = self.files.iter().map(String::as_str).collect();
        match (self.truncated, self.files.first()) {
            (true, _) => parts.push("..."),
            (false, Some(first)) => parts.push(first),
            (false, None) => {}
        }
        parts.join(" -> ")
    }
}

/// Short cycles are the tightest coupling.
pub fn cycle_severity(length: usize) -> Severity {
    match length {
        0..=2 => Severity::High,
        3..=4 => Severity::Medium,
        _ => Severity::Low,
    }
}

/// Result of a bounded search.
#[derive(Debug, Clone, Default)]
pub struct CycleSearch {
    pub cycles: Vec<Cycle>,
    /// Enumeration stopped at the cycle limit.
    pub limited: bool,
}

struct Walk<'a> {
    successors: &'a [Vec<usize>],
    max_length: usize,
    max_cycles: usize,
    found: Vec<(Vec<usize>, bool)>,
    limited: bool,
}

impl Walk<'_> {
    fn record(&mut self, path: &[usize], truncated: bool) {
        if self.found.len() >= self.max_cycles {
            self.limited = true;
            return;
        }
        self.found.push((path.to_vec(), truncated));
    }

    fn extend(&mut self, start: usize, allowed: &[bool], path: &mut Vec<usize>, on_path: &mut [bool]) {
        let Some(&last) = path.last() else {
            return;
        };
        let successors = self.successors;
        let mut truncated = false;
        for &next in &successors[last] {
            if self.limited {
                return;
            }
            if next == start {
                self.record(path, false);
                continue;
            }
            if next < start || !allowed[next] || on_path[next] {
                continue;
            }
            if path.len() >= self.max_length {
                if !truncated {
                    truncated = true;
                    self.record(path, true);
                }
                continue;
            }
            path.push(next);
            on_path[next] = true;
            self.extend(start, allowed, path, on_path);
            path.pop();
            on_path[next] = false;
        }
    }
}

/// Nodes `>= start` that reach `start` through nodes `>= start`.
fn reaching(start: usize, predecessors: &[Vec<usize>]) -> Vec<bool> {
    let mut allowed = vec![false; predecessors.len()];
    allowed[start] = true;
    let mut stack = vec![start];
    while let Some(node) = stack.pop() {
        for &prev in &predecessors[node] {
            if prev > start && !allowed[prev] {
                allowed[prev] = true;
                stack.push(prev);
            }
        }
    }
    allowed
}

/// Enumerate simple cycles of at most `max_length` files, stopping after
/// `max_cycles` results.
pub fn find_cycles(graph: &DependencyGraph, max_length: usize, max_cycles: usize) -> CycleSearch {
    let nodes = &graph.nodes;
    let index = |path: &String| nodes.binary_search(path).ok();
    let successors: Vec<Vec<usize>> = nodes
        .iter()
        .map(|n| graph.successors(n).iter().filter_map(index).collect())
        .collect();
    let predecessors: Vec<Vec<usize>> = nodes
        .iter()
        .map(|n| graph.predecessors(n).iter().filter_map(index).collect())
        .collect();

    let mut walk = Walk {
        successors: &successors,
        max_length: max_length.max(2),
        max_cycles,
        found: Vec::new(),
        limited: false,
    };

    let mut on_path = vec![false; nodes.len()];
    for start in 0..nodes.len() {
        if walk.limited {
            break;
        }
        let allowed = reaching(start, &predecessors);
        if allowed.iter().filter(|a| **a).count() < 2 {
            continue;
        }
        let mut path = vec![start];
        on_path[start] = true;
        walk.extend(start, &allowed, &mut path, &mut on_path);
        on_path[start] = false;
    }

    CycleSearch {
        cycles: walk
            .found
            .into_iter()
            .map(|(path, truncated)| {
                Cycle::new(path.into_iter().map(|i| nodes[i].clone()).collect(), truncated)
            })
            .collect(),
        limited: walk.limited,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn graph(edges: &[(&str, &str)]) -> DependencyGraph {
        DependencyGraph::from_edges(
            Vec::new(),
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
    fn test_three_file_cycle_is_one_cycle() {
        let g = graph(&[("b.py", "c.py"), ("c.py", "a.py"), ("a.py", "b.py")]);
        let search = find_cycles(&g, 8, 100);
        assert_eq!(search.cycles.len(), 1);
        assert_eq!(search.cycles[0].files, vec!["a.py", "b.py", "c.py"]);
        assert_eq!(search.cycles[0].severity, Severity::Medium);
        assert_eq!(search.cycles[0].chain(), "a.py -> b.py -> c.py -> a.py");
        assert!(!search.limited);
    }

    #[test]
    fn test_overlapping_cycles() {
        let g = graph(&[
            ("a.py", "b.py"),
            ("b.py", "a.py"),
            ("b.py", "c.py"),
            ("c.py", "a.py"),
            ("d.py", "a.py"),
        ]);
        let search = find_cycles(&g, 8, 100);
        let files: Vec<Vec<String>> = search.cycles.iter().map(|c| c.files.clone()).collect();
        assert_eq!(
            files,
            vec![
                vec!["a.py".to_string(), "b.py".to_string()],
                vec!["a.py".to_string(), "b.py".to_string(), "c.py".to_string()],
            ]
        );
        assert_eq!(search.cycles[0].severity, Severity::High);
    }

    #[test]
    fn test_acyclic_graph() {
        let g = graph(&[("a.py", "b.py"), ("b.py", "c.py"), ("a.py", "c.py")]);
        assert!(find_cycles(&g, 8, 100).cycles.is_empty());
    }

    #[test]
    fn test_long_cycles_are_truncated() {
        let g = graph(&[("a.py", "b.py"), ("b.py", "c.py"), ("c.py", "a.py")]);
        let search = find_cycles(&g, 2, 100);
        assert_eq!(search.cycles.len(), 1);
        assert!(search.cycles[0].truncated);
        assert_eq!(search.cycles[0].files, vec!["a.py", "b.py"]);
        assert_eq!(search.cycles[0].chain(), "a.py -> b.py -> ...");
    }

    #[test]
    fn test_cycle_limit() {
        let g = graph(&[
            ("a.py", "b.py"),
            ("b.py", "a.py"),
            ("c.py", "d.py"),
            ("d.py", "c.py"),
        ]);
        let search = find_cycles(&g, 8, 1);
        assert_eq!(search.cycles.len(), 1);
        assert!(search.limited);
    }
}
