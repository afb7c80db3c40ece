//! Graph-level architecture reasoning over an analysis report.
//!
//! ```text
//! AnalysisReport ──► cycles ────────┐
//!   (graph, facts)   hotspots ──────┤
//!                    coupling ──────┼──► score + recommendations
//!                    concerns ──────┤
//!                    pattern ───────┘
//! ```
//!
//! Every stage reads the graph and facts as published by the extractor and
//! never changes them.

mod concerns;
mod coupling;
mod cycles;
mod hotspots;
mod pattern;
mod recommend;

pub use concerns::{file_concerns, find_concern_mixes, ConcernMix};
pub use coupling::{coupling_scores, summarize as coupling_summary, CouplingSummary};
pub use cycles::{cycle_severity, find_cycles, Cycle, CycleSearch};
pub use hotspots::{find_bottlenecks, find_god_modules, nearest_rank, Bottleneck, GodModule};
pub use pattern::{detect_pattern, ArchitecturePattern, PatternKind};
pub use recommend::{recommend, Recommendation};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::analysis::{AnalysisReport, FileFact};
use crate::config::ArchitectureConfig;
use crate::graph::DependencyGraph;
use crate::score::{grade, Grade};

/// Points lost per issue and the cap for each issue type.
pub mod penalties {
    pub const CYCLE: u32 = 5;
    pub const CYCLE_CAP: u32 = 25;
    pub const GOD_MODULE: u32 = 10;
    pub const GOD_MODULE_CAP: u32 = 30;
    pub const BOTTLENECK: u32 = 5;
    pub const BOTTLENECK_CAP: u32 = 20;
    pub const CONCERN_MIX: u32 = 3;
    pub const CONCERN_MIX_CAP: u32 = 15;
    pub const DENSE_COUPLING: u32 = 10;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Penalty {
    pub count: usize,
    pub penalty: u32,
}

impl Penalty {
    fn capped(count: usize, each: u32, cap: u32) -> Self {
        let penalty = (count.min(cap as usize) as u32 * each).min(cap);
        Self { count, penalty }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub cycles: Penalty,
    pub god_modules: Penalty,
    pub bottlenecks: Penalty,
    pub concern_separation: Penalty,
    pub coupling: Penalty,
}

impl ScoreBreakdown {
    pub fn total(&self) -> u32 {
        self.cycles.penalty
            + self.god_modules.penalty
            + self.bottlenecks.penalty
            + self.concern_separation.penalty
            + self.coupling.penalty
    }

    pub fn score(&self) -> u32 {
        100u32.saturating_sub(self.total())
    }
}

/// The Architecture Reasoner's output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchitectureReport {
    pub project: String,
    pub analyzed_at: DateTime<Utc>,
    pub pattern: ArchitecturePattern,
    pub architecture_score: u32,
    pub architecture_grade: Grade,
    pub score_breakdown: ScoreBreakdown,
    /// Complete cycles, each starting at its smallest path.
    pub cycles: Vec<Vec<String>>,
    pub cycle_details: Vec<Cycle>,
    #[serde(default)]
    pub cycles_limited: bool,
    pub god_modules: Vec<String>,
    pub god_module_details: Vec<GodModule>,
    pub coupling_scores: BTreeMap<String, f64>,
    pub coupling: CouplingSummary,
    pub bottlenecks: Vec<Bottleneck>,
    pub concern_separation: Vec<ConcernMix>,
    pub recommendations: Vec<String>,
    pub recommendation_details: Vec<Recommendation>,
    pub summary: String,
}

impl ArchitectureReport {
    /// Cycles that closed within the length limit.
    pub fn complete_cycles(&self) -> impl Iterator<Item = &Cycle> {
        self.cycle_details.iter().filter(|c| !c.truncated)
    }
}

pub struct ArchitectureReasoner {
    config: ArchitectureConfig,
}

impl ArchitectureReasoner {
    pub fn new(config: ArchitectureConfig) -> Self {
        Self { config }
    }

    pub fn analyze(&self, analysis: &AnalysisReport) -> ArchitectureReport {
        self.reason(
            &analysis.project,
            &analysis.file_analyses,
            &analysis.dependency_graph,
        )
    }

    /// Reason over facts and a graph built from them.
    pub fn reason(&self, project: &str, files: &[FileFact], graph: &DependencyGraph) -> ArchitectureReport {
        let config = &self.config;

        let search = find_cycles(graph, config.max_cycle_length, config.max_cycles);
        let complete: Vec<&Cycle> = search.cycles.iter().filter(|c| !c.truncated).collect();
        debug!(
            cycles = complete.len(),
            truncated = search.cycles.len() - complete.len(),
            limited = search.limited,
            "cycle search"
        );

        let mut cycle_counts: BTreeMap<&str, usize> = BTreeMap::new();
        for file in complete.iter().flat_map(|c| c.files.iter()) {
            *cycle_counts.entry(file.as_str()).or_default() += 1;
        }
        let coupling_scores = coupling_scores(graph, &cycle_counts, &config.coupling_weights);
        let coupling = coupling::summarize(graph);

        let god_modules = find_god_modules(files, graph, config);
        let bottlenecks = find_bottlenecks(files, graph, config);
        let concerns = find_concern_mixes(files);
        let pattern = detect_pattern(files.iter().map(|f| f.path.as_str()));
        debug!(
            god_modules = god_modules.len(),
            bottlenecks = bottlenecks.len(),
            concern_mixes = concerns.len(),
            pattern = %pattern.pattern,
            "architecture hotspots"
        );

        let dense = coupling.density > coupling::DENSITY_PENALTY_THRESHOLD;
        let breakdown = ScoreBreakdown {
            cycles: Penalty::capped(complete.len(), penalties::CYCLE, penalties::CYCLE_CAP),
            god_modules: Penalty::capped(
                god_modules.len(),
                penalties::GOD_MODULE,
                penalties::GOD_MODULE_CAP,
            ),
            bottlenecks: Penalty::capped(
                bottlenecks.len(),
                penalties::BOTTLENECK,
                penalties::BOTTLENECK_CAP,
            ),
            concern_separation: Penalty::capped(
                concerns.len(),
                penalties::CONCERN_MIX,
                penalties::CONCERN_MIX_CAP,
            ),
            coupling: Penalty {
                count: usize::from(dense),
                penalty: if dense { penalties::DENSE_COUPLING } else { 0 },
            },
        };
        let score = breakdown.score();

        let details = recommend(&search.cycles, &god_modules, &bottlenecks, &concerns);
        let summary = narrative(score, &pattern, complete.len(), &god_modules, &bottlenecks, &concerns);

        ArchitectureReport {
            project: project.to_string(),
            analyzed_at: Utc::now(),
            architecture_score: score,
            architecture_grade: grade(score),
            score_breakdown: breakdown,
            cycles: complete.iter().map(|c| c.files.clone()).collect(),
            cycles_limited: search.limited,
            god_modules: god_modules.iter().map(|g| g.file.clone()).collect(),
            god_module_details: god_modules,
            coupling_scores,
            coupling,
            bottlenecks,
            concern_separation: concerns,
            recommendations: details.iter().map(Recommendation::render).collect(),
            recommendation_details: details,
            summary,
            pattern,
            cycle_details: search.cycles,
        }
    }
}

impl Default for ArchitectureReasoner {
    fn default() -> Self {
        Self::new(ArchitectureConfig::default())
    }
}

fn narrative(
    score: u32,
    pattern: &ArchitecturePattern,
    cycles: usize,
    god_modules: &[GodModule],
    bottlenecks: &[Bottleneck],
    concerns: &[ConcernMix],
) -> String {
    let health = if score >= 90 {
        "Strong architectural health."
    } else if score >= 75 {
        "Generally sound with room for targeted improvements."
    } else if score >= 60 {
        "Several architectural concerns need attention."
    } else {
        "Significant architectural issues; prioritize refactoring."
    };
    format!(
        "Architecture score {}/100 (grade {}), {} layout ({:.0}% confidence). {} {} cycles, {} god modules, {} bottlenecks, {} mixed-concern modules.",
        score,
        grade(score),
        pattern.pattern,
        pattern.confidence * 100.0,
        health,
        cycles,
        god_modules.len(),
        bottlenecks.len(),
        concerns.len()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;

    fn edges(pairs: &[(&str, &str)]) -> Vec<Edge> {
        pairs
            .iter()
            .map(|(s, t)| Edge {
                source: s.to_string(),
                target: t.to_string(),
            })
            .collect()
    }

    fn files(paths: &[&str]) -> Vec<FileFact> {
        paths.iter().map(|p| FileFact::empty(p)).collect()
    }

    #[test]
    fn test_three_file_cycle_report() {
        let facts = files(&["app/a.py", "app/b.py", "app/c.py"]);
        let graph = DependencyGraph::from_edges(
            facts.iter().map(|f| f.path.clone()).collect(),
            edges(&[("app/a.py", "app/b.py"), ("app/b.py", "app/c.py"), ("app/c.py", "app/a.py")]),
        );
        let report = ArchitectureReasoner::default().reason("demo", &facts, &graph);

        assert_eq!(report.cycles, vec![vec!["app/a.py", "app/b.py", "app/c.py"]]);
        assert_eq!(report.score_breakdown.cycles, Penalty { count: 1, penalty: 5 });
        // 3 of 6 possible edges
        assert_eq!(report.coupling.density, 0.5);
        assert_eq!(report.score_breakdown.coupling.penalty, 10);
        assert_eq!(report.architecture_score, 85);
        assert_eq!(report.architecture_grade, Grade::B);
        assert_eq!(report.coupling_scores["app/a.py"], 4.0);
        assert_eq!(report.recommendations.len(), 1);
        assert!(report.recommendations[0].contains("app/a.py -> app/b.py -> app/c.py -> app/a.py"));
    }

    #[test]
    fn test_empty_project_is_neutral() {
        let report = ArchitectureReasoner::default().reason("empty", &[], &DependencyGraph::default());
        assert!(report.cycles.is_empty());
        assert!(report.god_modules.is_empty());
        assert!(report.coupling_scores.is_empty());
        assert_eq!(report.architecture_score, 100);
        assert_eq!(report.architecture_grade, Grade::A);
        assert!(report.recommendations.is_empty());
        assert_eq!(report.pattern.pattern, PatternKind::Flat);
    }

    #[test]
    fn test_penalties_are_capped() {
        assert_eq!(Penalty::capped(9, 5, 25).penalty, 25);
        assert_eq!(Penalty::capped(2, 10, 30).penalty, 20);
        assert_eq!(Penalty::capped(usize::MAX, 3, 15).penalty, 15);

        let breakdown = ScoreBreakdown {
            cycles: Penalty::capped(10, 5, 25),
            god_modules: Penalty::capped(10, 10, 30),
            bottlenecks: Penalty::capped(10, 5, 20),
            concern_separation: Penalty::capped(10, 3, 15),
            coupling: Penalty { count: 1, penalty: 10 },
        };
        assert_eq!(breakdown.score(), 0);
    }

    #[test]
    fn test_truncated_cycles_do_not_score() {
        let facts = files(&["a.py", "b.py", "c.py"]);
        let graph = DependencyGraph::from_edges(
            Vec::new(),
            edges(&[("a.py", "b.py"), ("b.py", "c.py"), ("c.py", "a.py")]),
        );
        let config = ArchitectureConfig {
            max_cycle_length: 2,
            ..ArchitectureConfig::default()
        };
        let report = ArchitectureReasoner::new(config).reason("demo", &facts, &graph);
        assert!(report.cycles.is_empty());
        assert_eq!(report.cycle_details.len(), 1);
        assert!(report.cycle_details[0].truncated);
        assert_eq!(report.score_breakdown.cycles.penalty, 0);
    }

    #[test]
    fn test_file_in_two_cycles_scores_both() {
        let facts = files(&["a.py", "b.py", "c.py", "d.py", "e.py"]);
        let graph = DependencyGraph::from_edges(
            facts.iter().map(|f| f.path.clone()).collect(),
            edges(&[
                ("a.py", "b.py"),
                ("b.py", "a.py"),
                ("a.py", "c.py"),
                ("c.py", "a.py"),
                ("d.py", "e.py"),
                ("e.py", "d.py"),
            ]),
        );
        let report = ArchitectureReasoner::default().reason("demo", &facts, &graph);

        assert_eq!(report.cycles.len(), 3);
        assert_eq!(report.coupling_scores["a.py"], 8.0);
        assert_eq!(report.coupling_scores["d.py"], 4.0);
    }
}
