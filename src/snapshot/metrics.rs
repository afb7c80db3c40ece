//! Metrics captured in a snapshot and the direction each one regresses in.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::{round2, AnalysisReport};
use crate::architecture::ArchitectureReport;
use crate::detect::{GovernanceReport, SecurityReport, Severity};

/// Which way a metric gets worse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Worse {
    Up,
    Down,
    /// Reported, never a regression.
    Neutral,
}

#[derive(Debug, Clone, Copy)]
pub struct TrackedMetric {
    pub name: &'static str,
    pub worse: Worse,
    /// Unfavorable moves up to this size are noise.
    pub min_delta: f64,
}

const fn metric(name: &'static str, worse: Worse, min_delta: f64) -> TrackedMetric {
    TrackedMetric {
        name,
        worse,
        min_delta,
    }
}

/// Metrics with a regression direction. Anything else is neutral.
pub const TRACKED: &[TrackedMetric] = &[
    metric("avg_complexity", Worse::Up, 1.0),
    metric("max_complexity", Worse::Up, 5.0),
    metric("median_complexity", Worse::Up, 1.0),
    metric("avg_function_length", Worse::Up, 5.0),
    metric("max_function_length", Worse::Up, 25.0),
    metric("docstring_coverage", Worse::Down, 0.05),
    metric("type_hint_coverage", Worse::Down, 0.05),
    metric("security_critical", Worse::Up, 0.0),
    metric("security_high", Worse::Up, 0.0),
    metric("security_score", Worse::Down, 5.0),
    metric("governance_high", Worse::Up, 0.0),
    metric("governance_score", Worse::Down, 5.0),
    metric("architecture_cycles", Worse::Up, 0.0),
    metric("architecture_god_modules", Worse::Up, 0.0),
    metric("architecture_score", Worse::Down, 5.0),
];

pub fn tracked(name: &str) -> TrackedMetric {
    TRACKED
        .iter()
        .find(|m| m.name == name)
        .copied()
        .unwrap_or(TrackedMetric {
            name: "",
            worse: Worse::Neutral,
            min_delta: 0.0,
        })
}

/// Per-file values kept for file-level comparisons.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub avg_complexity: f64,
    pub line_count: usize,
}

/// Stage documents a snapshot is taken from.
#[derive(Debug, Clone, Copy)]
pub struct SnapshotInput<'a> {
    pub analysis: &'a AnalysisReport,
    pub security: Option<&'a SecurityReport>,
    pub governance: Option<&'a GovernanceReport>,
    pub architecture: Option<&'a ArchitectureReport>,
}

impl<'a> SnapshotInput<'a> {
    pub fn new(analysis: &'a AnalysisReport) -> Self {
        Self {
            analysis,
            security: None,
            governance: None,
            architecture: None,
        }
    }

    pub fn with_security(mut self, report: &'a SecurityReport) -> Self {
        self.security = Some(report);
        self
    }

    pub fn with_governance(mut self, report: &'a GovernanceReport) -> Self {
        self.governance = Some(report);
        self
    }

    pub fn with_architecture(mut self, report: &'a ArchitectureReport) -> Self {
        self.architecture = Some(report);
        self
    }

    /// Flat metric table. Optional stages contribute only when present.
    pub fn metrics(&self) -> BTreeMap<String, f64> {
        let mut out = BTreeMap::new();
        let mut put = |name: &str, value: f64| {
            out.insert(name.to_string(), value);
        };

        let pm = &self.analysis.project_metrics;
        put("avg_complexity", pm.avg_complexity);
        put("max_complexity", pm.max_complexity as f64);
        put("median_complexity", pm.median_complexity);
        put("avg_function_length", pm.avg_function_length);
        put("max_function_length", pm.max_function_length as f64);
        put("docstring_coverage", pm.docstring_coverage);
        put("type_hint_coverage", pm.type_hint_coverage);

        let summary = &self.analysis.summary;
        put("total_files", summary.total_files as f64);
        put("analyzed_files", summary.analyzed_files as f64);
        put("total_lines", summary.total_lines as f64);
        put("total_functions", summary.total_functions as f64);
        put("total_classes", summary.total_classes as f64);
        put("parse_errors", summary.parse_errors as f64);
        put("dependency_edges", self.analysis.dependency_graph.edge_count() as f64);

        let count = |counts: &BTreeMap<Severity, usize>, severity| {
            counts.get(&severity).copied().unwrap_or(0) as f64
        };

        if let Some(security) = self.security {
            for severity in Severity::ALL {
                put(
                    &format!("security_{}", severity),
                    count(&security.severity_counts, severity),
                );
            }
            put("security_total", security.total_findings as f64);
            put("security_score", security.security_score as f64);
        }

        if let Some(governance) = self.governance {
            for severity in Severity::ALL {
                put(
                    &format!("governance_{}", severity),
                    count(&governance.severity_counts, severity),
                );
            }
            put("governance_total", governance.total_findings as f64);
            put("governance_score", governance.governance_score as f64);
        }

        if let Some(architecture) = self.architecture {
            put("architecture_cycles", architecture.complete_cycles().count() as f64);
            put("architecture_god_modules", architecture.god_modules.len() as f64);
            put("architecture_bottlenecks", architecture.bottlenecks.len() as f64);
            put("architecture_score", architecture.architecture_score as f64);
        }

        out
    }

    pub fn file_metrics(&self) -> BTreeMap<String, FileMetrics> {
        self.analysis
            .file_analyses
            .iter()
            .map(|f| {
                (
                    f.path.clone(),
                    FileMetrics {
                        avg_complexity: round2(f.complexity.average),
                        line_count: f.line_count,
                    },
                )
            })
            .collect()
    }
}
