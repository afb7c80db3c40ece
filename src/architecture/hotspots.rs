//! Files carrying structural risk: god modules and bottlenecks.

use serde::{Deserialize, Serialize};

use crate::analysis::FileFact;
use crate::config::ArchitectureConfig;
use crate::detect::Severity;
use crate::graph::DependencyGraph;

/// A file that is large, widely imported and imports widely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GodModule {
    pub file: String,
    pub severity: Severity,
    pub risk_score: usize,
    pub fan_in: usize,
    pub fan_out: usize,
    pub line_count: usize,
    pub function_count: usize,
    pub class_count: usize,
    pub reasons: Vec<String>,
}

/// A heavily depended-on file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bottleneck {
    pub file: String,
    pub severity: Severity,
    pub fan_in: usize,
    pub avg_complexity: f64,
    pub max_complexity: u32,
    pub function_count: usize,
    pub depended_by: Vec<String>,
    pub reasons: Vec<String>,
}

/// Every threshold must hold at once; size alone is not enough.
pub fn find_god_modules(
    files: &[FileFact],
    graph: &DependencyGraph,
    config: &ArchitectureConfig,
) -> Vec<GodModule> {
    let mut gods: Vec<GodModule> = files
        .iter()
        .filter_map(|file| {
            let (fan_in, fan_out) = graph.fan(&file.path);
            if fan_in < config.god_fan_in
                || fan_out < config.god_fan_out
                || file.line_count < config.god_lines
            {
                return None;
            }

            let function_count = file.functions.len();
            let class_count = file.classes.len();
            let mut reasons = vec![
                format!("{} dependents", fan_in),
                format!("{} dependencies", fan_out),
                format!("{} lines", file.line_count),
            ];
            let mut risk_score = (fan_in - config.god_fan_in + 1)
                + (fan_out - config.god_fan_out + 1)
                + (file.line_count - config.god_lines) / 50;
            if function_count >= 10 {
                reasons.push(format!("{} functions", function_count));
                risk_score += function_count - 9;
            }
            if class_count >= 3 {
                reasons.push(format!("{} classes", class_count));
                risk_score += (class_count - 2) * 3;
            }

            let severity = if risk_score >= 15 {
                Severity::Critical
            } else if risk_score >= 10 {
                Severity::High
            } else {
                Severity::Medium
            };
            Some(GodModule {
                file: file.path.clone(),
                severity,
                risk_score,
                fan_in,
                fan_out,
                line_count: file.line_count,
                function_count,
                class_count,
                reasons,
            })
        })
        .collect();
    gods.sort_by(|a, b| b.risk_score.cmp(&a.risk_score).then_with(|| a.file.cmp(&b.file)));
    gods
}

/// Nearest-rank percentile of an ascending slice; 0 when empty.
pub fn nearest_rank(sorted: &[usize], percentile: f64) -> usize {
    if sorted.is_empty() {
        return 0;
    }
    let rank = (percentile / 100.0 * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Files whose fan-in reaches the configured percentile of all nodes.
pub fn find_bottlenecks(
    files: &[FileFact],
    graph: &DependencyGraph,
    config: &ArchitectureConfig,
) -> Vec<Bottleneck> {
    let mut fan_ins: Vec<usize> = graph.nodes.iter().map(|n| graph.fan(n).0).collect();
    fan_ins.sort_unstable();
    let threshold = nearest_rank(&fan_ins, config.bottleneck_percentile);

    let mut bottlenecks: Vec<Bottleneck> = files
        .iter()
        .filter_map(|file| {
            let (fan_in, _) = graph.fan(&file.path);
            if fan_in < threshold || fan_in < config.bottleneck_min_fan_in {
                return None;
            }

            let avg_complexity = file.complexity.average;
            let max_complexity = file.complexity.max;
            let function_count = file.functions.len();
            let mut reasons = vec![format!("{} files depend on this module", fan_in)];
            if avg_complexity >= 8.0 {
                reasons.push(format!("Contains high-complexity logic (avg: {})", avg_complexity));
            }
            if max_complexity >= 15 {
                reasons.push(format!("Contains a function with complexity {}", max_complexity));
            }
            if function_count >= 10 {
                reasons.push(format!("Has {} functions (large surface area)", function_count));
            }

            let severity = if avg_complexity >= 8.0 || max_complexity >= 15 {
                Severity::Critical
            } else if function_count >= 10 {
                Severity::High
            } else {
                Severity::Medium
            };
            Some(Bottleneck {
                file: file.path.clone(),
                severity,
                fan_in,
                avg_complexity,
                max_complexity,
                function_count,
                depended_by: graph.predecessors(&file.path).to_vec(),
                reasons,
            })
        })
        .collect();
    bottlenecks.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.file.cmp(&b.file)));
    bottlenecks
}
