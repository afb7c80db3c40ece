//! Comparison of two snapshots and the metric time series.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metrics::{tracked, Worse};
use super::Snapshot;
use crate::detect::Severity;

/// Smallest per-file average complexity move worth reporting.
pub const FILE_COMPLEXITY_DELTA: f64 = 1.0;

/// Result of asking for a diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DiffOutcome {
    NotEnoughHistory { available: usize },
    Compared(RegressionReport),
}

impl DiffOutcome {
    pub fn regression_detected(&self) -> bool {
        matches!(self, DiffOutcome::Compared(report) if report.regression_detected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Movement {
    Increased,
    Decreased,
    Unchanged,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricChange {
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
    /// Undefined when the previous value is zero.
    pub pct_change: Option<f64>,
    pub direction: Movement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Regression {
    pub metric: String,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
    pub threshold: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Improvement {
    pub metric: String,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileComplexityChange {
    pub file: String,
    pub previous: f64,
    pub current: f64,
    pub delta: f64,
}

/// Identifies one side of a comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRef {
    pub file: String,
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionReport {
    pub project: String,
    pub previous: SnapshotRef,
    pub current: SnapshotRef,
    pub metric_changes: BTreeMap<String, MetricChange>,
    pub regressions: Vec<Regression>,
    pub improvements: Vec<Improvement>,
    pub added_files: Vec<String>,
    pub removed_files: Vec<String>,
    pub file_complexity_changes: Vec<FileComplexityChange>,
    pub regression_detected: bool,
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn movement(delta: f64) -> Movement {
    if delta > 0.0 {
        Movement::Increased
    } else if delta < 0.0 {
        Movement::Decreased
    } else {
        Movement::Unchanged
    }
}

/// Compare `previous` against `current`. `thresholds` override the default
/// minimum delta of a metric.
pub fn compare(
    previous: (&str, &Snapshot),
    current: (&str, &Snapshot),
    thresholds: &BTreeMap<String, f64>,
) -> RegressionReport {
    let (prev_file, prev) = previous;
    let (curr_file, curr) = current;

    let mut metric_changes = BTreeMap::new();
    let mut regressions = Vec::new();
    let mut improvements = Vec::new();

    for (name, &current_value) in &curr.metrics {
        let Some(&previous_value) = prev.metrics.get(name) else {
            continue;
        };
        let delta = round4(current_value - previous_value);
        let pct_change = (previous_value != 0.0)
            .then(|| ((delta / previous_value) * 10_000.0).round() / 100.0);
        metric_changes.insert(
            name.clone(),
            MetricChange {
                previous: previous_value,
                current: current_value,
                delta,
                pct_change,
                direction: movement(delta),
            },
        );

        let rule = tracked(name);
        let unfavorable = match rule.worse {
            Worse::Up => delta,
            Worse::Down => -delta,
            Worse::Neutral => continue,
        };
        let threshold = thresholds.get(name).copied().unwrap_or(rule.min_delta);
        if unfavorable > threshold {
            regressions.push(Regression {
                metric: name.clone(),
                previous: previous_value,
                current: current_value,
                delta,
                threshold,
                severity: if unfavorable >= 2.0 * threshold {
                    Severity::High
                } else {
                    Severity::Medium
                },
            });
        } else if unfavorable < 0.0 {
            improvements.push(Improvement {
                metric: name.clone(),
                previous: previous_value,
                current: current_value,
                delta,
            });
        }
    }

    let prev_files: BTreeSet<&String> = prev.file_metrics.keys().collect();
    let curr_files: BTreeSet<&String> = curr.file_metrics.keys().collect();
    let added_files = curr_files.difference(&prev_files).map(|f| f.to_string()).collect();
    let removed_files = prev_files.difference(&curr_files).map(|f| f.to_string()).collect();

    let mut file_complexity_changes: Vec<FileComplexityChange> = curr
        .file_metrics
        .iter()
        .filter_map(|(file, now)| {
            let before = prev.file_metrics.get(file)?;
            let delta = round4(now.avg_complexity - before.avg_complexity);
            (delta.abs() >= FILE_COMPLEXITY_DELTA).then(|| FileComplexityChange {
                file: file.clone(),
                previous: before.avg_complexity,
                current: now.avg_complexity,
                delta,
            })
        })
        .collect();
    file_complexity_changes.sort_by(|a, b| {
        b.delta
            .abs()
            .total_cmp(&a.delta.abs())
            .then_with(|| a.file.cmp(&b.file))
    });

    RegressionReport {
        project: curr.project.clone(),
        previous: prev.reference(prev_file),
        current: curr.reference(curr_file),
        metric_changes,
        regression_detected: !regressions.is_empty(),
        regressions,
        improvements,
        added_files,
        removed_files,
        file_complexity_changes,
    }
}

/// One point of the time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendPoint {
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub metrics: BTreeMap<String, f64>,
}

/// First-to-last movement of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendChange {
    pub first: f64,
    pub last: f64,
    pub delta: f64,
    pub pct_change: Option<f64>,
    pub direction: Movement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub project: String,
    pub snapshot_count: usize,
    /// Oldest first.
    pub points: Vec<TrendPoint>,
    pub changes: BTreeMap<String, TrendChange>,
}

/// Build the series from snapshots already in ascending order.
pub fn trend(project: &str, snapshots: &[&Snapshot]) -> Trend {
    let points: Vec<TrendPoint> = snapshots
        .iter()
        .map(|s| TrendPoint {
            timestamp: s.timestamp,
            label: s.label.clone(),
            metrics: s.metrics.clone(),
        })
        .collect();

    let mut changes = BTreeMap::new();
    if let (Some(first), Some(last)) = (points.first(), points.last()) {
        for (name, &last_value) in &last.metrics {
            let Some(&first_value) = first.metrics.get(name) else {
                continue;
            };
            let delta = round4(last_value - first_value);
            changes.insert(
                name.clone(),
                TrendChange {
                    first: first_value,
                    last: last_value,
                    delta,
                    pct_change: (first_value != 0.0)
                        .then(|| ((delta / first_value) * 1000.0).round() / 10.0),
                    direction: movement(delta),
                },
            );
        }
    }

    Trend {
        project: project.to_string(),
        snapshot_count: points.len(),
        points,
        changes,
    }
}
