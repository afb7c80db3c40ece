//! Heuristic code-governance detection over extracted facts.
//!
//! Each smell is an independent [`Detector`] working only on
//! [`FileFact`]s, never on raw text. These are shape and size heuristics,
//! not proof that code was generated: every finding carries a confidence
//! and false positives are expected.
//!
//! Detectors:
//! - `long_function`, `verbose_function`, `deep_nesting` (size.rs)
//! - `generic_members`, `shallow_class` (classes.rs)
//! - `naming_inconsistency` (naming.rs)
//! - `near_duplicate` (duplicates.rs)

mod classes;
mod duplicates;
mod naming;
mod size;

pub use classes::{GenericMembers, ShallowClass};
pub use duplicates::NearDuplicate;
pub use naming::{naming_convention, NamingConvention, NamingInconsistency};
pub use size::{DeepNesting, LongFunction, VerboseFunction};

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    count_by, filter_suppressed, severity_counts, Domain, Finding, FindingSet, Severity,
    SuppressedFinding,
};
use crate::analysis::FileFact;
use crate::config::GovernanceConfig;
use crate::score::{grade, severity_score, Grade};

/// A single governance heuristic.
pub trait Detector: Send + Sync {
    /// Rule name, the suffix of the finding kind.
    fn id(&self) -> &'static str;

    fn detect(&self, files: &[FileFact], config: &GovernanceConfig) -> Vec<Finding>;
}

/// Build a governance finding.
pub(crate) fn finding(
    rule: &str,
    category: &str,
    severity: Severity,
    file: &str,
    line: usize,
    message: impl Into<String>,
) -> Finding {
    Finding::new(Domain::Governance, rule, category, severity, file, line, message)
}

/// The Governance Detector's output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GovernanceReport {
    pub project: String,
    pub analyzed_at: DateTime<Utc>,
    pub total_findings: usize,
    pub severity_counts: BTreeMap<Severity, usize>,
    pub kind_counts: BTreeMap<String, usize>,
    pub governance_score: u32,
    pub governance_grade: Grade,
    pub summary: String,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub suppressed: Vec<SuppressedFinding>,
    pub recommendations: Vec<String>,
}

/// Runs every registered detector.
pub struct GovernanceDetector {
    config: GovernanceConfig,
    detectors: Vec<Box<dyn Detector>>,
}

impl GovernanceDetector {
    pub fn new(config: GovernanceConfig) -> Self {
        Self {
            config,
            detectors: vec![
                Box::new(LongFunction),
                Box::new(VerboseFunction),
                Box::new(GenericMembers),
                Box::new(NearDuplicate),
                Box::new(NamingInconsistency),
                Box::new(ShallowClass),
                Box::new(DeepNesting),
            ],
        }
    }

    pub fn detector_ids(&self) -> Vec<&'static str> {
        self.detectors.iter().map(|d| d.id()).collect()
    }

    /// Run all detectors over the facts of one project.
    pub fn analyze(&self, project: &str, files: &[FileFact]) -> GovernanceReport {
        let mut set = FindingSet::new();
        for detector in &self.detectors {
            let findings = detector.detect(files, &self.config);
            debug!(detector = detector.id(), findings = findings.len(), "governance detector");
            set.extend(findings);
        }

        let suppressions: Vec<_> = files.iter().flat_map(|f| f.suppressions.iter().cloned()).collect();
        let (findings, suppressed) = filter_suppressed(set.into_sorted(), &suppressions);
        GovernanceReport::new(project.to_string(), findings, suppressed)
    }
}

impl Default for GovernanceDetector {
    fn default() -> Self {
        Self::new(GovernanceConfig::default())
    }
}

impl GovernanceReport {
    pub fn new(project: String, findings: Vec<Finding>, suppressed: Vec<SuppressedFinding>) -> Self {
        let severity_counts = severity_counts(&findings);
        let kind_counts = count_by(&findings, |f| &f.kind);
        let governance_score = severity_score(&severity_counts);
        Self {
            project,
            analyzed_at: Utc::now(),
            total_findings: findings.len(),
            summary: summarize(&findings, &kind_counts, governance_score),
            recommendations: recommendations(&kind_counts),
            severity_counts,
            kind_counts,
            governance_score,
            governance_grade: grade(governance_score),
            findings,
            suppressed,
        }
    }
}

fn summarize(findings: &[Finding], kind_counts: &BTreeMap<String, usize>, score: u32) -> String {
    // Highest count wins; BTreeMap order breaks ties by name.
    let top = kind_counts
        .iter()
        .fold(None::<(&String, usize)>, |best, (kind, n)| match best {
            Some((_, m)) if m >= *n => best,
            _ => Some((kind, *n)),
        });
    match top {
        None => "No governance issues detected.".to_string(),
        Some((kind, n)) => format!(
            "Found {} governance issues (score: {}/100). Most common: {} ({} instances).",
            findings.len(),
            score,
            kind.trim_start_matches("governance.").replace('_', " "),
            n
        ),
    }
}

/// One templated line per finding kind present.
fn recommendations(kind_counts: &BTreeMap<String, usize>) -> Vec<String> {
    const TEMPLATES: &[(&str, &str)] = &[
        (
            "governance.near_duplicate",
            "NEAR DUPLICATES: Several functions share the same structure. Extract the shared logic into one parameterized function.",
        ),
        (
            "governance.long_function",
            "LONG FUNCTIONS: Some functions exceed the length limit. Split them along their logical steps.",
        ),
        (
            "governance.verbose_function",
            "VERBOSE FUNCTIONS: Some functions have many lines but little branching. Replace repetitive statements with data-driven code or helpers.",
        ),
        (
            "governance.deep_nesting",
            "DEEP NESTING: Nested blocks hide intent. Extract inner blocks into named helpers or return early.",
        ),
        (
            "governance.generic_members",
            "GENERIC NAMES: Classes expose methods such as process() or handle(). Name methods after what they do in the domain.",
        ),
        (
            "governance.naming_inconsistency",
            "NAMING INCONSISTENCY: Mixed naming conventions within a module. Standardize on snake_case for functions and methods.",
        ),
        (
            "governance.shallow_class",
            "SHALLOW CLASSES: Classes wrap a single trivial method. Replace them with plain functions.",
        ),
    ];

    let recs: Vec<String> = TEMPLATES
        .iter()
        .filter(|(kind, _)| kind_counts.get(*kind).copied().unwrap_or(0) > 0)
        .map(|(_, text)| text.to_string())
        .collect();
    if recs.is_empty() {
        return vec!["No significant governance issues. Keep current code quality standards.".to_string()];
    }
    recs
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use crate::detect::{Suppression, SuppressionType};

    #[test]
    fn test_clean_project() {
        let report = GovernanceDetector::default().analyze("demo", &[]);
        assert_eq!(report.total_findings, 0);
        assert_eq!(report.governance_score, 100);
        assert_eq!(report.governance_grade, Grade::A);
        assert_eq!(report.recommendations.len(), 1);
    }

    #[test]
    fn test_findings_are_namespaced_sorted_and_scored() {
        let files = vec![file(
            "app/jobs.py",
            vec![function("short", 1, 5, 1), function("huge", 10, 120, 20)],
        )];
        let report = GovernanceDetector::default().analyze("demo", &files);

        assert_eq!(report.total_findings, 1);
        assert_eq!(report.findings[0].kind, "governance.long_function");
        assert_eq!(report.findings[0].severity, Severity::High);
        assert_eq!(report.governance_score, 90);
        assert_eq!(report.kind_counts.get("governance.long_function"), Some(&1));
        assert!(report.recommendations[0].starts_with("LONG FUNCTIONS"));
        assert!(report.summary.contains("long function"));
    }

    #[test]
    fn test_suppressed_findings_are_kept_aside() {
        let mut fact = file("app/jobs.py", vec![function("huge", 10, 120, 20)]);
        fact.suppressions = vec![Suppression {
            rule: "long_function".to_string(),
            reason: "generated".to_string(),
            file: "app/jobs.py".to_string(),
            line: 0,
            suppression_type: SuppressionType::File,
        }];
        let report = GovernanceDetector::default().analyze("demo", &[fact]);
        assert!(report.findings.is_empty());
        assert_eq!(report.suppressed.len(), 1);
        assert_eq!(report.governance_score, 100);
    }

    #[test]
    fn test_detector_ids() {
        assert_eq!(
            GovernanceDetector::default().detector_ids(),
            vec![
                "long_function",
                "verbose_function",
                "generic_members",
                "near_duplicate",
                "naming_inconsistency",
                "shallow_class",
                "deep_nesting"
            ]
        );
    }
}
