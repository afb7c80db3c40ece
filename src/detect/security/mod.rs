//! Pattern-based security scanning.
//!
//! The scanner reads raw file content, independent of fact extraction, and
//! runs two rule tables over it:
//! - [`TEXT_RULES`]: regexes matched line by line
//! - [`TREE_RULES`]: checks over call, assignment and function nodes of the syntax tree
//!
//! Text matches are never suppressed because of where they land. A secret in
//! a comment, a docstring or a test fixture is still reported; the tree
//! context only lowers the finding's confidence and is recorded in
//! `context`. Expect findings from fixtures and examples.

mod rules;
mod tree_rules;

pub use rules::{SecurityRule, TEXT_RULES};
pub use tree_rules::{run_tree_rules, TreeRule, TREE_RULES};

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use tree_sitter::Point;

use super::{
    count_by, filter_suppressed, parse_suppressions, severity_counts, Domain, Finding, FindingSet,
    MatchContext, Severity, SuppressedFinding, Suppression,
};
use crate::analysis::{
    build_pool, discover_sources, python, relative_path, LanguageAnalyzer, ParsedFile,
};
use crate::config::Config;
use crate::score::{grade, severity_score, Grade};

/// The Security Scanner's output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityReport {
    pub project: String,
    pub scanned_at: DateTime<Utc>,
    pub files_scanned: usize,
    pub total_findings: usize,
    pub severity_counts: BTreeMap<Severity, usize>,
    pub category_counts: BTreeMap<String, usize>,
    pub security_score: u32,
    pub security_grade: Grade,
    pub summary: String,
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub suppressed: Vec<SuppressedFinding>,
}

/// Findings and directives from one file.
#[derive(Debug, Default)]
pub struct FileScan {
    pub findings: Vec<Finding>,
    pub suppressions: Vec<Suppression>,
}

pub struct SecurityScanner {
    config: Config,
}

impl SecurityScanner {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Scan every source file under `root`.
    pub fn scan(&self, root: &Path) -> anyhow::Result<SecurityReport> {
        let files = discover_sources(root, &self.config)?;
        info!(root = %root.display(), files = files.len(), "security scan");

        let pool = build_pool(self.config.parallelism)?;
        let scans: Vec<Option<FileScan>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| {
                    let rel = relative_path(root, path);
                    match fs::read(path) {
                        Ok(bytes) => Some(self.scan_source(&rel, &String::from_utf8_lossy(&bytes))),
                        Err(err) => {
                            warn!(file = %rel, error = %err, "cannot read file, skipping");
                            None
                        }
                    }
                })
                .collect()
        });

        let files_scanned = scans.iter().filter(|s| s.is_some()).count();
        let mut set = FindingSet::new();
        let mut suppressions = Vec::new();
        for scan in scans.into_iter().flatten() {
            set.extend(scan.findings);
            suppressions.extend(scan.suppressions);
        }

        let (findings, mut suppressed) = filter_suppressed(set.into_sorted(), &suppressions);
        suppressed.sort_by(|a, b| {
            (&a.finding.file, a.finding.line, &a.finding.kind)
                .cmp(&(&b.finding.file, b.finding.line, &b.finding.kind))
        });
        debug!(findings = findings.len(), suppressed = suppressed.len(), "security scan done");

        Ok(SecurityReport::new(
            crate::analysis::project_name(root),
            files_scanned,
            findings,
            suppressed,
        ))
    }

    /// Scan one file's content. `path` is project-relative.
    pub fn scan_source(&self, path: &str, source: &str) -> FileScan {
        let is_test = is_test_path(path);
        let parsed = match python().parse(path, source.as_bytes(), &self.config.parse_options()) {
            Ok(parsed) => Some(parsed),
            Err(err) => {
                debug!(file = %path, error = %err, "no syntax tree, text rules only");
                None
            }
        };

        let mut set = FindingSet::new();

        let text_rules: Vec<&SecurityRule> = TEXT_RULES
            .iter()
            .filter(|r| self.config.security.is_enabled(r.id, r.category))
            .collect();
        for (row, line) in source.lines().enumerate() {
            for rule in &text_rules {
                let column = match rule.find(line) {
                    Some(c) => c,
                    None => continue,
                };
                let context = if is_test {
                    MatchContext::TestFile
                } else {
                    parsed
                        .as_ref()
                        .map(|p| tree_context(p, row, column))
                        .unwrap_or(MatchContext::Code)
                };
                set.push(
                    Finding::new(
                        Domain::Security,
                        rule.id,
                        rule.category,
                        rule.severity,
                        path,
                        row + 1,
                        rule.message,
                    )
                    .with_snippet(line)
                    .with_confidence(confidence(context))
                    .with_context(context),
                );
            }
        }

        // Error trees yield unreliable call structure.
        if let Some(parsed) = parsed.as_ref().filter(|p| !p.has_errors()) {
            let tree_rules: Vec<&TreeRule> = TREE_RULES
                .iter()
                .filter(|r| self.config.security.is_enabled(r.id, r.category))
                .collect();
            let lines: Vec<&str> = source.lines().collect();
            let context = if is_test {
                MatchContext::TestFile
            } else {
                MatchContext::Code
            };
            for (rule, line, message) in run_tree_rules(parsed, &tree_rules) {
                // A text rule already reported this secret.
                if rule.category == "secrets" && set.covers(rule.category, line) {
                    continue;
                }
                let snippet = lines.get(line - 1).copied().unwrap_or("");
                set.push(
                    Finding::new(
                        Domain::Security,
                        rule.id,
                        rule.category,
                        rule.severity,
                        path,
                        line,
                        message,
                    )
                    .with_snippet(snippet)
                    .with_confidence(confidence(context))
                    .with_context(context),
                );
            }
        }

        FileScan {
            findings: set.into_sorted(),
            suppressions: parse_suppressions(path, source),
        }
    }
}

impl SecurityReport {
    pub fn new(
        project: String,
        files_scanned: usize,
        findings: Vec<Finding>,
        suppressed: Vec<SuppressedFinding>,
    ) -> Self {
        let severity_counts = severity_counts(&findings);
        let security_score = severity_score(&severity_counts);
        Self {
            project,
            scanned_at: Utc::now(),
            files_scanned,
            total_findings: findings.len(),
            category_counts: count_by(&findings, |f| &f.category),
            summary: summarize(&findings, &severity_counts),
            severity_counts,
            security_score,
            security_grade: grade(security_score),
            findings,
            suppressed,
        }
    }
}

/// Context of the innermost node at (row, column).
fn tree_context(parsed: &ParsedFile, row: usize, column: usize) -> MatchContext {
    let point = Point { row, column };
    let mut node = parsed.tree.root_node().descendant_for_point_range(point, point);
    while let Some(n) = node {
        match n.kind() {
            "comment" => return MatchContext::Comment,
            "string" => return MatchContext::String,
            _ => node = n.parent(),
        }
    }
    MatchContext::Code
}

fn confidence(context: MatchContext) -> f64 {
    match context {
        MatchContext::Code => 0.9,
        MatchContext::String => 0.7,
        MatchContext::TestFile => 0.5,
        MatchContext::Comment => 0.4,
    }
}

/// Test modules, fixtures and anything under a tests directory.
pub(crate) fn is_test_path(path: &str) -> bool {
    let mut parts = path.split('/').collect::<Vec<_>>();
    let file = parts.pop().unwrap_or("");
    file.starts_with("test_")
        || file.ends_with("_test.py")
        || file == "conftest.py"
        || parts.iter().any(|p| matches!(*p, "test" | "tests" | "fixtures"))
}

fn summarize(findings: &[Finding], counts: &BTreeMap<Severity, usize>) -> String {
    if findings.is_empty() {
        return "No security issues detected.".to_string();
    }
    let parts: Vec<String> = Severity::ALL
        .iter()
        .filter_map(|s| match counts.get(s) {
            Some(n) if *n > 0 => Some(format!("{} {}", n, s.as_str().to_uppercase())),
            _ => None,
        })
        .collect();
    let categories: Vec<String> = count_by(findings, |f| &f.category).into_keys().collect();
    format!(
        "Found {} issues ({}) across categories: {}",
        findings.len(),
        parts.join(", "),
        categories.join(", ")
    )
}
