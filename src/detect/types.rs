//! Core types for findings shared by every detection stage.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Severity levels for findings, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("unknown severity: {}", s)),
        }
    }
}

/// Which stage produced a finding. Encoded as the prefix of its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Security,
    Governance,
    Parse,
}

impl Domain {
    pub fn as_str(&self) -> &'static str {
        match self {
            Domain::Security => "security",
            Domain::Governance => "governance",
            Domain::Parse => "parse",
        }
    }
}

/// Where in the syntax tree a text match landed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchContext {
    Code,
    Comment,
    String,
    /// Any position inside a test module or fixture.
    TestFile,
}

/// A single detected issue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    /// Namespaced rule identifier, e.g. `security.pickle_load`.
    pub kind: String,
    /// Rule family within the namespace, e.g. `unsafe_deserialization`.
    pub category: String,
    pub severity: Severity,
    pub file: String,
    pub line: usize,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    /// Heuristic confidence in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<MatchContext>,
}

impl Finding {
    pub fn new(
        domain: Domain,
        rule: &str,
        category: &str,
        severity: Severity,
        file: &str,
        line: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: format!("{}.{}", domain.as_str(), rule),
            category: category.to_string(),
            severity,
            file: file.to_string(),
            line,
            message: message.into(),
            snippet: None,
            confidence: None,
            context: None,
        }
    }

    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        let snippet = snippet.into();
        let trimmed = snippet.trim();
        if !trimmed.is_empty() {
            self.snippet = Some(truncate(trimmed, 160));
        }
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some((confidence.clamp(0.0, 1.0) * 100.0).round() / 100.0);
        self
    }

    pub fn with_context(mut self, context: MatchContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Rule identifier without the namespace.
    pub fn rule(&self) -> &str {
        self.kind.split_once('.').map(|(_, r)| r).unwrap_or(&self.kind)
    }

    pub fn domain(&self) -> &str {
        self.kind.split_once('.').map(|(d, _)| d).unwrap_or("")
    }

    /// Deduplication key: at most one finding per (kind, file, line).
    pub fn key(&self) -> (String, String, usize) {
        (self.kind.clone(), self.file.clone(), self.line)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars).collect();
    out.push_str("...");
    out
}

/// Canonical output ordering: severity descending, then file, line, kind.
pub fn sort_findings(findings: &mut [Finding]) {
    findings.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.file.cmp(&b.file))
            .then_with(|| a.line.cmp(&b.line))
            .then_with(|| a.kind.cmp(&b.kind))
    });
}

/// Append-only collection of findings that drops repeated keys.
#[derive(Debug, Clone, Default)]
pub struct FindingSet {
    findings: Vec<Finding>,
    seen: HashSet<(String, String, usize)>,
}

impl FindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a finding; returns false when its key was already present.
    pub fn push(&mut self, finding: Finding) -> bool {
        if !self.seen.insert(finding.key()) {
            return false;
        }
        self.findings.push(finding);
        true
    }

    pub fn extend(&mut self, findings: impl IntoIterator<Item = Finding>) {
        for finding in findings {
            self.push(finding);
        }
    }

    /// Whether a finding of `category` is already held for `line`.
    pub fn covers(&self, category: &str, line: usize) -> bool {
        self.findings.iter().any(|f| f.category == category && f.line == line)
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    /// Consume the set, returning findings in canonical order.
    pub fn into_sorted(self) -> Vec<Finding> {
        let mut findings = self.findings;
        sort_findings(&mut findings);
        findings
    }
}

/// Finding counts per severity, always containing every level.
pub fn severity_counts(findings: &[Finding]) -> BTreeMap<Severity, usize> {
    let mut counts: BTreeMap<Severity, usize> = Severity::ALL.iter().map(|s| (*s, 0)).collect();
    for f in findings {
        *counts.entry(f.severity).or_insert(0) += 1;
    }
    counts
}

/// Finding counts keyed by `key_fn`.
pub fn count_by<F>(findings: &[Finding], key_fn: F) -> BTreeMap<String, usize>
where
    F: Fn(&Finding) -> &str,
{
    let mut counts = BTreeMap::new();
    for f in findings {
        *counts.entry(key_fn(f).to_string()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(rule: &str, severity: Severity, file: &str, line: usize) -> Finding {
        Finding::new(Domain::Security, rule, "secrets", severity, file, line, "msg")
    }

    #[test]
    fn test_severity_order_and_parse() {
        assert!(Severity::Critical > Severity::High);
        assert!(Severity::Medium > Severity::Low);
        assert_eq!("HIGH".parse::<Severity>().unwrap(), Severity::High);
        assert!("fatal".parse::<Severity>().is_err());
        assert_eq!(serde_json::to_string(&Severity::Critical).unwrap(), "\"critical\"");
    }

    #[test]
    fn test_kind_namespace() {
        let f = finding("hardcoded_password", Severity::High, "a.py", 3);
        assert_eq!(f.kind, "security.hardcoded_password");
        assert_eq!(f.rule(), "hardcoded_password");
        assert_eq!(f.domain(), "security");
    }

    #[test]
    fn test_finding_set_dedups_on_key() {
        let mut set = FindingSet::new();
        assert!(set.push(finding("a", Severity::High, "x.py", 1)));
        assert!(!set.push(finding("a", Severity::High, "x.py", 1)));
        assert!(set.push(finding("b", Severity::High, "x.py", 1)));
        assert!(set.push(finding("a", Severity::High, "x.py", 2)));
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn test_sorted_by_severity_file_line() {
        let mut set = FindingSet::new();
        set.push(finding("a", Severity::Low, "a.py", 1));
        set.push(finding("b", Severity::Critical, "z.py", 9));
        set.push(finding("c", Severity::Critical, "b.py", 5));
        set.push(finding("d", Severity::Critical, "b.py", 2));

        let sorted = set.into_sorted();
        let order: Vec<(&str, usize)> = sorted.iter().map(|f| (f.file.as_str(), f.line)).collect();
        assert_eq!(order, vec![("b.py", 2), ("b.py", 5), ("z.py", 9), ("a.py", 1)]);
    }

    #[test]
    fn test_severity_counts_has_all_levels() {
        let counts = severity_counts(&[finding("a", Severity::High, "a.py", 1)]);
        assert_eq!(counts.len(), 4);
        assert_eq!(counts[&Severity::High], 1);
        assert_eq!(counts[&Severity::Low], 0);
    }

    #[test]
    fn test_snippet_is_trimmed_and_truncated() {
        let f = finding("a", Severity::Low, "a.py", 1).with_snippet(format!("   {}  ", "x".repeat(200)));
        let snippet = f.snippet.unwrap();
        assert!(snippet.ends_with("..."));
        assert_eq!(snippet.chars().count(), 163);
    }
}
