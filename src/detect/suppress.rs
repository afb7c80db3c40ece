//! Inline suppression of findings via comments.
//!
//! Supports suppression comments like:
//! - `# codestrata:ignore <rule> - <reason>`
//! - `# codestrata:ignore-next-line <rule> - <reason>`
//! - `# codestrata:ignore-file <rule> - <reason>`
//!
//! `<rule>` may be `*`, a full kind (`security.debug_print`), a bare rule
//! (`debug_print`) or a category (`debug_leftovers`). Suppressed findings
//! are reported separately, never dropped.

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::Finding;

/// File-level directives must appear within this many leading lines.
const FILE_DIRECTIVE_WINDOW: usize = 10;

/// How a suppression applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SuppressionType {
    /// Applies to the same line
    Line,
    /// Applies to the next line
    NextLine,
    /// Applies to the entire file
    File,
}

/// An inline suppression directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suppression {
    /// Rule to suppress or "*" for all
    pub rule: String,
    /// Human-readable reason
    #[serde(default)]
    pub reason: String,
    /// File containing the suppression
    pub file: String,
    /// Line number (0 for file-level)
    pub line: usize,
    pub suppression_type: SuppressionType,
}

impl Suppression {
    /// Whether this directive names the rule behind `finding`.
    fn covers_rule(&self, finding: &Finding) -> bool {
        self.rule == "*"
            || self.rule == finding.kind
            || self.rule == finding.rule()
            || self.rule == finding.category
    }

    /// Check if a finding matches this suppression.
    pub fn matches(&self, finding: &Finding) -> bool {
        if finding.file != self.file || !self.covers_rule(finding) {
            return false;
        }
        match self.suppression_type {
            SuppressionType::File => true,
            SuppressionType::Line => finding.line == self.line,
            SuppressionType::NextLine => finding.line == self.line + 1,
        }
    }
}

/// A finding that was suppressed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuppressedFinding {
    pub finding: Finding,
    pub suppression: Suppression,
}

lazy_static::lazy_static! {
    /// Pattern for matching suppression comments.
    static ref SUPPRESSION_PATTERN: Regex =
        Regex::new(r"#\s*codestrata:(ignore(?:-file|-next-line)?)\s+(\S+)\s*(?:-\s*(.*))?").unwrap();
}

/// Parse suppression directives from file content.
pub fn parse_suppressions(file_path: &str, content: &str) -> Vec<Suppression> {
    let mut suppressions = Vec::new();
    let mut in_header = true;

    for (idx, line) in content.lines().enumerate() {
        let line_number = idx + 1;
        let trimmed = line.trim();

        if in_header && !(trimmed.is_empty() || trimmed.starts_with('#')) {
            in_header = false;
        }

        let caps = match SUPPRESSION_PATTERN.captures(line) {
            Some(c) => c,
            None => continue,
        };
        let directive = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let rule = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        let reason = caps
            .get(3)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();

        let suppression_type = match directive {
            "ignore-file" => {
                if !in_header && line_number > FILE_DIRECTIVE_WINDOW {
                    continue;
                }
                SuppressionType::File
            }
            "ignore-next-line" => SuppressionType::NextLine,
            "ignore" => {
                // Alone on its line it guards the next line.
                let before = caps.get(0).map(|m| &line[..m.start()]).unwrap_or("");
                if before.trim().is_empty() {
                    SuppressionType::NextLine
                } else {
                    SuppressionType::Line
                }
            }
            _ => continue,
        };

        suppressions.push(Suppression {
            rule: rule.to_string(),
            reason,
            file: file_path.to_string(),
            line: if suppression_type == SuppressionType::File {
                0
            } else {
                line_number
            },
            suppression_type,
        });
    }

    suppressions
}

/// Separate findings into active and suppressed.
pub fn filter_suppressed(
    findings: Vec<Finding>,
    suppressions: &[Suppression],
) -> (Vec<Finding>, Vec<SuppressedFinding>) {
    if suppressions.is_empty() {
        return (findings, Vec::new());
    }

    let mut active = Vec::new();
    let mut suppressed = Vec::new();

    for finding in findings {
        match suppressions.iter().find(|s| s.matches(&finding)) {
            Some(suppression) => suppressed.push(SuppressedFinding {
                finding,
                suppression: suppression.clone(),
            }),
            None => active.push(finding),
        }
    }

    (active, suppressed)
}
