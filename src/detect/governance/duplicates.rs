//! Structural near-duplicate detection.
//!
//! Candidates come from an inverted index over body shape hashes and
//! fingerprint values, so only functions sharing at least one shingle are
//! ever compared.

use std::collections::{BTreeMap, BTreeSet};

use super::{finding, Detector};
use crate::analysis::shape::jaccard;
use crate::analysis::{FileFact, FunctionFact};
use crate::config::GovernanceConfig;
use crate::detect::{Finding, Severity};

/// Similarity at which a pair counts as a copy.
const COPY_SIMILARITY: f64 = 0.95;

struct Candidate<'a> {
    file: &'a str,
    func: &'a FunctionFact,
}

/// Pairs of functions whose normalized body shapes match.
pub struct NearDuplicate;

impl Detector for NearDuplicate {
    fn id(&self) -> &'static str {
        "near_duplicate"
    }

    fn detect(&self, files: &[FileFact], config: &GovernanceConfig) -> Vec<Finding> {
        // Facts arrive sorted by path and functions by position, so index
        // order is the reporting order.
        let candidates: Vec<Candidate> = files
            .iter()
            .flat_map(|file| {
                file.functions
                    .iter()
                    .filter(|f| f.line_count >= config.duplicate_min_lines && !f.shape_hash.is_empty())
                    .map(move |func| Candidate {
                        file: &file.path,
                        func,
                    })
            })
            .collect();

        let mut by_shape: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
        let mut by_shingle: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        let mut findings = Vec::new();

        for (idx, current) in candidates.iter().enumerate() {
            let mut earlier: BTreeSet<usize> = BTreeSet::new();
            if let Some(ids) = by_shape.get(current.func.shape_hash.as_str()) {
                earlier.extend(ids);
            }
            for value in &current.func.shape_fingerprint {
                if let Some(ids) = by_shingle.get(value) {
                    earlier.extend(ids);
                }
            }

            let mut best: Option<(usize, f64, bool)> = None;
            for other_idx in earlier {
                let other = &candidates[other_idx];
                if other.file == current.file
                    && (other.func.contains(current.func) || current.func.contains(other.func))
                {
                    continue;
                }
                let identical = other.func.shape_hash == current.func.shape_hash;
                let similarity = if identical {
                    1.0
                } else {
                    jaccard(&other.func.shape_fingerprint, &current.func.shape_fingerprint)
                };
                if similarity < config.duplicate_similarity {
                    continue;
                }
                // Highest similarity wins, then the earliest function.
                if best.map_or(true, |(_, s, _)| similarity > s) {
                    best = Some((other_idx, similarity, identical));
                }
            }

            if let Some((other_idx, similarity, identical)) = best {
                let other = &candidates[other_idx];
                let severity = if identical || similarity >= COPY_SIMILARITY {
                    Severity::High
                } else {
                    Severity::Medium
                };
                findings.push(
                    finding(
                        self.id(),
                        "duplication",
                        severity,
                        current.file,
                        current.func.line,
                        format!(
                            "Function \"{}\" is {:.0}% structurally similar to \"{}\" ({}:{})",
                            current.func.name,
                            similarity * 100.0,
                            other.func.name,
                            other.file,
                            other.func.line
                        ),
                    )
                    .with_snippet(current.func.signature.clone())
                    .with_confidence(similarity),
                );
            }

            by_shape.entry(current.func.shape_hash.as_str()).or_default().push(idx);
            for value in &current.func.shape_fingerprint {
                by_shingle.entry(*value).or_default().push(idx);
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{file, function};
    use super::*;
    use crate::analysis::{LanguageAnalyzer, ParseOptions, PythonAnalyzer};

    fn facts(path: &str, source: &str) -> FileFact {
        let analyzer = PythonAnalyzer::new();
        let parsed = analyzer
            .parse(path, source.as_bytes(), &ParseOptions::default())
            .unwrap();
        analyzer.extract_facts(&parsed).unwrap()
    }

    const ORIGINAL: &str = r#"
def total_price(items, rate):
    total = 0
    for item in items:
        if item.active:
            total += item.price * rate
    return round(total, 2)
"#;

    const RENAMED: &str = r#"
def sum_weights(parcels, factor):
    acc = 0
    for parcel in parcels:
        if parcel.active:
            acc += parcel.weight * factor
    return round(acc, 2)
"#;

    const DIFFERENT: &str = r#"
def describe(task):
    parts = [task.title]
    while task.parent is not None:
        task = task.parent
        parts.append(task.title)
    return " / ".join(reversed(parts))
"#;

    #[test]
    fn test_renamed_copy_is_reported_at_the_later_function() {
        let files = vec![
            facts("app/billing.py", ORIGINAL),
            facts("app/shipping.py", RENAMED),
            facts("app/tasks.py", DIFFERENT),
        ];
        let findings = NearDuplicate.detect(&files, &GovernanceConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "app/shipping.py");
        assert_eq!(findings[0].line, 2);
        assert_eq!(findings[0].severity, Severity::High);
        assert!(findings[0].message.contains("app/billing.py:2"));
    }

    #[test]
    fn test_short_functions_are_ignored() {
        let mut a = function("a", 1, 3, 1);
        let mut b = function("b", 10, 3, 1);
        a.shape_hash = "same".to_string();
        b.shape_hash = "same".to_string();
        let files = vec![file("x.py", vec![a, b])];
        assert!(NearDuplicate.detect(&files, &GovernanceConfig::default()).is_empty());
    }

    #[test]
    fn test_identical_shapes_without_fingerprints() {
        let mut a = function("a", 1, 6, 1);
        let mut b = function("b", 10, 6, 1);
        a.shape_hash = "same".to_string();
        b.shape_hash = "same".to_string();
        let files = vec![file("x.py", vec![a]), file("y.py", vec![b])];
        let findings = NearDuplicate.detect(&files, &GovernanceConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].file, "y.py");
        assert_eq!(findings[0].confidence, Some(1.0));
    }
}
