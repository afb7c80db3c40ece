//! Naming convention consistency within a module.

use std::collections::BTreeMap;
use std::fmt;

use super::{finding, Detector};
use crate::analysis::{FileFact, FunctionFact};
use crate::config::GovernanceConfig;
use crate::detect::{Finding, Severity};

/// Casing style of an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum NamingConvention {
    Snake,
    Camel,
    Pascal,
    Upper,
    Other,
}

impl NamingConvention {
    pub fn as_str(&self) -> &'static str {
        match self {
            NamingConvention::Snake => "snake_case",
            NamingConvention::Camel => "camelCase",
            NamingConvention::Pascal => "PascalCase",
            NamingConvention::Upper => "UPPER_CASE",
            NamingConvention::Other => "other",
        }
    }
}

impl fmt::Display for NamingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify `name`. Leading underscores are ignored.
pub fn naming_convention(name: &str) -> NamingConvention {
    let name = name.trim_start_matches('_');
    let has_upper = name.chars().any(|c| c.is_uppercase());
    let has_lower = name.chars().any(|c| c.is_lowercase());
    let has_underscore = name.contains('_');
    let first = match name.chars().next() {
        Some(c) => c,
        None => return NamingConvention::Other,
    };

    if !has_upper && has_lower {
        NamingConvention::Snake
    } else if has_upper && !has_lower {
        NamingConvention::Upper
    } else if has_underscore || !first.is_alphabetic() {
        NamingConvention::Other
    } else if first.is_lowercase() {
        NamingConvention::Camel
    } else {
        NamingConvention::Pascal
    }
}

/// Modules mixing casing conventions for functions of the same kind.
pub struct NamingInconsistency;

impl NamingInconsistency {
    fn check_group(
        &self,
        file: &FileFact,
        kind: &str,
        functions: &[&FunctionFact],
        config: &GovernanceConfig,
    ) -> Option<Finding> {
        if functions.len() < config.naming_min_names.max(1) {
            return None;
        }

        let conventions: Vec<NamingConvention> =
            functions.iter().map(|f| naming_convention(&f.name)).collect();
        let mut counts: BTreeMap<NamingConvention, usize> = BTreeMap::new();
        for c in &conventions {
            *counts.entry(*c).or_insert(0) += 1;
        }
        // Highest count wins; enum order breaks ties.
        let (dominant, dominant_count) = counts.iter().fold(
            (NamingConvention::Other, 0usize),
            |best, (c, n)| if *n > best.1 { (*c, *n) } else { best },
        );
        let dominance = dominant_count as f64 / functions.len() as f64;
        if dominance >= config.naming_dominance {
            return None;
        }

        let (first_outlier, _) = functions
            .iter()
            .zip(&conventions)
            .find(|(_, c)| **c != dominant)?;
        let breakdown: Vec<String> = counts.iter().map(|(c, n)| format!("{} {}", n, c)).collect();
        let severity = if dominance < 0.6 {
            Severity::Medium
        } else {
            Severity::Low
        };

        Some(
            finding(
                self.id(),
                "naming",
                severity,
                &file.path,
                first_outlier.line,
                format!(
                    "Mixed naming for {}: {} covers {:.0}% ({}); \"{}\" is the first outlier",
                    kind,
                    dominant,
                    dominance * 100.0,
                    breakdown.join(", "),
                    first_outlier.name
                ),
            )
            .with_confidence(1.0 - dominance),
        )
    }
}

impl Detector for NamingInconsistency {
    fn id(&self) -> &'static str {
        "naming_inconsistency"
    }

    fn detect(&self, files: &[FileFact], config: &GovernanceConfig) -> Vec<Finding> {
        let mut findings = Vec::new();
        for file in files {
            let (methods, functions): (Vec<&FunctionFact>, Vec<&FunctionFact>) = file
                .functions
                .iter()
                .filter(|f| f.is_public())
                .partition(|f| f.is_method);
            findings.extend(self.check_group(file, "functions", &functions, config));
            findings.extend(self.check_group(file, "methods", &methods, config));
        }
        findings
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{file, function, method};
    use super::*;

    #[test]
    fn test_naming_convention() {
        assert_eq!(naming_convention("load_tasks"), NamingConvention::Snake);
        assert_eq!(naming_convention("load"), NamingConvention::Snake);
        assert_eq!(naming_convention("_private_helper"), NamingConvention::Snake);
        assert_eq!(naming_convention("loadTasks"), NamingConvention::Camel);
        assert_eq!(naming_convention("LoadTasks"), NamingConvention::Pascal);
        assert_eq!(naming_convention("MAX_RETRIES"), NamingConvention::Upper);
        assert_eq!(naming_convention("load_Tasks"), NamingConvention::Other);
    }

    #[test]
    fn test_mixed_functions_reported_at_first_outlier() {
        let fact = file(
            "app/utils.py",
            vec![
                function("format_date", 1, 3, 1),
                function("parseDate", 5, 3, 1),
                function("slugify", 9, 3, 1),
                function("_privateThing", 13, 3, 1),
                function("to_json", 17, 3, 1),
            ],
        );
        let findings = NamingInconsistency.detect(&[fact], &GovernanceConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].line, 5);
        // 3 of 4 public names are snake_case
        assert_eq!(findings[0].severity, Severity::Low);
        assert_eq!(findings[0].confidence, Some(0.25));
    }

    #[test]
    fn test_methods_grouped_separately() {
        let fact = file(
            "app/models.py",
            vec![
                function("load_all", 1, 3, 1),
                function("save_all", 5, 3, 1),
                function("reset_all", 9, 3, 1),
                method("Task", "getTitle", 14, 2),
                method("Task", "setTitle", 17, 2),
                method("Task", "to_dict", 20, 2),
                method("Task", "from_dict", 23, 2),
            ],
        );
        let findings = NamingInconsistency.detect(&[fact], &GovernanceConfig::default());
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].severity, Severity::Medium);
        assert!(findings[0].message.contains("methods"));
    }

    #[test]
    fn test_consistent_or_small_groups_are_clean() {
        let fact = file(
            "app/a.py",
            vec![function("a_b", 1, 2, 1), function("cD", 4, 2, 1)],
        );
        assert!(NamingInconsistency
            .detect(&[fact], &GovernanceConfig::default())
            .is_empty());
    }
}
