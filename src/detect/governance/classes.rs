//! Class-level detectors: generic vocabularies and trivial wrappers.

use super::{finding, Detector};
use crate::analysis::{FileFact, FunctionFact};
use crate::config::GovernanceConfig;
use crate::detect::{Finding, Severity};

/// Method names that say nothing about what the method does.
const GENERIC_NAMES: &[&str] = &[
    "process", "handle", "run", "execute", "do", "manage", "data", "info", "helper", "util",
    "item", "obj", "thing", "stuff", "temp", "foo", "bar", "get", "set", "update", "perform",
    "compute",
];

const GENERIC_SUFFIXES: &[&str] = &["_data", "_item"];

pub fn is_generic_name(name: &str) -> bool {
    let lower = name.to_lowercase();
    let stem = GENERIC_SUFFIXES
        .iter()
        .find_map(|s| lower.strip_suffix(s))
        .unwrap_or(lower.as_str());
    GENERIC_NAMES.contains(&stem)
}

/// Methods defined directly in the class at `class_index`.
fn direct_methods<'a>(file: &'a FileFact, class_index: usize) -> Vec<&'a FunctionFact> {
    let class = &file.classes[class_index];
    file.methods_of(class).filter(|f| f.is_method).collect()
}

/// Classes whose public methods all carry generic names.
pub struct GenericMembers;

impl Detector for GenericMembers {
    fn id(&self) -> &'static str {
        "generic_members"
    }

    fn detect(&self, files: &[FileFact], config: &GovernanceConfig) -> Vec<Finding> {
        let mut findings = Vec::new();
        for file in files {
            for (idx, class) in file.classes.iter().enumerate() {
                let public: Vec<&str> = direct_methods(file, idx)
                    .into_iter()
                    .filter(|m| m.is_public())
                    .map(|m| m.name.as_str())
                    .collect();
                if public.len() < config.generic_min_members.max(1)
                    || !public.iter().all(|n| is_generic_name(n))
                {
                    continue;
                }
                let confidence = (0.6 + 0.1 * public.len().saturating_sub(2) as f64).min(0.9);
                findings.push(
                    finding(
                        self.id(),
                        "naming",
                        Severity::Medium,
                        &file.path,
                        class.line,
                        format!(
                            "Class \"{}\" only exposes generic methods: {}",
                            class.name,
                            public.join(", ")
                        ),
                    )
                    .with_confidence(confidence),
                );
            }
        }
        findings
    }
}

/// Classes that wrap exactly one trivial method.
pub struct ShallowClass;

impl Detector for ShallowClass {
    fn id(&self) -> &'static str {
        "shallow_class"
    }

    fn detect(&self, files: &[FileFact], _config: &GovernanceConfig) -> Vec<Finding> {
        let mut findings = Vec::new();
        for file in files {
            for (idx, class) in file.classes.iter().enumerate() {
                let methods: Vec<&FunctionFact> = direct_methods(file, idx)
                    .into_iter()
                    .filter(|m| !m.is_dunder())
                    .collect();
                let only = match methods.as_slice() {
                    [only] => *only,
                    _ => continue,
                };
                if only.statement_count > 1 || only.complexity != 1 {
                    continue;
                }
                findings.push(
                    finding(
                        self.id(),
                        "abstraction",
                        Severity::Low,
                        &file.path,
                        class.line,
                        format!(
                            "Class \"{}\" wraps a single trivial method \"{}\"; a function would do",
                            class.name, only.name
                        ),
                    )
                    .with_confidence(0.5),
                );
            }
        }
        findings
    }
}
