//! Function size and shape detectors.

use super::{finding, Detector};
use crate::analysis::FileFact;
use crate::config::GovernanceConfig;
use crate::detect::{Finding, Severity};

/// Functions longer than the configured limit.
pub struct LongFunction;

impl Detector for LongFunction {
    fn id(&self) -> &'static str {
        "long_function"
    }

    fn detect(&self, files: &[FileFact], config: &GovernanceConfig) -> Vec<Finding> {
        let limit = config.max_function_lines;
        let mut findings = Vec::new();
        for file in files {
            for func in file.functions.iter().filter(|f| f.line_count > limit) {
                let severity = if func.line_count >= limit * 2 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let overshoot = (func.line_count - limit) as f64 / limit.max(1) as f64;
                findings.push(
                    finding(
                        self.id(),
                        "size",
                        severity,
                        &file.path,
                        func.line,
                        format!(
                            "Function \"{}\" is {} lines long (limit {})",
                            func.name, func.line_count, limit
                        ),
                    )
                    .with_snippet(func.signature.clone())
                    .with_confidence(0.5 + 0.5 * overshoot),
                );
            }
        }
        findings
    }
}

/// Long functions with little branching: boilerplate or unrolled logic.
pub struct VerboseFunction;

impl Detector for VerboseFunction {
    fn id(&self) -> &'static str {
        "verbose_function"
    }

    fn detect(&self, files: &[FileFact], config: &GovernanceConfig) -> Vec<Finding> {
        let mut findings = Vec::new();
        for file in files {
            for func in &file.functions {
                if func.line_count == 0 {
                    continue;
                }
                let density = func.complexity as f64 / func.line_count as f64;
                let (severity, confidence) = if density < config.verbose_density_high
                    && func.line_count >= config.verbose_min_lines_high
                {
                    (Severity::High, 0.7)
                } else if density < config.verbose_density_medium
                    && func.line_count >= config.verbose_min_lines_medium
                {
                    (Severity::Medium, 0.5)
                } else {
                    continue;
                };
                findings.push(
                    finding(
                        self.id(),
                        "verbosity",
                        severity,
                        &file.path,
                        func.line,
                        format!(
                            "Function \"{}\" has low logic density ({:.3}): {} lines but complexity {}",
                            func.name, density, func.line_count, func.complexity
                        ),
                    )
                    .with_snippet(func.signature.clone())
                    .with_confidence(confidence),
                );
            }
        }
        findings
    }
}

/// Long functions with deeply nested blocks.
pub struct DeepNesting;

impl Detector for DeepNesting {
    fn id(&self) -> &'static str {
        "deep_nesting"
    }

    fn detect(&self, files: &[FileFact], config: &GovernanceConfig) -> Vec<Finding> {
        let mut findings = Vec::new();
        for file in files {
            for func in &file.functions {
                if func.nesting_depth < config.deep_nesting
                    || func.line_count < config.deep_nesting_min_lines
                {
                    continue;
                }
                let severity = if func.nesting_depth >= 4 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                let excess = (func.nesting_depth - config.deep_nesting) as f64;
                findings.push(
                    finding(
                        self.id(),
                        "abstraction",
                        severity,
                        &file.path,
                        func.line,
                        format!(
                            "Function \"{}\" nests {} levels deep over {} lines; extract the inner logic",
                            func.name, func.nesting_depth, func.line_count
                        ),
                    )
                    .with_snippet(func.signature.clone())
                    .with_confidence((0.6 + 0.1 * excess).min(0.9)),
                );
            }
        }
        findings
    }
}
