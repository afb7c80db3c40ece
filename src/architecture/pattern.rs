//! Architectural pattern guessed from file and directory names.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::analysis::round2;

/// Share of a pattern's indicators that must be present.
const MIN_CONFIDENCE: f64 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Mvc,
    Layered,
    Microservice,
    Package,
    Flat,
}

impl PatternKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatternKind::Mvc => "mvc",
            PatternKind::Layered => "layered",
            PatternKind::Microservice => "microservice",
            PatternKind::Package => "package",
            PatternKind::Flat => "flat",
        }
    }
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

const INDICATORS: &[(PatternKind, &[&str])] = &[
    (PatternKind::Mvc, &["models", "views", "controllers", "templates"]),
    (
        PatternKind::Layered,
        &["models", "services", "routes", "controllers", "repositories", "utils"],
    ),
    (PatternKind::Microservice, &["gateway", "service", "worker", "proto"]),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchitecturePattern {
    pub pattern: PatternKind,
    pub confidence: f64,
    pub matched_indicators: Vec<String>,
}

/// File stems and directory names of every path, lowercased.
fn path_names<'a>(paths: impl IntoIterator<Item = &'a str>) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    for path in paths {
        let mut parts: Vec<&str> = path.split('/').collect();
        if let Some(file) = parts.pop() {
            names.insert(file.trim_end_matches(".py").to_lowercase());
        }
        names.extend(parts.iter().map(|p| p.to_lowercase()));
    }
    names
}

pub fn detect_pattern<'a>(paths: impl IntoIterator<Item = &'a str>) -> ArchitecturePattern {
    let paths: Vec<&str> = paths.into_iter().collect();
    let names = path_names(paths.iter().copied());

    let mut best: Option<(PatternKind, f64, Vec<String>)> = None;
    for (kind, indicators) in INDICATORS {
        let matched: Vec<String> = indicators
            .iter()
            .filter(|i| names.contains(**i))
            .map(|i| i.to_string())
            .collect();
        let score = matched.len() as f64 / indicators.len() as f64;
        if score > best.as_ref().map_or(0.0, |b| b.1) {
            best = Some((*kind, score, matched));
        }
    }

    match best {
        Some((pattern, confidence, matched_indicators)) if confidence >= MIN_CONFIDENCE => {
            ArchitecturePattern {
                pattern,
                confidence: round2(confidence),
                matched_indicators,
            }
        }
        _ => {
            // No named layout: nested sources make a package, else flat.
            let nested = paths.iter().filter(|p| p.contains('/')).count();
            let (pattern, share) = if nested > 0 {
                (PatternKind::Package, nested as f64 / paths.len() as f64)
            } else {
                (PatternKind::Flat, if paths.is_empty() { 0.0 } else { 1.0 })
            };
            ArchitecturePattern {
                pattern,
                confidence: round2(share),
                matched_indicators: Vec::new(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layered_layout() {
        let detected = detect_pattern([
            "app/__init__.py",
            "app/models.py",
            "app/routes.py",
            "app/utils.py",
        ]);
        assert_eq!(detected.pattern, PatternKind::Layered);
        assert_eq!(detected.confidence, 0.5);
        assert_eq!(detected.matched_indicators, vec!["models", "routes", "utils"]);
    }

    #[test]
    fn test_mvc_layout() {
        let detected = detect_pattern(["web/models/task.py", "web/views/task.py", "web/templates/render.py"]);
        assert_eq!(detected.pattern, PatternKind::Mvc);
        assert_eq!(detected.confidence, 0.75);
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(detect_pattern(["main.py", "helpers.py"]).pattern, PatternKind::Flat);
        let package = detect_pattern(["setup.py", "pkg/core.py", "pkg/cli.py", "pkg/__init__.py"]);
        assert_eq!(package.pattern, PatternKind::Package);
        assert_eq!(package.confidence, 0.75);
        assert_eq!(detect_pattern(Vec::<&str>::new()).confidence, 0.0);
    }
}
