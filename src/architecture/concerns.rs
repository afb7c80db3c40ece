//! Concern separation: files mixing unrelated responsibilities.
//!
//! A file's concerns are inferred from the packages it imports and the
//! words its function names are made of. Test files are skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::analysis::FileFact;
use crate::detect::Severity;

/// Evidence entries kept per concern.
const MAX_EVIDENCE: usize = 3;

struct Concern {
    id: &'static str,
    keywords: &'static [&'static str],
    packages: &'static [&'static str],
}

const CONCERNS: &[Concern] = &[
    Concern {
        id: "io",
        keywords: &["open", "read", "write", "file", "path"],
        packages: &["io", "os", "pathlib", "shutil", "tempfile", "glob"],
    },
    Concern {
        id: "network",
        keywords: &["request", "response", "http", "url", "socket", "api"],
        packages: &["requests", "urllib", "http", "aiohttp", "httpx", "socket", "flask", "fastapi", "django"],
    },
    Concern {
        id: "database",
        keywords: &["query", "cursor", "execute", "commit", "session", "model"],
        packages: &["sqlalchemy", "sqlite3", "psycopg2", "pymongo", "redis", "mysql", "peewee"],
    },
    Concern {
        id: "presentation",
        keywords: &["render", "template", "view", "display", "format", "serialize", "jsonify"],
        packages: &["jinja2", "mako", "django.template"],
    },
    Concern {
        id: "logging",
        keywords: &["log", "logger", "logging", "debug", "warning", "error"],
        packages: &["logging", "loguru", "structlog"],
    },
    Concern {
        id: "testing",
        keywords: &["test", "assert", "mock", "fixture", "setup", "teardown"],
        packages: &["pytest", "unittest", "mock", "hypothesis"],
    },
    Concern {
        id: "business_logic",
        keywords: &["calculate", "compute", "process", "validate", "transform", "parse", "convert"],
        packages: &[],
    },
];

/// A file with three or more concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConcernMix {
    pub file: String,
    pub severity: Severity,
    pub concerns: Vec<String>,
    pub evidence: BTreeMap<String, Vec<String>>,
}

/// `module` is `package` or one of its submodules.
fn within(module: &str, package: &str) -> bool {
    module
        .strip_prefix(package)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Keyword matches on whole snake_case words, allowing a plural `s`.
fn names_keyword(name: &str, keyword: &str) -> bool {
    name.to_lowercase()
        .split('_')
        .any(|word| word == keyword || word.strip_suffix('s') == Some(keyword))
}

/// Concern ids of a file with their evidence.
pub fn file_concerns(file: &FileFact) -> BTreeMap<&'static str, Vec<String>> {
    let mut found: BTreeMap<&'static str, Vec<String>> = BTreeMap::new();
    let mut note = |id: &'static str, evidence: String| {
        let entry = found.entry(id).or_default();
        if entry.len() < MAX_EVIDENCE && !entry.contains(&evidence) {
            entry.push(evidence);
        }
    };

    for import in file.imports.iter().filter(|i| !i.is_relative()) {
        let module = import.module_path();
        let mut targets = vec![module.to_string()];
        targets.extend(import.names.iter().map(|n| format!("{}.{}", module, n)));
        for concern in CONCERNS {
            if concern
                .packages
                .iter()
                .any(|p| targets.iter().any(|t| within(t, p)))
            {
                note(concern.id, format!("imports {}", module));
            }
        }
    }

    for func in &file.functions {
        for concern in CONCERNS {
            if concern.keywords.iter().any(|k| names_keyword(&func.name, k)) {
                note(concern.id, format!("function {}", func.name));
            }
        }
    }

    found
}

pub fn find_concern_mixes(files: &[FileFact]) -> Vec<ConcernMix> {
    files
        .iter()
        .filter(|f| !f.path.to_lowercase().contains("test"))
        .filter_map(|file| {
            let concerns = file_concerns(file);
            let severity = match concerns.len() {
                0..=2 => return None,
                3 => Severity::Medium,
                _ => Severity::High,
            };
            Some(ConcernMix {
                file: file.path.clone(),
                severity,
                concerns: concerns.keys().map(|c| c.to_string()).collect(),
                evidence: concerns
                    .into_iter()
                    .map(|(id, evidence)| (id.to_string(), evidence))
                    .collect(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{ImportRef, LanguageAnalyzer, ParseOptions, PythonAnalyzer};

    fn facts(path: &str, source: &str) -> FileFact {
        let analyzer = PythonAnalyzer::new();
        let parsed = analyzer
            .parse(path, source.as_bytes(), &ParseOptions::default())
            .unwrap();
        analyzer.extract_facts(&parsed).unwrap()
    }

    #[test]
    fn test_within() {
        assert!(within("os", "os"));
        assert!(within("os.path", "os"));
        assert!(!within("osmosis", "os"));
        assert!(within("django.template.loader", "django.template"));
    }

    #[test]
    fn test_names_keyword() {
        assert!(names_keyword("render_report", "render"));
        assert!(names_keyword("load_models", "model"));
        assert!(!names_keyword("login", "log"));
        assert!(!names_keyword("catalog", "log"));
    }

    #[test]
    fn test_mixed_module_is_reported() {
        let source = r#"
import os
import sqlite3
import logging

def render_task(task):
    return str(task)

def calculate_total(items):
    return sum(items)
"#;
        let mixes = find_concern_mixes(&[facts("app/service.py", source)]);
        assert_eq!(mixes.len(), 1);
        assert_eq!(mixes[0].severity, Severity::High);
        assert_eq!(
            mixes[0].concerns,
            vec!["business_logic", "database", "io", "logging", "presentation"]
        );
        assert_eq!(mixes[0].evidence["io"], vec!["imports os"]);
    }

    #[test]
    fn test_focused_and_test_modules_are_clean() {
        let focused = r#"
import sqlite3

def run_query(sql):
    return sql
"#;
        let mut test_file = FileFact::empty("tests/test_service.py");
        test_file.imports = ["os", "sqlite3", "logging", "requests"]
            .iter()
            .enumerate()
            .map(|(i, m)| ImportRef {
                module: m.to_string(),
                names: Vec::new(),
                level: 0,
                line: i + 1,
                resolved: Vec::new(),
            })
            .collect();
        let files = vec![facts("app/store.py", focused), test_file];
        assert!(find_concern_mixes(&files).is_empty());
    }
}
