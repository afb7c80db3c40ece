//! End-to-end tests of the analysis stages against the sample project.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use codestrata::analysis::{Extractor, LanguageAnalyzer, ParseOptions, PythonAnalyzer};
use codestrata::architecture::ArchitectureReasoner;
use codestrata::config::Config;
use codestrata::detect::{GovernanceDetector, SecurityScanner, Severity};
use codestrata::score::Grade;
use tempfile::TempDir;

fn sample_project() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata/sample_project")
}

fn analyze(root: &Path) -> codestrata::AnalysisReport {
    Extractor::new(root, Config::default())
        .run()
        .expect("extraction should succeed")
}

fn complexity_of(source: &str, name: &str) -> u32 {
    let analyzer = PythonAnalyzer::new();
    let parsed = analyzer
        .parse("snippet.py", source.as_bytes(), &ParseOptions::default())
        .expect("should parse");
    let facts = analyzer.extract_facts(&parsed).expect("should extract");
    facts
        .functions
        .iter()
        .find(|f| f.name == name)
        .map(|f| f.complexity)
        .expect("function should exist")
}

#[test]
fn test_sample_project_facts() {
    let report = analyze(&sample_project());

    assert_eq!(report.summary.total_files, 10);
    assert_eq!(report.summary.parse_errors, 0);
    assert!(report.summary.has_tests);

    let models = report.file("taskflow/models.py").expect("models.py");
    let classes: Vec<&str> = models.classes.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(classes, vec!["Task", "TaskStore"]);
    assert!(models.functions.iter().any(|f| f.name == "list_for" && f.is_method));

    for file in &report.file_analyses {
        for function in &file.functions {
            assert!(function.complexity >= 1, "{} in {}", function.name, file.path);
        }
    }
}

#[test]
fn test_sample_project_inventory() {
    let report = analyze(&sample_project());
    let inventory = &report.inventory;

    assert_eq!(inventory.tech_stack.languages, vec!["Python"]);
    assert_eq!(inventory.tech_stack.frameworks, vec!["Flask"]);
    assert_eq!(inventory.tech_stack.tools, vec!["Python (pip)"]);
    assert_eq!(inventory.language_stats["Python"].files, 10);
    assert_eq!(inventory.language_stats["Python"].lines, report.summary.total_lines);
    assert_eq!(inventory.entry_points, vec!["taskflow/app.py"]);
    assert_eq!(inventory.dependencies.python, vec!["flask>=3.0", "pytest==8.2.0"]);
    assert!(inventory.has_ci);
}

#[test]
fn test_one_more_branch_adds_one() {
    let base = "def f(x):\n    if x > 1:\n        return 1\n    return 0\n";
    let more = "def f(x):\n    if x > 1:\n        return 1\n    if x < -1:\n        return -1\n    return 0\n";
    assert_eq!(complexity_of(base, "f"), 2);
    assert_eq!(complexity_of(more, "f"), complexity_of(base, "f") + 1);
}

#[test]
fn test_graph_has_no_self_or_parallel_edges() {
    let report = analyze(&sample_project());
    let graph = &report.dependency_graph;

    let mut seen = BTreeSet::new();
    for edge in &graph.edges {
        assert_ne!(edge.source, edge.target);
        assert!(seen.insert((edge.source.clone(), edge.target.clone())), "duplicate edge {:?}", edge);
    }
    assert!(graph.successors("taskflow/routes.py").contains(&"taskflow/models.py".to_string()));
    assert!(graph.external_modules.contains(&"flask".to_string()));
}

#[test]
fn test_extraction_is_deterministic() {
    let first = analyze(&sample_project());
    let second = analyze(&sample_project());

    assert_eq!(
        serde_json::to_string(&first.file_analyses).unwrap(),
        serde_json::to_string(&second.file_analyses).unwrap()
    );
    assert_eq!(first.dependency_graph, second.dependency_graph);
    assert_eq!(first.project_metrics, second.project_metrics);
}

#[test]
fn test_single_hardcoded_secret() {
    let scanner = SecurityScanner::new(Config::default());
    let first = scanner.scan(&sample_project()).unwrap();
    let second = scanner.scan(&sample_project()).unwrap();

    let secrets: Vec<_> = first.findings.iter().filter(|f| f.category == "secrets").collect();
    assert_eq!(secrets.len(), 1);
    assert_eq!(secrets[0].file, "taskflow/settings.py");
    assert_eq!(secrets[0].line, 9);
    assert_eq!(secrets[0].kind, "security.hardcoded_secret");

    assert_eq!(first.findings, second.findings);
}

#[test]
fn test_suppressed_findings_are_listed_separately() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("config.py"),
        "SECRET_KEY = \"0123456789abcdef\"  # codestrata:ignore hardcoded_secret - fixture\n",
    )
    .unwrap();

    let report = SecurityScanner::new(Config::default()).scan(dir.path()).unwrap();
    assert!(report.findings.iter().all(|f| f.category != "secrets"));
    assert_eq!(report.suppressed.len(), 1);
    assert_eq!(report.suppressed[0].finding.kind, "security.hardcoded_secret");
}

#[test]
fn test_three_file_cycle_is_one_cycle() {
    let analysis = analyze(&sample_project());
    let report = ArchitectureReasoner::default().analyze(&analysis);

    assert_eq!(
        report.cycles,
        vec![vec!["taskflow/audit.py", "taskflow/events.py", "taskflow/notify.py"]]
    );
    assert_eq!(report.cycle_details[0].length, 3);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.contains("taskflow/audit.py -> taskflow/events.py -> taskflow/notify.py -> taskflow/audit.py")));
}

#[test]
fn test_relative_import_in_package_init() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("pkg")).unwrap();
    fs::write(dir.path().join("pkg/__init__.py"), "from .core import run\n").unwrap();
    fs::write(dir.path().join("pkg/core.py"), "def run():\n    return 1\n").unwrap();

    let report = analyze(dir.path());
    assert_eq!(
        report.dependency_graph.successors("pkg/__init__.py"),
        &["pkg/core.py".to_string()]
    );
}

#[test]
fn test_empty_project_is_neutral() {
    let dir = TempDir::new().unwrap();
    let analysis = analyze(dir.path());

    assert_eq!(analysis.summary.total_files, 0);
    assert_eq!(analysis.project_metrics.avg_complexity, 0.0);
    assert_eq!(analysis.project_metrics.max_complexity, 0);
    assert_eq!(analysis.dependency_graph.node_count(), 0);

    let security = SecurityScanner::new(Config::default()).scan(dir.path()).unwrap();
    assert_eq!(security.security_score, 100);
    assert_eq!(security.security_grade, Grade::A);

    let governance = GovernanceDetector::default().analyze(&analysis.project, &analysis.file_analyses);
    assert_eq!(governance.total_findings, 0);

    let architecture = ArchitectureReasoner::default().analyze(&analysis);
    assert_eq!(architecture.architecture_score, 100);
    assert!(architecture.cycles.is_empty());

    serde_json::to_string(&analysis).unwrap();
    serde_json::to_string(&architecture).unwrap();
}

#[test]
fn test_governance_on_sample_project() {
    let analysis = analyze(&sample_project());
    let report = GovernanceDetector::default().analyze(&analysis.project, &analysis.file_analyses);

    assert!(report.findings.iter().all(|f| f.kind.starts_with("governance.")));
    assert!(report.findings.iter().all(|f| f.severity <= Severity::High));
    assert!(report.governance_score <= 100);
}

#[test]
fn test_config_defaults_from_empty_yaml() {
    let config = Config::parse_str("").unwrap();
    let defaults = Config::default();
    assert_eq!(
        serde_yaml::to_string(&config).unwrap(),
        serde_yaml::to_string(&defaults).unwrap()
    );
    let reparsed = Config::parse_str(&serde_yaml::to_string(&defaults).unwrap()).unwrap();
    assert_eq!(reparsed.architecture.max_cycle_length, defaults.architecture.max_cycle_length);
}
