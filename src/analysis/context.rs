//! The extraction run: discover, parse and resolve a whole project.
//!
//! The Extractor provides:
//! - Parallel per-file fact extraction on a bounded rayon pool
//! - Recovery of per-file parse failures as `parse.*` findings
//! - Import resolution and the dependency graph
//! - Project-wide metrics
//! - The project inventory of languages, tools and declared dependencies

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::discover::{discover_sources, relative_path};
use super::inventory::ProjectInventory;
use super::languages::python;
use super::{FileFact, LanguageAnalyzer, ParseOptions, ProjectMetrics};
use crate::config::Config;
use crate::detect::{sort_findings, Domain, Finding, Severity};
use crate::error::ParseError;
use crate::graph::DependencyGraph;

/// Counts describing one extraction run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    /// Every discovered source file, including the ones that failed to parse.
    pub total_files: usize,
    pub analyzed_files: usize,
    pub total_lines: usize,
    pub total_functions: usize,
    pub total_classes: usize,
    pub parse_errors: usize,
    pub has_tests: bool,
}

/// The Extractor's output document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub project: String,
    pub analyzed_at: DateTime<Utc>,
    pub summary: AnalysisSummary,
    pub project_metrics: ProjectMetrics,
    pub dependency_graph: DependencyGraph,
    #[serde(default)]
    pub inventory: ProjectInventory,
    pub file_analyses: Vec<FileFact>,
    pub parse_errors: Vec<Finding>,
}

impl AnalysisReport {
    /// Facts for a single file.
    pub fn file(&self, path: &str) -> Option<&FileFact> {
        self.file_analyses
            .binary_search_by(|f| f.path.as_str().cmp(path))
            .ok()
            .map(|i| &self.file_analyses[i])
    }
}

/// Build the worker pool for per-file stages.
///
/// `parallelism == 0` lets rayon pick the number of threads.
pub fn build_pool(parallelism: usize) -> anyhow::Result<rayon::ThreadPool> {
    let mut builder = rayon::ThreadPoolBuilder::new();
    if parallelism > 0 {
        builder = builder.num_threads(parallelism);
    }
    Ok(builder.build()?)
}

/// Runs fact extraction over a project root.
pub struct Extractor {
    root: PathBuf,
    config: Config,
}

impl Extractor {
    pub fn new<P: AsRef<Path>>(root: P, config: Config) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Analyze every source file under the root.
    ///
    /// Individual files that cannot be parsed are reported in
    /// `parse_errors`; only discovery and pool setup failures are fatal.
    pub fn run(&self) -> anyhow::Result<AnalysisReport> {
        let files = discover_sources(&self.root, &self.config)?;
        info!(root = %self.root.display(), files = files.len(), "extracting facts");

        let options = self.config.parse_options();
        let pool = build_pool(self.config.parallelism)?;
        let outcomes: Vec<Result<FileFact, Finding>> = pool.install(|| {
            files
                .par_iter()
                .map(|path| self.analyze_file(path, &options))
                .collect()
        });

        let mut facts = Vec::with_capacity(outcomes.len());
        let mut parse_errors = Vec::new();
        for outcome in outcomes {
            match outcome {
                Ok(fact) => facts.push(fact),
                Err(finding) => parse_errors.push(finding),
            }
        }

        // Completion order is arbitrary; everything downstream sees sorted input.
        facts.sort_by(|a, b| a.path.cmp(&b.path));
        sort_findings(&mut parse_errors);

        let dependency_graph = DependencyGraph::build(&mut facts);
        let project_metrics = ProjectMetrics::compute(&facts);
        debug!(
            edges = dependency_graph.edge_count(),
            external = dependency_graph.external_modules.len(),
            "dependency graph built"
        );
        let inventory = ProjectInventory::collect(&self.root, &self.config, &dependency_graph.external_modules)?;

        let summary = AnalysisSummary {
            total_files: files.len(),
            analyzed_files: facts.len(),
            total_lines: facts.iter().map(|f| f.line_count).sum(),
            total_functions: project_metrics.total_functions,
            total_classes: project_metrics.total_classes,
            parse_errors: parse_errors.len(),
            has_tests: files
                .iter()
                .any(|p| relative_path(&self.root, p).to_lowercase().contains("test")),
        };

        Ok(AnalysisReport {
            project: project_name(&self.root),
            analyzed_at: Utc::now(),
            summary,
            project_metrics,
            dependency_graph,
            inventory,
            file_analyses: facts,
            parse_errors,
        })
    }

    /// Extract facts for one file, or the Finding describing why not.
    fn analyze_file(&self, path: &Path, options: &ParseOptions) -> Result<FileFact, Finding> {
        let rel = relative_path(&self.root, path);
        let analyzer = python();

        let result = read_source(path, options)
            .map_err(anyhow::Error::from)
            .and_then(|source| Ok(analyzer.parse(&rel, &source, options)?))
            .and_then(|parsed| analyzer.extract_facts(&parsed));

        result.map_err(|err| {
            warn!(file = %rel, error = %err, "skipping file");
            parse_finding(&rel, &err)
        })
    }
}

/// Read a file, refusing oversized ones before loading them.
fn read_source(path: &Path, options: &ParseOptions) -> Result<Vec<u8>, ParseError> {
    let size = fs::metadata(path)?.len();
    if size > options.max_file_bytes {
        return Err(ParseError::TooLarge {
            size,
            limit: options.max_file_bytes,
        });
    }
    Ok(fs::read(path)?)
}

fn parse_finding(file: &str, err: &anyhow::Error) -> Finding {
    let (rule, line) = match err.downcast_ref::<ParseError>() {
        Some(parse_err) => (parse_err.rule(), parse_err.line()),
        None => ("extraction_failed", 1),
    };
    Finding::new(
        Domain::Parse,
        rule,
        "parse",
        Severity::Medium,
        file,
        line,
        format!("File excluded from analysis: {}", err),
    )
}

/// Directory name of the project root.
pub(crate) fn project_name(root: &Path) -> String {
    let canonical = root.canonicalize().unwrap_or_else(|_| root.to_path_buf());
    canonical
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| canonical.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn project() -> TempDir {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "app/__init__.py", "");
        write(
            dir.path(),
            "app/models.py",
            "class Task:\n    def __init__(self, title: str) -> None:\n        self.title = title\n",
        );
        write(
            dir.path(),
            "app/routes.py",
            "from .models import Task\nimport os\n\ndef create(title):\n    if title:\n        return Task(title)\n    return None\n",
        );
        write(dir.path(), "app/broken.py", "def broken(:\n    pass\n");
        dir
    }

    #[test]
    fn test_run_collects_facts_and_parse_errors() {
        let dir = project();
        let report = Extractor::new(dir.path(), Config::default()).run().unwrap();

        let paths: Vec<&str> = report.file_analyses.iter().map(|f| f.path.as_str()).collect();
        assert_eq!(paths, vec!["app/__init__.py", "app/models.py", "app/routes.py"]);
        assert_eq!(report.summary.total_files, 4);
        assert_eq!(report.summary.analyzed_files, 3);
        assert_eq!(report.summary.parse_errors, 1);
        assert_eq!(report.parse_errors[0].kind, "parse.syntax_error");
        assert_eq!(report.parse_errors[0].severity, Severity::Medium);
        assert_eq!(report.parse_errors[0].file, "app/broken.py");

        assert_eq!(report.dependency_graph.fan("app/models.py"), (1, 0));
        assert_eq!(report.dependency_graph.external_modules, vec!["os"]);
        let routes = report.file("app/routes.py").unwrap();
        assert_eq!(routes.imports[0].resolved, vec!["app/models.py"]);
        assert_eq!(report.project_metrics.total_functions, 2);

        assert_eq!(report.inventory.tech_stack.languages, vec!["Python"]);
        assert_eq!(report.inventory.language_stats["Python"].files, 4);
        assert!(!report.inventory.has_ci);
    }

    #[test]
    fn test_run_is_deterministic() {
        let dir = project();
        let config = Config {
            parallelism: 4,
            ..Config::default()
        };
        let first = Extractor::new(dir.path(), config.clone()).run().unwrap();
        let second = Extractor::new(dir.path(), config).run().unwrap();
        assert_eq!(
            serde_json::to_string(&first.file_analyses).unwrap(),
            serde_json::to_string(&second.file_analyses).unwrap()
        );
        assert_eq!(first.dependency_graph, second.dependency_graph);
    }

    #[test]
    fn test_empty_project_is_neutral() {
        let dir = TempDir::new().unwrap();
        let report = Extractor::new(dir.path(), Config::default()).run().unwrap();
        assert_eq!(report.summary, AnalysisSummary::default());
        assert_eq!(report.project_metrics, ProjectMetrics::default());
        assert!(report.dependency_graph.edges.is_empty());
        assert_eq!(report.inventory, ProjectInventory::default());
    }

    #[test]
    fn test_oversized_file_is_reported() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "big.py", &"x = 1\n".repeat(100));
        let config = Config {
            max_file_bytes: 64,
            ..Config::default()
        };
        let report = Extractor::new(dir.path(), config).run().unwrap();
        assert!(report.file_analyses.is_empty());
        assert_eq!(report.parse_errors[0].kind, "parse.too_large");
    }
}
