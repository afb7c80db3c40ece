//! codestrata - static analysis for Python codebases.
//!
//! A run is a pipeline of stages, each producing a JSON document the next
//! stage can consume:
//!
//! - `analysis`: the Extractor. Parses every `.py` file with tree-sitter
//!   into facts and project metrics
//! - `graph`: resolves imports into a file-level dependency graph
//! - `detect`: the Security Scanner and the Governance Detector
//! - `architecture`: cycles, coupling, hotspots and recommendations
//! - `snapshot`: append-only metric history with diffs and trends
//! - `history`: churn, authorship and velocity read from git
//! - `report`: JSON and terminal output
//!
//! Stages never mutate their inputs; each document can be written to disk
//! and fed back in later.

pub mod analysis;
pub mod architecture;
pub mod cli;
pub mod config;
pub mod detect;
pub mod error;
pub mod graph;
pub mod history;
pub mod report;
pub mod score;
pub mod snapshot;

pub use analysis::{register_analyzers, AnalysisReport, Extractor, FileFact, LanguageAnalyzer};
pub use architecture::{ArchitectureReasoner, ArchitectureReport};
pub use config::Config;
pub use detect::{Finding, GovernanceDetector, GovernanceReport, SecurityReport, SecurityScanner, Severity};
pub use graph::DependencyGraph;
pub use history::{GitHistory, HistoryAnalyzer};
pub use score::Grade;
pub use snapshot::{DiffOutcome, SnapshotInput, SnapshotStore};
