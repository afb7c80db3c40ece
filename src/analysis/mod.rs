//! AST-backed fact extraction.
//!
//! This module turns a Python source tree into "facts" using tree-sitter:
//! - Functions and methods with parameters, complexity and documentation
//! - Classes with bases and method names
//! - Imports, later resolved against the project by [`crate::graph`]
//! - Per-function body shapes for near-duplicate detection
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source Files    │────▶│ Analyzer     │────▶│ FileFact      │
//! │ (discover)      │     │ (Python)     │     │ (Functions,   │
//! └─────────────────┘     └──────────────┘     │  Imports, etc)│
//!                                              └───────────────┘
//!                                                      │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ Dependency   │◀────│ Extractor     │
//!                         │ Graph        │     │ (run, sort)   │
//!                         └──────────────┘     └───────────────┘
//! ```
//!
//! # Adding a New Language
//!
//! 1. Create a new module in `src/analysis/languages/`
//! 2. Implement the `LanguageAnalyzer` trait
//! 3. Define tree-sitter queries for declarations, control flow and imports
//! 4. Register the analyzer in `languages/mod.rs`
//!
//! See `languages/python.rs` for the reference implementation.

mod context;
mod discover;
mod facts;
mod inventory;
mod languages;
mod metrics;
pub mod shape;
mod traits;
pub mod tree;

pub use context::{build_pool, AnalysisReport, AnalysisSummary, Extractor};
pub use discover::{discover_sources, relative_path, walk_files, DEFAULT_SKIP_DIRS};
pub use facts::{
    module_name_for_path, ClassFact, ControlFlowInfo, FileComplexity, FileFact, FunctionFact,
    ImportRef, Parameter, ParameterKind,
};
pub use inventory::{
    parse_package_json, parse_pyproject, parse_requirements, DeclaredDependencies, LanguageStats,
    ProjectInventory, TechStack,
};
pub use languages::{get_analyzer, python, register_analyzers, PythonAnalyzer};
pub use metrics::{ComplexityDistribution, FunctionRef, ProjectMetrics, TOP_FUNCTIONS};
pub use traits::{LanguageAnalyzer, ParseOptions, ParsedFile};

pub(crate) use context::project_name;
pub(crate) use facts::round2;
