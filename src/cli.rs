//! Command-line interface for codestrata.

use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use crate::analysis::{AnalysisReport, Extractor};
use crate::architecture::{ArchitectureReasoner, ArchitectureReport};
use crate::config::Config;
use crate::detect::{GovernanceDetector, GovernanceReport, SecurityReport, SecurityScanner};
use crate::history::HistoryAnalyzer;
use crate::report::{self, Format};
use crate::snapshot::{SnapshotInput, SnapshotStore};

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Static analysis for Python projects: facts, security, governance,
/// architecture and history.
#[derive(Parser)]
#[command(name = "codestrata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (overrides CODESTRATA_LOG)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract facts, metrics and the dependency graph
    Analyze(AnalyzeArgs),
    /// Scan source files for security issues
    Security(AnalyzeArgs),
    /// Detect maintainability issues
    Governance(StageArgs),
    /// Reason about cycles, coupling and hotspots
    Architecture(StageArgs),
    /// Save, compare and list metric snapshots
    Snapshot {
        #[command(subcommand)]
        command: SnapshotCommand,
    },
    /// Summarize churn, authorship and velocity from git
    History(HistoryArgs),
    /// Run every stage and write all documents to a directory
    Run(RunArgs),
}

/// Where a stage document goes.
#[derive(Args)]
pub struct OutputArgs {
    /// Write the JSON document to this file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    pub format: Format,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Project root
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover at the project root)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub out: OutputArgs,
}

/// Arguments of stages that can start from a saved analysis document.
#[derive(Args)]
pub struct StageArgs {
    /// Project root
    #[arg(required_unless_present = "analysis", conflicts_with = "analysis")]
    pub path: Option<PathBuf>,

    /// Read facts from an analysis document instead of extracting them
    #[arg(long)]
    pub analysis: Option<PathBuf>,

    /// Path to config YAML file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args)]
pub struct HistoryArgs {
    /// Project root
    pub path: PathBuf,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Newest commits to read (overrides history.max_commits)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    pub commits: Option<u32>,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Subcommand)]
pub enum SnapshotCommand {
    /// Store a snapshot built from stage documents
    Save(SaveArgs),
    /// Compare the two most recent snapshots
    Diff(DiffArgs),
    /// Show every snapshot as a time series
    Trend(ProjectArgs),
    /// List stored snapshots
    List(ProjectArgs),
}

#[derive(Args)]
pub struct ProjectArgs {
    /// Project root
    pub project: PathBuf,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub out: OutputArgs,
}

#[derive(Args)]
pub struct SaveArgs {
    /// Project root
    pub project: PathBuf,

    #[arg(long)]
    pub analysis: PathBuf,

    #[arg(long)]
    pub security: Option<PathBuf>,

    #[arg(long)]
    pub governance: Option<PathBuf>,

    #[arg(long)]
    pub architecture: Option<PathBuf>,

    /// Snapshot label (default: current commit, or "manual")
    #[arg(short, long)]
    pub label: Option<String>,

    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct DiffArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Exit with status 1 when a regression is detected
    #[arg(long)]
    pub fail_on_regression: bool,
}

#[derive(Args)]
pub struct RunArgs {
    /// Project root
    pub path: PathBuf,

    /// Directory for the stage documents
    #[arg(long)]
    pub out_dir: PathBuf,

    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Also save a snapshot
    #[arg(long)]
    pub snapshot: bool,

    /// Snapshot label
    #[arg(short, long, requires = "snapshot")]
    pub label: Option<String>,

    /// Exit with status 1 when the new snapshot regresses
    #[arg(long, requires = "snapshot")]
    pub fail_on_regression: bool,
}

/// Dispatch a parsed command line.
pub fn run(cli: &Cli) -> anyhow::Result<i32> {
    match &cli.command {
        Commands::Analyze(args) => run_analyze(args),
        Commands::Security(args) => run_security(args),
        Commands::Governance(args) => run_governance(args),
        Commands::Architecture(args) => run_architecture(args),
        Commands::Snapshot { command } => match command {
            SnapshotCommand::Save(args) => run_snapshot_save(args),
            SnapshotCommand::Diff(args) => run_snapshot_diff(args),
            SnapshotCommand::Trend(args) => run_snapshot_trend(args),
            SnapshotCommand::List(args) => run_snapshot_list(args),
        },
        Commands::History(args) => run_history(args),
        Commands::Run(args) => run_all(args),
    }
}

/// Canonical project root, which must be a directory.
fn project_root(path: &Path) -> anyhow::Result<PathBuf> {
    let root = path
        .canonicalize()
        .with_context(|| format!("cannot access path {}", path.display()))?;
    if !root.is_dir() {
        anyhow::bail!("{} is not a directory", root.display());
    }
    Ok(root)
}

/// Write `doc` as JSON, and print its summary in pretty mode.
fn emit<T, F>(doc: &T, out: &OutputArgs, pretty: F) -> anyhow::Result<()>
where
    T: serde::Serialize,
    F: FnOnce(&mut io::StdoutLock<'static>, &T) -> io::Result<()>,
{
    match out.format {
        Format::Json => report::write_json(doc, out.output.as_deref()),
        Format::Pretty => {
            if let Some(path) = &out.output {
                report::write_json(doc, Some(path))?;
            }
            pretty(&mut io::stdout().lock(), doc)?;
            Ok(())
        }
    }
}

fn extract(root: &Path, config: &Config) -> anyhow::Result<AnalysisReport> {
    Extractor::new(root, config.clone()).run()
}

/// Facts from a saved document or a fresh extraction, plus the config.
fn load_analysis(args: &StageArgs) -> anyhow::Result<(AnalysisReport, Config)> {
    match (&args.analysis, &args.path) {
        (Some(doc), _) => {
            let config = Config::load(args.config.as_deref(), Path::new("."))?;
            Ok((report::read_json(doc)?, config))
        }
        (None, Some(path)) => {
            let root = project_root(path)?;
            let config = Config::load(args.config.as_deref(), &root)?;
            Ok((extract(&root, &config)?, config))
        }
        (None, None) => anyhow::bail!("either a project path or --analysis is required"),
    }
}

pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let root = project_root(&args.path)?;
    let config = Config::load(args.config.as_deref(), &root)?;
    let analysis = extract(&root, &config)?;
    emit(&analysis, &args.out, |w, r| report::print_analysis(w, r))?;
    Ok(EXIT_SUCCESS)
}

pub fn run_security(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    let root = project_root(&args.path)?;
    let config = Config::load(args.config.as_deref(), &root)?;
    let security = SecurityScanner::new(config).scan(&root)?;
    emit(&security, &args.out, |w, r| report::print_security(w, r))?;
    Ok(EXIT_SUCCESS)
}

pub fn run_governance(args: &StageArgs) -> anyhow::Result<i32> {
    let (analysis, config) = load_analysis(args)?;
    let governance = GovernanceDetector::new(config.governance).analyze(&analysis.project, &analysis.file_analyses);
    emit(&governance, &args.out, |w, r| report::print_governance(w, r))?;
    Ok(EXIT_SUCCESS)
}

pub fn run_architecture(args: &StageArgs) -> anyhow::Result<i32> {
    let (analysis, config) = load_analysis(args)?;
    let architecture = ArchitectureReasoner::new(config.architecture).analyze(&analysis);
    emit(&architecture, &args.out, |w, r| report::print_architecture(w, r))?;
    Ok(EXIT_SUCCESS)
}

pub fn run_history(args: &HistoryArgs) -> anyhow::Result<i32> {
    let root = project_root(&args.path)?;
    let mut config = Config::load(args.config.as_deref(), &root)?;
    if let Some(commits) = args.commits {
        config.history.max_commits = commits as usize;
    }
    let history = HistoryAnalyzer::new(&root, config.history).analyze()?;
    emit(&history, &args.out, |w, h| report::print_history(w, h))?;
    Ok(EXIT_SUCCESS)
}

fn open_store(project: &Path, config: Option<&Path>) -> anyhow::Result<SnapshotStore> {
    let root = project_root(project)?;
    let config = Config::load(config, &root)?;
    Ok(SnapshotStore::open(&root, &config.snapshots)?)
}

pub fn run_snapshot_save(args: &SaveArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.project, args.config.as_deref())?;

    let analysis: AnalysisReport = report::read_json(&args.analysis)?;
    let security: Option<SecurityReport> = args.security.as_deref().map(report::read_json).transpose()?;
    let governance: Option<GovernanceReport> = args.governance.as_deref().map(report::read_json).transpose()?;
    let architecture: Option<ArchitectureReport> =
        args.architecture.as_deref().map(report::read_json).transpose()?;

    let mut input = SnapshotInput::new(&analysis);
    if let Some(r) = &security {
        input = input.with_security(r);
    }
    if let Some(r) = &governance {
        input = input.with_governance(r);
    }
    if let Some(r) = &architecture {
        input = input.with_architecture(r);
    }

    let stored = store.save(&input, args.label.as_deref())?;
    println!("Saved {} ({})", stored.file, stored.snapshot.label);
    Ok(EXIT_SUCCESS)
}

pub fn run_snapshot_diff(args: &DiffArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.project.project, args.project.config.as_deref())?;
    let outcome = store.diff()?;
    let project = store.project().to_string();
    emit(&outcome, &args.project.out, |w, o| report::print_diff(w, &project, o))?;

    if args.fail_on_regression && outcome.regression_detected() {
        return Ok(EXIT_FAILED);
    }
    Ok(EXIT_SUCCESS)
}

pub fn run_snapshot_trend(args: &ProjectArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.project, args.config.as_deref())?;
    let trend = store.trend()?;
    emit(&trend, &args.out, |w, t| report::print_trend(w, t))?;
    Ok(EXIT_SUCCESS)
}

pub fn run_snapshot_list(args: &ProjectArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.project, args.config.as_deref())?;
    let snapshots = store.list()?;
    let project = store.project().to_string();
    let files: Vec<&str> = snapshots.iter().map(|s| s.file.as_str()).collect();
    emit(&files, &args.out, |w, _| report::print_snapshots(w, &project, &snapshots))?;
    Ok(EXIT_SUCCESS)
}

/// Run every stage and write `analysis.json`, `security.json`,
/// `governance.json`, `architecture.json` and `history.json` into `out_dir`.
pub fn run_all(args: &RunArgs) -> anyhow::Result<i32> {
    let root = project_root(&args.path)?;
    let config = Config::load(args.config.as_deref(), &root)?;

    let analysis = extract(&root, &config)?;
    let security = SecurityScanner::new(config.clone()).scan(&root)?;
    let governance =
        GovernanceDetector::new(config.governance.clone()).analyze(&analysis.project, &analysis.file_analyses);
    let architecture = ArchitectureReasoner::new(config.architecture.clone()).analyze(&analysis);
    let history = HistoryAnalyzer::new(&root, config.history.clone()).analyze()?;

    let out = &args.out_dir;
    report::write_json(&analysis, Some(&out.join("analysis.json")))?;
    report::write_json(&security, Some(&out.join("security.json")))?;
    report::write_json(&governance, Some(&out.join("governance.json")))?;
    report::write_json(&architecture, Some(&out.join("architecture.json")))?;
    report::write_json(&history, Some(&out.join("history.json")))?;
    info!(dir = %out.display(), "wrote stage documents");

    println!(
        "{}: security {}/100, governance {}/100, architecture {}/100",
        analysis.project, security.security_score, governance.governance_score, architecture.architecture_score
    );

    if !args.snapshot {
        return Ok(EXIT_SUCCESS);
    }

    let store = SnapshotStore::open(&root, &config.snapshots)?;
    let input = SnapshotInput::new(&analysis)
        .with_security(&security)
        .with_governance(&governance)
        .with_architecture(&architecture);
    let stored = store.save(&input, args.label.as_deref())?;
    println!("Saved {} ({})", stored.file, stored.snapshot.label);

    if args.fail_on_regression && store.diff()?.regression_detected() {
        return Ok(EXIT_FAILED);
    }
    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_stage_args_accept_analysis_document() {
        let cli = Cli::try_parse_from(["codestrata", "governance", "--analysis", "a.json"]).unwrap();
        match cli.command {
            Commands::Governance(args) => {
                assert!(args.path.is_none());
                assert_eq!(args.analysis.as_deref(), Some(Path::new("a.json")));
                assert_eq!(args.out.format, Format::Json);
            }
            _ => panic!("expected governance"),
        }
    }

    #[test]
    fn test_stage_args_need_an_input() {
        assert!(Cli::try_parse_from(["codestrata", "architecture"]).is_err());
        assert!(Cli::try_parse_from(["codestrata", "architecture", ".", "--analysis", "a.json"]).is_err());
    }

    #[test]
    fn test_snapshot_diff_flags() {
        let cli = Cli::try_parse_from(["codestrata", "-v", "snapshot", "diff", "proj", "--fail-on-regression"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Snapshot {
                command: SnapshotCommand::Diff(args),
            } => {
                assert!(args.fail_on_regression);
                assert_eq!(args.project.project, PathBuf::from("proj"));
            }
            _ => panic!("expected snapshot diff"),
        }
    }

    #[test]
    fn test_history_commit_override() {
        let cli = Cli::try_parse_from(["codestrata", "history", "proj", "--commits", "10", "-f", "pretty"]).unwrap();
        match cli.command {
            Commands::History(args) => {
                assert_eq!(args.commits, Some(10));
                assert_eq!(args.out.format, Format::Pretty);
            }
            _ => panic!("expected history"),
        }
        assert!(Cli::try_parse_from(["codestrata", "history", "proj", "--commits", "0"]).is_err());
    }

    #[test]
    fn test_project_root_rejects_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let file = dir.path().join("x.py");
        std::fs::write(&file, "").unwrap();
        assert!(project_root(&file).is_err());
        assert!(project_root(dir.path()).is_ok());
    }
}
