//! Output formatting for stage documents.
//!
//! Two formats:
//! - JSON: the stage document itself, pretty-printed, for the next stage
//! - Pretty: a colored terminal summary for humans

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use colored::*;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::analysis::AnalysisReport;
use crate::architecture::ArchitectureReport;
use crate::detect::{Finding, GovernanceReport, SecurityReport, Severity, SuppressedFinding};
use crate::history::GitHistory;
use crate::score::Grade;
use crate::snapshot::{DiffOutcome, StoredSnapshot, Trend};

/// How many findings the pretty summary lists before eliding the rest.
const MAX_LISTED: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    Json,
    Pretty,
}

// =============================================================================
// JSON
// =============================================================================

/// Write `value` as pretty JSON to `output`, or to stdout.
pub fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .with_context(|| format!("cannot create {}", parent.display()))?;
            }
            fs::write(path, json + "\n").with_context(|| format!("cannot write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote report");
        }
        None => {
            let mut out = io::stdout().lock();
            writeln!(out, "{}", json)?;
        }
    }
    Ok(())
}

/// Read a stage document written by [`write_json`].
pub fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("{} is not a valid stage document", path.display()))
}

// =============================================================================
// Pretty
// =============================================================================

fn header(out: &mut impl Write, stage: &str, project: &str) -> io::Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "  {} {} v{}",
        "codestrata".cyan().bold(),
        stage.bold(),
        env!("CARGO_PKG_VERSION")
    )?;
    writeln!(out, "  {}{}", "Project: ".dimmed(), project)?;
    writeln!(out)
}

fn colored_grade(grade: Grade) -> ColoredString {
    let s = grade.as_str();
    match grade {
        Grade::A => s.green().bold(),
        Grade::B => s.green(),
        Grade::C => s.yellow(),
        Grade::D => s.yellow().bold(),
        Grade::F => s.red(),
    }
}

fn colored_score(score: u32) -> ColoredString {
    let s = score.to_string();
    match score {
        90.. => s.green().bold(),
        75..=89 => s.green(),
        60..=74 => s.yellow(),
        45..=59 => s.yellow().bold(),
        _ => s.red(),
    }
}

fn severity_tag(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => "CRIT".red().bold(),
        Severity::High => "HIGH".red(),
        Severity::Medium => "MED ".yellow(),
        Severity::Low => "LOW ".blue(),
    }
}

fn score_line(out: &mut impl Write, label: &str, score: u32, grade: Grade) -> io::Result<()> {
    writeln!(
        out,
        "  {}: {}/100  Grade: {}",
        label,
        colored_score(score),
        colored_grade(grade)
    )
}

fn severity_line(
    out: &mut impl Write,
    counts: &std::collections::BTreeMap<Severity, usize>,
) -> io::Result<()> {
    let parts: Vec<String> = Severity::ALL
        .iter()
        .map(|s| format!("{} {}", counts.get(s).copied().unwrap_or(0), s))
        .collect();
    writeln!(out, "  {}", parts.join(", ").dimmed())
}

fn findings(out: &mut impl Write, findings: &[Finding], suppressed: &[SuppressedFinding]) -> io::Result<()> {
    if !findings.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {} ({}):", "Findings".bold(), findings.len())?;
        writeln!(out)?;
        for f in findings.iter().take(MAX_LISTED) {
            writeln!(
                out,
                "    {}  {:<34}{}{}",
                severity_tag(f.severity),
                f.kind.dimmed(),
                f.file.blue(),
                format!(":{}", f.line).dimmed()
            )?;
            writeln!(out, "          {}", f.message)?;
        }
        if findings.len() > MAX_LISTED {
            writeln!(out, "    {}", format!("... and {} more", findings.len() - MAX_LISTED).dimmed())?;
        }
    }
    if !suppressed.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {} ({})", "Suppressed".dimmed(), suppressed.len())?;
    }
    Ok(())
}

pub fn print_analysis(out: &mut impl Write, report: &AnalysisReport) -> io::Result<()> {
    header(out, "analyze", &report.project)?;
    let s = &report.summary;
    let pm = &report.project_metrics;
    writeln!(
        out,
        "  Files: {} ({} analyzed, {} parse errors)  Lines: {}",
        s.total_files, s.analyzed_files, s.parse_errors, s.total_lines
    )?;
    writeln!(
        out,
        "  Functions: {}  Classes: {}  Dependencies: {}",
        s.total_functions,
        s.total_classes,
        report.dependency_graph.edge_count()
    )?;
    writeln!(
        out,
        "  Complexity: avg {:.2}, median {:.2}, max {}",
        pm.avg_complexity, pm.median_complexity, pm.max_complexity
    )?;
    writeln!(
        out,
        "  Docstrings: {:.0}%  Type hints: {:.0}%",
        pm.docstring_coverage * 100.0,
        pm.type_hint_coverage * 100.0
    )?;

    let inv = &report.inventory;
    if !inv.tech_stack.languages.is_empty() {
        let mut stack = inv.tech_stack.languages.clone();
        stack.extend(inv.tech_stack.frameworks.iter().cloned());
        writeln!(out, "  Stack: {}", stack.join(", "))?;
    }
    if !inv.tech_stack.tools.is_empty() {
        writeln!(out, "  Tools: {}", inv.tech_stack.tools.join(", ").dimmed())?;
    }
    if !inv.entry_points.is_empty() {
        writeln!(out, "  Entry points: {}", inv.entry_points.join(", "))?;
    }
    writeln!(
        out,
        "  Declared dependencies: {}  CI: {}",
        inv.dependencies.python.len() + inv.dependencies.node.len(),
        if inv.has_ci { "yes".green() } else { "no".yellow() }
    )?;

    if !pm.hotspot_functions.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", "Hotspots:".bold())?;
        for f in pm.hotspot_functions.iter().take(5) {
            writeln!(
                out,
                "    {:>3}  {} {}",
                f.complexity,
                f.name,
                format!("({}:{})", f.file, f.line).dimmed()
            )?;
        }
    }
    findings(out, &report.parse_errors, &[])?;
    writeln!(out)
}

pub fn print_security(out: &mut impl Write, report: &SecurityReport) -> io::Result<()> {
    header(out, "security", &report.project)?;
    score_line(out, "Security", report.security_score, report.security_grade)?;
    severity_line(out, &report.severity_counts)?;
    writeln!(out, "  {} files scanned", report.files_scanned)?;
    findings(out, &report.findings, &report.suppressed)?;
    writeln!(out)
}

pub fn print_governance(out: &mut impl Write, report: &GovernanceReport) -> io::Result<()> {
    header(out, "governance", &report.project)?;
    score_line(out, "Governance", report.governance_score, report.governance_grade)?;
    severity_line(out, &report.severity_counts)?;
    findings(out, &report.findings, &report.suppressed)?;
    if !report.recommendations.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", "Recommendations:".bold())?;
        for r in &report.recommendations {
            writeln!(out, "    - {}", r)?;
        }
    }
    writeln!(out)
}

pub fn print_architecture(out: &mut impl Write, report: &ArchitectureReport) -> io::Result<()> {
    header(out, "architecture", &report.project)?;
    score_line(out, "Architecture", report.architecture_score, report.architecture_grade)?;
    writeln!(
        out,
        "  Layout: {} ({:.0}% confidence)  Coupling density: {:.3}",
        report.pattern.pattern,
        report.pattern.confidence * 100.0,
        report.coupling.density
    )?;

    if !report.cycles.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {} ({}):", "Cycles".bold(), report.cycles.len())?;
        for cycle in report.complete_cycles() {
            writeln!(out, "    {}  {}", severity_tag(cycle.severity), cycle.chain())?;
        }
    }
    if !report.god_module_details.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {} ({}):", "God modules".bold(), report.god_module_details.len())?;
        for g in &report.god_module_details {
            writeln!(
                out,
                "    {}  {} {}",
                severity_tag(g.severity),
                g.file.blue(),
                format!("(fan-in {}, fan-out {}, {} lines)", g.fan_in, g.fan_out, g.line_count).dimmed()
            )?;
        }
    }
    if !report.bottlenecks.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {} ({}):", "Bottlenecks".bold(), report.bottlenecks.len())?;
        for b in &report.bottlenecks {
            writeln!(
                out,
                "    {}  {} {}",
                severity_tag(b.severity),
                b.file.blue(),
                format!("(fan-in {}, avg complexity {:.2})", b.fan_in, b.avg_complexity).dimmed()
            )?;
        }
    }
    if !report.recommendations.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", "Recommendations:".bold())?;
        for r in &report.recommendations {
            writeln!(out, "    {}", r)?;
        }
    }
    writeln!(out)?;
    writeln!(out, "  {}", report.summary)?;
    writeln!(out)
}

pub fn print_diff(out: &mut impl Write, project: &str, outcome: &DiffOutcome) -> io::Result<()> {
    header(out, "snapshot diff", project)?;
    let report = match outcome {
        DiffOutcome::NotEnoughHistory { available } => {
            writeln!(
                out,
                "  Not enough history: {} snapshot(s), at least 2 needed",
                available
            )?;
            return writeln!(out);
        }
        DiffOutcome::Compared(report) => report,
    };

    writeln!(
        out,
        "  {} ({})  ->  {} ({})",
        report.previous.label,
        report.previous.timestamp.format("%Y-%m-%d %H:%M:%S"),
        report.current.label,
        report.current.timestamp.format("%Y-%m-%d %H:%M:%S")
    )?;
    writeln!(out)?;

    if report.regressions.is_empty() {
        writeln!(out, "  {}", "✓ No regressions".green())?;
    } else {
        writeln!(out, "  {} ({}):", "✗ Regressions".red(), report.regressions.len())?;
        for r in &report.regressions {
            writeln!(
                out,
                "    {}  {:<28} {} -> {} ({:+})",
                severity_tag(r.severity),
                r.metric,
                r.previous,
                r.current,
                r.delta
            )?;
        }
    }
    if !report.improvements.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {} ({}):", "Improvements".green(), report.improvements.len())?;
        for i in &report.improvements {
            writeln!(out, "    {:<34} {} -> {}", i.metric, i.previous, i.current)?;
        }
    }
    if !report.added_files.is_empty() || !report.removed_files.is_empty() {
        writeln!(out)?;
        writeln!(
            out,
            "  Files: {} added, {} removed",
            report.added_files.len(),
            report.removed_files.len()
        )?;
    }
    writeln!(out)
}

pub fn print_trend(out: &mut impl Write, trend: &Trend) -> io::Result<()> {
    header(out, "snapshot trend", &trend.project)?;
    writeln!(out, "  {} snapshots", trend.snapshot_count)?;
    if trend.changes.is_empty() {
        return writeln!(out);
    }
    writeln!(out)?;
    for (metric, change) in &trend.changes {
        let pct = change
            .pct_change
            .map(|p| format!(" ({:+.1}%)", p))
            .unwrap_or_default();
        writeln!(
            out,
            "    {:<34} {} -> {}{}",
            metric,
            change.first,
            change.last,
            pct.dimmed()
        )?;
    }
    writeln!(out)
}

pub fn print_history(out: &mut impl Write, history: &GitHistory) -> io::Result<()> {
    header(out, "history", &history.project)?;
    if let Some(message) = &history.message {
        writeln!(out, "  {}", message.yellow())?;
        return writeln!(out);
    }
    writeln!(
        out,
        "  Commits: {} analyzed of {}  Velocity: {} /week ({})",
        history.analyzed_commits,
        history.total_commits,
        history.velocity.commits_per_week,
        serde_json::to_value(history.velocity.trend)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default()
    )?;
    let recent = &history.recent_activity;
    writeln!(
        out,
        "  Last {} days: {} commits on {} days",
        recent.period_days, recent.total_commits, recent.active_days
    )?;

    if !history.author_stats.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {}", "Authors:".bold())?;
        for a in history.author_stats.iter().take(5) {
            writeln!(out, "    {:<24} {:>4} commits {}", a.author, a.commits, format!("({}%)", a.percentage).dimmed())?;
        }
    }
    if !history.hotspots.is_empty() {
        writeln!(out)?;
        writeln!(out, "  {} ({}):", "Churn hotspots".bold(), history.hotspots.len())?;
        for h in history.hotspots.iter().take(MAX_LISTED) {
            writeln!(out, "    {}  {} {}", severity_tag(h.risk), h.file.blue(), h.reason.dimmed())?;
        }
    }
    writeln!(out)?;
    writeln!(out, "  {}", history.summary)?;
    writeln!(out)
}

pub fn print_snapshots(out: &mut impl Write, project: &str, snapshots: &[StoredSnapshot]) -> io::Result<()> {
    header(out, "snapshot list", project)?;
    if snapshots.is_empty() {
        writeln!(out, "  No snapshots")?;
    }
    for s in snapshots {
        writeln!(
            out,
            "    {}  {:<16} {}",
            s.snapshot.timestamp.format("%Y-%m-%d %H:%M:%S"),
            s.snapshot.label,
            s.file.dimmed()
        )?;
    }
    writeln!(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::Domain;
    use tempfile::TempDir;

    #[test]
    fn test_json_round_trip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/out.json");
        let finding = Finding::new(Domain::Security, "hardcoded_secret", "secrets", Severity::Critical, "app/config.py", 3, "secret");

        write_json(&finding, Some(&path)).unwrap();
        let back: Finding = read_json(&path).unwrap();
        assert_eq!(back.kind, "security.hardcoded_secret");
        assert_eq!(back.line, 3);
    }

    #[test]
    fn test_read_json_reports_bad_documents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        fs::write(&path, "[1, 2").unwrap();
        let err = read_json::<Finding>(&path).unwrap_err();
        assert!(err.to_string().contains("not a valid stage document"));
    }

    #[test]
    fn test_print_security_lists_findings() {
        let finding = Finding::new(Domain::Security, "eval_usage", "injection", Severity::High, "app/routes.py", 12, "eval() on input");
        let report = SecurityReport::new("demo".to_string(), 4, vec![finding], Vec::new());

        let mut buf = Vec::new();
        print_security(&mut buf, &report).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("demo"));
        assert!(text.contains("app/routes.py"));
        assert!(text.contains("eval() on input"));
        assert!(text.contains("4 files scanned"));
    }

    #[test]
    fn test_print_history_outside_git() {
        let history = GitHistory::unavailable("demo", "Not a git repository.", chrono::Utc::now());
        let mut buf = Vec::new();
        print_history(&mut buf, &history).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("demo"));
        assert!(text.contains("Not a git repository."));
        assert!(!text.contains("Velocity"));
    }

    #[test]
    fn test_print_diff_without_history() {
        let mut buf = Vec::new();
        print_diff(&mut buf, "demo", &DiffOutcome::NotEnoughHistory { available: 1 }).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Not enough history"));
    }
}
