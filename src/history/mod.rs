//! Git history: velocity, churn and authorship of a project.
//!
//! Reads the newest commits with the `git` binary and turns them into a
//! `GitHistory` document:
//! - per-file churn and churn hotspots
//! - per-author commit counts
//! - velocity and its trend between the older and newer half of the window
//! - commit size categories and recent activity by day
//!
//! A project outside any git work tree yields an unavailable document, not
//! an error.

mod log;

pub use log::{git_available, parse_log, FileChange, RawCommit};

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::analysis::{project_name, round2};
use crate::config::HistoryConfig;
use crate::detect::Severity;

/// Characters of the commit id shown in summaries.
const SHORT_HASH: usize = 8;
/// Churn entries considered for hotspots.
const HOTSPOT_CANDIDATES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommitSummary {
    pub hash: String,
    pub full_hash: String,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChurn {
    pub file: String,
    /// Numstat rows naming the file.
    pub change_count: usize,
    pub unique_commits: usize,
    pub total_added: usize,
    pub total_deleted: usize,
    pub total_churn: usize,
    pub last_changed: DateTime<FixedOffset>,
    /// Deleted over added lines.
    pub churn_ratio: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecentActivity {
    pub period_days: i64,
    pub total_commits: usize,
    pub avg_commits_per_day: f64,
    pub active_days: usize,
    /// Busiest day; the earliest one on ties.
    pub most_active_day: Option<String>,
    /// Commits per `YYYY-MM-DD`, in each commit's own timezone.
    pub daily_breakdown: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorStats {
    pub author: String,
    pub commits: usize,
    /// Share of the analyzed commits, one decimal.
    pub percentage: f64,
    pub first_commit: DateTime<FixedOffset>,
    pub last_commit: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityTrend {
    Accelerating,
    Steady,
    Decelerating,
    #[default]
    InsufficientData,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Velocity {
    pub total_span_days: i64,
    pub commits_per_week: f64,
    pub commits_per_day: f64,
    pub trend: VelocityTrend,
    /// Commits per week in the older half of the window.
    pub first_half_rate: f64,
    pub second_half_rate: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCategory {
    Tiny,
    Small,
    Medium,
    Large,
    Massive,
}

impl SizeCategory {
    /// Category of a commit changing `lines` lines.
    pub fn of(lines: usize) -> Self {
        match lines {
            0..=10 => SizeCategory::Tiny,
            11..=50 => SizeCategory::Small,
            51..=200 => SizeCategory::Medium,
            201..=500 => SizeCategory::Large,
            _ => SizeCategory::Massive,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSize {
    pub commit: String,
    pub message: String,
    pub files_changed: usize,
    pub insertions: usize,
    pub deletions: usize,
    pub total_changes: usize,
    pub category: SizeCategory,
}

/// A file that changes often or in bulk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChurnHotspot {
    pub file: String,
    pub risk: Severity,
    pub reason: String,
    pub change_count: usize,
    pub total_churn: usize,
}

/// The history stage's output document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GitHistory {
    pub project: String,
    pub analyzed_at: DateTime<Utc>,
    pub is_git_repo: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Non-merge commits touching the project, over the whole history.
    pub total_commits: usize,
    pub analyzed_commits: usize,
    pub commits: Vec<CommitSummary>,
    /// Sorted by total churn, largest first.
    pub file_churn: Vec<FileChurn>,
    pub recent_activity: RecentActivity,
    pub author_stats: Vec<AuthorStats>,
    pub velocity: Velocity,
    pub change_sizes: Vec<ChangeSize>,
    pub hotspots: Vec<ChurnHotspot>,
    pub summary: String,
}

impl GitHistory {
    /// Document for a project git cannot describe.
    pub fn unavailable(project: &str, message: &str, now: DateTime<Utc>) -> Self {
        Self {
            project: project.to_string(),
            analyzed_at: now,
            is_git_repo: false,
            message: Some(message.to_string()),
            total_commits: 0,
            analyzed_commits: 0,
            commits: Vec::new(),
            file_churn: Vec::new(),
            recent_activity: RecentActivity::default(),
            author_stats: Vec::new(),
            velocity: Velocity::default(),
            change_sizes: Vec::new(),
            hotspots: Vec::new(),
            summary: "No git history. History tracking requires git.".to_string(),
        }
    }

    /// Build the document from commits read newest first.
    pub fn from_commits(
        project: &str,
        commits: &[RawCommit],
        total_commits: usize,
        now: DateTime<Utc>,
        config: &HistoryConfig,
    ) -> Self {
        let file_churn = file_churn(commits);
        let velocity = velocity(commits);
        let summary = summarize(commits, &file_churn, &velocity);
        Self {
            project: project.to_string(),
            analyzed_at: now,
            is_git_repo: true,
            message: None,
            total_commits: total_commits.max(commits.len()),
            analyzed_commits: commits.len(),
            commits: commits.iter().map(commit_summary).collect(),
            hotspots: hotspots(&file_churn),
            file_churn,
            recent_activity: recent_activity(commits, now, config.recent_days),
            author_stats: author_stats(commits),
            velocity,
            change_sizes: commits.iter().map(change_size).collect(),
            summary,
        }
    }
}

/// Reads and summarizes the history of one project root.
pub struct HistoryAnalyzer {
    root: PathBuf,
    config: HistoryConfig,
}

impl HistoryAnalyzer {
    pub fn new<P: AsRef<Path>>(root: P, config: HistoryConfig) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            config,
        }
    }

    pub fn analyze(&self) -> anyhow::Result<GitHistory> {
        self.analyze_at(Utc::now())
    }

    /// Analyze with `now` as the reference time for recent activity.
    pub fn analyze_at(&self, now: DateTime<Utc>) -> anyhow::Result<GitHistory> {
        let project = project_name(&self.root);
        if !log::git_available() {
            return Ok(GitHistory::unavailable(&project, "git is not installed or not on PATH.", now));
        }
        if !log::is_work_tree(&self.root) {
            return Ok(GitHistory::unavailable(
                &project,
                "Not a git repository. Run `git init` to enable history tracking.",
                now,
            ));
        }

        let commits = if log::has_head(&self.root) {
            log::read_log(&self.root, self.config.max_commits)?
        } else {
            debug!(root = %self.root.display(), "repository has no commits yet");
            Vec::new()
        };
        let total = if commits.is_empty() {
            0
        } else {
            log::count_commits(&self.root).unwrap_or_else(|err| {
                debug!(error = %err, "commit count unavailable");
                commits.len()
            })
        };
        info!(root = %self.root.display(), commits = commits.len(), total, "read git history");

        Ok(GitHistory::from_commits(&project, &commits, total, now, &self.config))
    }
}

fn short(hash: &str) -> String {
    hash.chars().take(SHORT_HASH).collect()
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn commit_summary(commit: &RawCommit) -> CommitSummary {
    CommitSummary {
        hash: short(&commit.hash),
        full_hash: commit.hash.clone(),
        author: commit.author.clone(),
        date: commit.date,
        message: commit.subject.clone(),
    }
}

fn change_size(commit: &RawCommit) -> ChangeSize {
    let insertions = commit.insertions();
    let deletions = commit.deletions();
    ChangeSize {
        commit: short(&commit.hash),
        message: commit.subject.clone(),
        files_changed: commit.changes.len(),
        insertions,
        deletions,
        total_changes: insertions + deletions,
        category: SizeCategory::of(insertions + deletions),
    }
}

pub fn file_churn(commits: &[RawCommit]) -> Vec<FileChurn> {
    struct Acc<'a> {
        changes: usize,
        commits: BTreeSet<&'a str>,
        added: usize,
        deleted: usize,
        last: DateTime<FixedOffset>,
    }

    let mut by_file: BTreeMap<&str, Acc> = BTreeMap::new();
    for commit in commits {
        for change in &commit.changes {
            let acc = by_file.entry(change.path.as_str()).or_insert_with(|| Acc {
                changes: 0,
                commits: BTreeSet::new(),
                added: 0,
                deleted: 0,
                last: commit.date,
            });
            acc.changes += 1;
            acc.commits.insert(commit.hash.as_str());
            acc.added += change.added;
            acc.deleted += change.deleted;
            acc.last = acc.last.max(commit.date);
        }
    }

    let mut churn: Vec<FileChurn> = by_file
        .into_iter()
        .map(|(file, acc)| FileChurn {
            file: file.to_string(),
            change_count: acc.changes,
            unique_commits: acc.commits.len(),
            total_added: acc.added,
            total_deleted: acc.deleted,
            total_churn: acc.added + acc.deleted,
            last_changed: acc.last,
            churn_ratio: round2(acc.deleted as f64 / acc.added.max(1) as f64),
        })
        .collect();
    churn.sort_by(|a, b| b.total_churn.cmp(&a.total_churn).then_with(|| a.file.cmp(&b.file)));
    churn
}

pub fn hotspots(churn: &[FileChurn]) -> Vec<ChurnHotspot> {
    churn
        .iter()
        .take(HOTSPOT_CANDIDATES)
        .filter(|c| c.change_count >= 3 || c.total_churn >= 50)
        .map(|c| {
            let risk = if c.change_count >= 5 && c.total_churn >= 100 {
                Severity::High
            } else if c.change_count >= 3 && c.total_churn >= 50 {
                Severity::Medium
            } else {
                Severity::Low
            };
            ChurnHotspot {
                file: c.file.clone(),
                risk,
                reason: format!("Changed {} times with {} lines churned", c.change_count, c.total_churn),
                change_count: c.change_count,
                total_churn: c.total_churn,
            }
        })
        .collect()
}

pub fn recent_activity(commits: &[RawCommit], now: DateTime<Utc>, days: i64) -> RecentActivity {
    let cutoff = now - Duration::days(days);
    let mut daily: BTreeMap<String, usize> = BTreeMap::new();
    let mut total = 0;
    for commit in commits.iter().filter(|c| c.date.with_timezone(&Utc) >= cutoff) {
        total += 1;
        *daily.entry(commit.date.format("%Y-%m-%d").to_string()).or_insert(0) += 1;
    }

    // max_by_key keeps the last maximum; iterate newest day first so the
    // earliest busiest day wins.
    let most_active_day = daily
        .iter()
        .rev()
        .max_by_key(|(_, count)| **count)
        .map(|(day, _)| day.clone());

    RecentActivity {
        period_days: days,
        total_commits: total,
        avg_commits_per_day: if days > 0 { round2(total as f64 / days as f64) } else { 0.0 },
        active_days: daily.len(),
        most_active_day,
        daily_breakdown: daily,
    }
}

pub fn author_stats(commits: &[RawCommit]) -> Vec<AuthorStats> {
    let mut by_author: BTreeMap<&str, (usize, DateTime<FixedOffset>, DateTime<FixedOffset>)> = BTreeMap::new();
    for commit in commits {
        let entry = by_author
            .entry(commit.author.as_str())
            .or_insert((0, commit.date, commit.date));
        entry.0 += 1;
        entry.1 = entry.1.min(commit.date);
        entry.2 = entry.2.max(commit.date);
    }

    let total = commits.len();
    let mut stats: Vec<AuthorStats> = by_author
        .into_iter()
        .map(|(author, (count, first, last))| AuthorStats {
            author: author.to_string(),
            commits: count,
            percentage: round1(count as f64 / total as f64 * 100.0),
            first_commit: first,
            last_commit: last,
        })
        .collect();
    stats.sort_by(|a, b| b.commits.cmp(&a.commits).then_with(|| a.author.cmp(&b.author)));
    stats
}

/// Whole days between two instants, at least one.
fn span_days(first: DateTime<Utc>, last: DateTime<Utc>) -> i64 {
    (last - first).num_days().max(1)
}

pub fn velocity(commits: &[RawCommit]) -> Velocity {
    if commits.len() < 2 {
        return Velocity::default();
    }
    let mut dates: Vec<DateTime<Utc>> = commits.iter().map(|c| c.date.with_timezone(&Utc)).collect();
    dates.sort();

    let n = dates.len();
    let total_days = span_days(dates[0], dates[n - 1]);
    let weeks = (total_days as f64 / 7.0).max(0.1);

    let (older, newer) = dates.split_at(n / 2);
    let rate = |half: &[DateTime<Utc>]| half.len() as f64 / span_days(half[0], half[half.len() - 1]) as f64;
    let first_rate = rate(older);
    let second_rate = rate(newer);

    let trend = if second_rate > first_rate * 1.2 {
        VelocityTrend::Accelerating
    } else if second_rate < first_rate * 0.8 {
        VelocityTrend::Decelerating
    } else {
        VelocityTrend::Steady
    };

    Velocity {
        total_span_days: total_days,
        commits_per_week: round2(n as f64 / weeks),
        commits_per_day: round2(n as f64 / total_days as f64),
        trend,
        first_half_rate: round2(first_rate * 7.0),
        second_half_rate: round2(second_rate * 7.0),
    }
}

fn summarize(commits: &[RawCommit], churn: &[FileChurn], velocity: &Velocity) -> String {
    if commits.is_empty() {
        return "No git history available.".to_string();
    }
    let trend = serde_json::to_value(velocity.trend)
        .ok()
        .and_then(|v| v.as_str().map(str::to_string))
        .unwrap_or_default();
    let mut summary = format!(
        "{} commits analyzed. Development velocity: {} commits/week ({}).",
        commits.len(),
        velocity.commits_per_week,
        trend
    );
    if let Some(top) = churn.first() {
        summary.push_str(&format!(
            " Most churned file: {} ({} lines changed across {} commits).",
            top.file, top.total_churn, top.change_count
        ));
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 3, day, hour, 0, 0)
            .unwrap()
    }

    fn commit(hash: &str, author: &str, date: DateTime<FixedOffset>, changes: &[(&str, usize, usize)]) -> RawCommit {
        RawCommit {
            hash: hash.to_string(),
            author: author.to_string(),
            date,
            subject: format!("change {}", hash),
            changes: changes
                .iter()
                .map(|(path, added, deleted)| FileChange {
                    path: path.to_string(),
                    added: *added,
                    deleted: *deleted,
                })
                .collect(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 31, 12, 0, 0).unwrap()
    }

    /// Newest first, as git prints them.
    fn history() -> Vec<RawCommit> {
        vec![
            commit("e5e5e5e5e5", "ada", at(30, 9), &[("app/core.py", 30, 10), ("app/api.py", 2, 0)]),
            commit("d4d4d4d4d4", "ada", at(30, 8), &[("app/core.py", 20, 15)]),
            commit("c3c3c3c3c3", "grace", at(29, 10), &[("app/core.py", 10, 5), ("README.md", 1, 1)]),
            commit("b2b2b2b2b2", "ada", at(20, 10), &[("app/core.py", 25, 0)]),
            commit("a1a1a1a1a1", "grace", at(2, 9), &[("app/core.py", 300, 0), ("app/api.py", 80, 0)]),
        ]
    }

    #[test]
    fn test_file_churn_and_hotspots() {
        let churn = file_churn(&history());
        let files: Vec<&str> = churn.iter().map(|c| c.file.as_str()).collect();
        assert_eq!(files, vec!["app/core.py", "app/api.py", "README.md"]);

        let core = &churn[0];
        assert_eq!(core.change_count, 5);
        assert_eq!(core.unique_commits, 5);
        assert_eq!(core.total_churn, 415);
        assert_eq!(core.last_changed, at(30, 9));
        assert_eq!(core.churn_ratio, 0.08);

        let spots = hotspots(&churn);
        assert_eq!(spots.len(), 2);
        assert_eq!(spots[0].risk, Severity::High);
        assert_eq!(spots[1].file, "app/api.py");
        assert_eq!(spots[1].risk, Severity::Low);
        assert_eq!(spots[1].reason, "Changed 2 times with 82 lines churned");
    }

    #[test]
    fn test_author_stats() {
        let stats = author_stats(&history());
        assert_eq!(stats[0].author, "ada");
        assert_eq!(stats[0].commits, 3);
        assert_eq!(stats[0].percentage, 60.0);
        assert_eq!(stats[0].first_commit, at(20, 10));
        assert_eq!(stats[0].last_commit, at(30, 9));
        assert_eq!(stats[1].author, "grace");
        assert_eq!(stats[1].percentage, 40.0);
    }

    #[test]
    fn test_velocity_trend() {
        let v = velocity(&history());
        assert_eq!(v.total_span_days, 28);
        assert_eq!(v.commits_per_week, 1.25);
        assert_eq!(v.trend, VelocityTrend::Accelerating);

        let v = velocity(&history()[..1]);
        assert_eq!(v.trend, VelocityTrend::InsufficientData);
        assert_eq!(v.commits_per_week, 0.0);

        // Same pace in both halves.
        let even = vec![
            commit("4", "a", at(22, 9), &[]),
            commit("3", "a", at(15, 9), &[]),
            commit("2", "a", at(8, 9), &[]),
            commit("1", "a", at(1, 9), &[]),
        ];
        assert_eq!(velocity(&even).trend, VelocityTrend::Steady);
    }

    #[test]
    fn test_recent_activity_window() {
        let activity = recent_activity(&history(), now(), 7);
        assert_eq!(activity.total_commits, 3);
        assert_eq!(activity.active_days, 2);
        assert_eq!(activity.most_active_day.as_deref(), Some("2026-03-30"));
        assert_eq!(activity.daily_breakdown["2026-03-29"], 1);
        assert_eq!(activity.avg_commits_per_day, 0.43);
    }

    #[test]
    fn test_change_size_categories() {
        assert_eq!(SizeCategory::of(0), SizeCategory::Tiny);
        assert_eq!(SizeCategory::of(10), SizeCategory::Tiny);
        assert_eq!(SizeCategory::of(11), SizeCategory::Small);
        assert_eq!(SizeCategory::of(200), SizeCategory::Medium);
        assert_eq!(SizeCategory::of(500), SizeCategory::Large);
        assert_eq!(SizeCategory::of(501), SizeCategory::Massive);

        let sizes: Vec<SizeCategory> = history().iter().map(|c| change_size(c).category).collect();
        assert_eq!(
            sizes,
            vec![
                SizeCategory::Small,
                SizeCategory::Small,
                SizeCategory::Small,
                SizeCategory::Small,
                SizeCategory::Large
            ]
        );
    }

    #[test]
    fn test_from_commits_document() {
        let doc = GitHistory::from_commits("demo", &history(), 12, now(), &HistoryConfig::default());
        assert!(doc.is_git_repo);
        assert_eq!(doc.total_commits, 12);
        assert_eq!(doc.analyzed_commits, 5);
        assert_eq!(doc.commits[0].hash, "e5e5e5e5");
        assert_eq!(doc.commits[0].full_hash, "e5e5e5e5e5");
        assert_eq!(doc.recent_activity.period_days, 30);
        assert_eq!(
            doc.summary,
            "5 commits analyzed. Development velocity: 1.25 commits/week (accelerating). \
             Most churned file: app/core.py (415 lines changed across 5 commits)."
        );

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(json["velocity"]["trend"], "accelerating");
        assert_eq!(json["change_sizes"][4]["category"], "large");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn test_empty_and_unavailable_documents() {
        let doc = GitHistory::from_commits("demo", &[], 0, now(), &HistoryConfig::default());
        assert_eq!(doc.summary, "No git history available.");
        assert_eq!(doc.velocity.trend, VelocityTrend::InsufficientData);
        assert!(doc.hotspots.is_empty());

        let doc = GitHistory::unavailable("demo", "not a repo", now());
        assert!(!doc.is_git_repo);
        assert_eq!(doc.message.as_deref(), Some("not a repo"));
        assert_eq!(doc.total_commits, 0);
    }
}
