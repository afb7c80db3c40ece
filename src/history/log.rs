//! Reading commit history from the `git` binary.
//!
//! Every command runs with `-C <root>` and `--relative`, so a project that
//! lives in a subdirectory of a larger repository only sees its own files.

use std::path::Path;
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset};
use tracing::warn;

/// Starts each commit record in the log output.
const RECORD_SEP: char = '\u{1e}';
/// Separates header fields; never appears in names or subjects.
const FIELD_SEP: char = '\u{1f}';
const LOG_FORMAT: &str = "--pretty=format:%x1e%H%x1f%an%x1f%aI%x1f%s";

/// One file touched by a commit. Binary files count zero lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub added: usize,
    pub deleted: usize,
}

/// A commit as read from `git log --numstat`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawCommit {
    pub hash: String,
    pub author: String,
    pub date: DateTime<FixedOffset>,
    pub subject: String,
    pub changes: Vec<FileChange>,
}

impl RawCommit {
    pub fn insertions(&self) -> usize {
        self.changes.iter().map(|c| c.added).sum()
    }

    pub fn deletions(&self) -> usize {
        self.changes.iter().map(|c| c.deleted).sum()
    }
}

/// A `git` command immune to an inherited `GIT_DIR` or `GIT_WORK_TREE`.
fn git_cmd(root: &Path) -> Command {
    let mut cmd = Command::new("git");
    cmd.env_remove("GIT_DIR").env_remove("GIT_WORK_TREE").arg("-C").arg(root);
    cmd
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Whether `root` is inside a git work tree.
pub fn is_work_tree(root: &Path) -> bool {
    git_cmd(root)
        .args(["rev-parse", "--is-inside-work-tree"])
        .stderr(Stdio::null())
        .output()
        .map(|o| o.status.success() && String::from_utf8_lossy(&o.stdout).trim() == "true")
        .unwrap_or(false)
}

/// Whether the repository has at least one commit.
pub fn has_head(root: &Path) -> bool {
    git_cmd(root)
        .args(["rev-parse", "--verify", "--quiet", "HEAD"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Non-merge commits touching the project, over the whole history.
pub fn count_commits(root: &Path) -> Result<usize> {
    let output = git_cmd(root)
        .args(["rev-list", "--count", "--no-merges", "HEAD", "--", "."])
        .output()
        .context("failed to run git rev-list")?;
    if !output.status.success() {
        anyhow::bail!("git rev-list failed: {}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().parse()?)
}

/// The newest `max_commits` non-merge commits, newest first.
pub fn read_log(root: &Path, max_commits: usize) -> Result<Vec<RawCommit>> {
    let output = git_cmd(root)
        .arg("log")
        .arg(format!("-{}", max_commits))
        .args(["--no-merges", "--numstat", "--relative", LOG_FORMAT, "--", "."])
        .output()
        .context("failed to run git log")?;
    if !output.status.success() {
        anyhow::bail!("git log failed: {}", String::from_utf8_lossy(&output.stderr).trim());
    }
    Ok(parse_log(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse `git log --numstat` output written with [`LOG_FORMAT`].
///
/// Records with an unreadable header or date are skipped.
pub fn parse_log(text: &str) -> Vec<RawCommit> {
    text.split(RECORD_SEP)
        .filter(|record| !record.trim().is_empty())
        .filter_map(|record| {
            let commit = parse_record(record);
            if commit.is_none() {
                warn!(record = %record.lines().next().unwrap_or(""), "skipping unreadable log record");
            }
            commit
        })
        .collect()
}

fn parse_record(record: &str) -> Option<RawCommit> {
    let mut lines = record.lines();
    let header = lines.next()?;
    let mut fields = header.splitn(4, FIELD_SEP);
    let hash = fields.next()?.trim().to_string();
    let author = fields.next()?.to_string();
    let date = DateTime::parse_from_rfc3339(fields.next()?.trim()).ok()?;
    let subject = fields.next().unwrap_or("").to_string();
    if hash.is_empty() {
        return None;
    }

    let changes = lines.filter_map(parse_numstat).collect();
    Some(RawCommit {
        hash,
        author,
        date,
        subject,
        changes,
    })
}

/// `added<TAB>deleted<TAB>path`; `-` counts mark binary files.
fn parse_numstat(line: &str) -> Option<FileChange> {
    let mut parts = line.splitn(3, '\t');
    let added = parts.next()?;
    let deleted = parts.next()?;
    let path = parts.next()?.trim();
    if path.is_empty() {
        return None;
    }
    let count = |s: &str| if s == "-" { Some(0) } else { s.parse().ok() };
    Some(FileChange {
        path: path.to_string(),
        added: count(added)?,
        deleted: count(deleted)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(hash: &str, author: &str, date: &str, subject: &str, numstat: &[&str]) -> String {
        let mut text = format!("\u{1e}{hash}\u{1f}{author}\u{1f}{date}\u{1f}{subject}\n");
        for line in numstat {
            text.push_str(line);
            text.push('\n');
        }
        text.push('\n');
        text
    }

    #[test]
    fn test_parse_log() {
        let text = [
            record(
                "a1b2c3d4e5f6a7b8c9d0a1b2c3d4e5f6a7b8c9d0",
                "Ada Lovelace",
                "2026-03-14T10:00:00+01:00",
                "Fix parser | handle tabs",
                &["12\t3\tapp/parser.py", "-\t-\tdocs/logo.png"],
            ),
            record(
                "0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f0f",
                "Grace Hopper",
                "2026-03-13T09:30:00Z",
                "Initial commit",
                &["40\t0\tapp/parser.py"],
            ),
        ]
        .concat();

        let commits = parse_log(&text);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].author, "Ada Lovelace");
        assert_eq!(commits[0].subject, "Fix parser | handle tabs");
        assert_eq!(commits[0].changes.len(), 2);
        assert_eq!(commits[0].changes[1], FileChange { path: "docs/logo.png".to_string(), added: 0, deleted: 0 });
        assert_eq!(commits[0].insertions(), 12);
        assert_eq!(commits[0].deletions(), 3);
        assert_eq!(commits[1].date.to_rfc3339(), "2026-03-13T09:30:00+00:00");
    }

    #[test]
    fn test_parse_log_skips_bad_records() {
        let text = format!(
            "{}\u{1e}deadbeef\u{1f}someone\u{1f}not-a-date\u{1f}broken\n",
            record("cafe", "a", "2026-01-01T00:00:00Z", "ok", &[])
        );
        let commits = parse_log(&text);
        assert_eq!(commits.len(), 1);
        assert_eq!(commits[0].hash, "cafe");
        assert!(commits[0].changes.is_empty());
        assert!(parse_log("").is_empty());
    }

    #[test]
    fn test_parse_numstat() {
        assert_eq!(
            parse_numstat("3\t1\tsrc/app.py"),
            Some(FileChange { path: "src/app.py".to_string(), added: 3, deleted: 1 })
        );
        assert_eq!(parse_numstat("x\t1\tsrc/app.py"), None);
        assert_eq!(parse_numstat("just a line"), None);
    }
}
