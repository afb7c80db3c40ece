//! Append-only snapshot store with diffing and trends.
//!
//! Every snapshot is its own file, published with an atomic no-clobber
//! rename, so concurrent writers never touch the same bytes. `index.json`
//! is rebuilt from the directory after each save and is never read back as
//! a source of truth.

mod diff;
mod git;
mod metrics;

pub use diff::{
    compare, trend, DiffOutcome, FileComplexityChange, Improvement, MetricChange, Movement,
    Regression, RegressionReport, SnapshotRef, Trend, TrendChange, TrendPoint,
    FILE_COMPLEXITY_DELTA,
};
pub use git::{current_commit, default_label, FALLBACK_LABEL};
pub use metrics::{tracked, FileMetrics, SnapshotInput, TrackedMetric, Worse, TRACKED};

use std::collections::BTreeMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::analysis::project_name;
use crate::config::SnapshotConfig;
use crate::error::StorageError;

pub const INDEX_FILE: &str = "index.json";

const FILE_PREFIX: &str = "snapshot_";

/// Attempts at a free file name before giving up.
const MAX_NAME_ATTEMPTS: usize = 100;

/// Metrics of one project at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub project: String,
    /// Canonical project root at capture time.
    pub project_root: String,
    pub timestamp: DateTime<Utc>,
    pub label: String,
    /// First 12 hex characters of the blake3 hash of the metric tables.
    pub content_hash: String,
    pub metrics: BTreeMap<String, f64>,
    #[serde(default)]
    pub file_metrics: BTreeMap<String, FileMetrics>,
}

impl Snapshot {
    pub fn capture(
        project: &str,
        project_root: &Path,
        input: &SnapshotInput,
        label: String,
        timestamp: DateTime<Utc>,
    ) -> Result<Self, StorageError> {
        let metrics = input.metrics();
        let file_metrics = input.file_metrics();
        let content_hash = content_hash(&metrics, &file_metrics)?;
        Ok(Self {
            project: project.to_string(),
            project_root: project_root.display().to_string(),
            timestamp,
            label,
            content_hash,
            metrics,
            file_metrics,
        })
    }

    /// File name without extension or collision counter.
    fn file_stem(&self) -> String {
        format!(
            "{}{}_{}_{}",
            FILE_PREFIX,
            self.timestamp.format("%Y%m%dT%H%M%S%.9fZ"),
            slug(&self.label),
            self.content_hash.get(..8).unwrap_or(&self.content_hash)
        )
    }

    pub fn reference(&self, file: &str) -> SnapshotRef {
        SnapshotRef {
            file: file.to_string(),
            timestamp: self.timestamp,
            label: self.label.clone(),
            content_hash: self.content_hash.clone(),
        }
    }
}

fn content_hash(
    metrics: &BTreeMap<String, f64>,
    file_metrics: &BTreeMap<String, FileMetrics>,
) -> Result<String, StorageError> {
    let bytes = serde_json::to_vec(&(metrics, file_metrics))?;
    Ok(blake3::hash(&bytes).to_hex()[..12].to_string())
}

/// File-name-safe form of a label.
fn slug(label: &str) -> String {
    let mut out = String::new();
    for c in label.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    let trimmed: String = out.trim_matches('-').chars().take(40).collect();
    if trimmed.is_empty() {
        "snapshot".to_string()
    } else {
        trimmed
    }
}

/// A snapshot together with the file it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSnapshot {
    pub file: String,
    pub snapshot: Snapshot,
}

/// One line of `index.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub file: String,
    pub timestamp: DateTime<Utc>,
    pub label: String,
    pub content_hash: String,
}

pub struct SnapshotStore {
    root: PathBuf,
    dir: PathBuf,
    project: String,
    thresholds: BTreeMap<String, f64>,
}

impl SnapshotStore {
    /// Open the store of the project at `project_root`. Nothing is created
    /// until the first save.
    pub fn open(project_root: &Path, config: &SnapshotConfig) -> Result<Self, StorageError> {
        let root = project_root
            .canonicalize()
            .map_err(|e| StorageError::io(project_root, e))?;
        Ok(Self {
            dir: root.join(&config.dir),
            project: project_name(&root),
            thresholds: config.thresholds.clone(),
            root,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn project(&self) -> &str {
        &self.project
    }

    /// Capture and store a snapshot. The label defaults to the current
    /// commit, or `manual` outside a git checkout.
    pub fn save(&self, input: &SnapshotInput, label: Option<&str>) -> Result<StoredSnapshot, StorageError> {
        let label = match label {
            Some(l) => l.to_string(),
            None => default_label(&self.root),
        };
        let snapshot = Snapshot::capture(&self.project, &self.root, input, label, Utc::now())?;
        let file = self.write(&snapshot)?;
        Ok(StoredSnapshot { file, snapshot })
    }

    /// Publish `snapshot` under a fresh file name and refresh the index.
    /// Index failures are logged, never returned.
    pub fn write(&self, snapshot: &Snapshot) -> Result<String, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;

        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, snapshot)?;
        tmp.flush().map_err(|e| StorageError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| StorageError::io(tmp.path(), e))?;

        let stem = snapshot.file_stem();
        let mut attempt = 0;
        let file = loop {
            let name = match attempt {
                0 => format!("{}.json", stem),
                n => format!("{}_{}.json", stem, n),
            };
            let target = self.dir.join(&name);
            match tmp.persist_noclobber(&target) {
                Ok(_) => break name,
                Err(err) if err.error.kind() == ErrorKind::AlreadyExists && attempt < MAX_NAME_ATTEMPTS => {
                    debug!(file = %name, "snapshot name taken, retrying");
                    tmp = err.file;
                    attempt += 1;
                }
                Err(err) => {
                    return Err(StorageError::Persist {
                        path: target,
                        source: err.error,
                    })
                }
            }
        };

        info!(file = %file, label = %snapshot.label, "saved snapshot");
        // The snapshot is already published; a stale index is rebuilt on the
        // next save.
        if let Err(err) = self.rebuild_index() {
            warn!(file = %file, error = %err, "snapshot saved but index not refreshed");
        }
        Ok(file)
    }

    /// Every readable snapshot, oldest first. Corrupt files are skipped.
    pub fn list(&self) -> Result<Vec<StoredSnapshot>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::io(&self.dir, e)),
        };

        let mut snapshots = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::io(&self.dir, e))?;
            let file = entry.file_name().to_string_lossy().into_owned();
            if !file.starts_with(FILE_PREFIX) || !file.ends_with(".json") {
                continue;
            }
            match read_snapshot(&entry.path()) {
                Ok(snapshot) => snapshots.push(StoredSnapshot { file, snapshot }),
                Err(err) => warn!(file = %file, error = %err, "skipping unreadable snapshot"),
            }
        }

        snapshots.sort_by(|a, b| {
            a.snapshot
                .timestamp
                .cmp(&b.snapshot.timestamp)
                .then_with(|| a.file.cmp(&b.file))
        });
        Ok(snapshots)
    }

    /// Rewrite `index.json` from the snapshot files.
    pub fn rebuild_index(&self) -> Result<Vec<IndexEntry>, StorageError> {
        let index: Vec<IndexEntry> = self
            .list()?
            .into_iter()
            .map(|s| IndexEntry {
                file: s.file,
                timestamp: s.snapshot.timestamp,
                label: s.snapshot.label,
                content_hash: s.snapshot.content_hash,
            })
            .collect();

        fs::create_dir_all(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(|e| StorageError::io(&self.dir, e))?;
        serde_json::to_writer_pretty(&mut tmp, &index)?;
        let target = self.dir.join(INDEX_FILE);
        tmp.persist(&target).map_err(|err| StorageError::Persist {
            path: target.clone(),
            source: err.error,
        })?;
        Ok(index)
    }

    /// Compare the two most recent snapshots.
    pub fn diff(&self) -> Result<DiffOutcome, StorageError> {
        let snapshots = self.list()?;
        let [.., previous, current] = snapshots.as_slice() else {
            return Ok(DiffOutcome::NotEnoughHistory {
                available: snapshots.len(),
            });
        };
        Ok(DiffOutcome::Compared(compare(
            (previous.file.as_str(), &previous.snapshot),
            (current.file.as_str(), &current.snapshot),
            &self.thresholds,
        )))
    }

    /// The full series, oldest first.
    pub fn trend(&self) -> Result<Trend, StorageError> {
        let snapshots = self.list()?;
        let refs: Vec<&Snapshot> = snapshots.iter().map(|s| &s.snapshot).collect();
        Ok(trend(&self.project, &refs))
    }
}

fn read_snapshot(path: &Path) -> Result<Snapshot, StorageError> {
    let text = fs::read_to_string(path).map_err(|e| StorageError::io(path, e))?;
    serde_json::from_str(&text).map_err(|e| StorageError::Corrupt {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
