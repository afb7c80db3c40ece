//! Configuration schema for codestrata.
//!
//! Configuration is optional. When present it lives at the project root as
//! `codestrata.yaml` and every field falls back to a documented default, so
//! an empty document is a valid configuration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};

use crate::analysis::ParseOptions;

/// Default config file names searched at the project root.
pub const DEFAULT_CONFIG_NAMES: &[&str] = &["codestrata.yaml", ".codestrata.yaml", "codestrata.yml"];

/// Top-level configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Glob patterns for paths to exclude from analysis (e.g. "**/migrations/**").
    pub excluded_paths: Vec<String>,
    /// Directory names skipped in addition to the built-in list.
    pub skip_dirs: Vec<String>,
    /// Descend into dot-directories.
    pub include_hidden: bool,
    /// Worker threads for per-file stages; 0 uses all cores.
    pub parallelism: usize,
    /// Per-file parse budget in milliseconds; 0 disables it.
    pub parse_timeout_ms: u64,
    /// Files larger than this are reported instead of parsed.
    pub max_file_bytes: u64,
    pub security: SecurityConfig,
    pub governance: GovernanceConfig,
    pub architecture: ArchitectureConfig,
    pub snapshots: SnapshotConfig,
    pub history: HistoryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            excluded_paths: Vec::new(),
            skip_dirs: Vec::new(),
            include_hidden: false,
            parallelism: 0,
            parse_timeout_ms: 2000,
            max_file_bytes: 2 * 1024 * 1024,
            security: SecurityConfig::default(),
            governance: GovernanceConfig::default(),
            architecture: ArchitectureConfig::default(),
            snapshots: SnapshotConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Config {
    /// Parse a configuration from a YAML file.
    pub fn parse_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("cannot read config {}", path.display()))?;
        Self::parse_str(&content).with_context(|| format!("invalid config {}", path.display()))
    }

    /// Parse a configuration from YAML text.
    pub fn parse_str(content: &str) -> anyhow::Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(content)?;
        validate(&config)?;
        Ok(config)
    }

    /// Load the config file at `root`, or defaults when there is none.
    pub fn discover(root: &Path) -> anyhow::Result<Self> {
        for name in DEFAULT_CONFIG_NAMES {
            let candidate = root.join(name);
            if candidate.is_file() {
                tracing::debug!(path = %candidate.display(), "loading config");
                return Self::parse_file(candidate);
            }
        }
        Ok(Self::default())
    }

    /// Load an explicit config file, or discover one at `root`.
    pub fn load(explicit: Option<&Path>, root: &Path) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::parse_file(path),
            None => Self::discover(root),
        }
    }

    /// Compile `excluded_paths` into a matcher.
    ///
    /// Uses globset, which supports `**` for recursive directory matching.
    pub fn excluded_matcher(&self) -> anyhow::Result<GlobSet> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.excluded_paths {
            builder.add(Glob::new(pattern)?);
        }
        Ok(builder.build()?)
    }

    /// Limits for parsing a single file.
    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            timeout: Duration::from_millis(self.parse_timeout_ms),
            max_file_bytes: self.max_file_bytes,
        }
    }
}

/// Security scanner settings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// Rule categories to run; empty runs every category.
    pub enabled_categories: Vec<String>,
    /// Rule ids (e.g. "debug_print") that are never reported.
    pub disabled_rules: Vec<String>,
}

impl SecurityConfig {
    pub fn is_enabled(&self, rule_id: &str, category: &str) -> bool {
        if self.disabled_rules.iter().any(|r| r == rule_id) {
            return false;
        }
        self.enabled_categories.is_empty() || self.enabled_categories.iter().any(|c| c == category)
    }
}

/// Governance detector thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GovernanceConfig {
    pub max_function_lines: usize,
    pub verbose_density_high: f64,
    pub verbose_min_lines_high: usize,
    pub verbose_density_medium: f64,
    pub verbose_min_lines_medium: usize,
    pub duplicate_similarity: f64,
    pub duplicate_min_lines: usize,
    pub naming_dominance: f64,
    pub naming_min_names: usize,
    pub deep_nesting: u32,
    pub deep_nesting_min_lines: usize,
    pub generic_min_members: usize,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            max_function_lines: 50,
            verbose_density_high: 0.05,
            verbose_min_lines_high: 25,
            verbose_density_medium: 0.08,
            verbose_min_lines_medium: 15,
            duplicate_similarity: 0.85,
            duplicate_min_lines: 5,
            naming_dominance: 0.8,
            naming_min_names: 3,
            deep_nesting: 3,
            deep_nesting_min_lines: 20,
            generic_min_members: 2,
        }
    }
}

/// Weights of the per-file coupling score.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CouplingWeights {
    pub fan_in: f64,
    pub fan_out: f64,
    pub cycle: f64,
}

impl Default for CouplingWeights {
    fn default() -> Self {
        Self {
            fan_in: 1.0,
            fan_out: 1.0,
            cycle: 2.0,
        }
    }
}

/// Architecture reasoner thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ArchitectureConfig {
    /// Longest cycle enumerated in full; longer ones are reported truncated.
    pub max_cycle_length: usize,
    /// Enumeration stops after this many cycles.
    pub max_cycles: usize,
    pub god_fan_in: usize,
    pub god_fan_out: usize,
    pub god_lines: usize,
    /// Percentile of the fan-in distribution a bottleneck must reach.
    pub bottleneck_percentile: f64,
    /// Absolute floor so tiny projects do not flag every importer target.
    pub bottleneck_min_fan_in: usize,
    pub coupling_weights: CouplingWeights,
}

impl Default for ArchitectureConfig {
    fn default() -> Self {
        Self {
            max_cycle_length: 8,
            max_cycles: 100,
            god_fan_in: 5,
            god_fan_out: 5,
            god_lines: 300,
            bottleneck_percentile: 90.0,
            bottleneck_min_fan_in: 3,
            coupling_weights: CouplingWeights::default(),
        }
    }
}

/// Snapshot store settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SnapshotConfig {
    /// Snapshot directory, relative to the project root.
    pub dir: PathBuf,
    /// Per-metric minimum-delta overrides, keyed by metric name.
    pub thresholds: BTreeMap<String, f64>,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".codestrata/snapshots"),
            thresholds: BTreeMap::new(),
        }
    }
}

/// Git history settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HistoryConfig {
    /// Newest non-merge commits read from `git log`.
    pub max_commits: usize,
    /// Window of the recent-activity breakdown.
    pub recent_days: i64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_commits: 50,
            recent_days: 30,
        }
    }
}

/// Validate a configuration.
pub fn validate(config: &Config) -> anyhow::Result<()> {
    for pattern in &config.excluded_paths {
        Glob::new(pattern)
            .map_err(|e| anyhow::anyhow!("invalid excluded_paths pattern {:?}: {}", pattern, e))?;
    }

    let gov = &config.governance;
    for (name, value) in [
        ("governance.duplicate_similarity", gov.duplicate_similarity),
        ("governance.naming_dominance", gov.naming_dominance),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("{} must be between 0 and 1, got {}", name, value);
        }
    }

    let arch = &config.architecture;
    if arch.max_cycle_length < 2 {
        anyhow::bail!("architecture.max_cycle_length must be at least 2");
    }
    if !(0.0..=100.0).contains(&arch.bottleneck_percentile) {
        anyhow::bail!(
            "architecture.bottleneck_percentile must be between 0 and 100, got {}",
            arch.bottleneck_percentile
        );
    }

    if config.history.max_commits == 0 {
        anyhow::bail!("history.max_commits must be at least 1");
    }
    if config.history.recent_days <= 0 {
        anyhow::bail!("history.recent_days must be positive");
    }

    for (metric, threshold) in &config.snapshots.thresholds {
        if *threshold < 0.0 {
            anyhow::bail!("snapshot threshold for {} must not be negative", metric);
        }
    }

    Ok(())
}
