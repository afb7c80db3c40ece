//! Source file discovery.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::Config;

/// Directories never descended into.
pub const DEFAULT_SKIP_DIRS: &[&str] = &[
    "node_modules",
    ".git",
    "__pycache__",
    ".venv",
    "venv",
    "env",
    "dist",
    "build",
    ".next",
    "coverage",
    ".pytest_cache",
    ".mypy_cache",
    ".tox",
    ".idea",
    ".vscode",
    ".vs",
    "vendor",
    ".cache",
    "target",
    "bin",
    "obj",
    ".codestrata",
];

/// Collect Python sources under `root`, sorted by path.
pub fn discover_sources(root: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = walk_files(root, config)?;
    files.retain(|path| path.extension().and_then(|e| e.to_str()) == Some("py"));
    Ok(files)
}

/// Every file under `root` that survives the skip and exclude rules,
/// whatever its language, sorted by path.
pub fn walk_files(root: &Path, config: &Config) -> anyhow::Result<Vec<PathBuf>> {
    if !root.is_dir() {
        anyhow::bail!("project root {} is not a directory", root.display());
    }

    let excluded = config.excluded_matcher()?;
    let mut files = Vec::new();

    for entry in WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if !config.include_hidden && name.starts_with('.') {
                return false;
            }
            if DEFAULT_SKIP_DIRS.contains(&name.as_ref())
                || config.skip_dirs.iter().any(|d| d == name.as_ref())
            {
                return false;
            }
            let rel = relative_path(root, e.path());
            !excluded.is_match(&rel) && !excluded.is_match(format!("{}/", rel))
        })
    {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                tracing::warn!(error = %err, "skipping unreadable entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if excluded.is_match(relative_path(root, path)) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}

/// `path` relative to `root`, with `/` separators.
pub fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
