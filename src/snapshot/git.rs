//! Default snapshot labels from the repository's current commit.
//!
//! Reads `.git/HEAD` directly instead of shelling out, so labeling works
//! without a git binary. Loose refs win over `packed-refs`.

use std::fs;
use std::path::{Path, PathBuf};

/// Characters of the commit id used in labels.
const SHORT_ID: usize = 12;

/// Label used when the project is not a git checkout.
pub const FALLBACK_LABEL: &str = "manual";

/// The git directory of `root`, following `gitdir:` files of worktrees.
fn git_dir(root: &Path) -> Option<PathBuf> {
    let dot_git = root.join(".git");
    if dot_git.is_dir() {
        return Some(dot_git);
    }
    let pointer = fs::read_to_string(&dot_git).ok()?;
    let target = pointer.trim().strip_prefix("gitdir:")?.trim();
    Some(root.join(target))
}

fn is_commit_id(s: &str) -> bool {
    s.len() >= SHORT_ID && s.chars().all(|c| c.is_ascii_hexdigit())
}

fn resolve_ref(git_dir: &Path, reference: &str) -> Option<String> {
    // Worktrees keep shared refs in the common directory.
    let common = fs::read_to_string(git_dir.join("commondir"))
        .ok()
        .map(|c| git_dir.join(c.trim()));
    let dirs = std::iter::once(git_dir.to_path_buf()).chain(common);

    for dir in dirs {
        if let Ok(id) = fs::read_to_string(dir.join(reference)) {
            let id = id.trim();
            if is_commit_id(id) {
                return Some(id.to_string());
            }
        }
        if let Ok(packed) = fs::read_to_string(dir.join("packed-refs")) {
            let hit = packed
                .lines()
                .filter(|l| !l.starts_with('#') && !l.starts_with('^'))
                .filter_map(|l| l.split_once(' '))
                .find(|(_, name)| name.trim() == reference)
                .map(|(id, _)| id.to_string());
            if hit.is_some() {
                return hit;
            }
        }
    }
    None
}

/// Short id of the checked-out commit, if `root` is a git checkout.
pub fn current_commit(root: &Path) -> Option<String> {
    let dir = git_dir(root)?;
    let head = fs::read_to_string(dir.join("HEAD")).ok()?;
    let head = head.trim();

    let id = match head.strip_prefix("ref:") {
        Some(reference) => resolve_ref(&dir, reference.trim())?,
        None if is_commit_id(head) => head.to_string(),
        None => return None,
    };
    Some(id.chars().take(SHORT_ID).collect())
}

/// The label for a snapshot taken without an explicit one.
pub fn default_label(root: &Path) -> String {
    current_commit(root).unwrap_or_else(|| FALLBACK_LABEL.to_string())
}
