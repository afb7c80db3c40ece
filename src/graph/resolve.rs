//! Import resolution against the project's module index.

use std::collections::{BTreeMap, BTreeSet};

use crate::analysis::{FileFact, ImportRef};

/// Directories that act as import roots, so `src/utils.py` imports as `utils`.
const SOURCE_ROOTS: &[&str] = &["src", "lib"];

/// Maps dotted module names to project-relative file paths.
#[derive(Debug, Default)]
pub struct ModuleIndex {
    /// Full dotted names; always authoritative.
    exact: BTreeMap<String, String>,
    /// Dotted suffixes claimed by exactly one file. Single-segment suffixes
    /// only come from modules directly under a source root, so a nested
    /// `app/logging.py` never shadows the stdlib `logging`.
    suffixes: BTreeMap<String, String>,
}

impl ModuleIndex {
    pub fn build(files: &[FileFact]) -> Self {
        let mut exact = BTreeMap::new();
        let mut suffix_claims: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for file in files {
            if file.module.is_empty() {
                continue;
            }
            // A package init and a same-named module cannot both exist in
            // Python; if they do, the package wins.
            let entry = exact.entry(file.module.clone()).or_insert_with(|| file.path.clone());
            if file.is_package_init() {
                *entry = file.path.clone();
            }

            let parts: Vec<&str> = file.module.split('.').collect();
            for start in 1..parts.len() {
                if start == parts.len() - 1 && !(start == 1 && SOURCE_ROOTS.contains(&parts[0])) {
                    continue;
                }
                suffix_claims
                    .entry(parts[start..].join("."))
                    .or_default()
                    .insert(file.path.clone());
            }
        }

        let suffixes = suffix_claims
            .into_iter()
            .filter(|(_, paths)| paths.len() == 1)
            .filter_map(|(name, paths)| paths.into_iter().next().map(|p| (name, p)))
            .collect();

        Self { exact, suffixes }
    }

    /// Look up a dotted module name.
    pub fn lookup(&self, module: &str) -> Option<&str> {
        if module.is_empty() {
            return None;
        }
        self.exact
            .get(module)
            .or_else(|| self.suffixes.get(module))
            .map(String::as_str)
    }

    /// Project files an import refers to, sorted.
    pub fn resolve(&self, importer: &FileFact, import: &ImportRef) -> Vec<String> {
        let mut targets = BTreeSet::new();

        if import.is_relative() {
            let anchor = match relative_anchor(importer, import.level) {
                Some(a) => a,
                None => return Vec::new(),
            };
            let base = join_module(&anchor, import.module_path());
            self.resolve_from(&base, &import.names, &mut targets);
        } else if import.names.is_empty() {
            // `import a.b.c` binds `a` but loads every prefix; the deepest
            // project module is the dependency.
            let parts: Vec<&str> = import.module.split('.').collect();
            for end in (1..=parts.len()).rev() {
                if let Some(path) = self.lookup(&parts[..end].join(".")) {
                    targets.insert(path.to_string());
                    break;
                }
            }
        } else {
            self.resolve_from(&import.module, &import.names, &mut targets);
        }

        targets.into_iter().collect()
    }

    /// `from base import names`: each name may be a submodule, otherwise
    /// the dependency is `base` itself.
    fn resolve_from(&self, base: &str, names: &[String], targets: &mut BTreeSet<String>) {
        let mut needs_base = names.is_empty();
        for name in names {
            if name == "*" {
                needs_base = true;
                continue;
            }
            match self.lookup(&join_module(base, name)) {
                Some(path) => {
                    targets.insert(path.to_string());
                }
                None => needs_base = true,
            }
        }
        if needs_base {
            if let Some(path) = self.lookup(base) {
                targets.insert(path.to_string());
            }
        }
    }
}

/// Package a relative import with `level` dots is anchored at.
///
/// Returns None when the import climbs above the project root.
fn relative_anchor(importer: &FileFact, level: usize) -> Option<String> {
    let mut package: Vec<&str> = importer.module.split('.').filter(|p| !p.is_empty()).collect();
    if !importer.is_package_init() {
        // A plain module's package is its parent.
        package.pop()?;
    }
    for _ in 1..level {
        package.pop()?;
    }
    Some(package.join("."))
}

fn join_module(base: &str, name: &str) -> String {
    match (base.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => base.to_string(),
        _ => format!("{}.{}", base, name),
    }
}
