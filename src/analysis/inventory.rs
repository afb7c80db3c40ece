//! Project inventory: languages, tools, entry points and declared
//! dependencies of the whole tree, not just its Python sources.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::discover::{relative_path, walk_files};
use crate::config::Config;

/// File extension to language name.
const LANGUAGE_MAP: &[(&str, &str)] = &[
    ("py", "Python"),
    ("js", "JavaScript"),
    ("ts", "TypeScript"),
    ("jsx", "React JSX"),
    ("tsx", "React TSX"),
    ("java", "Java"),
    ("go", "Go"),
    ("rs", "Rust"),
    ("rb", "Ruby"),
    ("php", "PHP"),
    ("cs", "C#"),
    ("cpp", "C++"),
    ("c", "C"),
    ("swift", "Swift"),
    ("kt", "Kotlin"),
    ("dart", "Dart"),
];

/// File names that reveal a tool or build system, at any depth.
const TECH_INDICATORS: &[(&str, &str)] = &[
    ("package.json", "Node.js"),
    ("requirements.txt", "Python (pip)"),
    ("Pipfile", "Python (Pipenv)"),
    ("pyproject.toml", "Python"),
    ("setup.py", "Python (setuptools)"),
    ("Cargo.toml", "Rust"),
    ("go.mod", "Go"),
    ("Gemfile", "Ruby"),
    ("composer.json", "PHP"),
    ("pom.xml", "Java (Maven)"),
    ("build.gradle", "Gradle"),
    ("Dockerfile", "Docker"),
    ("docker-compose.yml", "Docker Compose"),
    ("tsconfig.json", "TypeScript"),
    ("Makefile", "Make"),
    ("tox.ini", "tox"),
    ("pytest.ini", "pytest"),
];

/// Package or import name to framework name.
const FRAMEWORK_PACKAGES: &[(&str, &str)] = &[
    ("django", "Django"),
    ("flask", "Flask"),
    ("fastapi", "FastAPI"),
    ("starlette", "Starlette"),
    ("tornado", "Tornado"),
    ("aiohttp", "aiohttp"),
    ("sqlalchemy", "SQLAlchemy"),
    ("celery", "Celery"),
    ("pydantic", "Pydantic"),
    ("react", "React"),
    ("vue", "Vue.js"),
    ("@angular/core", "Angular"),
    ("express", "Express.js"),
    ("next", "Next.js"),
    ("svelte", "Svelte"),
];

const ENTRY_POINT_NAMES: &[&str] = &[
    "main.py",
    "__main__.py",
    "app.py",
    "server.py",
    "index.py",
    "manage.py",
    "wsgi.py",
    "asgi.py",
    "index.js",
    "index.ts",
    "main.js",
    "main.ts",
    "server.js",
    "main.go",
    "main.rs",
];

/// Paths under the root whose presence means CI is configured.
const CI_MARKERS: &[&str] = &[
    ".github/workflows",
    ".gitlab-ci.yml",
    ".circleci",
    ".travis.yml",
    "Jenkinsfile",
    "azure-pipelines.yml",
    "bitbucket-pipelines.yml",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageStats {
    pub files: usize,
    pub lines: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TechStack {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub tools: Vec<String>,
}

/// Dependencies declared in manifest files at the project root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredDependencies {
    /// `requirements.txt` lines and `pyproject.toml` runtime dependencies.
    pub python: Vec<String>,
    /// Optional and dev groups from `pyproject.toml`.
    pub python_dev: Vec<String>,
    /// `package.json` dependencies as `name@version`.
    pub node: Vec<String>,
    pub node_dev: Vec<String>,
}

impl DeclaredDependencies {
    fn package_names(&self) -> impl Iterator<Item = String> + '_ {
        let python = self.python.iter().chain(&self.python_dev).map(|spec| requirement_name(spec));
        let node = self.node.iter().chain(&self.node_dev).map(|spec| node_name(spec));
        python.chain(node)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectInventory {
    pub tech_stack: TechStack,
    /// Keyed by language name.
    pub language_stats: BTreeMap<String, LanguageStats>,
    pub entry_points: Vec<String>,
    pub dependencies: DeclaredDependencies,
    pub has_ci: bool,
}

impl ProjectInventory {
    /// Survey `root`. `imported` are the external modules the dependency
    /// graph saw, used to spot frameworks that no manifest declares.
    pub fn collect(root: &Path, config: &Config, imported: &[String]) -> anyhow::Result<Self> {
        let files = walk_files(root, config)?;

        let mut language_stats: BTreeMap<String, LanguageStats> = BTreeMap::new();
        let mut tools = BTreeSet::new();
        let mut entry_points = Vec::new();

        for path in &files {
            let rel = relative_path(root, path);
            let name = path.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();

            if let Some(language) = language_of(path) {
                let stats = language_stats.entry(language.to_string()).or_default();
                stats.files += 1;
                stats.lines += count_lines(path, config.max_file_bytes);
            }
            if let Some((_, tool)) = TECH_INDICATORS.iter().find(|(file, _)| *file == name) {
                tools.insert(tool.to_string());
            }
            if ENTRY_POINT_NAMES.contains(&name.as_ref()) {
                entry_points.push(rel);
            }
        }

        let dependencies = declared_dependencies(root);
        let imported_roots = imported
            .iter()
            .map(|m| m.split('.').next().unwrap_or(m).to_lowercase());
        let frameworks: BTreeSet<String> = dependencies
            .package_names()
            .chain(imported_roots)
            .filter_map(|name| {
                FRAMEWORK_PACKAGES
                    .iter()
                    .find(|(package, _)| *package == name)
                    .map(|(_, framework)| framework.to_string())
            })
            .collect();

        let has_ci = CI_MARKERS.iter().any(|marker| root.join(marker).exists());
        debug!(
            files = files.len(),
            languages = language_stats.len(),
            has_ci,
            "project inventory"
        );

        Ok(Self {
            tech_stack: TechStack {
                languages: language_stats.keys().cloned().collect(),
                frameworks: frameworks.into_iter().collect(),
                tools: tools.into_iter().collect(),
            },
            language_stats,
            entry_points,
            dependencies,
            has_ci,
        })
    }
}

fn language_of(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    LANGUAGE_MAP
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, language)| *language)
}

/// Line count of a text file; oversized or unreadable files count as zero.
fn count_lines(path: &Path, max_bytes: u64) -> usize {
    match fs::metadata(path) {
        Ok(meta) if meta.len() <= max_bytes => {}
        _ => return 0,
    }
    fs::read(path)
        .map(|bytes| String::from_utf8_lossy(&bytes).lines().count())
        .unwrap_or(0)
}

fn declared_dependencies(root: &Path) -> DeclaredDependencies {
    let mut deps = DeclaredDependencies::default();

    if let Ok(text) = fs::read_to_string(root.join("requirements.txt")) {
        deps.python.extend(parse_requirements(&text));
    }
    if let Ok(text) = fs::read_to_string(root.join("pyproject.toml")) {
        match parse_pyproject(&text) {
            Ok((runtime, dev)) => {
                deps.python.extend(runtime);
                deps.python_dev.extend(dev);
            }
            Err(err) => warn!(error = %err, "ignoring unreadable pyproject.toml"),
        }
    }
    if let Ok(text) = fs::read_to_string(root.join("package.json")) {
        match parse_package_json(&text) {
            Ok((runtime, dev)) => {
                deps.node = runtime;
                deps.node_dev = dev;
            }
            Err(err) => warn!(error = %err, "ignoring unreadable package.json"),
        }
    }
    deps
}

/// Requirement specifiers, without comments, blank lines or pip options.
pub fn parse_requirements(text: &str) -> Vec<String> {
    text.lines()
        .map(|line| line.split(" #").next().unwrap_or(line).trim())
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with('-'))
        .map(str::to_string)
        .collect()
}

/// Runtime and dev dependencies of a `pyproject.toml`, covering both PEP 621
/// `[project]` tables and Poetry.
pub fn parse_pyproject(text: &str) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let doc: toml::Table = toml::from_str(text)?;
    let mut runtime = Vec::new();
    let mut dev = Vec::new();

    if let Some(project) = doc.get("project").and_then(|p| p.as_table()) {
        runtime.extend(string_array(project.get("dependencies")));
        if let Some(optional) = project.get("optional-dependencies").and_then(|o| o.as_table()) {
            for group in optional.values() {
                dev.extend(string_array(Some(group)));
            }
        }
    }

    if let Some(poetry) = doc
        .get("tool")
        .and_then(|t| t.get("poetry"))
        .and_then(|p| p.as_table())
    {
        runtime.extend(
            table_keys(poetry.get("dependencies"))
                .into_iter()
                .filter(|name| name != "python"),
        );
        dev.extend(table_keys(poetry.get("dev-dependencies")));
        if let Some(groups) = poetry.get("group").and_then(|g| g.as_table()) {
            for group in groups.values() {
                dev.extend(table_keys(group.get("dependencies")));
            }
        }
    }

    Ok((runtime, dev))
}

fn string_array(value: Option<&toml::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn table_keys(value: Option<&toml::Value>) -> Vec<String> {
    value
        .and_then(|v| v.as_table())
        .map(|t| t.keys().cloned().collect())
        .unwrap_or_default()
}

/// `dependencies` and `devDependencies` of a `package.json`.
pub fn parse_package_json(text: &str) -> anyhow::Result<(Vec<String>, Vec<String>)> {
    let doc: serde_json::Value = serde_json::from_str(text)?;
    let section = |key: &str| -> Vec<String> {
        doc.get(key)
            .and_then(|v| v.as_object())
            .map(|deps| {
                deps.iter()
                    .map(|(name, version)| format!("{}@{}", name, version.as_str().unwrap_or("*")))
                    .collect()
            })
            .unwrap_or_default()
    };
    Ok((section("dependencies"), section("devDependencies")))
}

/// Distribution name of a requirement: `Flask[async]>=2.0` is `flask`.
fn requirement_name(spec: &str) -> String {
    let end = spec
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'))
        .unwrap_or(spec.len());
    spec[..end].to_lowercase()
}

/// Package name of `name@version`, keeping the scope of `@scope/name@1`.
fn node_name(spec: &str) -> String {
    match spec.rfind('@') {
        Some(0) | None => spec.to_string(),
        Some(i) => spec[..i].to_string(),
    }
}
