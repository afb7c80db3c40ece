//! Fact structures extracted from syntax-tree analysis.
//!
//! A [`FileFact`] is produced once per analyzed file and never changes after
//! the extraction run that created it has finished.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::detect::Suppression;

/// How a parameter binds its arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterKind {
    Positional,
    VarArgs,
    KwArgs,
}

impl ParameterKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKind::Positional => "positional",
            ParameterKind::VarArgs => "var_args",
            ParameterKind::KwArgs => "kw_args",
        }
    }
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single function parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Type annotation text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
    /// Default value text, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    pub kind: ParameterKind,
}

impl Parameter {
    /// `self` and `cls` receivers are not annotatable slots.
    pub fn is_receiver(&self) -> bool {
        self.name == "self" || self.name == "cls"
    }
}

/// Counts of decision points found in a function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlFlowInfo {
    /// `if` statements and `elif` clauses.
    pub if_count: u32,
    /// Conditional expressions (`a if c else b`).
    pub ternary_count: u32,
    /// `for` and `while` statements.
    pub loop_count: u32,
    /// Generators inside comprehensions.
    pub comprehension_count: u32,
    /// `except` clauses.
    pub except_count: u32,
    pub with_count: u32,
    pub assert_count: u32,
    /// `case` clauses of a `match` statement.
    pub case_count: u32,
    /// `and` / `or` operators.
    pub bool_op_count: u32,
}

impl ControlFlowInfo {
    /// Calculate cyclomatic complexity.
    ///
    /// CC = 1 + decision_points
    pub fn cyclomatic_complexity(&self) -> u32 {
        1 + self.if_count
            + self.ternary_count
            + self.loop_count
            + self.comprehension_count
            + self.except_count
            + self.with_count
            + self.assert_count
            + self.case_count
            + self.bool_op_count
    }
}

/// A function or method definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionFact {
    pub name: String,
    /// Line of the `def` keyword (1-indexed).
    pub line: usize,
    pub end_line: usize,
    pub line_count: usize,
    pub params: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    /// One-line signature, e.g. `def load(path: str) -> dict`.
    pub signature: String,
    pub complexity: u32,
    pub has_docstring: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring_summary: Option<String>,
    pub is_async: bool,
    pub is_method: bool,
    /// Name of the directly enclosing class for methods.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    pub nesting_depth: u32,
    /// Body statements, docstring excluded.
    pub statement_count: usize,
    /// Distinct called names in order of first appearance, capped at 20.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub calls: Vec<String>,
    /// Digest of the normalized body shape.
    pub shape_hash: String,
    /// Sorted winnowed shingle hashes of the normalized body shape.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub shape_fingerprint: Vec<u32>,
}

impl FunctionFact {
    /// Parameters that count as annotatable slots.
    pub fn annotatable_params(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter().filter(|p| !p.is_receiver())
    }

    /// Annotated slots and total slots, return slot included.
    pub fn type_hint_slots(&self) -> (usize, usize) {
        let mut typed = 0;
        let mut total = 1;
        for p in self.annotatable_params() {
            total += 1;
            if p.annotation.is_some() {
                typed += 1;
            }
        }
        if self.return_type.is_some() {
            typed += 1;
        }
        (typed, total)
    }

    pub fn is_dunder(&self) -> bool {
        self.name.starts_with("__") && self.name.ends_with("__")
    }

    pub fn is_public(&self) -> bool {
        !self.name.starts_with('_')
    }

    /// Whether `other` lies entirely inside this function's body.
    pub fn contains(&self, other: &FunctionFact) -> bool {
        self.line <= other.line && other.end_line <= self.end_line && self != other
    }
}

/// A class definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassFact {
    pub name: String,
    pub line: usize,
    pub end_line: usize,
    /// Base class expressions as written.
    #[serde(default)]
    pub bases: Vec<String>,
    /// Names of directly defined methods, in order.
    #[serde(default)]
    pub methods: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub decorators: Vec<String>,
    pub has_docstring: bool,
}

/// An import statement.
///
/// `resolved` is filled by the dependency grapher before the facts of a run
/// are published; it stays empty for modules outside the project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRef {
    /// Module as written, including leading dots for relative imports.
    pub module: String,
    /// Names listed after `import` in a `from` import.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub names: Vec<String>,
    /// Number of leading dots (0 for absolute imports).
    pub level: usize,
    pub line: usize,
    #[serde(default)]
    pub resolved: Vec<String>,
}

impl ImportRef {
    pub fn is_relative(&self) -> bool {
        self.level > 0
    }

    /// Module path without leading dots.
    pub fn module_path(&self) -> &str {
        self.module.trim_start_matches('.')
    }
}

/// Per-file complexity aggregate.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileComplexity {
    pub total: u32,
    pub average: f64,
    pub max: u32,
}

/// All facts extracted from a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileFact {
    /// Project-relative path with `/` separators.
    pub path: String,
    /// Dotted module name derived from the path.
    pub module: String,
    pub line_count: usize,
    pub code_lines: usize,
    pub comment_lines: usize,
    pub blank_lines: usize,
    pub has_module_docstring: bool,
    pub functions: Vec<FunctionFact>,
    pub classes: Vec<ClassFact>,
    pub imports: Vec<ImportRef>,
    pub complexity: FileComplexity,
    /// None when the file defines no functions.
    pub docstring_coverage: Option<f64>,
    /// None when the file has no annotatable slots.
    pub type_hint_coverage: Option<f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unused_imports: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suppressions: Vec<Suppression>,
}

impl FileFact {
    /// Create empty facts for a file.
    pub fn empty(path: &str) -> Self {
        Self {
            path: path.to_string(),
            module: module_name_for_path(path),
            line_count: 0,
            code_lines: 0,
            comment_lines: 0,
            blank_lines: 0,
            has_module_docstring: false,
            functions: Vec::new(),
            classes: Vec::new(),
            imports: Vec::new(),
            complexity: FileComplexity::default(),
            docstring_coverage: None,
            type_hint_coverage: None,
            unused_imports: Vec::new(),
            suppressions: Vec::new(),
        }
    }

    /// Whether this file is a package `__init__.py`.
    pub fn is_package_init(&self) -> bool {
        self.path == "__init__.py" || self.path.ends_with("/__init__.py")
    }

    /// Methods defined directly in `class`.
    pub fn methods_of<'a>(&'a self, class: &'a ClassFact) -> impl Iterator<Item = &'a FunctionFact> {
        self.functions
            .iter()
            .filter(move |f| f.class_name.as_deref() == Some(class.name.as_str())
                && f.line >= class.line
                && f.end_line <= class.end_line)
    }

    /// Recompute the aggregate complexity and coverage fields from `functions`.
    pub fn recompute_aggregates(&mut self) {
        let count = self.functions.len();
        if count == 0 {
            self.complexity = FileComplexity::default();
            self.docstring_coverage = None;
            self.type_hint_coverage = None;
            return;
        }

        let total: u32 = self.functions.iter().map(|f| f.complexity).sum();
        let max = self.functions.iter().map(|f| f.complexity).max().unwrap_or(0);
        self.complexity = FileComplexity {
            total,
            average: round2(total as f64 / count as f64),
            max,
        };

        let documented = self.functions.iter().filter(|f| f.has_docstring).count();
        self.docstring_coverage = Some(round2(documented as f64 / count as f64));

        let (typed, slots) = self
            .functions
            .iter()
            .map(FunctionFact::type_hint_slots)
            .fold((0, 0), |(t, s), (ft, fs)| (t + ft, s + fs));
        self.type_hint_coverage = if slots == 0 {
            None
        } else {
            Some(round2(typed as f64 / slots as f64))
        };
    }
}

/// Map a relative `.py` path to its dotted module name.
///
/// `a/b/c.py` becomes `a.b.c`; `a/b/__init__.py` becomes `a.b`.
pub fn module_name_for_path(path: &str) -> String {
    let trimmed = path.strip_suffix(".py").unwrap_or(path);
    let mut parts: Vec<&str> = trimmed.split('/').filter(|p| !p.is_empty()).collect();
    if parts.last() == Some(&"__init__") {
        parts.pop();
    }
    parts.join(".")
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn function(name: &str, complexity: u32, documented: bool) -> FunctionFact {
        FunctionFact {
            name: name.to_string(),
            line: 1,
            end_line: 3,
            line_count: 3,
            params: vec![
                Parameter {
                    name: "self".to_string(),
                    annotation: None,
                    default: None,
                    kind: ParameterKind::Positional,
                },
                Parameter {
                    name: "value".to_string(),
                    annotation: Some("int".to_string()),
                    default: None,
                    kind: ParameterKind::Positional,
                },
            ],
            return_type: None,
            signature: format!("def {}(self, value: int)", name),
            complexity,
            has_docstring: documented,
            docstring_summary: None,
            is_async: false,
            is_method: true,
            class_name: Some("Thing".to_string()),
            decorators: Vec::new(),
            nesting_depth: 0,
            statement_count: 1,
            calls: Vec::new(),
            shape_hash: String::new(),
            shape_fingerprint: Vec::new(),
        }
    }

    #[test]
    fn test_module_name_for_path() {
        assert_eq!(module_name_for_path("a/b/c.py"), "a.b.c");
        assert_eq!(module_name_for_path("pkg/__init__.py"), "pkg");
        assert_eq!(module_name_for_path("app.py"), "app");
        assert_eq!(module_name_for_path("__init__.py"), "");
    }

    #[test]
    fn test_type_hint_slots_skip_receiver() {
        let f = function("run", 1, false);
        // value is typed, return is not, self is skipped
        assert_eq!(f.type_hint_slots(), (1, 2));
    }

    #[test]
    fn test_control_flow_base_is_one() {
        assert_eq!(ControlFlowInfo::default().cyclomatic_complexity(), 1);
        let info = ControlFlowInfo {
            if_count: 2,
            bool_op_count: 1,
            ..Default::default()
        };
        assert_eq!(info.cyclomatic_complexity(), 4);
    }

    #[test]
    fn test_recompute_aggregates() {
        let mut facts = FileFact::empty("pkg/mod.py");
        facts.recompute_aggregates();
        assert_eq!(facts.docstring_coverage, None);
        assert_eq!(facts.complexity.max, 0);

        facts.functions = vec![function("a", 2, true), function("b", 5, false)];
        facts.recompute_aggregates();
        assert_eq!(facts.complexity.total, 7);
        assert_eq!(facts.complexity.max, 5);
        assert_eq!(facts.complexity.average, 3.5);
        assert_eq!(facts.docstring_coverage, Some(0.5));
        assert_eq!(facts.type_hint_coverage, Some(0.5));
    }
}
