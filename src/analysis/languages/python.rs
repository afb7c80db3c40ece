//! Python language analyzer using tree-sitter.

use std::collections::{BTreeSet, HashSet};
use std::time::Duration;

use streaming_iterator::StreamingIterator;
use tree_sitter::{Language, Node, Parser, Query, QueryCursor};

use crate::analysis::shape;
use crate::analysis::tree::{first_error_line, statements, visit_preorder};
use crate::analysis::{
    module_name_for_path, ClassFact, ControlFlowInfo, FileFact, FunctionFact, ImportRef,
    LanguageAnalyzer, ParameterKind, Parameter, ParseOptions, ParsedFile,
};
use crate::detect::parse_suppressions;
use crate::error::ParseError;

const DECLARATION_QUERY: &str = r#"
; Function definitions (plain, async, decorated, nested)
(function_definition
  name: (identifier) @func_name
) @function

; Class definitions
(class_definition
  name: (identifier) @class_name
) @class
"#;

const CONTROL_FLOW_QUERY: &str = r#"
(if_statement) @if
(elif_clause) @elif
(conditional_expression) @ternary
(for_statement) @for
(while_statement) @while
(for_in_clause) @comprehension
(except_clause) @except
(with_statement) @with
(assert_statement) @assert
(case_clause) @case
(boolean_operator) @bool_op
"#;

/// Tree-sitter query for extracting imports.
const IMPORT_QUERY: &str = r#"
(import_statement) @import
(import_from_statement) @import_from
"#;

/// Statements that open a new nesting level.
const NESTING_KINDS: &[&str] = &[
    "if_statement",
    "for_statement",
    "while_statement",
    "try_statement",
    "with_statement",
    "match_statement",
];

/// Definitions whose bodies belong to someone else.
const SCOPE_KINDS: &[&str] = &["function_definition", "class_definition", "lambda"];

const MAX_CALLS: usize = 20;
const MAX_SUMMARY_CHARS: usize = 120;

pub struct PythonAnalyzer {
    language: Language,
}

impl PythonAnalyzer {
    pub fn new() -> Self {
        Self {
            language: tree_sitter_python::LANGUAGE.into(),
        }
    }

    fn create_parser(&self, timeout: Duration) -> Result<Parser, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.language)
            .map_err(|e| ParseError::Language(e.to_string()))?;
        if !timeout.is_zero() {
            parser.set_timeout_micros(timeout.as_micros() as u64);
        }
        Ok(parser)
    }

    fn extract_declarations(
        &self,
        parsed: &ParsedFile,
    ) -> anyhow::Result<(Vec<FunctionFact>, Vec<ClassFact>)> {
        let query = Query::new(&self.language, DECLARATION_QUERY)?;
        let flow_query = Query::new(&self.language, CONTROL_FLOW_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut functions = Vec::new();
        let mut classes = Vec::new();
        let mut seen = HashSet::new();

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let capture_name = query.capture_names()[capture.index as usize];
                let node = capture.node;
                if !seen.insert((node.start_byte(), capture_name)) {
                    continue;
                }
                match capture_name {
                    "function" => {
                        if let Some(func) = self.extract_function(parsed, node, &flow_query)? {
                            functions.push((node.start_byte(), func));
                        }
                    }
                    "class" => {
                        if let Some(class) = self.extract_class(parsed, node) {
                            classes.push((node.start_byte(), class));
                        }
                    }
                    _ => {}
                }
            }
        }

        functions.sort_by_key(|(start, _)| *start);
        classes.sort_by_key(|(start, _)| *start);
        Ok((
            functions.into_iter().map(|(_, f)| f).collect(),
            classes.into_iter().map(|(_, c)| c).collect(),
        ))
    }

    fn extract_function(
        &self,
        parsed: &ParsedFile,
        node: Node,
        flow_query: &Query,
    ) -> anyhow::Result<Option<FunctionFact>> {
        let name = match node.child_by_field_name("name") {
            Some(n) => parsed.node_text(n).to_string(),
            None => return Ok(None),
        };
        let body = match node.child_by_field_name("body") {
            Some(b) => b,
            None => return Ok(None),
        };

        let is_async = node.child(0).map(|c| c.kind() == "async").unwrap_or(false);
        let params = node
            .child_by_field_name("parameters")
            .map(|p| self.extract_parameters(parsed, p))
            .unwrap_or_default();
        let return_type = node
            .child_by_field_name("return_type")
            .map(|r| collapse_whitespace(parsed.node_text(r)));

        let signature = {
            let params_text = node
                .child_by_field_name("parameters")
                .map(|p| collapse_whitespace(parsed.node_text(p)))
                .unwrap_or_else(|| "()".to_string());
            let prefix = if is_async { "async def" } else { "def" };
            match &return_type {
                Some(ret) => format!("{} {}{} -> {}", prefix, name, params_text, ret),
                None => format!("{} {}{}", prefix, name, params_text),
            }
        };

        let docstring = docstring_node(body);
        let docstring_summary = docstring.map(|d| docstring_summary(parsed, d)).filter(|s| !s.is_empty());
        let statement_count = statements(body)
            .into_iter()
            .filter(|s| Some(*s) != docstring)
            .count();

        let definition = decorated_parent(node).unwrap_or(node);
        let class_name = enclosing_class(definition).map(|c| {
            c.child_by_field_name("name")
                .map(|n| parsed.node_text(n).to_string())
                .unwrap_or_default()
        });

        let line = node.start_position().row + 1;
        let end_line = node.end_position().row + 1;
        let tokens = body_shape(body, docstring);

        Ok(Some(FunctionFact {
            name,
            line,
            end_line,
            line_count: end_line - line + 1,
            params,
            return_type,
            signature,
            complexity: self.control_flow(parsed, node, flow_query).cyclomatic_complexity(),
            has_docstring: docstring.is_some(),
            docstring_summary,
            is_async,
            is_method: class_name.is_some(),
            class_name,
            decorators: decorators(parsed, node),
            nesting_depth: nesting_depth(body),
            statement_count,
            calls: called_names(parsed, body),
            shape_hash: shape::shape_hash(&tokens),
            shape_fingerprint: shape::fingerprint(&tokens),
        }))
    }

    fn extract_parameters(&self, parsed: &ParsedFile, params_node: Node) -> Vec<Parameter> {
        let mut params = Vec::new();
        let mut cursor = params_node.walk();

        for child in params_node.named_children(&mut cursor) {
            let param = match child.kind() {
                "identifier" => Parameter {
                    name: parsed.node_text(child).to_string(),
                    annotation: None,
                    default: None,
                    kind: ParameterKind::Positional,
                },
                "list_splat_pattern" | "dictionary_splat_pattern" => Parameter {
                    name: splat_name(parsed, child),
                    annotation: None,
                    default: None,
                    kind: splat_kind(child),
                },
                "typed_parameter" => {
                    let inner = child.named_child(0);
                    let (name, kind) = match inner {
                        Some(n) if n.kind() == "identifier" => {
                            (parsed.node_text(n).to_string(), ParameterKind::Positional)
                        }
                        Some(n) => (splat_name(parsed, n), splat_kind(n)),
                        None => continue,
                    };
                    Parameter {
                        name,
                        annotation: child
                            .child_by_field_name("type")
                            .map(|t| collapse_whitespace(parsed.node_text(t))),
                        default: None,
                        kind,
                    }
                }
                "default_parameter" | "typed_default_parameter" => Parameter {
                    name: child
                        .child_by_field_name("name")
                        .map(|n| parsed.node_text(n).to_string())
                        .unwrap_or_default(),
                    annotation: child
                        .child_by_field_name("type")
                        .map(|t| collapse_whitespace(parsed.node_text(t))),
                    default: child
                        .child_by_field_name("value")
                        .map(|v| collapse_whitespace(parsed.node_text(v))),
                    kind: ParameterKind::Positional,
                },
                // `*` and `/` separators carry no name
                _ => continue,
            };
            if !param.name.is_empty() {
                params.push(param);
            }
        }

        params
    }

    fn control_flow(&self, parsed: &ParsedFile, node: Node, query: &Query) -> ControlFlowInfo {
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(query, node, &parsed.source[..]);
        let mut info = ControlFlowInfo::default();

        while let Some(m) = matches.next() {
            for capture in m.captures {
                match query.capture_names()[capture.index as usize] {
                    "if" | "elif" => info.if_count += 1,
                    "ternary" => info.ternary_count += 1,
                    "for" | "while" => info.loop_count += 1,
                    "comprehension" => info.comprehension_count += 1,
                    "except" => info.except_count += 1,
                    "with" => info.with_count += 1,
                    "assert" => info.assert_count += 1,
                    "case" => info.case_count += 1,
                    "bool_op" => info.bool_op_count += 1,
                    _ => {}
                }
            }
        }

        info
    }

    fn extract_class(&self, parsed: &ParsedFile, node: Node) -> Option<ClassFact> {
        let name = parsed.node_text(node.child_by_field_name("name")?).to_string();
        let body = node.child_by_field_name("body")?;

        let bases = node
            .child_by_field_name("superclasses")
            .map(|args| {
                let mut cursor = args.walk();
                args.named_children(&mut cursor)
                    .filter(|a| a.kind() != "keyword_argument" && a.kind() != "comment")
                    .map(|a| collapse_whitespace(parsed.node_text(a)))
                    .collect()
            })
            .unwrap_or_default();

        let methods = statements(body)
            .into_iter()
            .filter_map(|stmt| match stmt.kind() {
                "function_definition" => Some(stmt),
                "decorated_definition" => stmt
                    .child_by_field_name("definition")
                    .filter(|d| d.kind() == "function_definition"),
                _ => None,
            })
            .filter_map(|f| f.child_by_field_name("name"))
            .map(|n| parsed.node_text(n).to_string())
            .collect();

        Some(ClassFact {
            name,
            line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            bases,
            methods,
            decorators: decorators(parsed, node),
            has_docstring: docstring_node(body).is_some(),
        })
    }

    fn extract_imports(&self, parsed: &ParsedFile) -> anyhow::Result<Vec<ImportRef>> {
        let query = Query::new(&self.language, IMPORT_QUERY)?;
        let mut cursor = QueryCursor::new();
        let mut matches = cursor.matches(&query, parsed.tree.root_node(), &parsed.source[..]);

        let mut imports = Vec::new();

        while let Some(m) = matches.next() {
            for capture in m.captures {
                let node = capture.node;
                let line = node.start_position().row + 1;
                match query.capture_names()[capture.index as usize] {
                    "import" => {
                        let mut c = node.walk();
                        for target in node.children_by_field_name("name", &mut c) {
                            let module_node = if target.kind() == "aliased_import" {
                                target.child_by_field_name("name")
                            } else {
                                Some(target)
                            };
                            if let Some(module_node) = module_node {
                                imports.push(ImportRef {
                                    module: parsed.node_text(module_node).to_string(),
                                    names: Vec::new(),
                                    level: 0,
                                    line,
                                    resolved: Vec::new(),
                                });
                            }
                        }
                    }
                    "import_from" => {
                        let module_node = match node.child_by_field_name("module_name") {
                            Some(n) => n,
                            None => continue,
                        };
                        let module = parsed.node_text(module_node).to_string();
                        let level = if module_node.kind() == "relative_import" {
                            module.chars().take_while(|c| *c == '.').count()
                        } else {
                            0
                        };

                        let mut names = Vec::new();
                        let mut c = node.walk();
                        for target in node.children_by_field_name("name", &mut c) {
                            let name_node = if target.kind() == "aliased_import" {
                                target.child_by_field_name("name")
                            } else {
                                Some(target)
                            };
                            if let Some(n) = name_node {
                                names.push(parsed.node_text(n).to_string());
                            }
                        }
                        let mut c = node.walk();
                        if node.named_children(&mut c).any(|n| n.kind() == "wildcard_import") {
                            names.push("*".to_string());
                        }

                        imports.push(ImportRef {
                            module,
                            names,
                            level,
                            line,
                            resolved: Vec::new(),
                        });
                    }
                    _ => {}
                }
            }
        }

        imports.sort_by(|a, b| (a.line, &a.module).cmp(&(b.line, &b.module)));
        Ok(imports)
    }

    /// Imported bindings never referenced outside import statements.
    fn unused_imports(&self, parsed: &ParsedFile) -> Vec<String> {
        let root = parsed.tree.root_node();
        let mut bound: Vec<String> = Vec::new();
        let mut used: HashSet<&str> = HashSet::new();

        visit_preorder(root, |node, _| match node.kind() {
            "import_statement" => {
                let mut c = node.walk();
                for target in node.children_by_field_name("name", &mut c) {
                    let binding = match target.kind() {
                        "aliased_import" => target
                            .child_by_field_name("alias")
                            .map(|a| parsed.node_text(a).to_string()),
                        _ => parsed
                            .node_text(target)
                            .split('.')
                            .next()
                            .map(str::to_string),
                    };
                    bound.extend(binding);
                }
                false
            }
            "import_from_statement" => {
                let mut c = node.walk();
                for target in node.children_by_field_name("name", &mut c) {
                    let binding = match target.kind() {
                        "aliased_import" => target.child_by_field_name("alias"),
                        _ => Some(target),
                    };
                    bound.extend(binding.map(|b| parsed.node_text(b).to_string()));
                }
                false
            }
            "future_import_statement" => false,
            "identifier" => {
                used.insert(parsed.node_text(node));
                false
            }
            _ => true,
        });

        let unused: BTreeSet<String> = bound
            .into_iter()
            .filter(|name| !used.contains(name.as_str()))
            .collect();
        unused.into_iter().collect()
    }
}

impl Default for PythonAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl LanguageAnalyzer for PythonAnalyzer {
    fn language_id(&self) -> &'static str {
        "python"
    }

    fn file_extensions(&self) -> &'static [&'static str] {
        &["py"]
    }

    fn parse(&self, path: &str, source: &[u8], options: &ParseOptions) -> Result<ParsedFile, ParseError> {
        let size = source.len() as u64;
        if size > options.max_file_bytes {
            return Err(ParseError::TooLarge {
                size,
                limit: options.max_file_bytes,
            });
        }

        // Latin-1 and other legacy encodings still parse; node offsets follow
        // the decoded text.
        let text = String::from_utf8_lossy(source);
        let mut parser = self.create_parser(options.timeout)?;
        let tree = parser.parse(text.as_bytes(), None).ok_or(ParseError::Timeout {
            timeout_ms: options.timeout.as_millis() as u64,
        })?;

        Ok(ParsedFile {
            tree,
            source: text.into_owned().into_bytes(),
            path: path.to_string(),
        })
    }

    fn extract_facts(&self, parsed: &ParsedFile) -> anyhow::Result<FileFact> {
        if parsed.has_errors() {
            let line = first_error_line(parsed.tree.root_node()).unwrap_or(1);
            return Err(ParseError::Syntax { line }.into());
        }

        let (functions, classes) = self.extract_declarations(parsed)?;
        let imports = self.extract_imports(parsed)?;
        let source = parsed.source_str();
        let (code_lines, comment_lines, blank_lines) = line_breakdown(&source);

        let mut facts = FileFact {
            path: parsed.path.clone(),
            module: module_name_for_path(&parsed.path),
            line_count: source.lines().count(),
            code_lines,
            comment_lines,
            blank_lines,
            has_module_docstring: docstring_node(parsed.tree.root_node()).is_some(),
            functions,
            classes,
            imports,
            complexity: Default::default(),
            docstring_coverage: None,
            type_hint_coverage: None,
            unused_imports: self.unused_imports(parsed),
            suppressions: parse_suppressions(&parsed.path, &source),
        };
        facts.recompute_aggregates();
        Ok(facts)
    }
}

/// The `string` statement opening a module, class or function body.
fn docstring_node(body: Node) -> Option<Node> {
    let first = statements(body).into_iter().next()?;
    if first.kind() != "expression_statement" {
        return None;
    }
    match first.named_child(0) {
        Some(s) if s.kind() == "string" => Some(first),
        _ => None,
    }
}

fn docstring_summary(parsed: &ParsedFile, stmt: Node) -> String {
    let string = match stmt.named_child(0) {
        Some(s) => s,
        None => return String::new(),
    };

    let mut cursor = string.walk();
    let content: String = string
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "string_content")
        .map(|c| parsed.node_text(c))
        .collect();

    let text = if content.is_empty() {
        parsed
            .node_text(string)
            .trim_start_matches(|c: char| c.is_ascii_alphabetic())
            .trim_matches(|c| c == '"' || c == '\'')
            .to_string()
    } else {
        content
    };

    let line = text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or("");
    line.chars().take(MAX_SUMMARY_CHARS).collect()
}

fn decorated_parent(node: Node) -> Option<Node> {
    node.parent().filter(|p| p.kind() == "decorated_definition")
}

fn decorators(parsed: &ParsedFile, node: Node) -> Vec<String> {
    let parent = match decorated_parent(node) {
        Some(p) => p,
        None => return Vec::new(),
    };
    let mut cursor = parent.walk();
    parent
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "decorator")
        .map(|d| collapse_whitespace(parsed.node_text(d).trim_start_matches('@')))
        .collect()
}

/// The class whose body directly contains `definition`.
fn enclosing_class(definition: Node) -> Option<Node> {
    let block = definition.parent().filter(|p| p.kind() == "block")?;
    block.parent().filter(|p| p.kind() == "class_definition")
}

fn splat_name(parsed: &ParsedFile, node: Node) -> String {
    node.named_child(0)
        .map(|n| parsed.node_text(n).to_string())
        .unwrap_or_default()
}

fn splat_kind(node: Node) -> ParameterKind {
    if node.kind() == "dictionary_splat_pattern" {
        ParameterKind::KwArgs
    } else {
        ParameterKind::VarArgs
    }
}

/// Deepest chain of nested block statements, ignoring nested definitions.
fn nesting_depth(body: Node) -> u32 {
    let mut max_depth = 0u32;
    visit_preorder(body, |node, _| {
        if node != body && SCOPE_KINDS.contains(&node.kind()) {
            return false;
        }
        if NESTING_KINDS.contains(&node.kind()) {
            let mut depth = 1;
            let mut current = node.parent();
            while let Some(p) = current {
                if p == body {
                    break;
                }
                if NESTING_KINDS.contains(&p.kind()) {
                    depth += 1;
                }
                current = p.parent();
            }
            max_depth = max_depth.max(depth);
        }
        true
    });
    max_depth
}

fn called_names(parsed: &ParsedFile, body: Node) -> Vec<String> {
    let mut calls: Vec<String> = Vec::new();
    visit_preorder(body, |node, _| {
        if node.kind() == "call" {
            if let Some(func) = node.child_by_field_name("function") {
                if matches!(func.kind(), "identifier" | "attribute") {
                    let name = collapse_whitespace(parsed.node_text(func));
                    if calls.len() < MAX_CALLS && !calls.contains(&name) {
                        calls.push(name);
                    }
                }
            }
        }
        true
    });
    calls
}

/// Normalized token stream of a function body.
fn body_shape(body: Node, docstring: Option<Node>) -> Vec<String> {
    let mut tokens = Vec::new();
    visit_preorder(body, |node, depth| {
        if Some(node) == docstring || !node.is_named() || node.kind() == "comment" {
            return false;
        }
        let (token, descend) = match node.kind() {
            "identifier" => ("id", false),
            "string" | "concatenated_string" => ("str", false),
            "integer" | "float" => ("num", false),
            "true" | "false" => ("bool", false),
            "none" => ("none", false),
            kind => (kind, true),
        };
        tokens.push(format!("{}:{}", depth, token));
        descend
    });
    tokens
}

fn line_breakdown(source: &str) -> (usize, usize, usize) {
    let (mut code, mut comment, mut blank) = (0, 0, 0);
    for line in source.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank += 1;
        } else if trimmed.starts_with('#') {
            comment += 1;
        } else {
            code += 1;
        }
    }
    (code, comment, blank)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_python(source: &str) -> (PythonAnalyzer, ParsedFile) {
        let analyzer = PythonAnalyzer::new();
        let parsed = analyzer
            .parse("pkg/sample.py", source.as_bytes(), &ParseOptions::default())
            .unwrap();
        (analyzer, parsed)
    }

    fn facts_for(source: &str) -> FileFact {
        let (analyzer, parsed) = parse_python(source);
        analyzer.extract_facts(&parsed).unwrap()
    }

    fn function<'a>(facts: &'a FileFact, name: &str) -> &'a FunctionFact {
        facts.functions.iter().find(|f| f.name == name).unwrap()
    }

    #[test]
    fn test_extract_imports() {
        let facts = facts_for(
            "import os\nimport os.path as osp\nfrom typing import List, Dict\nfrom ..models import Task\nfrom . import utils\n",
        );
        let modules: Vec<&str> = facts.imports.iter().map(|i| i.module.as_str()).collect();
        assert_eq!(modules, vec!["os", "os.path", "typing", "..models", "."]);
        assert_eq!(facts.imports[2].names, vec!["List", "Dict"]);
        assert_eq!(facts.imports[3].level, 2);
        assert_eq!(facts.imports[3].module_path(), "models");
        assert_eq!(facts.imports[4].level, 1);
        assert_eq!(facts.imports[4].names, vec!["utils"]);
    }

    #[test]
    fn test_extract_functions_and_methods() {
        let facts = facts_for(
            r#"
class Store(Base, metaclass=Meta):
    """Keeps things."""

    def get(self, key: str) -> str:
        """Fetch a key."""
        return self.data[key]

    @staticmethod
    def build(*args, **kwargs):
        return Store()

def helper(x, y=2):
    def inner():
        return x
    return inner
"#,
        );

        let names: Vec<&str> = facts.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["get", "build", "helper", "inner"]);

        let get = function(&facts, "get");
        assert!(get.is_method);
        assert_eq!(get.class_name.as_deref(), Some("Store"));
        assert!(get.has_docstring);
        assert_eq!(get.docstring_summary.as_deref(), Some("Fetch a key."));
        assert_eq!(get.return_type.as_deref(), Some("str"));
        assert_eq!(get.signature, "def get(self, key: str) -> str");

        let build = function(&facts, "build");
        assert_eq!(build.decorators, vec!["staticmethod"]);
        assert_eq!(build.params[0].kind, ParameterKind::VarArgs);
        assert_eq!(build.params[1].kind, ParameterKind::KwArgs);
        assert_eq!(build.params[1].name, "kwargs");

        let helper = function(&facts, "helper");
        assert!(!helper.is_method);
        assert_eq!(helper.params[1].default.as_deref(), Some("2"));
        assert!(!function(&facts, "inner").is_method);

        let class = &facts.classes[0];
        assert_eq!(class.name, "Store");
        assert_eq!(class.bases, vec!["Base"]);
        assert_eq!(class.methods, vec!["get", "build"]);
        assert!(class.has_docstring);
    }

    #[test]
    fn test_complexity_counts_decision_points() {
        let facts = facts_for(
            r#"
def simple():
    return 1

def branches(a, b, items):
    if a and b:
        pass
    elif a or b:
        pass
    for i in items:
        while i:
            i -= 1
    try:
        pass
    except ValueError:
        pass
    return [x for x in items if x] if a else None
"#,
        );
        assert_eq!(function(&facts, "simple").complexity, 1);
        // if, elif, and, or, for, while, except, comprehension, ternary
        assert_eq!(function(&facts, "branches").complexity, 10);
    }

    #[test]
    fn test_one_more_branch_adds_exactly_one() {
        let base = "def f(a):\n    if a > 1:\n        return 1\n    return 0\n";
        let extended = "def f(a):\n    if a > 1:\n        return 1\n    elif a < 0:\n        return 2\n    return 0\n";
        let before = facts_for(base).functions[0].complexity;
        let after = facts_for(extended).functions[0].complexity;
        assert_eq!(after, before + 1);
    }

    #[test]
    fn test_nesting_depth_ignores_nested_functions() {
        let facts = facts_for(
            r#"
def outer(items):
    for item in items:
        if item:
            with open(item) as fh:
                pass
    def inner():
        if True:
            if True:
                if True:
                    if True:
                        pass
    return inner
"#,
        );
        assert_eq!(function(&facts, "outer").nesting_depth, 3);
        assert_eq!(function(&facts, "inner").nesting_depth, 4);
    }

    #[test]
    fn test_type_hint_and_docstring_coverage() {
        let facts = facts_for(
            r#"
def typed(a: int, b: str) -> bool:
    """Typed."""
    return True

def untyped(a, b):
    return False
"#,
        );
        assert_eq!(facts.docstring_coverage, Some(0.5));
        // typed: 3 of 3 slots, untyped: 0 of 3 slots
        assert_eq!(facts.type_hint_coverage, Some(0.5));
    }

    #[test]
    fn test_unused_imports() {
        let facts = facts_for("import os\nimport sys\nfrom json import loads as parse\n\nprint(sys.argv)\n");
        assert_eq!(facts.unused_imports, vec!["os", "parse"]);
    }

    #[test]
    fn test_renamed_copies_share_shape() {
        let facts = facts_for(
            r#"
def total_price(items):
    result = 0
    for item in items:
        result += item.price * 2
    return result

def sum_weights(things):
    acc = 0
    for thing in things:
        acc += thing.weight * 3
    return acc
"#,
        );
        assert_eq!(facts.functions[0].shape_hash, facts.functions[1].shape_hash);
    }

    #[test]
    fn test_line_breakdown_and_module_docstring() {
        let facts = facts_for("\"\"\"Module doc.\"\"\"\n\n# comment\nx = 1\n");
        assert!(facts.has_module_docstring);
        assert_eq!(facts.line_count, 4);
        assert_eq!(facts.blank_lines, 1);
        assert_eq!(facts.comment_lines, 1);
        assert_eq!(facts.code_lines, 2);
        assert_eq!(facts.module, "pkg.sample");
    }

    #[test]
    fn test_syntax_error_is_reported() {
        let (analyzer, parsed) = parse_python("def broken(:\n    pass\n");
        let err = analyzer.extract_facts(&parsed).unwrap_err();
        let parse_err = err.downcast_ref::<ParseError>().unwrap();
        assert_eq!(parse_err.rule(), "syntax_error");
    }

    #[test]
    fn test_too_large_file_is_rejected() {
        let analyzer = PythonAnalyzer::new();
        let options = ParseOptions {
            max_file_bytes: 4,
            ..Default::default()
        };
        let err = analyzer.parse("big.py", b"x = 12345\n", &options).err().unwrap();
        assert!(matches!(err, ParseError::TooLarge { .. }));
    }

    #[test]
    fn test_latin1_source_keeps_lines_and_suppressions() {
        // "café" in latin-1: the 0xE9 byte is not valid UTF-8.
        let mut source = b"# caf\xe9 settings\n".to_vec();
        source.extend_from_slice(b"DEBUG = True  # codestrata:ignore debug_flag - local\n");
        source.extend_from_slice(b"def greet():\n    return 'caf\xe9'\n");

        let analyzer = PythonAnalyzer::new();
        let parsed = analyzer
            .parse("pkg/legacy.py", &source, &ParseOptions::default())
            .unwrap();
        assert!(parsed.source_str().contains('\u{FFFD}'));

        let facts = analyzer.extract_facts(&parsed).unwrap();
        assert_eq!(facts.line_count, 4);
        assert_eq!(facts.comment_lines, 1);
        assert_eq!(facts.suppressions.len(), 1);
        assert_eq!(facts.suppressions[0].line, 2);
        assert_eq!(facts.suppressions[0].rule, "debug_flag");
        assert_eq!(function(&facts, "greet").line, 3);
    }
}
