//! Syntax-tree rules: checks that need call structure rather than text.

use tree_sitter::Node;

use crate::analysis::tree::visit_preorder;
use crate::analysis::ParsedFile;
use crate::detect::Severity;

/// A check applied to every node of one kind.
pub struct TreeRule {
    pub id: &'static str,
    pub category: &'static str,
    pub severity: Severity,
    /// Node kind the check runs on.
    pub node_kind: &'static str,
    /// Returns the finding message when the node violates the rule.
    pub check: fn(&ParsedFile, Node) -> Option<String>,
}

pub static TREE_RULES: &[TreeRule] = &[
    TreeRule {
        id: "dynamic_eval",
        category: "dangerous_function",
        severity: Severity::Critical,
        node_kind: "call",
        check: check_dynamic_eval,
    },
    TreeRule {
        id: "shell_true",
        category: "shell_injection",
        severity: Severity::High,
        node_kind: "call",
        check: check_shell_true,
    },
    TreeRule {
        id: "os_system",
        category: "command_injection",
        severity: Severity::Medium,
        node_kind: "call",
        check: check_os_system,
    },
    TreeRule {
        id: "hardcoded_credential",
        category: "secrets",
        severity: Severity::High,
        node_kind: "assignment",
        check: check_hardcoded_credential,
    },
    TreeRule {
        id: "missing_validation",
        category: "input_validation",
        severity: Severity::Low,
        node_kind: "function_definition",
        check: check_missing_validation,
    },
];

const DYNAMIC_EXEC: &[&str] = &["eval", "exec", "__import__"];
const SENSITIVE_NAMES: &[&str] = &["password", "auth", "login", "token"];
const CREDENTIAL_NAMES: &[&str] = &[
    "password",
    "passwd",
    "secret",
    "api_key",
    "apikey",
    "private_key",
    "auth",
    "token",
    "credential",
];
/// Literals this short are placeholders, not credentials.
const MIN_CREDENTIAL_LEN: usize = 4;

fn callee<'a>(parsed: &'a ParsedFile, call: Node) -> Option<&'a str> {
    call.child_by_field_name("function").map(|f| parsed.node_text(f))
}

fn arguments(call: Node) -> Vec<Node> {
    match call.child_by_field_name("arguments") {
        Some(args) => {
            let mut cursor = args.walk();
            args.named_children(&mut cursor)
                .filter(|n| n.kind() != "comment")
                .collect()
        }
        None => Vec::new(),
    }
}

/// Whether `node` is a constant: a plain string or a literal value.
fn is_literal(node: Node) -> bool {
    match node.kind() {
        "integer" | "float" | "true" | "false" | "none" => true,
        "string" => {
            let mut cursor = node.walk();
            let interpolated = node
                .named_children(&mut cursor)
                .any(|c| c.kind() == "interpolation");
            !interpolated
        }
        _ => false,
    }
}

fn check_dynamic_eval(parsed: &ParsedFile, call: Node) -> Option<String> {
    let name = callee(parsed, call)?;
    if !DYNAMIC_EXEC.contains(&name) {
        return None;
    }
    let first = arguments(call).into_iter().next()?;
    if is_literal(first) {
        return None;
    }
    Some(format!("{}() called with a dynamic argument", name))
}

fn check_shell_true(parsed: &ParsedFile, call: Node) -> Option<String> {
    let name = callee(parsed, call)?;
    if !name.starts_with("subprocess.") {
        return None;
    }
    let shell_true = arguments(call).into_iter().any(|arg| {
        arg.kind() == "keyword_argument"
            && arg.child_by_field_name("name").map(|n| parsed.node_text(n)) == Some("shell")
            && arg.child_by_field_name("value").map(|v| v.kind()) == Some("true")
    });
    shell_true.then(|| format!("{}() with shell=True", name))
}

fn check_os_system(parsed: &ParsedFile, call: Node) -> Option<String> {
    (callee(parsed, call)? == "os.system")
        .then(|| "os.system() runs a shell; prefer subprocess with shell=False".to_string())
}

/// The name an assignment binds: `x`, the `y` of `obj.y`, or `None` for
/// tuple targets and subscripts.
fn assigned_name<'a>(parsed: &'a ParsedFile, assignment: Node) -> Option<&'a str> {
    let left = assignment.child_by_field_name("left")?;
    match left.kind() {
        "identifier" => Some(parsed.node_text(left)),
        "attribute" => left.child_by_field_name("attribute").map(|a| parsed.node_text(a)),
        _ => None,
    }
}

/// Characters inside a plain string literal's quotes.
fn literal_len(parsed: &ParsedFile, string: Node) -> usize {
    let mut cursor = string.walk();
    let len = string
        .named_children(&mut cursor)
        .filter(|c| c.kind() == "string_content")
        .map(|c| parsed.node_text(c).chars().count())
        .sum();
    len
}

fn check_hardcoded_credential(parsed: &ParsedFile, assignment: Node) -> Option<String> {
    let name = assigned_name(parsed, assignment)?;
    let lower = name.to_lowercase();
    if !CREDENTIAL_NAMES.iter().any(|s| lower.contains(s)) {
        return None;
    }
    let value = assignment.child_by_field_name("right")?;
    if value.kind() != "string" || !is_literal(value) || literal_len(parsed, value) < MIN_CREDENTIAL_LEN {
        return None;
    }
    Some(format!("\"{}\" is assigned a string literal credential", name))
}

fn check_missing_validation(parsed: &ParsedFile, def: Node) -> Option<String> {
    let name = parsed.node_text(def.child_by_field_name("name")?);
    let lower = name.to_lowercase();
    if !SENSITIVE_NAMES.iter().any(|s| lower.contains(s)) {
        return None;
    }

    let mut validated = false;
    visit_preorder(def, |node, _| {
        if validated {
            return false;
        }
        match node.kind() {
            "comparison_operator" => validated = true,
            "call" => {
                if callee(parsed, node).is_some_and(|c| c.to_lowercase().contains("validate")) {
                    validated = true;
                }
            }
            _ => {}
        }
        !validated
    });

    (!validated).then(|| format!("Security-sensitive function \"{}\" may lack input validation", name))
}

/// Run every rule over the tree. Yields (rule, line, message).
pub fn run_tree_rules<'r>(
    parsed: &ParsedFile,
    rules: &[&'r TreeRule],
) -> Vec<(&'r TreeRule, usize, String)> {
    let mut hits = Vec::new();
    if rules.is_empty() {
        return hits;
    }
    visit_preorder(parsed.tree.root_node(), |node, _| {
        for rule in rules.iter().filter(|r| r.node_kind == node.kind()) {
            if let Some(message) = (rule.check)(parsed, node) {
                hits.push((*rule, node.start_position().row + 1, message));
            }
        }
        true
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{LanguageAnalyzer, ParseOptions, PythonAnalyzer};

    fn hits(source: &str) -> Vec<(&'static str, usize)> {
        let analyzer = PythonAnalyzer::new();
        let parsed = analyzer
            .parse("app.py", source.as_bytes(), &ParseOptions::default())
            .unwrap();
        let rules: Vec<&TreeRule> = TREE_RULES.iter().collect();
        run_tree_rules(&parsed, &rules)
            .into_iter()
            .map(|(rule, line, _)| (rule.id, line))
            .collect()
    }

    #[test]
    fn test_dynamic_eval() {
        assert_eq!(hits("eval(user_code)\n"), vec![("dynamic_eval", 1)]);
        assert_eq!(hits("x = 1\nexec(f\"print({x})\")\n"), vec![("dynamic_eval", 2)]);
        assert!(hits("eval('1 + 1')\n").is_empty());
        assert!(hits("eval()\n").is_empty());
    }

    #[test]
    fn test_shell_and_os_system() {
        let source = "import subprocess, os\nsubprocess.run(cmd, shell=True)\nsubprocess.run(cmd, shell=False)\nos.system(cmd)\n";
        assert_eq!(hits(source), vec![("shell_true", 2), ("os_system", 4)]);
    }

    #[test]
    fn test_missing_validation() {
        let source = "def login(user, pw):\n    return make_session(user)\n\ndef check_token(t):\n    return len(t) == 32\n\ndef auth_user(data):\n    validate_payload(data)\n    return data\n";
        assert_eq!(hits(source), vec![("missing_validation", 1)]);
    }

    #[test]
    fn test_hardcoded_credential() {
        assert_eq!(hits("private_key = \"abcd1234\"\n"), vec![("hardcoded_credential", 1)]);
        assert_eq!(
            hits("class C:\n    def __init__(self):\n        self.auth_token = 'xyz-987'\n"),
            vec![("hardcoded_credential", 3)]
        );
        assert_eq!(hits("DB_PASSWORD: str = \"hunter22\"\n"), vec![("hardcoded_credential", 1)]);
    }

    #[test]
    fn test_hardcoded_credential_ignores_non_literals() {
        assert!(hits("api_key = \"abc\"\n").is_empty());
        assert!(hits("api_key = os.environ[\"API_KEY\"]\n").is_empty());
        assert!(hits("token = f\"{prefix}-1234\"\n").is_empty());
        assert!(hits("username = \"administrator\"\n").is_empty());
        assert!(hits("password = None\n").is_empty());
    }
}
