//! Iterative syntax-tree traversal helpers.
//!
//! Nothing here recurses on the Rust stack, so arbitrarily deep input
//! (generated code, pathological nesting) cannot overflow it.

use tree_sitter::Node;

/// Visit `root` and every descendant in pre-order.
///
/// `visit` receives the node and its depth below `root` (root is 0) and
/// returns whether to descend into that node's children.
pub fn visit_preorder<'t>(root: Node<'t>, mut visit: impl FnMut(Node<'t>, usize) -> bool) {
    let mut cursor = root.walk();
    let mut depth = 0usize;
    let mut descend = visit(cursor.node(), depth);

    loop {
        if descend && cursor.goto_first_child() {
            depth += 1;
            descend = visit(cursor.node(), depth);
            continue;
        }

        loop {
            if cursor.goto_next_sibling() {
                descend = visit(cursor.node(), depth);
                break;
            }
            if !cursor.goto_parent() {
                return;
            }
            depth -= 1;
        }
    }
}

/// Line (1-indexed) of the first ERROR or MISSING node, if any.
pub fn first_error_line(root: Node) -> Option<usize> {
    let mut line = None;
    visit_preorder(root, |node, _| {
        if line.is_some() {
            return false;
        }
        if node.is_error() || node.is_missing() {
            line = Some(node.start_position().row + 1);
            return false;
        }
        node.has_error()
    });
    line
}

/// Named, non-comment children of `node`.
pub fn statements(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|n| n.kind() != "comment")
        .collect()
}
