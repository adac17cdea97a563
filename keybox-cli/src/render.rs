//! Text rendering of the namespace tree

use keybox_core::{NamespaceTree, NodeId, NodeKind, RootStatus};

/// Render the subtree at `node` as an indented listing
pub fn render_tree(tree: &NamespaceTree, node: NodeId) -> String {
    let mut out = String::new();
    out.push_str(&describe(tree, node));
    out.push('\n');
    render_children(tree, node, "", &mut out);
    out
}

fn render_children(tree: &NamespaceTree, node: NodeId, indent: &str, out: &mut String) {
    let count = tree.child_count(node);
    for index in 0..count {
        let Some(child) = tree.child_at(node, index) else {
            continue;
        };
        let last = index + 1 == count;
        let (branch, next) = if last {
            ("└── ", "    ")
        } else {
            ("├── ", "│   ")
        };
        out.push_str(indent);
        out.push_str(branch);
        out.push_str(&describe(tree, child));
        out.push('\n');
        render_children(tree, child, &format!("{}{}", indent, next), out);
    }
}

fn describe(tree: &NamespaceTree, node: NodeId) -> String {
    let label = tree.label(node).unwrap_or("?");
    match tree.kind(node) {
        Some(NodeKind::ConnectionRoot(status)) => format!("{} [{}]", label, status_tag(status)),
        Some(NodeKind::Directory) => format!("{}/", label),
        _ => label.to_string(),
    }
}

fn status_tag(status: RootStatus) -> &'static str {
    match status {
        RootStatus::Unconnected => "unconnected",
        RootStatus::Connected => "connected",
        RootStatus::Searching => "filtered",
    }
}
