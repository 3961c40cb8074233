//! Owned views of syntax nodes.

use crate::span::NodeSpan;

/// Opaque reference to a node inside one [`crate::SyntaxTree`].
///
/// Only valid for replacement in the tree that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle {
    pub(crate) tree_id: u64,
    pub(crate) start_byte: usize,
    pub(crate) end_byte: usize,
}

impl NodeHandle {
    pub fn tree_id(&self) -> u64 {
        self.tree_id
    }
}

/// Snapshot of a node: kind, absolute location and source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxNode {
    pub kind: String,
    pub span: NodeSpan,
    pub text: String,
    /// Kind of the parent node, `None` for children of the root.
    pub parent_kind: Option<String>,
    pub(crate) handle: NodeHandle,
}

impl SyntaxNode {
    pub fn handle(&self) -> NodeHandle {
        self.handle
    }

    pub fn start_line(&self) -> usize {
        self.span.start.line
    }

    pub fn end_line(&self) -> usize {
        self.span.end.line
    }

    pub fn line_count(&self) -> usize {
        self.span.line_count()
    }

    /// `true` when `other` sits inside this node (or is the same node).
    pub fn encloses(&self, other: &SyntaxNode) -> bool {
        self.handle.tree_id == other.handle.tree_id && self.span.encloses(&other.span)
    }

    /// `true` when the node is a member of a class body.
    pub fn is_class_member(&self) -> bool {
        matches!(self.parent_kind.as_deref(), Some("class_body"))
    }
}

/// Node kinds that make a self-contained replacement unit: statements,
/// declarations and definitions across the bundled grammars.
pub fn is_statement_kind(kind: &str) -> bool {
    const SUFFIXES: [&str; 5] = [
        "_statement",
        "_declaration",
        "_definition",
        "_item",
        "_signature",
    ];
    SUFFIXES.iter().any(|s| kind.ends_with(s))
}

/// Declarations only (functions, methods, classes, impls and friends).
pub fn is_declaration_kind(kind: &str) -> bool {
    kind.ends_with("_declaration") || kind.ends_with("_definition") || kind.ends_with("_item")
}
