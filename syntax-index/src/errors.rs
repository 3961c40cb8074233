//! Error types for the syntax index.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SyntaxError>;

#[derive(Debug, Error)]
pub enum SyntaxError {
    /// No grammar is registered for the file.
    #[error("unsupported language: {0}")]
    UnsupportedLanguage(String),

    #[error("tree-sitter language init failed")]
    TreeSitterLanguage,

    /// Parser returned no tree (cancelled or internal failure).
    #[error("tree-sitter parse failed")]
    TreeSitterParse,

    /// Tree was produced but contains ERROR/MISSING nodes.
    #[error("source has {count} syntax error(s), first at line {first_line}")]
    SyntaxErrors { count: usize, first_line: usize },

    #[error("snippet contains no top-level nodes")]
    EmptySnippet,

    #[error("node belongs to tree {node_tree}, not to tree {tree}")]
    ForeignNode { tree: u64, node_tree: u64 },

    #[error("replacement for bytes {start}..{end} overlaps a pending replacement")]
    OverlappingEdit { start: usize, end: usize },

    /// The file with the replacement applied no longer parses into the
    /// snippet's nodes at the replaced position.
    #[error("replacement does not fit the file at line {line}: {reason}")]
    RenderMismatch { line: usize, reason: String },
}

impl SyntaxError {
    /// `true` for every failure that means "this text does not parse".
    pub fn is_parse_failure(&self) -> bool {
        matches!(
            self,
            SyntaxError::TreeSitterParse
                | SyntaxError::SyntaxErrors { .. }
                | SyntaxError::EmptySnippet
                | SyntaxError::RenderMismatch { .. }
        )
    }
}
