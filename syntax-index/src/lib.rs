//! Syntax index over tree-sitter grammars.
//!
//! - [`parse`] a file into a [`SyntaxTree`];
//! - map a line/column [`Probe`] to the smallest enclosing [`SyntaxNode`];
//! - list top-level statements for structural chunking;
//! - parse replacement snippets and splice them in with a single render.

pub mod errors;
pub mod language;
pub mod node;
pub mod snippet;
pub mod span;
pub mod tree;

pub use errors::{Result, SyntaxError};
pub use language::LanguageKind;
pub use node::{NodeHandle, SyntaxNode, is_declaration_kind, is_statement_kind};
pub use snippet::{ParsedSnippet, parse_snippet, parse_snippet_for};
pub use span::{LINE_WEIGHT, NodeSpan, Point, Probe};
pub use tree::{SyntaxTree, parse};
