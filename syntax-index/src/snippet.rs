//! Parsing of replacement snippets returned by the fixer.

use crate::errors::{Result, SyntaxError};
use crate::language::LanguageKind;
use crate::node::SyntaxNode;
use crate::tree::parse;

const WRAPPER_OPEN: &str = "class __Snippet {\n";
const WRAPPER_CLOSE: &str = "\n}\n";

/// A snippet that parsed cleanly into one or more top-level nodes.
#[derive(Debug, Clone)]
pub struct ParsedSnippet {
    text: String,
    kinds: Vec<String>,
    base_indent: usize,
}

impl ParsedSnippet {
    /// Text to splice in: from the first node to the end of the last one.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn node_count(&self) -> usize {
        self.kinds.len()
    }

    pub fn kinds(&self) -> &[String] {
        &self.kinds
    }

    /// Indentation width the first line had in the reply. Continuation lines
    /// are indented relative to it.
    pub fn base_indent(&self) -> usize {
        self.base_indent
    }
}

/// Width of the leading spaces and tabs of `line`.
pub(crate) fn indent_len(line: &str) -> usize {
    line.len() - line.trim_start_matches([' ', '\t']).len()
}

/// Parses `text` standalone. Fails on syntax errors or an empty snippet.
pub fn parse_snippet(language: LanguageKind, text: &str) -> Result<ParsedSnippet> {
    let tree = parse(language, text.to_string())?;
    tree.ensure_clean()?;
    let nodes = tree.top_level_statements();
    if nodes.is_empty() {
        return Err(SyntaxError::EmptySnippet);
    }
    let (start, end) = tree.top_level_extent().ok_or(SyntaxError::EmptySnippet)?;
    let line_start = text[..start].rfind('\n').map_or(0, |i| i + 1);
    Ok(ParsedSnippet {
        text: text[start..end].to_string(),
        kinds: nodes.into_iter().map(|n| n.kind).collect(),
        base_indent: indent_len(&text[line_start..start]),
    })
}

/// Parses `text` as a replacement for `target`.
///
/// Class members in JS/TS do not parse at the top level, so they are checked
/// inside a throwaway class body instead.
pub fn parse_snippet_for(
    language: LanguageKind,
    text: &str,
    target: &SyntaxNode,
) -> Result<ParsedSnippet> {
    if !(target.is_class_member() && language.members_need_class_wrapper()) {
        return parse_snippet(language, text);
    }

    let body = text.trim();
    if body.is_empty() {
        return Err(SyntaxError::EmptySnippet);
    }
    let wrapped = format!("{WRAPPER_OPEN}{body}{WRAPPER_CLOSE}");
    let tree = parse(language, wrapped)?;
    tree.ensure_clean()?;

    let kinds = tree.class_member_kinds();
    if kinds.is_empty() {
        return Err(SyntaxError::EmptySnippet);
    }
    let base_indent = text
        .lines()
        .find(|l| !l.trim().is_empty())
        .map_or(0, indent_len);
    Ok(ParsedSnippet {
        text: body.to_string(),
        kinds,
        base_indent,
    })
}
