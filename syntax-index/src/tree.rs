//! Parsed syntax trees: lookup, statement listing and deferred replacement.
//!
//! Flow for node-scoped patching:
//! 1) `parse` the file once;
//! 2) resolve findings to nodes with `find_enclosing_*`;
//! 3) record `replace` calls against the original byte positions;
//! 4) `render` the file once, applying every replacement back-to-front.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::debug;
use tree_sitter::{Node, Parser, Tree};

use crate::errors::{Result, SyntaxError};
use crate::language::LanguageKind;
use crate::node::SyntaxNode;
use crate::snippet::{ParsedSnippet, indent_len};
use crate::span::{NodeSpan, Probe};

static NEXT_TREE_ID: AtomicU64 = AtomicU64::new(1);

/// Raw tree-sitter parse of `source`.
pub(crate) fn parse_raw(language: LanguageKind, source: &str) -> Result<Tree> {
    let mut parser = Parser::new();
    let lang = language.grammar();
    parser
        .set_language(&lang)
        .map_err(|_| SyntaxError::TreeSitterLanguage)?;
    parser.parse(source, None).ok_or(SyntaxError::TreeSitterParse)
}

/// Parses `source` into a [`SyntaxTree`].
///
/// A tree with syntax errors is still returned; callers that need a clean
/// parse check [`SyntaxTree::ensure_clean`].
pub fn parse(language: LanguageKind, source: impl Into<String>) -> Result<SyntaxTree> {
    let source = source.into();
    let tree = parse_raw(language, &source)?;
    let id = NEXT_TREE_ID.fetch_add(1, Ordering::Relaxed);
    debug!(
        tree_id = id,
        %language,
        bytes = source.len(),
        has_error = tree.root_node().has_error(),
        "syntax.parse"
    );
    Ok(SyntaxTree {
        id,
        language,
        source,
        tree,
        edits: Vec::new(),
    })
}

#[derive(Debug, Clone)]
struct PendingEdit {
    start_byte: usize,
    end_byte: usize,
    text: String,
}

pub struct SyntaxTree {
    id: u64,
    language: LanguageKind,
    source: String,
    tree: Tree,
    edits: Vec<PendingEdit>,
}

impl fmt::Debug for SyntaxTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntaxTree")
            .field("id", &self.id)
            .field("language", &self.language)
            .field("bytes", &self.source.len())
            .field("pending_edits", &self.edits.len())
            .finish()
    }
}

impl SyntaxTree {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn language(&self) -> LanguageKind {
        self.language
    }

    /// Source text the tree was parsed from (edits are not applied here).
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn has_errors(&self) -> bool {
        self.tree.root_node().has_error()
    }

    /// Fails with [`SyntaxError::SyntaxErrors`] if the tree has ERROR/MISSING nodes.
    pub fn ensure_clean(&self) -> Result<()> {
        if !self.has_errors() {
            return Ok(());
        }
        let mut count = 0usize;
        let mut first_line = usize::MAX;
        self.walk(|node| {
            if node.is_error() || node.is_missing() {
                count += 1;
                first_line = first_line.min(node.start_position().row + 1);
            }
            node.has_error()
        });
        Err(SyntaxError::SyntaxErrors {
            count: count.max(1),
            first_line: if first_line == usize::MAX { 1 } else { first_line },
        })
    }

    /// Top-level statements in source order. Comments are skipped.
    pub fn top_level_statements(&self) -> Vec<SyntaxNode> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        root.named_children(&mut cursor)
            .filter(|n| !n.is_extra())
            .map(|n| self.snapshot(n))
            .collect()
    }

    /// Byte range covering every named child of the root, comments included.
    pub(crate) fn top_level_extent(&self) -> Option<(usize, usize)> {
        let root = self.tree.root_node();
        let mut cursor = root.walk();
        let spans: Vec<NodeSpan> = root
            .named_children(&mut cursor)
            .map(|n| NodeSpan::of(&n, &self.source))
            .collect();
        let start = spans.iter().map(|s| s.start_byte).min()?;
        let end = spans.iter().map(|s| s.end_byte).max()?;
        Some((start, end))
    }

    /// Kinds of the named members found directly inside class bodies.
    pub(crate) fn class_member_kinds(&self) -> Vec<String> {
        let mut kinds = Vec::new();
        self.walk(|node| {
            let in_body = node.parent().is_some_and(|p| p.kind() == "class_body");
            if in_body && node.is_named() && !node.is_extra() {
                kinds.push(node.kind().to_string());
                return false;
            }
            true
        });
        kinds
    }

    /// Smallest named node containing `probe` that spans at least
    /// `min_span_lines` lines. The root node is never returned.
    pub fn find_enclosing_node(&self, probe: Probe, min_span_lines: usize) -> Option<SyntaxNode> {
        self.find_enclosing_range(probe, probe, min_span_lines, |_| true)
    }

    /// Like [`Self::find_enclosing_node`], restricted to kinds accepted by `accept`.
    pub fn find_enclosing_node_where(
        &self,
        probe: Probe,
        min_span_lines: usize,
        accept: impl Fn(&str) -> bool,
    ) -> Option<SyntaxNode> {
        self.find_enclosing_range(probe, probe, min_span_lines, accept)
    }

    /// Smallest accepted node containing both `start` and `end`.
    pub fn find_enclosing_range(
        &self,
        start: Probe,
        end: Probe,
        min_span_lines: usize,
        accept: impl Fn(&str) -> bool,
    ) -> Option<SyntaxNode> {
        let root_id = self.tree.root_node().id();
        let mut best: Option<(i64, Node<'_>)> = None;

        self.walk(|node| {
            let row_start = node.start_position().row + 1;
            let row_end = node.end_position().row + 1;
            let may_contain = row_start <= start.line && end.line <= row_end;
            if !may_contain {
                return false;
            }
            if node.id() != root_id && node.is_named() && !node.is_extra() {
                let span = NodeSpan::of(&node, &self.source);
                if span.contains(start)
                    && span.contains(end)
                    && span.line_count() >= min_span_lines
                    && accept(node.kind())
                {
                    let size = span.size();
                    // Ties go to the deeper node.
                    if best.is_none_or(|(s, _)| size <= s) {
                        best = Some((size, node));
                    }
                }
            }
            true
        });

        best.map(|(_, n)| self.snapshot(n))
    }

    /// Indentation of the line `node` starts on.
    pub fn indent_of(&self, node: &SyntaxNode) -> &str {
        let start = node.handle.start_byte.min(self.source.len());
        let line_start = self.source[..start].rfind('\n').map_or(0, |i| i + 1);
        let line = &self.source[line_start..];
        &line[..indent_len(line).min(start - line_start)]
    }

    /// Checks that `snippet` can replace `node`: the edit must not overlap a
    /// pending one, and the file with every pending edit plus this one must
    /// re-parse cleanly with the snippet's nodes at the replaced position.
    pub fn check_replacement(&self, node: &SyntaxNode, snippet: &ParsedSnippet) -> Result<()> {
        self.prepare(node, snippet).map(|_| ())
    }

    /// Records a replacement of `node` by the snippet's nodes.
    ///
    /// The snippet's first line lands at the node's start column. Its other
    /// lines are re-based from the snippet's own indentation to the
    /// indentation of the node's line.
    pub fn replace(&mut self, node: &SyntaxNode, snippet: &ParsedSnippet) -> Result<()> {
        let edit = self.prepare(node, snippet)?;
        debug!(
            tree_id = self.id,
            kind = %node.kind,
            start_line = node.start_line(),
            end_line = node.end_line(),
            new_nodes = snippet.node_count(),
            "syntax.replace"
        );
        self.edits.push(edit);
        Ok(())
    }

    fn prepare(&self, node: &SyntaxNode, snippet: &ParsedSnippet) -> Result<PendingEdit> {
        let h = node.handle;
        if h.tree_id != self.id {
            return Err(SyntaxError::ForeignNode {
                tree: self.id,
                node_tree: h.tree_id,
            });
        }
        let overlaps = self
            .edits
            .iter()
            .any(|e| h.start_byte < e.end_byte && e.start_byte < h.end_byte);
        if overlaps || h.end_byte > self.source.len() {
            return Err(SyntaxError::OverlappingEdit {
                start: h.start_byte,
                end: h.end_byte,
            });
        }
        let edit = PendingEdit {
            start_byte: h.start_byte,
            end_byte: h.end_byte,
            text: reindent(snippet.text(), snippet.base_indent(), self.indent_of(node)),
        };
        self.verify_render(&edit, snippet.kinds())?;
        Ok(edit)
    }

    /// Renders the pending edits plus `edit`, re-parses the result and looks
    /// for a run of sibling nodes that covers exactly the inserted text and
    /// has the snippet's kinds.
    fn verify_render(&self, edit: &PendingEdit, kinds: &[String]) -> Result<()> {
        let mut edits = self.edits.clone();
        edits.push(edit.clone());
        let rendered = apply(&self.source, edits);

        let shift: isize = self
            .edits
            .iter()
            .filter(|e| e.end_byte <= edit.start_byte)
            .map(|e| e.text.len() as isize - (e.end_byte - e.start_byte) as isize)
            .sum();
        let start = edit.start_byte.saturating_add_signed(shift);
        let end = start + edit.text.trim_end().len();
        let line = rendered[..start].matches('\n').count() + 1;
        let mismatch = |reason: &str| SyntaxError::RenderMismatch {
            line,
            reason: reason.to_string(),
        };

        let tree = parse_raw(self.language, &rendered)?;
        let root = tree.root_node();
        if root.has_error() {
            return Err(mismatch("the patched file has syntax errors"));
        }

        let mut candidate = root.descendant_for_byte_range(start, (start + 1).min(end));
        while let Some(node) = candidate {
            // Never the root; climb only through nodes that start at the insertion.
            if node.parent().is_none() || node.start_byte() != start {
                break;
            }
            if content_end(node, &rendered) > end {
                break;
            }
            if node.is_named() && sibling_run_matches(node, end, kinds, &rendered) {
                return Ok(());
            }
            candidate = node.parent();
        }
        Err(mismatch("the replaced nodes re-parse differently in place"))
    }

    pub fn pending_edits(&self) -> usize {
        self.edits.len()
    }

    /// Regenerates the source with every recorded replacement applied.
    pub fn render(&self) -> String {
        apply(&self.source, self.edits.clone())
    }

    /// Pre-order walk; `visit` returns whether to descend into the node.
    fn walk<'t>(&'t self, mut visit: impl FnMut(Node<'t>) -> bool) {
        let mut cursor = self.tree.walk();
        'walk: loop {
            let descend = visit(cursor.node());
            if descend && cursor.goto_first_child() {
                continue;
            }
            loop {
                if cursor.goto_next_sibling() {
                    continue 'walk;
                }
                if !cursor.goto_parent() {
                    break 'walk;
                }
            }
        }
    }

    fn snapshot(&self, node: Node<'_>) -> SyntaxNode {
        let span = NodeSpan::of(&node, &self.source);
        let root_id = self.tree.root_node().id();
        let parent_kind = node
            .parent()
            .filter(|p| p.id() != root_id)
            .map(|p| p.kind().to_string());
        SyntaxNode {
            kind: node.kind().to_string(),
            text: self.source[span.start_byte..span.end_byte].to_string(),
            parent_kind,
            handle: crate::node::NodeHandle {
                tree_id: self.id,
                start_byte: span.start_byte,
                end_byte: span.end_byte,
            },
            span,
        }
    }
}

fn apply(source: &str, mut edits: Vec<PendingEdit>) -> String {
    edits.sort_by(|a, b| b.start_byte.cmp(&a.start_byte));
    let mut out = source.to_string();
    for e in edits {
        out.replace_range(e.start_byte..e.end_byte, &e.text);
    }
    out
}

/// Moves lines 2..n of `text` from indentation `base` to `target`, keeping
/// whatever they were indented by beyond `base`.
fn reindent(text: &str, base: usize, target: &str) -> String {
    if base == target.len() {
        return text.to_string();
    }
    let mut lines = text.split('\n');
    let mut out = String::with_capacity(text.len() + target.len());
    out.push_str(lines.next().unwrap_or_default());
    for line in lines {
        out.push('\n');
        let ws = indent_len(line);
        if line[ws..].trim().is_empty() {
            out.push_str(&line[ws..]);
            continue;
        }
        out.push_str(target);
        out.push_str(&line[base.min(ws)..]);
    }
    out
}

/// End byte of `node` with trailing whitespace left out.
fn content_end(node: Node<'_>, source: &str) -> usize {
    let start = node.start_byte().min(source.len());
    let end = node.end_byte().clamp(start, source.len());
    start + source[start..end].trim_end().len()
}

/// `true` when `first` and its following named siblings end exactly at `end`
/// and, comments aside, have the given kinds.
fn sibling_run_matches(first: Node<'_>, end: usize, kinds: &[String], source: &str) -> bool {
    let mut seen: Vec<&str> = Vec::new();
    let mut current = Some(first);
    while let Some(node) = current {
        if node.start_byte() >= end {
            return false;
        }
        if !node.is_extra() {
            seen.push(node.kind());
        }
        let node_end = content_end(node, source);
        if node_end == end {
            return seen.len() == kinds.len()
                && seen.iter().zip(kinds).all(|(a, b)| *a == b.as_str());
        }
        if node_end > end {
            return false;
        }
        current = node.next_named_sibling();
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    const JS: &str = "const a = 1;\nclass Greeter {\n  greet(name) {\n    const msg = \"hi \" + name;\n    return msg;\n  }\n}\n";

    #[test]
    fn clean_and_broken_sources() {
        let ok = parse(LanguageKind::JavaScript, JS).unwrap();
        assert!(!ok.has_errors());
        assert!(ok.ensure_clean().is_ok());

        let broken = parse(LanguageKind::JavaScript, "function f( {\n  return 1;\n").unwrap();
        assert!(broken.has_errors());
        match broken.ensure_clean() {
            Err(SyntaxError::SyntaxErrors { count, .. }) => assert!(count >= 1),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn smallest_node_at_point() {
        let tree = parse(LanguageKind::JavaScript, JS).unwrap();
        let node = tree.find_enclosing_node(Probe::at(4, 24), 1).unwrap();
        assert_eq!(node.kind, "identifier");
        assert_eq!(node.text, "name");
        assert_eq!(node.start_line(), 4);
    }

    #[test]
    fn min_span_filters_short_nodes() {
        let tree = parse(LanguageKind::JavaScript, JS).unwrap();
        let node = tree.find_enclosing_node(Probe::at(4, 24), 2).unwrap();
        assert!(node.line_count() >= 2);
        assert_eq!(node.kind, "statement_block");
    }

    #[test]
    fn column_before_node_start_falls_to_parent() {
        let tree = parse(LanguageKind::JavaScript, JS).unwrap();
        // Line 3 column 0 is indentation before `greet`.
        let node = tree.find_enclosing_node(Probe::at(3, 0), 1).unwrap();
        assert_eq!(node.kind, "class_body");
    }

    #[test]
    fn no_node_outside_source() {
        let tree = parse(LanguageKind::JavaScript, JS).unwrap();
        assert!(tree.find_enclosing_node(Probe::line(40), 1).is_none());
    }

    #[test]
    fn render_without_edits_is_identity() {
        let tree = parse(LanguageKind::JavaScript, JS).unwrap();
        assert_eq!(tree.render(), JS);
        assert_eq!(tree.pending_edits(), 0);
    }
}
