//! Structural chunking of large files.
//!
//! Chunks follow top-level statements: a statement is never split, and a
//! chunk is closed as soon as adding the next statement would push it past
//! the line target. Coverage is lossless: the first chunk starts at line 1,
//! each next chunk starts right after the previous one (so comments and
//! blank lines between statements travel with the following statement), and
//! the last chunk runs to the end of the file.

use serde::Serialize;
use syntax_index::{LanguageKind, SyntaxTree};

use crate::finding::{LineSpan, RuleSpan};
use crate::lines::LineBuffer;

/// A finding clipped to a chunk and re-based to chunk-relative lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkFinding {
    /// Index into the file's finding list.
    pub finding: usize,
    pub rule_id: String,
    /// Chunk-relative lines (1-based).
    pub span: LineSpan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub start_line: usize,
    pub end_line: usize,
    pub code_text: String,
    pub contained_findings: Vec<ChunkFinding>,
}

impl Chunk {
    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    pub fn span(&self) -> LineSpan {
        LineSpan::new(self.start_line, self.end_line)
    }

    pub fn has_findings(&self) -> bool {
        !self.contained_findings.is_empty()
    }

    fn shift(&mut self, delta: isize) {
        self.start_line = self.start_line.saturating_add_signed(delta).max(1);
        self.end_line = self.end_line.saturating_add_signed(delta).max(self.start_line);
    }
}

/// Chunk boundaries for statements given as `(start_line, end_line)` in
/// source order.
pub fn plan_boundaries(
    statements: &[(usize, usize)],
    total_lines: usize,
    target_lines: usize,
) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    let mut chunk_start = 1usize;
    let mut last_end: Option<usize> = None;

    for &(start, end) in statements {
        let node_lines = end.saturating_sub(start) + 1;
        if let Some(last) = last_end {
            let current_span = last + 1 - chunk_start;
            // Statements sharing a line with the previous one stay together.
            if current_span + node_lines > target_lines && start > last {
                out.push((chunk_start, last));
                chunk_start = last + 1;
            }
        }
        last_end = Some(last_end.map_or(end, |l| l.max(end)));
    }

    if last_end.is_some() {
        out.push((chunk_start, total_lines.max(chunk_start)));
    }
    out
}

/// Partitions a parsed file by its top-level statements.
pub fn partition(buffer: &LineBuffer, tree: &SyntaxTree, target_lines: usize) -> Vec<Chunk> {
    let statements: Vec<(usize, usize)> = tree
        .top_level_statements()
        .iter()
        .map(|n| (n.start_line(), n.end_line()))
        .collect();
    plan_boundaries(&statements, buffer.len(), target_lines)
        .into_iter()
        .map(|(s, e)| Chunk {
            start_line: s,
            end_line: e,
            code_text: buffer.text_range(s, e),
            contained_findings: Vec::new(),
        })
        .collect()
}

/// Parses `source` and partitions it.
pub fn partition_source(
    source: &str,
    language: LanguageKind,
    target_lines: usize,
) -> syntax_index::Result<Vec<Chunk>> {
    let tree = syntax_index::parse(language, source)?;
    Ok(partition(&LineBuffer::from_text(source), &tree, target_lines))
}

/// Fixed-size windows, used when no grammar applies.
pub fn partition_by_lines(buffer: &LineBuffer, target_lines: usize) -> Vec<Chunk> {
    let size = target_lines.max(1);
    (1..=buffer.len())
        .step_by(size)
        .map(|s| {
            let e = (s + size - 1).min(buffer.len());
            Chunk {
                start_line: s,
                end_line: e,
                code_text: buffer.text_range(s, e),
                contained_findings: Vec::new(),
            }
        })
        .collect()
}

/// Intersects every finding with every chunk, storing chunk-relative spans.
pub fn attach_findings(chunks: &mut [Chunk], findings: &[RuleSpan]) {
    for chunk in chunks.iter_mut() {
        let span = chunk.span();
        chunk.contained_findings = findings
            .iter()
            .enumerate()
            .filter_map(|(i, f)| {
                f.span.intersect(&span).map(|clip| ChunkFinding {
                    finding: i,
                    rule_id: f.rule_id.clone(),
                    span: clip.relative_to(span.start),
                })
            })
            .collect();
    }
}

/// After chunk `index` changed by `delta` lines, moves its end and every
/// later chunk.
pub fn shift_following(chunks: &mut [Chunk], index: usize, delta: isize) {
    if delta == 0 {
        return;
    }
    if let Some(c) = chunks.get_mut(index) {
        c.end_line = c.end_line.saturating_add_signed(delta).max(c.start_line);
    }
    for c in chunks.iter_mut().skip(index + 1) {
        c.shift(delta);
    }
}
