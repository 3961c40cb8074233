//! Source positions and node spans.
//!
//! Lines are 1-based (as reported by scanners), columns are 0-based byte
//! offsets within the line (as reported by tree-sitter). Byte offsets are
//! 0-based into the parsed source.

use serde::{Deserialize, Serialize};

/// Weight of one line when comparing span sizes. Any column delta is smaller.
pub const LINE_WEIGHT: i64 = 1_000_000;

/// A concrete position inside a source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Point {
    /// 1-based line.
    pub line: usize,
    /// 0-based byte column.
    pub column: usize,
}

/// A lookup position. Without a column the probe matches by line only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    pub line: usize,
    pub column: Option<usize>,
}

impl Probe {
    pub fn at(line: usize, column: usize) -> Self {
        Self {
            line,
            column: Some(column),
        }
    }

    pub fn line(line: usize) -> Self {
        Self { line, column: None }
    }
}

/// Absolute location of a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeSpan {
    pub start: Point,
    /// Inclusive end position (the column is exclusive like tree-sitter's).
    pub end: Point,
    pub start_byte: usize,
    /// Exclusive end byte; never includes a trailing line terminator.
    pub end_byte: usize,
}

impl NodeSpan {
    /// Builds the span of `node`, pulling an end that sits at column 0 of the
    /// following row back onto the last line the node actually occupies.
    pub(crate) fn of(node: &tree_sitter::Node<'_>, source: &str) -> Self {
        let sp = node.start_position();
        let ep = node.end_position();
        let start = Point {
            line: sp.row + 1,
            column: sp.column,
        };
        let start_byte = node.start_byte();
        let mut end_byte = node.end_byte().min(source.len());
        let mut end = Point {
            line: ep.row + 1,
            column: ep.column,
        };

        if ep.column == 0 && ep.row > sp.row && start_byte <= end_byte {
            let body = source[start_byte..end_byte].trim_end();
            end_byte = start_byte + body.len();
            let newlines = body.matches('\n').count();
            let column = match body.rfind('\n') {
                Some(i) => body.len() - (i + 1),
                None => sp.column + body.len(),
            };
            end = Point {
                line: start.line + newlines,
                column,
            };
        }

        Self {
            start,
            end,
            start_byte,
            end_byte,
        }
    }

    pub fn start_line(&self) -> usize {
        self.start.line
    }

    pub fn end_line(&self) -> usize {
        self.end.line
    }

    /// Lines spanned (1-based inclusive).
    pub fn line_count(&self) -> usize {
        if self.end.line >= self.start.line {
            self.end.line - self.start.line + 1
        } else {
            0
        }
    }

    /// Ordering key: fewer lines always wins, columns break ties.
    pub fn size(&self) -> i64 {
        let lines = self.end.line as i64 - self.start.line as i64;
        let cols = self.end.column as i64 - self.start.column as i64;
        lines * LINE_WEIGHT + cols
    }

    /// Lexicographic containment at boundary lines, line containment inside.
    pub fn contains(&self, probe: Probe) -> bool {
        if probe.line < self.start.line || probe.line > self.end.line {
            return false;
        }
        match probe.column {
            None => true,
            Some(col) => {
                if probe.line == self.start.line && col < self.start.column {
                    return false;
                }
                if probe.line == self.end.line && col > self.end.column {
                    return false;
                }
                true
            }
        }
    }

    /// `true` when `other` lies entirely within this span's bytes.
    pub fn encloses(&self, other: &NodeSpan) -> bool {
        self.start_byte <= other.start_byte && other.end_byte <= self.end_byte
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(sl: usize, sc: usize, el: usize, ec: usize) -> NodeSpan {
        NodeSpan {
            start: Point {
                line: sl,
                column: sc,
            },
            end: Point {
                line: el,
                column: ec,
            },
            start_byte: 0,
            end_byte: 0,
        }
    }

    #[test]
    fn boundary_lines_compare_columns() {
        let s = span(3, 4, 6, 1);
        assert!(!s.contains(Probe::at(3, 2)));
        assert!(s.contains(Probe::at(3, 4)));
        assert!(s.contains(Probe::at(4, 0)));
        assert!(s.contains(Probe::at(6, 1)));
        assert!(!s.contains(Probe::at(6, 2)));
        assert!(!s.contains(Probe::at(7, 0)));
    }

    #[test]
    fn probe_without_column_matches_lines() {
        let s = span(3, 4, 6, 1);
        assert!(s.contains(Probe::line(3)));
        assert!(s.contains(Probe::line(6)));
        assert!(!s.contains(Probe::line(2)));
    }

    #[test]
    fn size_prefers_fewer_lines() {
        let wide = span(1, 0, 1, 900);
        let tall = span(1, 10, 2, 0);
        assert!(wide.size() < tall.size());
        assert_eq!(span(2, 0, 5, 3).line_count(), 4);
    }
}
