//! Context-padded windows around a line range.
//!
//! Lines are 1-based and inclusive. The margin is applied once on each side:
//! the window is `[max(1, start - margin), min(total, end + margin)]`.
//! `absolute_offset` is the 0-based index of the window's first line, so a
//! file line `L` is window line `L - absolute_offset` and back.

use std::path::Path;

use serde::Serialize;

use crate::errors::{EngineResult, Error, FileError};
use crate::lines::LineBuffer;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub text: String,
    pub absolute_offset: usize,
    /// Requested start, in window coordinates (1-based).
    pub requested_start: usize,
    /// Requested end, in window coordinates (1-based).
    pub requested_end: usize,
    pub line_count: usize,
}

impl Section {
    /// Cuts the window out of an in-memory buffer.
    pub fn from_buffer(
        buffer: &LineBuffer,
        start_line: usize,
        end_line: usize,
        margin: usize,
    ) -> EngineResult<Self> {
        let total = buffer.len();
        let start = start_line.max(1);
        if total == 0 || start > total {
            return Err(Error::EmptyRange {
                start: start_line,
                end: end_line,
                total,
            });
        }
        let end = end_line.clamp(start, total);

        let window_start = start.saturating_sub(margin).max(1);
        let window_end = (end + margin).min(total);
        let offset = window_start - 1;

        Ok(Self {
            text: buffer.text_range(window_start, window_end),
            absolute_offset: offset,
            requested_start: start - offset,
            requested_end: end - offset,
            line_count: window_end - window_start + 1,
        })
    }

    /// First window line, as an absolute file line.
    pub fn window_start(&self) -> usize {
        self.absolute_offset + 1
    }

    pub fn window_end(&self) -> usize {
        self.absolute_offset + self.line_count
    }

    pub fn to_relative(&self, absolute_line: usize) -> usize {
        absolute_line - self.absolute_offset
    }

    pub fn to_absolute(&self, relative_line: usize) -> usize {
        relative_line + self.absolute_offset
    }

    /// Requested range in absolute file lines.
    pub fn requested_absolute(&self) -> (usize, usize) {
        (
            self.to_absolute(self.requested_start),
            self.to_absolute(self.requested_end),
        )
    }
}

/// Reads `path` and extracts the window around `start_line..=end_line`.
pub async fn extract(
    path: &Path,
    start_line: usize,
    end_line: usize,
    margin: usize,
) -> EngineResult<Section> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| FileError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
    Section::from_buffer(&LineBuffer::from_text(&text), start_line, end_line, margin)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(n: usize) -> LineBuffer {
        let text: String = (1..=n).map(|i| format!("line {i}\n")).collect();
        LineBuffer::from_text(&text)
    }

    #[test]
    fn margin_applied_once_each_side() {
        let s = Section::from_buffer(&numbered(50), 20, 22, 5).unwrap();
        assert_eq!(s.absolute_offset, 14);
        assert_eq!((s.window_start(), s.window_end()), (15, 27));
        assert_eq!((s.requested_start, s.requested_end), (6, 8));
        assert_eq!(s.line_count, 13);
        assert!(s.text.starts_with("line 15\n"));
        assert!(s.text.ends_with("line 27\n"));
        assert_eq!(s.requested_absolute(), (20, 22));
    }

    #[test]
    fn clamps_at_file_edges() {
        let s = Section::from_buffer(&numbered(10), 2, 40, 5).unwrap();
        assert_eq!(s.absolute_offset, 0);
        assert_eq!((s.requested_start, s.requested_end), (2, 10));
        assert_eq!(s.line_count, 10);
    }

    #[test]
    fn relative_and_absolute_are_inverse() {
        let s = Section::from_buffer(&numbered(100), 60, 61, 3).unwrap();
        for line in s.window_start()..=s.window_end() {
            assert_eq!(s.to_absolute(s.to_relative(line)), line);
        }
    }

    #[test]
    fn out_of_range_is_an_error() {
        assert!(matches!(
            Section::from_buffer(&numbered(3), 9, 9, 5),
            Err(Error::EmptyRange { total: 3, .. })
        ));
        assert!(Section::from_buffer(&LineBuffer::default(), 1, 1, 5).is_err());
    }

    #[tokio::test]
    async fn extract_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, "a\nb\nc\nd\n").unwrap();
        let s = extract(&path, 2, 2, 1).await.unwrap();
        assert_eq!(s.text, "a\nb\nc\n");

        let missing = extract(&dir.path().join("nope.js"), 1, 1, 1).await;
        assert!(matches!(
            missing,
            Err(Error::File(FileError::Unreadable { .. }))
        ));
    }
}
