//! Line buffer that keeps every original line terminator.
//!
//! Splicing replaces whole lines and re-terminates the new lines with the
//! file's own line ending, so bytes outside the replaced range never change
//! (CRLF files stay CRLF, a missing final newline stays missing).

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
    /// Last line of a file without a trailing newline.
    None,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::CrLf => "\r\n",
            LineEnding::None => "",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Line {
    body: String,
    eol: LineEnding,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineBuffer {
    lines: Vec<Line>,
}

impl LineBuffer {
    pub fn from_text(text: &str) -> Self {
        let lines = text
            .split_inclusive('\n')
            .map(|piece| {
                if let Some(body) = piece.strip_suffix("\r\n") {
                    Line {
                        body: body.to_string(),
                        eol: LineEnding::CrLf,
                    }
                } else if let Some(body) = piece.strip_suffix('\n') {
                    Line {
                        body: body.to_string(),
                        eol: LineEnding::Lf,
                    }
                } else {
                    Line {
                        body: piece.to_string(),
                        eol: LineEnding::None,
                    }
                }
            })
            .collect();
        Self { lines }
    }

    /// Number of lines `text` would have in a buffer.
    pub fn count_lines(text: &str) -> usize {
        text.split_inclusive('\n').count()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Line body (1-based), without its terminator.
    pub fn line(&self, n: usize) -> Option<&str> {
        n.checked_sub(1)
            .and_then(|i| self.lines.get(i))
            .map(|l| l.body.as_str())
    }

    /// Lines `start..=end` (1-based, clamped) with their terminators.
    pub fn text_range(&self, start: usize, end: usize) -> String {
        let Some((from, to)) = self.clamp(start, end) else {
            return String::new();
        };
        let mut out = String::new();
        for l in &self.lines[from..to] {
            out.push_str(&l.body);
            out.push_str(l.eol.as_str());
        }
        out
    }

    /// Line ending used for freshly inserted lines.
    pub fn dominant_eol(&self) -> LineEnding {
        let crlf = self.lines.iter().filter(|l| l.eol == LineEnding::CrLf).count();
        let lf = self.lines.iter().filter(|l| l.eol == LineEnding::Lf).count();
        if crlf > lf {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    /// Replaces lines `start..=end` (1-based) with `replacement` and returns
    /// the change in line count.
    ///
    /// The last inserted line inherits the terminator of the last replaced
    /// line; the others get the file's dominant ending. An empty replacement
    /// deletes the range.
    pub fn splice(&mut self, start: usize, end: usize, replacement: &str) -> isize {
        let Some((from, to)) = self.clamp(start, end) else {
            return 0;
        };
        let eol = self.dominant_eol();
        let tail_eol = self.lines[to - 1].eol;

        let mut new_lines: Vec<Line> = if replacement.is_empty() {
            Vec::new()
        } else {
            replacement
                .split('\n')
                .map(|l| Line {
                    body: l.strip_suffix('\r').unwrap_or(l).to_string(),
                    eol,
                })
                .collect()
        };
        if let Some(last) = new_lines.last_mut() {
            last.eol = tail_eol;
        } else if tail_eol == LineEnding::None && to == self.lines.len() && from > 0 {
            // Deleting the unterminated last line: the new last line loses its newline.
            self.lines[from - 1].eol = LineEnding::None;
        }

        let old_len = to - from;
        let new_len = new_lines.len();
        self.lines.splice(from..to, new_lines);
        new_len as isize - old_len as isize
    }

    /// Overwrites the bodies of consecutive lines from `start` (1-based),
    /// keeping each line's own terminator. Returns how many lines changed;
    /// bodies past the end of the buffer are dropped.
    pub fn overwrite(&mut self, start: usize, bodies: &[String]) -> usize {
        let mut written = 0;
        for (line, body) in self
            .lines
            .iter_mut()
            .skip(start.saturating_sub(1))
            .zip(bodies)
        {
            line.body = body.strip_suffix('\r').unwrap_or(body).to_string();
            written += 1;
        }
        written
    }

    pub fn to_text(&self) -> String {
        let mut out = String::with_capacity(self.lines.iter().map(|l| l.body.len() + 2).sum());
        for l in &self.lines {
            out.push_str(&l.body);
            out.push_str(l.eol.as_str());
        }
        out
    }

    /// 0-based half-open index range for 1-based inclusive lines.
    fn clamp(&self, start: usize, end: usize) -> Option<(usize, usize)> {
        let total = self.lines.len();
        let start = start.max(1);
        if total == 0 || start > total {
            return None;
        }
        let end = end.clamp(start, total);
        Some((start - 1, end))
    }
}
