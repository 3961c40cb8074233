//! Structural checks applied to every oracle reply before it is accepted.

use syntax_index::{LanguageKind, parse};

use crate::errors::UnitError;

/// Syntax check that only applies when the original unit parses cleanly.
///
/// A window cut out of the middle of a function rarely parses on its own;
/// holding its replacement to a clean parse would reject every answer.
#[derive(Debug, Clone, Copy)]
pub struct SyntaxGate {
    language: Option<LanguageKind>,
}

impl SyntaxGate {
    pub fn for_original(language: Option<LanguageKind>, original: &str) -> Self {
        let language = language.filter(|&lang| {
            parse(lang, original)
                .map(|t| !t.has_errors())
                .unwrap_or(false)
        });
        Self { language }
    }

    pub fn is_active(&self) -> bool {
        self.language.is_some()
    }

    pub fn check(&self, replacement: &str) -> Result<(), UnitError> {
        let Some(lang) = self.language else {
            return Ok(());
        };
        parse(lang, replacement)?.ensure_clean()?;
        Ok(())
    }
}

/// Fits a window reply to the window's exact line count.
///
/// Code-block extraction drops blank lines at both ends of the reply, so a
/// window that starts or ends with blank lines gets them restored here.
/// Anything else that changes the line count is a mismatch.
pub fn fit_window_reply(original: &str, reply: &str) -> Result<Vec<String>, UnitError> {
    let orig: Vec<&str> = original.lines().collect();
    let got: Vec<&str> = reply.lines().collect();
    let expected = orig.len();

    let blank = |l: &&&str| l.trim().is_empty();
    let lead = orig.iter().take_while(blank).count();
    let trail = orig.iter().rev().take_while(blank).count();

    for (pad_front, pad_back) in [(0, 0), (lead, trail), (lead, 0), (0, trail)] {
        if pad_front + pad_back < expected && got.len() + pad_front + pad_back == expected {
            let mut out = Vec::with_capacity(expected);
            out.extend(orig[..pad_front].iter().map(|s| s.to_string()));
            out.extend(got.iter().map(|s| s.to_string()));
            out.extend(orig[expected - pad_back..].iter().map(|s| s.to_string()));
            return Ok(out);
        }
    }
    Err(UnitError::StructuralMismatch(format!(
        "expected {expected} lines, got {}",
        got.len()
    )))
}

/// Re-attaches the blank lines that surround `original` to a chunk reply.
///
/// Chunks own the blank lines and comments in front of their first
/// statement, and extraction trims blank edges off every reply; without this
/// each accepted chunk would eat the spacing between statements.
pub fn restore_blank_edges(original: &str, reply: &str) -> String {
    let orig: Vec<&str> = original.lines().collect();
    let blank = |l: &&&str| l.trim().is_empty();
    let lead = orig.iter().take_while(blank).count();
    if lead == orig.len() {
        return reply.to_string();
    }
    let trail = orig.iter().rev().take_while(blank).count();

    let body = reply.trim_matches(['\n', '\r']);
    let mut parts: Vec<&str> = orig[..lead].to_vec();
    if !body.is_empty() {
        parts.push(body);
    }
    parts.extend_from_slice(&orig[orig.len() - trail..]);
    parts.join("\n")
}
