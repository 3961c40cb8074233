//! Prompt builders for the fix oracle.
//!
//! The rule context is sent once per file as a retained turn; each unit
//! prompt is ephemeral and carries only the code and its affected lines.

use std::fmt::Write as _;

use syntax_index::LanguageKind;

use crate::errors::UnitError;
use crate::finding::{FindingMetadata, LineSpan};

pub const SYSTEM_PROMPT: &str = "You are a precise code remediation assistant. \
You receive source code together with static-analysis findings and return the same \
code with the findings fixed. Answer with exactly one fenced code block and nothing else.";

const METADATA_KEYS: [(&str, &str); 9] = [
    ("title", "Title"),
    ("category", "Category"),
    ("description", "Description"),
    ("explanation", "Explanation"),
    ("cwe", "CWE"),
    ("vulnerability_class", "Vulnerability class"),
    ("references", "References"),
    ("badExample", "Bad example"),
    ("goodExample", "Good example"),
];

/// Retained context turn: every rule that fires in the file.
pub fn rule_context<'a>(
    rules: impl IntoIterator<Item = &'a FindingMetadata>,
    language: Option<LanguageKind>,
) -> String {
    let mut out = String::new();
    let lang = language.map(|l| l.fence_tag()).unwrap_or("plain text");
    let _ = writeln!(
        out,
        "The following rules were violated in a {lang} file. Keep them in mind for every snippet I send."
    );
    for meta in rules {
        let _ = writeln!(out);
        let _ = writeln!(out, "Rule `{}` (severity: {})", meta.rule_id, meta.severity);
        if !meta.message.trim().is_empty() {
            let _ = writeln!(out, "Message: {}", meta.message.trim());
        }
        for (key, label) in METADATA_KEYS {
            if let Some(value) = meta.extra_text(key) {
                let _ = writeln!(out, "{label}: {value}");
            }
        }
    }
    out
}

/// One affected range in unit-relative coordinates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AffectedLines<'a> {
    pub rule_id: &'a str,
    pub span: LineSpan,
}

fn affected_block(out: &mut String, affected: &[AffectedLines<'_>]) {
    let _ = writeln!(out, "Affected lines (numbered from 1 inside the snippet):");
    for a in affected {
        if a.span.start == a.span.end {
            let _ = writeln!(out, "- `{}`: line {}", a.rule_id, a.span.start);
        } else {
            let _ = writeln!(out, "- `{}`: lines {} -> {}", a.rule_id, a.span.start, a.span.end);
        }
    }
}

fn code_block(out: &mut String, code: &str, language: Option<LanguageKind>) {
    let tag = language.map(|l| l.fence_tag()).unwrap_or("");
    let _ = writeln!(out, "```{tag}");
    out.push_str(code.trim_end_matches(['\n', '\r']));
    let _ = writeln!(out);
    let _ = writeln!(out, "```");
}

const COMMON_RULES: &str = "IMPORTANT:\n\
- Return the ENTIRE snippet with the fixes applied, in a single fenced code block.\n\
- Keep indentation, formatting and comments of untouched lines exactly as they are.\n\
- Do not add or remove brackets unless the fix requires it.\n\
- No explanations outside the code block.\n";

/// Window request: the padded section; line count must not change.
pub fn window_task(
    section_text: &str,
    line_count: usize,
    affected: &[AffectedLines<'_>],
    language: Option<LanguageKind>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TASK: fix the findings in this {line_count}-line snippet.");
    code_block(&mut out, section_text, language);
    affected_block(&mut out, affected);
    out.push_str(COMMON_RULES);
    let _ = writeln!(
        out,
        "- The answer MUST have exactly {line_count} lines, one for each input line."
    );
    out
}

/// Chunk request: a run of whole top-level statements.
pub fn chunk_task(
    code: &str,
    affected: &[AffectedLines<'_>],
    language: Option<LanguageKind>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "TASK: fix the findings in this part of a larger file. It holds complete top-level statements."
    );
    code_block(&mut out, code, language);
    affected_block(&mut out, affected);
    out.push_str(COMMON_RULES);
    out
}

/// Node request: one syntactic construct.
pub fn node_task(
    kind: &str,
    code: &str,
    affected: &[AffectedLines<'_>],
    language: Option<LanguageKind>,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "TASK: fix the findings in this `{kind}`.");
    code_block(&mut out, code, language);
    affected_block(&mut out, affected);
    out.push_str(COMMON_RULES);
    let _ = writeln!(
        out,
        "- Return only the replacement for this construct; it must parse on its own."
    );
    out
}

/// Prompt for a retry: the original request plus why the last answer failed.
pub fn with_retry_hint(prompt: &str, previous: &UnitError) -> String {
    format!(
        "{prompt}\nYour previous answer was rejected ({previous}). \
         Try again, following every rule above.\n"
    )
}
