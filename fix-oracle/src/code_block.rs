//! Extraction of the first fenced code block from a response.

use std::sync::LazyLock;

use regex::Regex;

use crate::error_handler::{OracleError, Result};

static FENCED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[ \t]*([\w+#.\-]*)[^\S\r\n]*\r?\n(.*?)```").expect("valid fence regex")
});

static INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(.*?)```").expect("valid inline fence regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeBlock {
    /// Info string after the opening fence, if any.
    pub lang: Option<String>,
    pub code: String,
}

impl CodeBlock {
    pub fn line_count(&self) -> usize {
        self.code.lines().count()
    }
}

/// Returns the first fenced block. Leading blank lines and trailing
/// whitespace are dropped; indentation of the first code line is kept.
pub fn extract_code_block(text: &str) -> Option<CodeBlock> {
    if let Some(caps) = FENCED.captures(text) {
        let lang = caps
            .get(1)
            .map(|m| m.as_str().to_string())
            .filter(|s| !s.is_empty());
        let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
        return Some(CodeBlock {
            lang,
            code: strip_leading_blank_lines(body).trim_end().to_string(),
        });
    }
    INLINE.captures(text).map(|caps| CodeBlock {
        lang: None,
        code: caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default(),
    })
}

/// Like [`extract_code_block`], failing with [`OracleError::MalformedResponse`].
pub fn require_code_block(text: &str) -> Result<CodeBlock> {
    extract_code_block(text).ok_or(OracleError::MalformedResponse)
}

fn strip_leading_blank_lines(s: &str) -> &str {
    let mut rest = s;
    while let Some(idx) = rest.find('\n') {
        if rest[..idx].trim().is_empty() {
            rest = &rest[idx + 1..];
        } else {
            break;
        }
    }
    rest
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_block_with_language() {
        let text = "Here you go:\n```ts\n  const a = 1;\n  const b = 2;\n```\nand\n```js\nother\n```";
        let block = extract_code_block(text).unwrap();
        assert_eq!(block.lang.as_deref(), Some("ts"));
        assert_eq!(block.code, "  const a = 1;\n  const b = 2;");
        assert_eq!(block.line_count(), 2);
    }

    #[test]
    fn block_without_language_and_crlf() {
        let text = "```\r\nfn main() {}\r\n```";
        let block = extract_code_block(text).unwrap();
        assert_eq!(block.lang, None);
        assert_eq!(block.code, "fn main() {}");
    }

    #[test]
    fn leading_blank_lines_are_dropped() {
        let block = extract_code_block("```python\n\n\n    return x\n```").unwrap();
        assert_eq!(block.code, "    return x");
    }

    #[test]
    fn inline_fence_fallback() {
        let block = extract_code_block("use ```let x = 1;``` here").unwrap();
        assert_eq!(block.code, "let x = 1;");
    }

    #[test]
    fn missing_or_unclosed_block_is_malformed() {
        assert!(matches!(
            require_code_block("I fixed it, trust me."),
            Err(OracleError::MalformedResponse)
        ));
        assert!(extract_code_block("```js\nconst a = 1;\n").is_none());
    }
}
