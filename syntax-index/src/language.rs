//! Language detection and grammar lookup.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tree_sitter::Language;

/// Languages with a bundled tree-sitter grammar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageKind {
    JavaScript,
    TypeScript,
    Tsx,
    Python,
    Rust,
}

impl LanguageKind {
    /// Detects the language from the file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        Self::from_extension(ext)
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "js" | "jsx" | "mjs" | "cjs" => Some(Self::JavaScript),
            "ts" | "mts" | "cts" => Some(Self::TypeScript),
            "tsx" => Some(Self::Tsx),
            "py" | "pyi" => Some(Self::Python),
            "rs" => Some(Self::Rust),
            _ => None,
        }
    }

    /// Tree-sitter grammar for this language.
    #[inline]
    pub fn grammar(self) -> Language {
        match self {
            Self::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Self::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Self::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Self::Python => tree_sitter_python::LANGUAGE.into(),
            Self::Rust => tree_sitter_rust::LANGUAGE.into(),
        }
    }

    /// Info string used on fenced code blocks in prompts.
    pub fn fence_tag(self) -> &'static str {
        match self {
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Tsx => "tsx",
            Self::Python => "python",
            Self::Rust => "rust",
        }
    }

    /// `true` when class members cannot be parsed as top-level items on their own.
    pub(crate) fn members_need_class_wrapper(self) -> bool {
        matches!(self, Self::JavaScript | Self::TypeScript | Self::Tsx)
    }
}

impl fmt::Display for LanguageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.fence_tag())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_by_extension() {
        assert_eq!(
            LanguageKind::from_path(Path::new("src/app/main.ts")),
            Some(LanguageKind::TypeScript)
        );
        assert_eq!(
            LanguageKind::from_path(Path::new("web/App.TSX")),
            Some(LanguageKind::Tsx)
        );
        assert_eq!(
            LanguageKind::from_path(Path::new("lib/util.mjs")),
            Some(LanguageKind::JavaScript)
        );
        assert_eq!(
            LanguageKind::from_path(Path::new("tool.py")),
            Some(LanguageKind::Python)
        );
        assert_eq!(LanguageKind::from_path(Path::new("README.md")), None);
        assert_eq!(LanguageKind::from_path(Path::new("Makefile")), None);
    }
}
