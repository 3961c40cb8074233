//! Findings as reported by the scanner, plus the small value types the
//! engine derives from them.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Severity, parsed leniently from scanner spellings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Severity {
    Info,
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl From<String> for Severity {
    fn from(s: String) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "info" | "note" | "hint" => Severity::Info,
            "low" | "minor" => Severity::Low,
            "high" | "error" | "major" => Severity::High,
            "critical" | "blocker" => Severity::Critical,
            _ => Severity::Medium,
        }
    }
}

impl From<Severity> for String {
    fn from(s: Severity) -> Self {
        s.as_str().to_string()
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One rule violation at a location.
///
/// Identity is `(file_path, rule_id, start_line..end_line)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    #[serde(alias = "path", alias = "file")]
    pub file_path: String,
    #[serde(alias = "line", alias = "start")]
    pub start_line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_column: Option<usize>,
    #[serde(default, alias = "end", skip_serializing_if = "Option::is_none")]
    pub end_line: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_column: Option<usize>,
    #[serde(alias = "checkId", alias = "rule")]
    pub rule_id: String,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub message: String,
    /// Open metadata (cwe, references, explanation, examples, ...).
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl Finding {
    /// Line span; a missing or inverted end collapses onto the start line.
    pub fn span(&self) -> LineSpan {
        let start = self.start_line.max(1);
        LineSpan::new(start, self.end_line.unwrap_or(start).max(start))
    }

    /// Repo-relative path with leading separators and `./` removed.
    pub fn relative_path(&self) -> PathBuf {
        normalize_path(&self.file_path)
    }
}

pub fn normalize_path(raw: &str) -> PathBuf {
    let unified = raw.replace('\\', "/");
    let mut s = unified.as_str();
    loop {
        if let Some(rest) = s.strip_prefix("./") {
            s = rest;
        } else if let Some(rest) = s.strip_prefix('/') {
            s = rest;
        } else {
            break;
        }
    }
    Path::new(s).to_path_buf()
}

/// `true` when joining `path` onto a directory cannot leave that directory.
pub fn stays_inside(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
}

/// Inclusive 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        if end >= start {
            Self { start, end }
        } else {
            Self {
                start: end,
                end: start,
            }
        }
    }

    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }

    pub fn overlaps(&self, other: &LineSpan) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn intersect(&self, other: &LineSpan) -> Option<LineSpan> {
        self.overlaps(other).then(|| LineSpan {
            start: self.start.max(other.start),
            end: self.end.min(other.end),
        })
    }

    /// Re-bases the span so that `origin` becomes line 1.
    pub fn relative_to(&self, origin: usize) -> LineSpan {
        LineSpan {
            start: self.start + 1 - origin,
            end: self.end + 1 - origin,
        }
    }
}

impl fmt::Display for LineSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// A deduplicated finding inside one file: which rule, which lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleSpan {
    pub rule_id: String,
    pub span: LineSpan,
}

/// What every fix request about a rule needs to know.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FindingMetadata {
    pub rule_id: String,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl FindingMetadata {
    pub fn from_finding(f: &Finding) -> Self {
        Self {
            rule_id: f.rule_id.clone(),
            severity: f.severity,
            message: f.message.clone(),
            extra: f.metadata.clone(),
        }
    }

    /// Metadata value rendered as prompt text (strings unquoted, lists joined).
    pub fn extra_text(&self, key: &str) -> Option<String> {
        match self.extra.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) if s.trim().is_empty() => None,
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Array(items) => {
                let parts: Vec<String> = items
                    .iter()
                    .map(|v| match v {
                        serde_json::Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                (!parts.is_empty()).then(|| parts.join(", "))
            }
            other => Some(other.to_string()),
        }
    }
}
