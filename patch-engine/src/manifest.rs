//! Input findings manifest and output run report.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DriverKind;
use crate::errors::ManifestError;
use crate::finding::Finding;
use crate::retry::UnitState;

/* ------------------------------------------------------------------------- */
/* Input                                                                     */
/* ------------------------------------------------------------------------- */

#[derive(Deserialize)]
#[serde(untagged)]
enum FindingsDoc {
    List(Vec<Finding>),
    Wrapped { findings: Vec<Finding> },
}

/// Accepts a bare array of findings or `{ "findings": [...] }`.
pub fn parse_findings(bytes: &[u8]) -> Result<Vec<Finding>, ManifestError> {
    let doc: FindingsDoc = serde_json::from_slice(bytes)?;
    Ok(match doc {
        FindingsDoc::List(v) => v,
        FindingsDoc::Wrapped { findings } => findings,
    })
}

pub async fn load_findings(path: &Path) -> Result<Vec<Finding>, ManifestError> {
    let bytes = tokio::fs::read(path).await?;
    let findings = parse_findings(&bytes)?;
    info!(path = %path.display(), findings = findings.len(), "manifest.load");
    Ok(findings)
}

/* ------------------------------------------------------------------------- */
/* Output                                                                    */
/* ------------------------------------------------------------------------- */

/// Outcome of one window, chunk or node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitReport {
    pub unit: String,
    /// Absolute lines at the time the unit was sent.
    pub start_line: usize,
    pub end_line: usize,
    pub finding_count: usize,
    pub attempts: u32,
    pub state: UnitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Every finding was resolved.
    Completed,
    /// Some units were accepted, some abandoned.
    Partial,
    /// Nothing was accepted.
    Unresolved,
    /// Not processed (unchanged since last run, parse failure, ...).
    Skipped,
    /// Could not be read or written.
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileReport {
    pub file_path: PathBuf,
    pub driver: Option<DriverKind>,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub attempts_used: u32,
    pub resolved_finding_count: usize,
    pub unresolved_finding_count: usize,
    pub units: Vec<UnitReport>,
}

impl FileReport {
    /// Report for a file that never reached a driver.
    pub fn not_processed(
        file_path: PathBuf,
        status: FileStatus,
        reason: impl Into<String>,
        findings: usize,
    ) -> Self {
        Self {
            file_path,
            driver: None,
            status,
            reason: Some(reason.into()),
            attempts_used: 0,
            resolved_finding_count: 0,
            unresolved_finding_count: findings,
            units: Vec::new(),
        }
    }
}

/// Files actually rewritten during the run, in path order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangedFileSet(BTreeSet<PathBuf>);

impl ChangedFileSet {
    pub fn insert(&mut self, path: impl Into<PathBuf>) -> bool {
        self.0.insert(path.into())
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.0.contains(path)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        self.0.iter().map(PathBuf::as_path)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_started_at: DateTime<Utc>,
    pub run_finished_at: Option<DateTime<Utc>>,
    pub files: Vec<FileReport>,
    pub changed_files: ChangedFileSet,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_started_at: Utc::now(),
            run_finished_at: None,
            files: Vec::new(),
            changed_files: ChangedFileSet::default(),
        }
    }

    /// Adds a file report; `changed` marks the file as rewritten.
    pub fn push(&mut self, report: FileReport, changed: bool) {
        if changed {
            self.changed_files.insert(report.file_path.clone());
        }
        self.files.push(report);
    }

    /// Stamps the end time and orders files by path.
    pub fn finish(&mut self) {
        self.files.sort_by(|a, b| a.file_path.cmp(&b.file_path));
        self.run_finished_at = Some(Utc::now());
    }

    pub fn resolved(&self) -> usize {
        self.files.iter().map(|f| f.resolved_finding_count).sum()
    }

    pub fn unresolved(&self) -> usize {
        self.files.iter().map(|f| f.unresolved_finding_count).sum()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes the report as pretty JSON, creating parent directories.
pub async fn write_report(path: &Path, report: &RunReport) -> Result<(), ManifestError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(report)?;
    tokio::fs::write(path, bytes).await?;
    info!(path = %path.display(), files = report.files.len(), "manifest.write_report");
    Ok(())
}
