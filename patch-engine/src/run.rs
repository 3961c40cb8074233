//! Run orchestration: files in parallel, units within a file in order.
//!
//! Each file is processed by its own future with no shared mutable state.
//! A single consuming loop merges the file reports, the changed-file set and
//! the resume state as results arrive.

use std::path::Path;

use fix_oracle::FixOracle;
use futures::{StreamExt, stream};
use syntax_index::LanguageKind;
use tracing::{error, info, instrument, warn};

use crate::aggregate::{FileFindings, RuleCatalog, aggregate};
use crate::artifacts::ArtifactSink;
use crate::config::EngineConfig;
use crate::drivers::{self, DriverInput};
use crate::errors::{EngineResult, FileError};
use crate::finding::{Finding, stays_inside};
use crate::lines::LineBuffer;
use crate::manifest::{FileReport, FileStatus, RunReport, write_report};
use crate::retry::UnitRunner;
use crate::state::{ResumeState, ResumeStatus, content_hash};

pub struct Engine<O> {
    cfg: EngineConfig,
    oracle: O,
    artifacts: ArtifactSink,
}

/// Result of one file, before it is merged into the run.
struct FileDone {
    report: FileReport,
    changed: bool,
    /// `(state key, hash of the content left on disk, status)`.
    resume: Option<(String, String, ResumeStatus)>,
}

impl FileDone {
    fn failed(rel: &Path, error: FileError, total: usize) -> Self {
        error!(error = %error, "skipping file");
        Self {
            report: FileReport::not_processed(
                rel.to_path_buf(),
                FileStatus::Failed,
                error.to_string(),
                total,
            ),
            changed: false,
            resume: None,
        }
    }
}

impl<O: FixOracle> Engine<O> {
    pub fn new(cfg: EngineConfig, oracle: O) -> Self {
        let artifacts = ArtifactSink::new(cfg.artifacts_dir.clone());
        Self {
            cfg,
            oracle,
            artifacts,
        }
    }

    /// Remediates every file named by `findings`.
    ///
    /// Per-file failures end up in the report. Only a failure to persist the
    /// resume state or the report is returned as an error, after the report
    /// accumulated so far has been written.
    pub async fn run(&self, findings: &[Finding]) -> EngineResult<RunReport> {
        let agg = aggregate(findings);
        info!(
            files = agg.files.len(),
            findings = agg.finding_count(),
            rules = agg.rules.len(),
            "run.start"
        );
        self.artifacts.write_json("files-map.json", &agg.files);
        self.artifacts.write_json("rules-map.json", &agg.rules);

        let mut state = match &self.cfg.state_file {
            Some(path) => Some(ResumeState::load(path).await?),
            None => None,
        };
        // Skip decisions only look at the previous run.
        let previous = state.clone();

        let mut report = RunReport::new();
        let mut files = stream::iter(agg.files.iter())
            .map(|(rel, file_findings)| {
                self.process_file(rel, file_findings, &agg.rules, previous.as_ref())
            })
            .buffer_unordered(self.cfg.max_concurrent_files.max(1));

        while let Some(done) = files.next().await {
            if let (Some(st), Some(path), Some((key, hash, status))) =
                (state.as_mut(), self.cfg.state_file.as_deref(), done.resume)
            {
                st.record(key, hash, status);
                if let Err(e) = st.save(path).await {
                    error!(path = %path.display(), error = %e, "failed to persist resume state");
                    report.push(done.report, done.changed);
                    self.persist_partial(&mut report).await;
                    return Err(e.into());
                }
            }
            report.push(done.report, done.changed);
        }

        report.finish();
        info!(
            files = report.files.len(),
            changed = report.changed_files.len(),
            resolved = report.resolved(),
            unresolved = report.unresolved(),
            "run.done"
        );
        self.artifacts.write_json("report.json", &report);
        if let Some(path) = &self.cfg.report_path {
            write_report(path, &report).await?;
        }
        Ok(report)
    }

    async fn persist_partial(&self, report: &mut RunReport) {
        report.finish();
        self.artifacts.write_json("report.json", &*report);
        if let Some(path) = &self.cfg.report_path {
            if let Err(e) = write_report(path, report).await {
                error!(path = %path.display(), error = %e, "failed to write partial report");
            }
        }
    }

    #[instrument(skip_all, fields(file = %rel.display()))]
    async fn process_file(
        &self,
        rel: &Path,
        findings: &FileFindings,
        rules: &RuleCatalog,
        previous: Option<&ResumeState>,
    ) -> FileDone {
        let total = findings.total();
        if !stays_inside(rel) {
            let e = FileError::OutsideRoot {
                path: rel.to_path_buf(),
            };
            return FileDone::failed(rel, e, total);
        }
        let abs = self.cfg.repo_root.join(rel);

        let source = match tokio::fs::read_to_string(&abs).await {
            Ok(s) => s,
            Err(source) => {
                let e = FileError::Unreadable { path: abs, source };
                return FileDone::failed(rel, e, total);
            }
        };

        let key = rel.to_string_lossy().replace('\\', "/");
        let hash = content_hash(&source);
        if previous.is_some_and(|s| s.should_skip(&key, &hash)) {
            info!("unchanged since last run, skipping");
            return FileDone {
                report: FileReport::not_processed(
                    rel.to_path_buf(),
                    FileStatus::Skipped,
                    "unchanged since last run",
                    total,
                ),
                changed: false,
                resume: None,
            };
        }

        let language = LanguageKind::from_path(rel);
        let driver = self.cfg.resolve_driver(LineBuffer::count_lines(&source));
        info!(?language, ?driver, findings = total, "processing file");

        let runner = UnitRunner {
            oracle: &self.oracle,
            policy: self.cfg.retry_policy(),
            artifacts: &self.artifacts,
            file: rel,
        };
        let input = DriverInput {
            path: rel,
            language,
            source: &source,
            findings,
            rules,
        };
        let outcome = drivers::run(driver, &self.cfg, &runner, &input).await;

        let mut changed = false;
        let mut left_on_disk = hash;
        if let Some(text) = outcome.new_text.as_deref().filter(|t| *t != source) {
            if let Err(err) = tokio::fs::write(&abs, text).await {
                let e = FileError::Write {
                    path: abs,
                    source: err,
                };
                error!(error = %e, "failed to write patched file");
                return FileDone {
                    report: FileReport {
                        file_path: rel.to_path_buf(),
                        driver: Some(outcome.driver),
                        status: FileStatus::Failed,
                        reason: Some(e.to_string()),
                        attempts_used: outcome.attempts_used(),
                        resolved_finding_count: 0,
                        unresolved_finding_count: total,
                        units: outcome.units,
                    },
                    changed: false,
                    resume: None,
                };
            }
            changed = true;
            left_on_disk = content_hash(text);
        }

        let status = outcome.status();
        match status {
            FileStatus::Completed => info!(resolved = outcome.resolved, changed, "file completed"),
            FileStatus::Skipped => {
                warn!(reason = ?outcome.skipped_reason, "file skipped by driver")
            }
            _ => warn!(
                resolved = outcome.resolved,
                unresolved = outcome.unresolved,
                changed,
                "file left with unresolved findings"
            ),
        }
        let resume_status = match status {
            FileStatus::Completed => ResumeStatus::Done,
            FileStatus::Skipped => ResumeStatus::Ignored,
            _ => ResumeStatus::Partial,
        };

        FileDone {
            report: FileReport {
                file_path: rel.to_path_buf(),
                driver: Some(outcome.driver),
                status,
                reason: outcome.skipped_reason.clone(),
                attempts_used: outcome.attempts_used(),
                resolved_finding_count: outcome.resolved,
                unresolved_finding_count: outcome.unresolved,
                units: outcome.units,
            },
            changed,
            resume: Some((key, left_on_disk, resume_status)),
        }
    }
}
