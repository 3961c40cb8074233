//! Patch drivers: how one file's findings become oracle units and how
//! accepted replacements are written back.
//!
//! - [`window`]: padded line windows, line count must not change;
//! - [`chunk`]: whole top-level statements, size may drift, later chunks
//!   are shifted after each acceptance;
//! - [`node`]: one syntax node per group of findings, rendered once.

pub mod chunk;
pub mod node;
pub mod window;

use std::path::Path;

use fix_oracle::{Conversation, FixOracle};
use syntax_index::LanguageKind;

use crate::aggregate::{FileFindings, RuleCatalog};
use crate::config::{DriverKind, EngineConfig};
use crate::manifest::{FileStatus, UnitReport};
use crate::prompts;
use crate::retry::{UnitOutcome, UnitRunner, UnitState};

/// What a driver gets to work with for one file.
pub struct DriverInput<'a> {
    /// Repo-relative path, used for logs and artifacts.
    pub path: &'a Path,
    pub language: Option<LanguageKind>,
    pub source: &'a str,
    pub findings: &'a FileFindings,
    pub rules: &'a RuleCatalog,
}

#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub driver: DriverKind,
    /// New file content; `None` when nothing was accepted.
    pub new_text: Option<String>,
    pub units: Vec<UnitReport>,
    pub resolved: usize,
    pub unresolved: usize,
    /// Set when the driver refused the file as a whole.
    pub skipped_reason: Option<String>,
}

impl FileOutcome {
    fn new(driver: DriverKind) -> Self {
        Self {
            driver,
            new_text: None,
            units: Vec::new(),
            resolved: 0,
            unresolved: 0,
            skipped_reason: None,
        }
    }

    fn skipped(driver: DriverKind, reason: impl Into<String>, findings: usize) -> Self {
        Self {
            unresolved: findings,
            skipped_reason: Some(reason.into()),
            ..Self::new(driver)
        }
    }

    pub fn attempts_used(&self) -> u32 {
        self.units.iter().map(|u| u.attempts).sum()
    }

    pub fn status(&self) -> FileStatus {
        if self.skipped_reason.is_some() {
            FileStatus::Skipped
        } else if self.resolved > 0 && self.unresolved == 0 {
            FileStatus::Completed
        } else if self.resolved > 0 {
            FileStatus::Partial
        } else {
            FileStatus::Unresolved
        }
    }
}

pub async fn run<O: FixOracle>(
    kind: DriverKind,
    cfg: &EngineConfig,
    runner: &UnitRunner<'_, O>,
    input: &DriverInput<'_>,
) -> FileOutcome {
    match kind {
        DriverKind::Window => window::run(cfg, runner, input).await,
        DriverKind::Chunk => chunk::run(cfg, runner, input).await,
        DriverKind::Node => node::run(cfg, runner, input).await,
    }
}

/// Per-file conversation: system instruction plus the retained rule context.
fn open_conversation(input: &DriverInput<'_>) -> Conversation {
    let mut conversation = Conversation::with_system(prompts::SYSTEM_PROMPT);
    let rules = input
        .findings
        .rule_ids()
        .filter_map(|id| input.rules.get(id));
    conversation.core(prompts::rule_context(rules, input.language));
    conversation
}

fn unit_report<T>(
    unit: String,
    lines: (usize, usize),
    finding_count: usize,
    outcome: &UnitOutcome<T>,
) -> UnitReport {
    let (state, error) = match outcome {
        UnitOutcome::Accepted { .. } => (UnitState::Accepted, None),
        UnitOutcome::Abandoned { error, .. } => (UnitState::Abandoned, Some(error.to_string())),
    };
    UnitReport {
        unit,
        start_line: lines.0,
        end_line: lines.1,
        finding_count,
        attempts: outcome.attempts(),
        state,
        error,
    }
}
