//! Window driver: findings clustered by proximity, each cluster sent with a
//! margin of read-only context.
//!
//! Only the requested lines of an accepted reply are copied back, into the
//! same absolute lines. Line counts never change, so later clusters keep
//! their coordinates.

use fix_oracle::FixOracle;
use tracing::{debug, info, warn};

use super::{DriverInput, FileOutcome, open_conversation, unit_report};
use crate::aggregate::cluster;
use crate::config::{DriverKind, EngineConfig};
use crate::finding::LineSpan;
use crate::lines::LineBuffer;
use crate::manifest::UnitReport;
use crate::prompts::{AffectedLines, window_task};
use crate::retry::{UnitOutcome, UnitRunner, UnitState};
use crate::section::Section;
use crate::validate::{SyntaxGate, fit_window_reply};

pub async fn run<O: FixOracle>(
    cfg: &EngineConfig,
    runner: &UnitRunner<'_, O>,
    input: &DriverInput<'_>,
) -> FileOutcome {
    let mut out = FileOutcome::new(DriverKind::Window);
    let mut buffer = LineBuffer::from_text(input.source);
    let mut conversation = open_conversation(input);
    let clusters = cluster(&input.findings.units(), cfg.cluster_gap_lines);
    debug!(file = %input.path.display(), clusters = clusters.len(), "window.plan");

    let mut accepted = 0usize;
    for c in clusters {
        let window = Section::from_buffer(&buffer, c.span.start, c.span.end, cfg.window_margin);
        let section = match window {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    file = %input.path.display(),
                    span = %c.span,
                    error = %e,
                    "window outside file"
                );
                out.unresolved += c.findings.len();
                out.units.push(UnitReport {
                    unit: format!("window {}", c.span),
                    start_line: c.span.start,
                    end_line: c.span.end,
                    finding_count: c.findings.len(),
                    attempts: 0,
                    state: UnitState::Abandoned,
                    error: Some(e.to_string()),
                });
                continue;
            }
        };

        let window = LineSpan::new(section.window_start(), section.window_end());
        let affected: Vec<AffectedLines<'_>> = c
            .findings
            .iter()
            .filter_map(|f| {
                f.span.intersect(&window).map(|clip| AffectedLines {
                    rule_id: &f.rule_id,
                    span: clip.relative_to(window.start),
                })
            })
            .collect();
        let prompt = window_task(&section.text, section.line_count, &affected, input.language);
        let gate = SyntaxGate::for_original(input.language, &section.text);
        let unit = format!("window {window}");

        let outcome = runner
            .run(&mut conversation, &unit, &prompt, |block| {
                let lines = fit_window_reply(&section.text, &block.code)?;
                gate.check(&lines.join("\n"))?;
                Ok(lines)
            })
            .await;

        let (abs_start, abs_end) = section.requested_absolute();
        out.units.push(unit_report(
            unit,
            (abs_start, abs_end),
            c.findings.len(),
            &outcome,
        ));
        match outcome {
            UnitOutcome::Accepted { value: lines, .. } => {
                let requested = &lines[section.requested_start - 1..section.requested_end];
                buffer.overwrite(abs_start, requested);
                out.resolved += c.findings.len();
                accepted += 1;
            }
            UnitOutcome::Abandoned { .. } => out.unresolved += c.findings.len(),
        }
    }

    if accepted > 0 {
        out.new_text = Some(buffer.to_text());
    }
    info!(
        file = %input.path.display(),
        units = out.units.len(),
        accepted,
        resolved = out.resolved,
        unresolved = out.unresolved,
        "window.done"
    );
    out
}
