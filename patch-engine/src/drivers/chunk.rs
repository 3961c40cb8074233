//! Chunk driver: the file is cut along top-level statements and every chunk
//! holding findings is sent whole.
//!
//! Chunks are processed in ascending order against one line buffer. An
//! accepted chunk may change size; its end and every later chunk are moved
//! by the difference before the next chunk is read.

use fix_oracle::FixOracle;
use tracing::{debug, info};

use super::{DriverInput, FileOutcome, open_conversation, unit_report};
use crate::chunk::{Chunk, attach_findings, partition, partition_by_lines, shift_following};
use crate::config::{DriverKind, EngineConfig};
use crate::lines::LineBuffer;
use crate::prompts::{AffectedLines, chunk_task};
use crate::retry::{UnitOutcome, UnitRunner};
use crate::validate::{SyntaxGate, restore_blank_edges};

pub async fn run<O: FixOracle>(
    cfg: &EngineConfig,
    runner: &UnitRunner<'_, O>,
    input: &DriverInput<'_>,
) -> FileOutcome {
    let mut out = FileOutcome::new(DriverKind::Chunk);
    let mut buffer = LineBuffer::from_text(input.source);
    let mut conversation = open_conversation(input);
    let findings = input.findings.units();

    let mut chunks = plan(input, &buffer, cfg.chunk_target_lines);
    attach_findings(&mut chunks, &findings);
    debug!(
        file = %input.path.display(),
        chunks = chunks.len(),
        with_findings = chunks.iter().filter(|c| c.has_findings()).count(),
        "chunk.plan"
    );

    // A finding is resolved once every chunk it touches was accepted.
    let mut touched = vec![false; findings.len()];
    let mut failed = vec![false; findings.len()];
    let mut accepted = 0usize;

    for i in 0..chunks.len() {
        if !chunks[i].has_findings() {
            continue;
        }
        let (start, end) = (chunks[i].start_line, chunks[i].end_line);
        let indices: Vec<usize> = chunks[i].contained_findings.iter().map(|f| f.finding).collect();
        let code = buffer.text_range(start, end);
        let prompt = {
            let affected: Vec<AffectedLines<'_>> = chunks[i]
                .contained_findings
                .iter()
                .map(|f| AffectedLines {
                    rule_id: &f.rule_id,
                    span: f.span,
                })
                .collect();
            chunk_task(&code, &affected, input.language)
        };
        let gate = SyntaxGate::for_original(input.language, &code);
        let unit = format!("chunk {} [{start}-{end}]", i + 1);

        let outcome = runner
            .run(&mut conversation, &unit, &prompt, |block| {
                gate.check(&block.code)?;
                Ok(restore_blank_edges(&code, &block.code))
            })
            .await;
        out.units.push(unit_report(unit, (start, end), indices.len(), &outcome));

        for &f in &indices {
            touched[f] = true;
        }
        match outcome {
            UnitOutcome::Accepted { value, .. } => {
                let delta = buffer.splice(start, end, &value);
                shift_following(&mut chunks, i, delta);
                debug!(file = %input.path.display(), chunk = i + 1, delta, "chunk.applied");
                accepted += 1;
            }
            UnitOutcome::Abandoned { .. } => {
                for &f in &indices {
                    failed[f] = true;
                }
            }
        }
    }

    out.resolved = touched
        .iter()
        .zip(&failed)
        .filter(|(t, f)| **t && !**f)
        .count();
    out.unresolved = findings.len() - out.resolved;
    if accepted > 0 {
        out.new_text = Some(buffer.to_text());
    }
    info!(
        file = %input.path.display(),
        units = out.units.len(),
        accepted,
        resolved = out.resolved,
        unresolved = out.unresolved,
        "chunk.done"
    );
    out
}

/// Statement chunks when the file parses at all, fixed line windows otherwise.
fn plan(input: &DriverInput<'_>, buffer: &LineBuffer, target_lines: usize) -> Vec<Chunk> {
    let chunks = match input.language.map(|lang| syntax_index::parse(lang, input.source)) {
        Some(Ok(tree)) => partition(buffer, &tree, target_lines),
        Some(Err(e)) => {
            debug!(
                file = %input.path.display(),
                error = %e,
                "chunk.plan: parse failed, using line windows"
            );
            Vec::new()
        }
        None => Vec::new(),
    };
    if chunks.is_empty() {
        partition_by_lines(buffer, target_lines)
    } else {
        chunks
    }
}
