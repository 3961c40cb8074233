//! Node driver: one request per enclosing statement node.
//!
//! Only cleanly parsing files are driven. Replacements are recorded against
//! the original tree and rendered once, so node coordinates never go stale.

use fix_oracle::FixOracle;
use syntax_index::{parse, parse_snippet_for};
use tracing::{debug, info, warn};

use super::{DriverInput, FileOutcome, open_conversation, unit_report};
use crate::aggregate::group_by_node;
use crate::config::{DriverKind, EngineConfig};
use crate::errors::UnitError;
use crate::finding::LineSpan;
use crate::prompts::{AffectedLines, node_task};
use crate::retry::{UnitOutcome, UnitRunner, UnitState};

pub async fn run<O: FixOracle>(
    cfg: &EngineConfig,
    runner: &UnitRunner<'_, O>,
    input: &DriverInput<'_>,
) -> FileOutcome {
    let total = input.findings.total();
    let Some(language) = input.language else {
        warn!(file = %input.path.display(), "node driver: no grammar for this file, skipping");
        return FileOutcome::skipped(DriverKind::Node, "no grammar for this file type", total);
    };
    let mut tree = match parse(language, input.source) {
        Ok(t) => t,
        Err(e) => {
            warn!(file = %input.path.display(), error = %e, "node driver: parse failed, skipping");
            return FileOutcome::skipped(DriverKind::Node, e.to_string(), total);
        }
    };
    if let Err(e) = tree.ensure_clean() {
        warn!(
            file = %input.path.display(),
            error = %e,
            "node driver: file has syntax errors, skipping"
        );
        return FileOutcome::skipped(DriverKind::Node, e.to_string(), total);
    }

    let mut out = FileOutcome::new(DriverKind::Node);
    let mut conversation = open_conversation(input);
    let grouping = group_by_node(&tree, &input.findings.units(), cfg.min_node_span_lines);
    if !grouping.unmapped.is_empty() {
        warn!(
            file = %input.path.display(),
            unmapped = grouping.unmapped.len(),
            "node driver: findings outside any statement node"
        );
    }
    out.unresolved += grouping.unmapped.len();
    debug!(file = %input.path.display(), nodes = grouping.groups.len(), "node.plan");

    for group in &grouping.groups {
        let node = &group.node;
        let node_span = LineSpan::new(node.start_line(), node.end_line());
        let affected: Vec<AffectedLines<'_>> = group
            .findings
            .iter()
            .map(|f| AffectedLines {
                rule_id: &f.rule_id,
                span: f
                    .span
                    .intersect(&node_span)
                    .unwrap_or(node_span)
                    .relative_to(node_span.start),
            })
            .collect();
        let shown = format!("{}{}", tree.indent_of(node), node.text);
        let prompt = node_task(&node.kind, &shown, &affected, Some(language));
        let unit = format!("{} [{node_span}]", node.kind);

        let outcome = runner
            .run(&mut conversation, &unit, &prompt, |block| {
                let snippet = parse_snippet_for(language, &block.code, node)?;
                tree.check_replacement(node, &snippet)?;
                Ok::<_, UnitError>(snippet)
            })
            .await;

        let mut report = unit_report(
            unit,
            (node_span.start, node_span.end),
            group.findings.len(),
            &outcome,
        );
        match outcome {
            UnitOutcome::Accepted { value: snippet, .. } => match tree.replace(node, &snippet) {
                Ok(()) => out.resolved += group.findings.len(),
                Err(e) => {
                    warn!(
                        file = %input.path.display(),
                        error = %e,
                        "node driver: replacement refused"
                    );
                    report.state = UnitState::Abandoned;
                    report.error = Some(e.to_string());
                    out.unresolved += group.findings.len();
                }
            },
            UnitOutcome::Abandoned { .. } => out.unresolved += group.findings.len(),
        }
        out.units.push(report);
    }

    if tree.pending_edits() > 0 {
        out.new_text = Some(tree.render());
    }
    info!(
        file = %input.path.display(),
        units = out.units.len(),
        edits = tree.pending_edits(),
        resolved = out.resolved,
        unresolved = out.unresolved,
        "node.done"
    );
    out
}
