//! Finding Aggregator: pure regrouping of raw findings.
//!
//! 1) `aggregate` builds `file → rule → lines` plus the rule catalog;
//! 2) `cluster` merges nearby findings into window requests;
//! 3) `group_by_node` attaches findings to their enclosing statement node.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::ser::{Serialize, SerializeSeq, Serializer};
use syntax_index::{NodeHandle, Probe, SyntaxNode, SyntaxTree, is_statement_kind};

use crate::finding::{Finding, FindingMetadata, LineSpan, RuleSpan};

/// Line spans of one rule in one file, keyed by start line.
///
/// Two findings of the same rule starting on the same line collapse into one
/// entry covering the widest end line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineSet(BTreeMap<usize, usize>);

impl LineSet {
    pub fn insert(&mut self, span: LineSpan) {
        let end = self.0.entry(span.start).or_insert(span.end);
        *end = (*end).max(span.end);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = LineSpan> + '_ {
        self.0.iter().map(|(&s, &e)| LineSpan::new(s, e))
    }
}

impl Serialize for LineSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.0.len()))?;
        for span in self.iter() {
            seq.serialize_element(&span)?;
        }
        seq.end()
    }
}

pub type RuleCatalog = BTreeMap<String, FindingMetadata>;

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
#[serde(transparent)]
pub struct FileFindings {
    pub by_rule: BTreeMap<String, LineSet>,
}

impl FileFindings {
    /// Every deduplicated finding, ordered by position then rule.
    pub fn units(&self) -> Vec<RuleSpan> {
        let mut out: Vec<RuleSpan> = self
            .by_rule
            .iter()
            .flat_map(|(rule, set)| {
                set.iter().map(move |span| RuleSpan {
                    rule_id: rule.clone(),
                    span,
                })
            })
            .collect();
        out.sort_by(|a, b| a.span.cmp(&b.span).then_with(|| a.rule_id.cmp(&b.rule_id)));
        out
    }

    pub fn total(&self) -> usize {
        self.by_rule.values().map(LineSet::len).sum()
    }

    pub fn rule_ids(&self) -> impl Iterator<Item = &str> {
        self.by_rule.keys().map(String::as_str)
    }
}

#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Aggregation {
    pub files: BTreeMap<PathBuf, FileFindings>,
    pub rules: RuleCatalog,
}

impl Aggregation {
    pub fn finding_count(&self) -> usize {
        self.files.values().map(FileFindings::total).sum()
    }
}

pub fn aggregate(findings: &[Finding]) -> Aggregation {
    let mut agg = Aggregation::default();
    for f in findings {
        agg.files
            .entry(f.relative_path())
            .or_default()
            .by_rule
            .entry(f.rule_id.clone())
            .or_default()
            .insert(f.span());
        agg.rules
            .entry(f.rule_id.clone())
            .or_insert_with(|| FindingMetadata::from_finding(f));
    }
    agg
}

/// Findings close enough to share one window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cluster {
    pub span: LineSpan,
    pub findings: Vec<RuleSpan>,
}

/// Merges findings whose spans are at most `gap_lines` apart.
pub fn cluster(findings: &[RuleSpan], gap_lines: usize) -> Vec<Cluster> {
    let mut sorted: Vec<&RuleSpan> = findings.iter().collect();
    sorted.sort_by(|a, b| a.span.cmp(&b.span));

    let mut out: Vec<Cluster> = Vec::new();
    for f in sorted {
        match out.last_mut() {
            Some(c) if f.span.start <= c.span.end + gap_lines => {
                c.span.end = c.span.end.max(f.span.end);
                c.findings.push(f.clone());
            }
            _ => out.push(Cluster {
                span: f.span,
                findings: vec![f.clone()],
            }),
        }
    }
    out
}

#[derive(Debug, Clone)]
pub struct NodeGroup {
    pub node: SyntaxNode,
    pub findings: Vec<RuleSpan>,
}

#[derive(Debug, Clone, Default)]
pub struct NodeGrouping {
    /// Disjoint nodes in source order.
    pub groups: Vec<NodeGroup>,
    /// Findings with no enclosing statement node.
    pub unmapped: Vec<RuleSpan>,
}

/// Attaches each finding to the smallest statement-like node covering it.
///
/// Nodes are deduplicated, and a node nested inside another selected node
/// is folded into the outer one so replacements never overlap.
pub fn group_by_node(
    tree: &SyntaxTree,
    findings: &[RuleSpan],
    min_span_lines: usize,
) -> NodeGrouping {
    let mut by_handle: BTreeMap<NodeHandle, NodeGroup> = BTreeMap::new();
    let mut unmapped = Vec::new();

    for f in findings {
        let node = tree.find_enclosing_range(
            Probe::line(f.span.start),
            Probe::line(f.span.end),
            min_span_lines,
            is_statement_kind,
        );
        match node {
            Some(node) => by_handle
                .entry(node.handle())
                .or_insert_with(|| NodeGroup {
                    node,
                    findings: Vec::new(),
                })
                .findings
                .push(f.clone()),
            None => unmapped.push(f.clone()),
        }
    }

    let mut candidates: Vec<NodeGroup> = by_handle.into_values().collect();
    // Outer nodes first: earlier start, then longer.
    candidates.sort_by(|a, b| {
        a.node
            .span
            .start_byte
            .cmp(&b.node.span.start_byte)
            .then(b.node.span.end_byte.cmp(&a.node.span.end_byte))
    });

    let mut groups: Vec<NodeGroup> = Vec::new();
    for g in candidates {
        match groups.last_mut() {
            Some(outer) if outer.node.encloses(&g.node) => outer.findings.extend(g.findings),
            _ => groups.push(g),
        }
    }
    for g in &mut groups {
        g.findings.sort_by(|a, b| a.span.cmp(&b.span));
    }

    NodeGrouping { groups, unmapped }
}
