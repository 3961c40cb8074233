//! Automated finding remediation.
//!
//! Static-analysis findings go in, patched source files and a run report
//! come out. The pipeline per file:
//!
//! 1) findings are aggregated per file and rule ([`aggregate`]);
//! 2) a driver cuts the file into units: padded windows, statement chunks
//!    or syntax nodes ([`drivers`]);
//! 3) every unit goes through the fix oracle under a bounded retry policy
//!    ([`retry`]) and structural validation ([`validate`]);
//! 4) accepted replacements are applied at their absolute position and the
//!    file is written once.

pub mod aggregate;
pub mod artifacts;
pub mod chunk;
pub mod config;
pub mod drivers;
pub mod errors;
pub mod finding;
pub mod lines;
pub mod manifest;
pub mod prompts;
pub mod retry;
pub mod run;
pub mod section;
pub mod state;
pub mod validate;

pub use aggregate::{
    Aggregation, Cluster, FileFindings, NodeGroup, aggregate, cluster, group_by_node,
};
pub use chunk::{Chunk, ChunkFinding, attach_findings, partition, partition_source};
pub use config::{DriverKind, DriverStrategy, EngineConfig};
pub use errors::{EngineResult, Error, UnitError};
pub use finding::{Finding, FindingMetadata, LineSpan, Severity};
pub use lines::LineBuffer;
pub use manifest::{
    ChangedFileSet, FileReport, FileStatus, RunReport, UnitReport, load_findings, parse_findings,
    write_report,
};
pub use retry::{PatchResult, RetryPolicy, UnitOutcome, UnitState};
pub use run::Engine;
pub use section::{Section, extract};
pub use state::{ResumeState, ResumeStatus};

use fix_oracle::FixOracle;

/// Runs the whole pipeline with `cfg` against `oracle`.
pub async fn remediate<O: FixOracle>(
    cfg: EngineConfig,
    oracle: O,
    findings: &[Finding],
) -> EngineResult<RunReport> {
    Engine::new(cfg, oracle).run(findings).await
}
