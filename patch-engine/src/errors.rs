//! Crate-wide error hierarchy for patch-engine.
//!
//! - [`Error`] is returned by public entry points; only startup problems and
//!   failures to persist run state surface through it.
//! - [`UnitError`] describes why a single fix unit was retried or abandoned.
//!   It never escapes the file being processed; it ends up in the report.

use std::path::PathBuf;

use fix_oracle::OracleError;
use syntax_index::SyntaxError;
use thiserror::Error;

/// Convenient alias for crate-wide results.
pub type EngineResult<T> = Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Syntax(#[from] SyntaxError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// Requested lines fall entirely outside the file.
    #[error("[Patch Engine] lines {start}..{end} are outside a {total}-line file")]
    EmptyRange {
        start: usize,
        end: usize,
        total: usize,
    },
}

/// File-scoped I/O failures.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("[Patch Engine] cannot read {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Finding path climbs out of the repository root.
    #[error("[Patch Engine] {path} is outside the repository root")]
    OutsideRoot { path: PathBuf },

    #[error("[Patch Engine] cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Input/output manifest and state file failures.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("[Patch Engine] manifest io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("[Patch Engine] manifest json error: {0}")]
    Serde(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[Patch Engine] invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    #[error("[Patch Engine] invalid value in {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Why one fix unit failed an attempt (or all of them).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UnitError {
    #[error("oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("oracle timeout: {0}")]
    OracleTimeout(String),

    /// No usable code block in the response.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Replacement has the wrong shape (line count, syntax, node fit).
    #[error("structural mismatch: {0}")]
    StructuralMismatch(String),

    /// The oracle refused the request in a way retrying cannot fix.
    #[error("oracle rejected request: {0}")]
    Rejected(String),

    #[error("retry limit reached after {attempts} attempt(s); last error: {last}")]
    RetryExhausted { attempts: u32, last: String },
}

impl UnitError {
    pub fn is_retryable(&self) -> bool {
        !matches!(self, UnitError::Rejected(_) | UnitError::RetryExhausted { .. })
    }
}

impl From<OracleError> for UnitError {
    fn from(e: OracleError) -> Self {
        let msg = e.to_string();
        if !e.is_retryable() {
            return UnitError::Rejected(msg);
        }
        match e {
            OracleError::Timeout(_) => UnitError::OracleTimeout(msg),
            OracleError::MalformedResponse => {
                UnitError::MalformedResponse("no fenced code block".to_string())
            }
            OracleError::Decode(_) => UnitError::MalformedResponse(msg),
            _ => UnitError::OracleUnavailable(msg),
        }
    }
}

impl From<SyntaxError> for UnitError {
    fn from(e: SyntaxError) -> Self {
        UnitError::StructuralMismatch(e.to_string())
    }
}
