//! Unified error handling for `fix-oracle`.
//!
//! [`OracleError`] covers everything a fix request can fail with; config
//! problems are grouped in [`ConfigError`]. Env helpers at the bottom read
//! and validate variables for [`crate::OracleConfig::from_env`].
//!
//! All messages carry the `[Fix Oracle]` prefix to simplify attribution in logs.

use reqwest::StatusCode;
use std::time::Duration;
use thiserror::Error;

/* ------------------------------------------------------------------------- */
/* Public result alias                                                       */
/* ------------------------------------------------------------------------- */

pub type Result<T> = std::result::Result<T, OracleError>;

/* ------------------------------------------------------------------------- */
/* Oracle errors                                                             */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum OracleError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Transport failure without status (DNS/connect/reset).
    #[error("[Fix Oracle] oracle unavailable: {0}")]
    Unavailable(String),

    #[error("[Fix Oracle] request timed out after {0:?}")]
    Timeout(Duration),

    /// Upstream returned a non-successful HTTP status.
    #[error("[Fix Oracle] HTTP {status} from {url}: {snippet}")]
    HttpStatus {
        status: StatusCode,
        url: String,
        /// Short snippet of the response body (trimmed).
        snippet: String,
    },

    /// Response payload could not be decoded as expected.
    #[error("[Fix Oracle] decode error: {0}")]
    Decode(String),

    /// Response carried no fenced code block to apply.
    #[error("[Fix Oracle] response contains no fenced code block")]
    MalformedResponse,
}

impl OracleError {
    /// Maps a transport error, keeping timeouts distinguishable.
    pub(crate) fn from_transport(e: reqwest::Error, timeout: Duration) -> Self {
        if e.is_timeout() {
            return OracleError::Timeout(timeout);
        }
        if let Some(status) = e.status() {
            return OracleError::HttpStatus {
                status,
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
                snippet: String::new(),
            };
        }
        OracleError::Unavailable(e.to_string())
    }

    /// `true` for failures worth another attempt with the same request.
    pub fn is_retryable(&self) -> bool {
        match self {
            OracleError::Config(_) => false,
            OracleError::HttpStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            _ => true,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, OracleError::Timeout(_))
    }
}

/* ------------------------------------------------------------------------- */
/* Config errors                                                             */
/* ------------------------------------------------------------------------- */

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("[Fix Oracle] missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("[Fix Oracle] invalid number in {var}: {reason}")]
    InvalidNumber {
        var: &'static str,
        reason: &'static str,
    },

    #[error("[Fix Oracle] unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("[Fix Oracle] invalid format in {var}: {reason}")]
    InvalidFormat {
        var: &'static str,
        reason: &'static str,
    },

    #[error("[Fix Oracle] {field} is out of range: {detail}")]
    OutOfRange {
        field: &'static str,
        detail: &'static str,
    },

    #[error("[Fix Oracle] model name must not be empty")]
    EmptyModel,
}

/* ------------------------------------------------------------------------- */
/* Env helpers                                                               */
/* ------------------------------------------------------------------------- */

/// Fetches a required, non-empty environment variable.
pub fn must_env(name: &'static str) -> std::result::Result<String, ConfigError> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(ConfigError::MissingVar(name)),
    }
}

/// Optional non-empty string (`None` if unset or blank).
pub fn env_opt(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub fn env_opt_u32(name: &'static str) -> std::result::Result<Option<u32>, ConfigError> {
    match env_opt(name) {
        Some(v) => v.parse::<u32>().map(Some).map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected u32",
        }),
        None => Ok(None),
    }
}

pub fn env_opt_u64(name: &'static str) -> std::result::Result<Option<u64>, ConfigError> {
    match env_opt(name) {
        Some(v) => v.parse::<u64>().map(Some).map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected u64",
        }),
        None => Ok(None),
    }
}

pub fn env_opt_f32(name: &'static str) -> std::result::Result<Option<f32>, ConfigError> {
    match env_opt(name) {
        Some(v) => v.parse::<f32>().map(Some).map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected f32",
        }),
        None => Ok(None),
    }
}

/// Validates that an HTTP endpoint starts with `http://` or `https://`.
pub fn validate_http_endpoint(
    var: &'static str,
    value: &str,
) -> std::result::Result<(), ConfigError> {
    if value.starts_with("http://") || value.starts_with("https://") {
        Ok(())
    } else {
        Err(ConfigError::InvalidFormat {
            var,
            reason: "must start with http:// or https://",
        })
    }
}

/// Validates that a float lies within an inclusive range.
pub fn validate_range_f32(
    field: &'static str,
    value: f32,
    min: f32,
    max: f32,
) -> std::result::Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            detail: "expected value in inclusive range",
        })
    }
}

/// Cuts a response body down to a log-friendly snippet.
pub(crate) fn body_snippet(text: &str) -> String {
    text.chars().take(240).collect()
}
