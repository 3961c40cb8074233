//! Engine configuration loaded once from the environment.
//!
//! | Variable                     | Default | Meaning                                        |
//! |------------------------------|---------|------------------------------------------------|
//! | `PATCH_REPO_ROOT`            | `.`     | Root that finding paths are relative to        |
//! | `PATCH_MAX_ATTEMPTS`         | 5       | Oracle attempts per unit                       |
//! | `PATCH_WINDOW_MARGIN`        | 5       | Context lines on each side of a window         |
//! | `PATCH_CLUSTER_GAP_LINES`    | 10      | Findings this close share one window           |
//! | `PATCH_CHUNK_TARGET_LINES`   | 300     | Chunk target; also the `auto` switch point     |
//! | `PATCH_MIN_NODE_SPAN_LINES`  | 1       | Smallest node the node driver will replace     |
//! | `PATCH_DRIVER`               | `auto`  | `auto`, `window`, `chunk` or `node`            |
//! | `PATCH_MAX_CONCURRENT_FILES` | 4       | Files processed at once                        |
//! | `PATCH_STATE_FILE`           | unset   | Resume state JSON (enables resumability)       |
//! | `PATCH_ARTIFACTS_DIR`        | unset   | Debug dumps of maps, prompts and responses     |
//! | `PATCH_REPORT_PATH`          | unset   | Where the run report is written                |

use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::ConfigError;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DriverStrategy {
    /// Chunk driver for files above the chunk target, window driver otherwise.
    #[default]
    Auto,
    Window,
    Chunk,
    Node,
}

impl FromStr for DriverStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(DriverStrategy::Auto),
            "window" => Ok(DriverStrategy::Window),
            "chunk" => Ok(DriverStrategy::Chunk),
            "node" | "ast" => Ok(DriverStrategy::Node),
            other => Err(ConfigError::InvalidValue {
                var: "PATCH_DRIVER",
                value: other.to_string(),
            }),
        }
    }
}

/// The driver actually used for one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverKind {
    Window,
    Chunk,
    Node,
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub repo_root: PathBuf,
    pub max_attempts: u32,
    pub window_margin: usize,
    pub cluster_gap_lines: usize,
    pub chunk_target_lines: usize,
    pub min_node_span_lines: usize,
    pub strategy: DriverStrategy,
    pub max_concurrent_files: usize,
    pub state_file: Option<PathBuf>,
    pub artifacts_dir: Option<PathBuf>,
    pub report_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            repo_root: PathBuf::from("."),
            max_attempts: 5,
            window_margin: 5,
            cluster_gap_lines: 10,
            chunk_target_lines: 300,
            min_node_span_lines: 1,
            strategy: DriverStrategy::Auto,
            max_concurrent_files: 4,
            state_file: None,
            artifacts_dir: None,
            report_path: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let d = Self::default();
        let strategy = match env_str("PATCH_DRIVER") {
            Some(v) => v.parse()?,
            None => d.strategy,
        };
        Ok(Self {
            repo_root: env_path("PATCH_REPO_ROOT").unwrap_or(d.repo_root),
            max_attempts: env_positive("PATCH_MAX_ATTEMPTS", d.max_attempts as usize)? as u32,
            window_margin: env_usize("PATCH_WINDOW_MARGIN", d.window_margin)?,
            cluster_gap_lines: env_usize("PATCH_CLUSTER_GAP_LINES", d.cluster_gap_lines)?,
            chunk_target_lines: env_positive("PATCH_CHUNK_TARGET_LINES", d.chunk_target_lines)?,
            min_node_span_lines: env_positive(
                "PATCH_MIN_NODE_SPAN_LINES",
                d.min_node_span_lines,
            )?,
            strategy,
            max_concurrent_files: env_positive(
                "PATCH_MAX_CONCURRENT_FILES",
                d.max_concurrent_files,
            )?,
            state_file: env_path("PATCH_STATE_FILE"),
            artifacts_dir: env_path("PATCH_ARTIFACTS_DIR"),
            report_path: env_path("PATCH_REPORT_PATH"),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts)
    }

    /// Picks the driver for a file with `line_count` lines.
    pub fn resolve_driver(&self, line_count: usize) -> DriverKind {
        match self.strategy {
            DriverStrategy::Window => DriverKind::Window,
            DriverStrategy::Chunk => DriverKind::Chunk,
            DriverStrategy::Node => DriverKind::Node,
            DriverStrategy::Auto if line_count > self.chunk_target_lines => DriverKind::Chunk,
            DriverStrategy::Auto => DriverKind::Window,
        }
    }
}

fn env_str(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_path(name: &str) -> Option<PathBuf> {
    env_str(name).map(PathBuf::from)
}

fn env_usize(name: &'static str, default_: usize) -> Result<usize, ConfigError> {
    match env_str(name) {
        Some(v) => v.parse::<usize>().map_err(|_| ConfigError::InvalidNumber {
            var: name,
            reason: "expected unsigned integer",
        }),
        None => Ok(default_),
    }
}

fn env_positive(name: &'static str, default_: usize) -> Result<usize, ConfigError> {
    let v = env_usize(name, default_)?;
    if v == 0 {
        return Err(ConfigError::InvalidNumber {
            var: name,
            reason: "must be greater than zero",
        });
    }
    Ok(v)
}
