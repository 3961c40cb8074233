//! Optional resume state (`PATCH_STATE_FILE`).
//!
//! One entry per repo-relative path: the SHA-256 of the content the engine
//! last left behind and what happened to it. A later run skips a file whose
//! hash still matches a `done` or `ignored` entry.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::errors::ManifestError;

const STATE_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResumeStatus {
    /// All findings resolved.
    Done,
    /// Nothing to do for this content (e.g. unparseable for the node driver).
    Ignored,
    /// Some findings left; retried on the next run.
    Partial,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateEntry {
    pub content_sha256: String,
    pub status: ResumeStatus,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResumeState {
    pub version: u32,
    #[serde(default)]
    pub files: BTreeMap<String, StateEntry>,
}

impl Default for ResumeState {
    fn default() -> Self {
        Self {
            version: STATE_VERSION,
            files: BTreeMap::new(),
        }
    }
}

pub fn content_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

impl ResumeState {
    /// Loads the state; a missing file is an empty state.
    pub async fn load(path: &Path) -> Result<Self, ManifestError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "state.load: no previous state");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temp file and a rename so a crash never leaves a
    /// truncated state behind.
    pub async fn save(&self, path: &Path) -> Result<(), ManifestError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(self)?).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    pub fn should_skip(&self, rel_path: &str, hash: &str) -> bool {
        self.files.get(rel_path).is_some_and(|e| {
            e.content_sha256 == hash && e.status != ResumeStatus::Partial
        })
    }

    pub fn record(&mut self, rel_path: impl Into<String>, hash: String, status: ResumeStatus) {
        self.files.insert(
            rel_path.into(),
            StateEntry {
                content_sha256: hash,
                status,
                updated_at: Utc::now(),
            },
        );
    }
}
