//! HTTP transports behind the [`FixOracle`] seam.
//!
//! Dispatch is a plain enum: one variant per provider, no trait objects.

pub mod ollama;
pub mod openai;

use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::warn;

use crate::config::{OracleConfig, OracleProvider};
use crate::conversation::Turn;
use crate::error_handler::{OracleError, Result, body_snippet};
use crate::oracle::FixOracle;

pub use ollama::OllamaOracle;
pub use openai::OpenAiOracle;

pub enum HttpOracle {
    Ollama(OllamaOracle),
    OpenAi(OpenAiOracle),
}

impl HttpOracle {
    /// Builds the transport selected by `cfg.provider`.
    pub fn from_config(cfg: OracleConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(match cfg.provider {
            OracleProvider::Ollama => HttpOracle::Ollama(OllamaOracle::new(cfg)?),
            OracleProvider::OpenAi => HttpOracle::OpenAi(OpenAiOracle::new(cfg)?),
        })
    }

    pub fn model(&self) -> &str {
        match self {
            HttpOracle::Ollama(o) => o.model(),
            HttpOracle::OpenAi(o) => o.model(),
        }
    }
}

impl FixOracle for HttpOracle {
    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        match self {
            HttpOracle::Ollama(o) => o.chat(turns).await,
            HttpOracle::OpenAi(o) => o.chat(turns).await,
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .gzip(true)
        .brotli(true)
        .build()
        .map_err(|e| OracleError::Unavailable(format!("http client: {e}")))
}

/// Checks the status and decodes a JSON body.
pub(crate) async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    url: &str,
    timeout: Duration,
) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let text = resp.text().await.unwrap_or_default();
        let snippet = body_snippet(&text);
        warn!(%status, %url, %snippet, "oracle: non-success status");
        return Err(OracleError::HttpStatus {
            status,
            url: url.to_string(),
            snippet,
        });
    }
    let bytes = resp
        .bytes()
        .await
        .map_err(|e| OracleError::from_transport(e, timeout))?;
    serde_json::from_slice(&bytes).map_err(|e| {
        OracleError::Decode(format!(
            "serde error: {e}; body starts with {:?}",
            body_snippet(&String::from_utf8_lossy(&bytes))
        ))
    })
}
