//! Oracle configuration loaded from the environment.
//!
//! Variables:
//! - `ORACLE_KIND`         : `ollama` (default) or `openai`
//! - `ORACLE_URL`          : endpoint base; falls back to `OLLAMA_URL`, then a provider default
//! - `ORACLE_MODEL`        : model name (required)
//! - `ORACLE_API_KEY`      : bearer key for OpenAI-compatible endpoints
//! - `ORACLE_MAX_TOKENS`   : generation cap
//! - `ORACLE_TEMPERATURE`  : `0.0..=2.0`
//! - `ORACLE_TOP_P`        : `0.0..=1.0`
//! - `ORACLE_TIMEOUT_SECS` : per-request timeout (default 120)

use std::str::FromStr;
use std::time::Duration;

use crate::error_handler::{
    ConfigError, env_opt, env_opt_f32, env_opt_u32, env_opt_u64, must_env,
    validate_http_endpoint, validate_range_f32,
};

const DEFAULT_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleProvider {
    /// Local Ollama runtime (`/api/chat`).
    Ollama,
    /// OpenAI-compatible chat completions (`/v1/chat/completions`).
    OpenAi,
}

impl OracleProvider {
    fn default_endpoint(self) -> &'static str {
        match self {
            OracleProvider::Ollama => "http://127.0.0.1:11434",
            OracleProvider::OpenAi => "https://api.openai.com",
        }
    }
}

impl FromStr for OracleProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(OracleProvider::Ollama),
            "openai" | "chatgpt" | "open_ai" => Ok(OracleProvider::OpenAi),
            other => Err(ConfigError::UnsupportedProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OracleConfig {
    pub provider: OracleProvider,
    pub model: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub timeout_secs: u64,
}

impl OracleConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let provider = match env_opt("ORACLE_KIND") {
            Some(v) => v.parse()?,
            None => OracleProvider::Ollama,
        };
        let endpoint = env_opt("ORACLE_URL")
            .or_else(|| env_opt("OLLAMA_URL"))
            .unwrap_or_else(|| provider.default_endpoint().to_string());

        let cfg = OracleConfig {
            provider,
            model: must_env("ORACLE_MODEL")?,
            endpoint,
            api_key: env_opt("ORACLE_API_KEY"),
            max_tokens: env_opt_u32("ORACLE_MAX_TOKENS")?,
            temperature: env_opt_f32("ORACLE_TEMPERATURE")?,
            top_p: env_opt_f32("ORACLE_TOP_P")?,
            timeout_secs: env_opt_u64("ORACLE_TIMEOUT_SECS")?.unwrap_or(DEFAULT_TIMEOUT_SECS),
        };
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.model.trim().is_empty() {
            return Err(ConfigError::EmptyModel);
        }
        validate_http_endpoint("ORACLE_URL", self.endpoint.trim())?;
        if let Some(t) = self.temperature {
            validate_range_f32("temperature", t, 0.0, 2.0)?;
        }
        if let Some(p) = self.top_p {
            validate_range_f32("top_p", p, 0.0, 1.0)?;
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::OutOfRange {
                field: "timeout_secs",
                detail: "must be greater than zero",
            });
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub(crate) fn base_url(&self) -> String {
        self.endpoint.trim().trim_end_matches('/').to_string()
    }
}
