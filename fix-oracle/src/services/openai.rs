//! OpenAI-compatible transport: `POST {endpoint}/v1/chat/completions`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{OracleConfig, OracleProvider};
use crate::conversation::Turn;
use crate::error_handler::{ConfigError, OracleError, Result};
use crate::services::{build_client, read_json};

pub struct OpenAiOracle {
    client: reqwest::Client,
    cfg: OracleConfig,
    url_chat: String,
    timeout: Duration,
}

impl OpenAiOracle {
    pub fn new(cfg: OracleConfig) -> Result<Self> {
        if cfg.provider != OracleProvider::OpenAi {
            return Err(ConfigError::UnsupportedProvider("expected openai".into()).into());
        }
        if cfg.api_key.is_none() && cfg.endpoint.contains("api.openai.com") {
            return Err(ConfigError::MissingVar("ORACLE_API_KEY").into());
        }
        let timeout = cfg.timeout();
        let client = build_client(timeout)?;
        let url_chat = format!("{}/v1/chat/completions", cfg.base_url());
        Ok(Self {
            client,
            cfg,
            url_chat,
            timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.cfg.model
    }

    /// Returns `choices[0].message.content`.
    #[instrument(level = "debug", skip_all, fields(model = %self.cfg.model, turns = turns.len()))]
    pub async fn chat(&self, turns: &[Turn]) -> Result<String> {
        let body = ChatCompletionRequest::new(&self.cfg, turns);
        debug!("POST {}", self.url_chat);
        let mut req = self.client.post(&self.url_chat).json(&body);
        if let Some(key) = &self.cfg.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req
            .send()
            .await
            .map_err(|e| OracleError::from_transport(e, self.timeout))?;

        let out: ChatCompletionResponse = read_json(resp, &self.url_chat, self.timeout).await?;
        out.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| {
                OracleError::Decode("expected `choices[0].message.content`".to_string())
            })
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl<'a> ChatCompletionRequest<'a> {
    fn new(cfg: &'a OracleConfig, turns: &'a [Turn]) -> Self {
        Self {
            model: &cfg.model,
            messages: turns
                .iter()
                .map(|t| ChatMessage {
                    role: t.role.as_str(),
                    content: &t.content,
                })
                .collect(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            top_p: cfg.top_p,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageOut,
}

#[derive(Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_first_choice() {
        let raw = r#"{"choices":[{"message":{"role":"assistant","content":"```js\nx\n```"}}]}"#;
        let out: ChatCompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(
            out.choices[0].message.content.as_deref(),
            Some("```js\nx\n```")
        );
    }

    #[test]
    fn hosted_endpoint_needs_key() {
        let cfg = OracleConfig {
            provider: OracleProvider::OpenAi,
            model: "gpt-4o-mini".into(),
            endpoint: "https://api.openai.com".into(),
            api_key: None,
            max_tokens: None,
            temperature: None,
            top_p: None,
            timeout_secs: 10,
        };
        assert!(OpenAiOracle::new(cfg).is_err());
    }
}
