//! Ollama chat transport: `POST {endpoint}/api/chat` with `stream=false`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{OracleConfig, OracleProvider};
use crate::conversation::Turn;
use crate::error_handler::{ConfigError, OracleError, Result};
use crate::services::{build_client, read_json};

pub struct OllamaOracle {
    client: reqwest::Client,
    cfg: OracleConfig,
    url_chat: String,
    timeout: Duration,
}

impl OllamaOracle {
    pub fn new(cfg: OracleConfig) -> Result<Self> {
        if cfg.provider != OracleProvider::Ollama {
            return Err(ConfigError::UnsupportedProvider("expected ollama".into()).into());
        }
        let timeout = cfg.timeout();
        let client = build_client(timeout)?;
        let url_chat = format!("{}/api/chat", cfg.base_url());
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

    /// Non-streaming chat request over the whole conversation.
    ///
    /// Mapped options: `temperature`, `top_p`, `num_predict` ← `max_tokens`.
    #[instrument(level = "debug", skip_all, fields(model = %self.cfg.model, turns = turns.len()))]
    pub async fn chat(&self, turns: &[Turn]) -> Result<String> {
        let body = ChatRequest::new(&self.cfg, turns);
        debug!("POST {}", self.url_chat);
        let resp = self
            .client
            .post(&self.url_chat)
            .json(&body)
            .send()
            .await
            .map_err(|e| OracleError::from_transport(e, self.timeout))?;

        let out: ChatResponse = read_json(resp, &self.url_chat, self.timeout).await?;
        Ok(out.message.content)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<ChatOptions>,
}

impl<'a> ChatRequest<'a> {
    fn new(cfg: &'a OracleConfig, turns: &'a [Turn]) -> Self {
        let options = (cfg.temperature.is_some() || cfg.top_p.is_some() || cfg.max_tokens.is_some())
            .then_some(ChatOptions {
                temperature: cfg.temperature,
                top_p: cfg.top_p,
                num_predict: cfg.max_tokens,
            });
        Self {
            model: &cfg.model,
            messages: turns
                .iter()
                .map(|t| ChatMessage {
                    role: t.role.as_str(),
                    content: &t.content,
                })
                .collect(),
            stream: false,
            options,
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessageOut,
}

#[derive(Deserialize)]
struct ChatMessageOut {
    content: String,
}
