//! Per-file conversation context.
//!
//! Retained ("core") turns carry the rule context and survive every
//! exchange. Ephemeral turns live for exactly one request/response and are
//! dropped afterwards, so unrelated fix requests never see each other.

use serde::Serialize;
use tracing::debug;

use crate::error_handler::Result;
use crate::oracle::FixOracle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
    pub retained: bool,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>, retained: bool) -> Self {
        Self {
            role,
            content: content.into(),
            retained,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a conversation with a retained system instruction.
    pub fn with_system(text: impl Into<String>) -> Self {
        Self {
            turns: vec![Turn::new(Role::System, text, true)],
        }
    }

    /// Adds a retained user turn without calling the oracle.
    pub fn core(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::new(Role::User, text, true));
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear_ephemeral(&mut self) {
        self.turns.retain(|t| t.retained);
    }

    /// Sends `prompt` as an ephemeral turn. Both the prompt and the answer
    /// are dropped afterwards, on success and on failure alike.
    pub async fn ask<O: FixOracle>(&mut self, oracle: &O, prompt: &str) -> Result<String> {
        self.exchange(oracle, prompt, false).await
    }

    /// Sends `prompt` and keeps both sides of the exchange as context.
    pub async fn ask_retained<O: FixOracle>(&mut self, oracle: &O, prompt: &str) -> Result<String> {
        self.exchange(oracle, prompt, true).await
    }

    async fn exchange<O: FixOracle>(
        &mut self,
        oracle: &O,
        prompt: &str,
        retained: bool,
    ) -> Result<String> {
        self.turns.push(Turn::new(Role::User, prompt, retained));
        debug!(
            turns = self.turns.len(),
            retained,
            prompt_chars = prompt.len(),
            "conversation.exchange"
        );
        let result = oracle.complete(&self.turns).await;
        if let Ok(text) = &result {
            self.turns.push(Turn::new(Role::Assistant, text.as_str(), retained));
        }
        self.clear_ephemeral();
        result
    }
}
