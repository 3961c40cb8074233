//! Fix oracle: the external text-fixing service behind a narrow seam.
//!
//! - [`FixOracle`] turns a list of turns into a response text;
//! - [`Conversation`] keeps retained rule context and drops ephemeral turns
//!   after each exchange;
//! - [`HttpOracle`] talks to Ollama or an OpenAI-compatible endpoint;
//! - [`extract_code_block`] pulls the first fenced block out of a response.

pub mod code_block;
pub mod config;
pub mod conversation;
pub mod error_handler;
pub mod oracle;
pub mod services;

pub use code_block::{CodeBlock, extract_code_block, require_code_block};
pub use config::{OracleConfig, OracleProvider};
pub use conversation::{Conversation, Role, Turn};
pub use error_handler::{ConfigError, OracleError, Result};
pub use oracle::FixOracle;
pub use services::HttpOracle;
