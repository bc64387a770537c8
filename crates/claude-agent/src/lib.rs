//! `claude-agent`: blocking client for the Anthropic Messages API.
//!
//! One call, one completion: a system prompt and a user prompt go in, the
//! concatenated text blocks of the reply come out.
//!
//! # Architecture
//!
//! ```text
//! ClientConfig   ← key, model, token ceiling, endpoint, timeout
//!     │
//!     ▼
//! ClaudeClient   ← POST {api_url}
//!     │              x-api-key + anthropic-version headers
//!     ▼
//! MessagesResponse ← typed reply; text() joins the text blocks
//! ```
//!
//! The client is blocking. Build and use it off the async runtime (inside
//! `spawn_blocking` or a plain thread).
//!
//! # Quick start
//!
//! ```rust,ignore
//! use claude_agent::{ClaudeClient, ClientConfig};
//!
//! let config = ClientConfig::from_env()?;
//! let client = ClaudeClient::new(config)?;
//! let text = client.complete("Output only JSON.", "Describe a bakery app.")?;
//! ```

pub mod client;
pub mod error;
pub mod types;

#[cfg(test)]
mod tests;

pub use client::{ClaudeClient, ClientConfig, API_KEY_ENV, DEFAULT_API_URL, DEFAULT_MODEL};
pub use error::ClaudeAgentError;
pub use types::{ContentBlock, MessagesRequest, MessagesResponse, RequestMessage, TokenUsage};

/// Convenience `Result` alias for this crate.
pub type Result<T> = std::result::Result<T, ClaudeAgentError>;
