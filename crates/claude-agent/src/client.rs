use std::time::Duration;

use tracing::debug;

use crate::error::ClaudeAgentError;
use crate::types::{ApiErrorBody, MessagesRequest, MessagesResponse, RequestMessage};
use crate::Result;

pub const DEFAULT_API_URL: &str = "https://api.anthropic.com/v1/messages";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
pub const API_KEY_ENV: &str = "CLAUDE_API_KEY";
const FALLBACK_KEY_ENV: &str = "ANTHROPIC_API_KEY";
const API_VERSION: &str = "2023-06-01";
/// Longest body excerpt carried in parse errors.
const BODY_EXCERPT: usize = 500;

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    /// Full Messages endpoint.
    pub api_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 4096,
            api_url: DEFAULT_API_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Key from `CLAUDE_API_KEY`, falling back to `ANTHROPIC_API_KEY`.
    pub fn from_env() -> Result<Self> {
        [API_KEY_ENV, FALLBACK_KEY_ENV]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|v| !v.trim().is_empty()))
            .map(Self::new)
            .ok_or(ClaudeAgentError::NoApiKey(API_KEY_ENV))
    }
}

/// Blocking Messages API client. Owns its own connection pool, so build it
/// outside any async runtime.
pub struct ClaudeClient {
    config: ClientConfig,
    http: reqwest::blocking::Client,
}

impl ClaudeClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ClaudeAgentError::NoApiKey(API_KEY_ENV));
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Send one user turn and return the reply text.
    pub fn complete(&self, system: &str, prompt: &str) -> Result<String> {
        let request = MessagesRequest {
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            system: (!system.is_empty()).then(|| system.to_string()),
            messages: vec![RequestMessage::user(prompt)],
        };
        debug!(
            model = %request.model,
            max_tokens = request.max_tokens,
            prompt_chars = prompt.len(),
            "sending messages request"
        );

        let response = self
            .http
            .post(&self.config.api_url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&request)
            .send()
            .map_err(|e| self.classify(e))?;
        let status = response.status();
        let body = response.text().map_err(|e| self.classify(e))?;

        if !status.is_success() {
            return Err(ClaudeAgentError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&body).map_err(|source| ClaudeAgentError::Parse {
                body: body.chars().take(BODY_EXCERPT).collect(),
                source,
            })?;
        let text = parsed.text();
        if text.trim().is_empty() {
            return Err(ClaudeAgentError::EmptyResponse);
        }
        debug!(
            id = %parsed.id,
            input_tokens = parsed.usage.input_tokens,
            output_tokens = parsed.usage.output_tokens,
            stop_reason = parsed.stop_reason.as_deref().unwrap_or(""),
            "messages response received"
        );
        Ok(text)
    }

    fn classify(&self, e: reqwest::Error) -> ClaudeAgentError {
        if e.is_timeout() {
            ClaudeAgentError::Timeout(self.config.timeout)
        } else {
            ClaudeAgentError::Http(e)
        }
    }
}

/// The API's own error message when the body has one, the raw body otherwise.
fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) if parsed.error.kind.is_empty() => parsed.error.message,
        Ok(parsed) => format!("{}: {}", parsed.error.kind, parsed.error.message),
        Err(_) => body.chars().take(BODY_EXCERPT).collect(),
    }
}
