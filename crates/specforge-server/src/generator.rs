//! Claude-backed [`Generator`].

use std::sync::Arc;

use claude_agent::{ClaudeAgentError, ClaudeClient, ClientConfig};
use specforge_core::config::GenerationConfig;
use specforge_core::generation::{
    GenerationError, GenerationRequest, Generator, UnconfiguredGenerator, SYSTEM_PROMPT,
};

pub struct ClaudeGenerator {
    client: ClientConfig,
}

impl ClaudeGenerator {
    pub fn new(api_key: impl Into<String>, config: &GenerationConfig) -> Self {
        let mut client = ClientConfig::new(api_key);
        client.model = config.model.clone();
        client.max_tokens = config.max_tokens;
        client.api_url = config.api_url.clone();
        client.timeout = config.timeout();
        Self { client }
    }
}

impl Generator for ClaudeGenerator {
    fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        // the blocking client runs its own runtime; build it on the calling
        // thread, which is never an async worker
        let client = ClaudeClient::new(self.client.clone())
            .map_err(|e| GenerationError::Failed(e.to_string()))?;
        client
            .complete(SYSTEM_PROMPT, &request.prompt())
            .map_err(|e| match e {
                ClaudeAgentError::Timeout(d) => GenerationError::Timeout(d),
                other => GenerationError::Failed(other.to_string()),
            })
    }
}

/// Claude when an API key is available, otherwise a generator that records
/// every attempt as failed.
pub fn from_key(api_key: Option<String>, config: &GenerationConfig) -> Arc<dyn Generator> {
    match api_key.filter(|k| !k.trim().is_empty()) {
        Some(key) => {
            tracing::info!(model = %config.model, "PRD generation via Claude");
            Arc::new(ClaudeGenerator::new(key, config))
        }
        None => {
            tracing::warn!("no Claude API key set; PRD generation attempts will fail");
            Arc::new(UnconfiguredGenerator)
        }
    }
}
