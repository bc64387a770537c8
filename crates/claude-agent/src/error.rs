use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeAgentError {
    #[error("no API key configured (set {0})")]
    NoApiKey(&'static str),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse API response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("API returned no text content")]
    EmptyResponse,
}
