//! Error types for healer-gateways

use healer_core::GatewayError;
use thiserror::Error;

/// Errors from the chat model and linter adapters
#[derive(Error, Debug)]
pub enum LlmError {
    /// No API key was configured
    #[error("chat model is not configured (set OPENAI_API_KEY)")]
    NotConfigured,

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// The chat API answered with a non-success status
    #[error("chat API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// The model returned no choices or empty content
    #[error("chat model returned an empty reply")]
    EmptyResponse,

    /// The reply did not have the requested shape
    #[error("could not parse model reply: {0}")]
    Parse(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// External command failed
    #[error("command failed: {0}")]
    Command(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            LlmError::Parse(err.to_string())
        } else {
            LlmError::Http(err.to_string())
        }
    }
}

impl From<LlmError> for GatewayError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::EmptyResponse | LlmError::Parse(_) | LlmError::Json(_) => {
                GatewayError::Malformed(err.to_string())
            }
            LlmError::NotConfigured
            | LlmError::Http(_)
            | LlmError::Api { .. }
            | LlmError::Command(_)
            | LlmError::Io(_) => GatewayError::Unavailable(err.to_string()),
        }
    }
}
