//! Domain-level error taxonomy for Healer.

use crate::gateway::GatewayError;
use crate::hosting::HostingError;

/// Errors produced by event payload validation.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("unknown event kind: {kind}")]
    UnknownEventKind { kind: String },

    #[error("event kind {kind} missing required payload field: {field}")]
    MissingPayloadField { kind: String, field: String },

    #[error("event kind {kind} has a malformed payload: {reason}")]
    InvalidPayload { kind: String, reason: String },

    #[error("event kind must not be empty")]
    EmptyKind,
}

/// Healer domain errors.
#[derive(Debug, thiserror::Error)]
pub enum HealerError {
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("analysis unavailable: {0}")]
    AnalysisUnavailable(#[source] GatewayError),

    #[error("{stage} unavailable: {source}")]
    FixOrTestUnavailable {
        stage: &'static str,
        #[source]
        source: GatewayError,
    },

    #[error("publish failed: {0}")]
    Publish(#[source] HostingError),

    #[error("hosting error: {0}")]
    Hosting(#[from] HostingError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for Healer domain operations.
pub type Result<T> = std::result::Result<T, HealerError>;
