//! Analysis, fix and test gateway definitions.
//!
//! These traits are the narrow contracts the remediation loop calls:
//! - `AnalysisGateway`: static/dynamic quality analysis of an artifact
//! - `FixGateway`: rewrite code so it addresses a list of findings
//! - `TestGateway`: decide whether a fix attempt worked
//!
//! All traits are async and transport-agnostic. In-memory fakes are provided
//! for testing via the `fakes` module.

use async_trait::async_trait;

use crate::domain::{AnalysisResult, CodeArtifact, TestReport};

/// Failure of a gateway call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Unavailable(String),

    #[error("gateway returned malformed data: {0}")]
    Malformed(String),

    #[error("{gateway} call timed out after {secs}s")]
    Timeout { gateway: &'static str, secs: u64 },
}

/// Result type for gateway calls.
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Quality analysis of a code artifact.
#[async_trait]
pub trait AnalysisGateway: Send + Sync {
    async fn analyze(&self, artifact: &CodeArtifact) -> GatewayResult<AnalysisResult>;
}

/// Produces corrected code for a list of findings.
///
/// Implementations return code only: no prose, no markdown fences.
#[async_trait]
pub trait FixGateway: Send + Sync {
    async fn fix(&self, language: &str, code: &str, suggestions: &[String])
        -> GatewayResult<String>;
}

/// Validates a fix attempt.
#[async_trait]
pub trait TestGateway: Send + Sync {
    async fn test(&self, language: &str, code: &str) -> GatewayResult<TestReport>;
}
