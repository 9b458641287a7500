//! Error types for healer-github

use healer_core::HostingError;
use thiserror::Error;

/// Errors that can occur talking to the GitHub REST API
#[derive(Error, Debug)]
pub enum GitHubError {
    /// Neither a token nor app credentials were configured
    #[error("GitHub credentials are not configured (set GITHUB_TOKEN or GITHUB_APP_ID, GITHUB_APP_INSTALLATION_ID and GITHUB_APP_PRIVATE_KEY)")]
    NotConfigured,

    /// App JWT signing or installation token exchange failed
    #[error("GitHub App authentication failed: {0}")]
    Auth(String),

    /// Invalid API base URL or path
    #[error("invalid GitHub URL: {0}")]
    InvalidUrl(String),

    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(String),

    /// GitHub answered with a non-success status
    #[error("GitHub API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Resource does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Response body did not have the expected shape
    #[error("unexpected GitHub response: {0}")]
    Decode(String),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for GitHubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            GitHubError::Decode(err.to_string())
        } else {
            GitHubError::Http(err.to_string())
        }
    }
}

impl From<GitHubError> for HostingError {
    fn from(err: GitHubError) -> Self {
        match err {
            GitHubError::NotConfigured | GitHubError::InvalidUrl(_) | GitHubError::Auth(_) => {
                HostingError::Init(err.to_string())
            }
            GitHubError::Http(msg) => HostingError::Transport(msg),
            GitHubError::Api { status, message } => HostingError::Api { status, message },
            GitHubError::NotFound(what) => HostingError::NotFound(what),
            GitHubError::Decode(msg) => HostingError::Decode(msg),
            GitHubError::Json(e) => HostingError::Decode(e.to_string()),
        }
    }
}

/// Result type for GitHub operations
pub type Result<T> = std::result::Result<T, GitHubError>;
