//! GitHub client configuration.
//!
//! Two credential modes: a static bearer token (`GITHUB_TOKEN`) or a GitHub
//! App installation (`GITHUB_APP_ID`, `GITHUB_APP_INSTALLATION_ID`,
//! `GITHUB_APP_PRIVATE_KEY`). The app identity wins when both are set.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Public GitHub REST endpoint.
pub const DEFAULT_API_URL: &str = "https://api.github.com";

/// Value sent as `X-GitHub-Api-Version`.
pub const API_VERSION: &str = "2022-11-28";

/// GitHub App installation credentials.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppCredentials {
    pub app_id: String,
    pub installation_id: String,
    /// PEM-encoded RSA private key of the app
    #[serde(skip_serializing, default)]
    pub private_key: String,
}

impl fmt::Debug for AppCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppCredentials")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

impl AppCredentials {
    pub fn new(app_id: &str, installation_id: &str, private_key: &str) -> Self {
        AppCredentials {
            app_id: app_id.trim().to_string(),
            installation_id: installation_id.trim().to_string(),
            // Keys pasted into env files often carry literal `\n`.
            private_key: private_key.replace("\\n", "\n"),
        }
    }

    /// Credentials from the environment, when all three variables are set.
    pub fn from_env() -> Option<Self> {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());
        Some(Self::new(
            &var("GITHUB_APP_ID")?,
            &var("GITHUB_APP_INSTALLATION_ID")?,
            &var("GITHUB_APP_PRIVATE_KEY")?,
        ))
    }

    pub fn is_complete(&self) -> bool {
        !self.app_id.is_empty()
            && !self.installation_id.is_empty()
            && !self.private_key.trim().is_empty()
    }
}

/// Configuration for [`crate::GitHubClient`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST base URL; GitHub Enterprise uses `https://<host>/api/v3`
    pub api_url: String,
    /// Bearer token (installation token or PAT)
    #[serde(skip_serializing)]
    pub token: Option<String>,
    /// GitHub App identity; takes precedence over `token`
    #[serde(default)]
    pub app: Option<AppCredentials>,
    /// `User-Agent` header value
    pub user_agent: String,
    /// Per-request timeout
    pub timeout_secs: u64,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        GitHubConfig {
            api_url: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| DEFAULT_API_URL.to_string()),
            token: std::env::var("GITHUB_TOKEN").ok().filter(|t| !t.trim().is_empty()),
            app: AppCredentials::from_env(),
            user_agent: format!("healer/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

impl GitHubConfig {
    /// Create a new config from environment variables
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Create config for a specific endpoint
    pub fn new(api_url: &str) -> Self {
        GitHubConfig {
            api_url: api_url.to_string(),
            token: None,
            app: None,
            user_agent: format!("healer/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }

    /// Set authentication token
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    /// Authenticate as a GitHub App installation
    pub fn with_app(mut self, credentials: AppCredentials) -> Self {
        self.app = Some(credentials);
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.app.as_ref().is_some_and(AppCredentials::is_complete)
            || self.token.as_deref().is_some_and(|t| !t.trim().is_empty())
    }
}
