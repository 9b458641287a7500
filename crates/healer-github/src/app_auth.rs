//! GitHub App installation tokens.
//!
//! The app signs a short-lived RS256 JWT and exchanges it for an
//! installation access token. Tokens are cached and minted again once they
//! are within [`REFRESH_MARGIN_SECS`] of expiry.

use std::fmt;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::client::api_error_message;
use crate::config::{AppCredentials, API_VERSION};
use crate::error::{GitHubError, Result};

/// Seconds before expiry at which a cached token is replaced.
pub const REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Serialize)]
struct Claims {
    iat: i64,
    exp: i64,
    iss: String,
}

#[derive(Deserialize)]
struct AccessTokenResponse {
    token: String,
    expires_at: String,
}

#[derive(Clone)]
struct InstallationToken {
    token: String,
    expires_at: DateTime<Utc>,
}

/// Mints and caches installation tokens for one app installation.
pub struct AppTokenProvider {
    app_id: String,
    installation_id: String,
    key: EncodingKey,
    http: reqwest::Client,
    endpoint: Url,
    user_agent: String,
    cached: Mutex<Option<InstallationToken>>,
}

impl fmt::Debug for AppTokenProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppTokenProvider")
            .field("app_id", &self.app_id)
            .field("installation_id", &self.installation_id)
            .field("endpoint", &self.endpoint.as_str())
            .finish_non_exhaustive()
    }
}

impl AppTokenProvider {
    /// Fails early when the private key is not a valid RSA PEM.
    pub fn new(
        credentials: &AppCredentials,
        api_base: &Url,
        http: reqwest::Client,
        user_agent: &str,
    ) -> Result<Self> {
        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes())
            .map_err(|e| GitHubError::Auth(format!("invalid app private key: {e}")))?;

        let mut endpoint = api_base.clone();
        endpoint
            .path_segments_mut()
            .map_err(|_| GitHubError::InvalidUrl(api_base.to_string()))?
            .pop_if_empty()
            .push("app")
            .push("installations")
            .push(&credentials.installation_id)
            .push("access_tokens");

        Ok(Self {
            app_id: credentials.app_id.clone(),
            installation_id: credentials.installation_id.clone(),
            key,
            http,
            endpoint,
            user_agent: user_agent.to_string(),
            cached: Mutex::new(None),
        })
    }

    /// App JWT issued at `now`, backdated a minute for clock drift.
    pub fn app_jwt(&self, now: DateTime<Utc>) -> Result<String> {
        let now = now.timestamp();
        let claims = Claims {
            iat: now - 60,
            exp: now + 600,
            iss: self.app_id.clone(),
        };
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| GitHubError::Auth(format!("failed to sign app JWT: {e}")))
    }

    /// A valid installation token, minting a new one when needed.
    pub async fn token(&self) -> Result<String> {
        let now = Utc::now();
        if let Some(cached) = self.cached_token(now) {
            return Ok(cached);
        }
        let fresh = self.mint(now).await?;
        let token = fresh.token.clone();
        *self.cached.lock().unwrap_or_else(PoisonError::into_inner) = Some(fresh);
        Ok(token)
    }

    fn cached_token(&self, now: DateTime<Utc>) -> Option<String> {
        let guard = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        guard
            .as_ref()
            .filter(|t| t.expires_at - now > Duration::seconds(REFRESH_MARGIN_SECS))
            .map(|t| t.token.clone())
    }

    async fn mint(&self, now: DateTime<Utc>) -> Result<InstallationToken> {
        let jwt = self.app_jwt(now)?;
        let resp = self
            .http
            .post(self.endpoint.clone())
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION)
            .bearer_auth(jwt)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GitHubError::Api {
                status: status.as_u16(),
                message: api_error_message(&body),
            });
        }

        let payload: AccessTokenResponse = resp.json().await?;
        let expires_at = DateTime::parse_from_rfc3339(&payload.expires_at)
            .map_err(|e| {
                GitHubError::Decode(format!("invalid expires_at '{}': {e}", payload.expires_at))
            })?
            .with_timezone(&Utc);
        debug!(
            app_id = %self.app_id,
            installation_id = %self.installation_id,
            expires_at = %expires_at,
            "minted installation token"
        );
        Ok(InstallationToken {
            token: payload.token,
            expires_at,
        })
    }
}
