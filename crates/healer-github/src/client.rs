//! GitHub REST client implementing [`HostingService`].

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use healer_core::{
    FileContent, FileUpdate, HostingResult, HostingService, NewPullRequest, PullRequestRef,
    RepoRef,
};
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app_auth::AppTokenProvider;
use crate::config::{GitHubConfig, API_VERSION};
use crate::error::{GitHubError, Result};

/// Page size used for list endpoints.
const PER_PAGE: usize = 100;

/// GitHub returns at most 3000 files per pull request.
const MAX_PAGES: usize = 30;

/// Maximum length for error body content in error messages
const MAX_ERROR_BODY_LEN: usize = 200;

/// Sanitize an API error body to prevent credential leakage.
/// Truncates long responses and redacts potential secrets.
pub fn sanitize_error_body(body: &str) -> String {
    const SECRET_PATTERNS: &[&str] = &[
        "token",
        "secret",
        "password",
        "credential",
        "bearer",
        "ghp_",
        "ghs_",
        "github_pat_",
    ];

    let truncated = if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}... (truncated)", &body[..cut])
    } else {
        body.to_string()
    };

    let lower = truncated.to_lowercase();
    if SECRET_PATTERNS.iter().any(|p| lower.contains(p)) {
        return "(error details redacted - may contain sensitive data)".to_string();
    }
    truncated
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    message: String,
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: Option<String>,
}

/// Human-readable message for a failed response body.
pub fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorResponse>(body) {
        Ok(api_error) => {
            let detail = api_error
                .errors
                .first()
                .and_then(|e| e.message.clone())
                .unwrap_or_default();
            if detail.is_empty() {
                api_error.message
            } else {
                format!("{}: {}", api_error.message, detail)
            }
        }
        Err(_) => sanitize_error_body(body),
    }
}

/// Decode the base64 `content` field of the contents API.
pub fn decode_content(encoded: &str) -> Result<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD
        .decode(compact)
        .map_err(|e| GitHubError::Decode(format!("invalid base64 content: {e}")))?;
    String::from_utf8(bytes).map_err(|_| GitHubError::Decode("file is not UTF-8 text".to_string()))
}

/// Full 40-character hex commit id.
pub fn is_commit_sha(value: &str) -> bool {
    value.len() == 40 && value.chars().all(|c| c.is_ascii_hexdigit())
}

#[derive(Deserialize)]
struct ContentsResponse {
    #[serde(rename = "type")]
    kind: String,
    sha: String,
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    encoding: Option<String>,
}

#[derive(Deserialize)]
struct PullRequestFile {
    filename: String,
    status: String,
}

#[derive(Deserialize)]
struct GitRefObject {
    sha: String,
}

#[derive(Deserialize)]
struct GitRefResponse {
    object: GitRefObject,
}

#[derive(Serialize)]
struct CreateRefRequest<'a> {
    #[serde(rename = "ref")]
    git_ref: String,
    sha: &'a str,
}

#[derive(Serialize)]
struct PutContentsRequest<'a> {
    message: &'a str,
    content: String,
    branch: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    sha: Option<&'a str>,
}

#[derive(Serialize)]
struct CreatePrRequest<'a> {
    title: &'a str,
    body: &'a str,
    head: &'a str,
    base: &'a str,
}

#[derive(Deserialize)]
struct CreatePrResponse {
    html_url: String,
    number: u64,
}

#[derive(Serialize)]
struct CreateCommentRequest<'a> {
    body: &'a str,
}

#[derive(Clone)]
enum Auth {
    Token(String),
    App(Arc<AppTokenProvider>),
}

impl fmt::Debug for Auth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Auth::Token(_) => f.write_str("Token(<redacted>)"),
            Auth::App(provider) => f.debug_tuple("App").field(provider).finish(),
        }
    }
}

/// Authenticated GitHub REST client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base: Url,
    auth: Auth,
    user_agent: String,
}

impl GitHubClient {
    /// Build a client; fails when neither app credentials nor a token are
    /// configured. App credentials take precedence.
    pub fn new(config: GitHubConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(GitHubError::NotConfigured);
        }
        let base = Url::parse(config.api_url.trim_end_matches('/'))
            .map_err(|e| GitHubError::InvalidUrl(format!("{}: {e}", config.api_url)))?;
        if base.cannot_be_a_base() {
            return Err(GitHubError::InvalidUrl(config.api_url));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;

        let auth = match (&config.app, &config.token) {
            (Some(app), _) if app.is_complete() => Auth::App(Arc::new(AppTokenProvider::new(
                app,
                &base,
                http.clone(),
                &config.user_agent,
            )?)),
            (_, Some(token)) => Auth::Token(token.clone()),
            _ => return Err(GitHubError::NotConfigured),
        };

        Ok(Self {
            http,
            base,
            auth,
            user_agent: config.user_agent,
        })
    }

    /// Client from the `GITHUB_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(GitHubConfig::from_env())
    }

    /// `<api>/repos/<owner>/<name>/<segments...>`, each segment percent-encoded.
    pub fn repo_url(&self, repo: &RepoRef, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| GitHubError::InvalidUrl(self.base.to_string()))?;
            path.pop_if_empty();
            path.push("repos").push(&repo.owner).push(&repo.name);
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn contents_url(&self, repo: &RepoRef, file_path: &str) -> Result<Url> {
        let mut segments = vec!["contents"];
        segments.extend(file_path.split('/').filter(|s| !s.is_empty()));
        self.repo_url(repo, &segments)
    }

    async fn bearer(&self) -> Result<String> {
        match &self.auth {
            Auth::Token(token) => Ok(token.clone()),
            Auth::App(provider) => provider.token().await,
        }
    }

    async fn request(&self, method: Method, url: Url) -> Result<RequestBuilder> {
        let bearer = self.bearer().await?;
        Ok(self
            .http
            .request(method, url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {bearer}"))
            .header("User-Agent", &self.user_agent)
            .header("X-GitHub-Api-Version", API_VERSION))
    }

    async fn send(&self, builder: RequestBuilder, what: &str) -> Result<Response> {
        let resp = builder.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GitHubError::NotFound(what.to_string()));
        }
        Err(GitHubError::Api {
            status: status.as_u16(),
            message: api_error_message(&body),
        })
    }

    pub async fn get_file(&self, repo: &RepoRef, path: &str, git_ref: Option<&str>) -> Result<FileContent> {
        let mut url = self.contents_url(repo, path)?;
        if let Some(r) = git_ref {
            url.query_pairs_mut().append_pair("ref", r);
        }
        let resp = self
            .send(self.request(Method::GET, url).await?, &format!("{repo}:{path}"))
            .await?;
        let value: serde_json::Value = resp.json().await?;
        if value.is_array() {
            return Err(GitHubError::Decode(format!("{path} is a directory")));
        }
        let contents: ContentsResponse = serde_json::from_value(value)?;
        if contents.kind != "file" {
            return Err(GitHubError::Decode(format!("{path} is a {}", contents.kind)));
        }
        match contents.encoding.as_deref() {
            Some("base64") | None => {}
            Some(other) => {
                return Err(GitHubError::Decode(format!(
                    "{path} uses unsupported encoding {other}"
                )))
            }
        }
        let content = decode_content(contents.content.as_deref().unwrap_or(""))?;
        Ok(FileContent {
            content,
            sha: Some(contents.sha),
        })
    }

    /// Paths touched by a pull request, excluding removed files.
    pub async fn pull_request_files(&self, repo: &RepoRef, number: u64) -> Result<Vec<String>> {
        let number_segment = number.to_string();
        let mut paths = Vec::new();

        for page in 1..=MAX_PAGES {
            let mut url = self.repo_url(repo, &["pulls", &number_segment, "files"])?;
            url.query_pairs_mut()
                .append_pair("per_page", &PER_PAGE.to_string())
                .append_pair("page", &page.to_string());
            let files: Vec<PullRequestFile> = self
                .send(self.request(Method::GET, url).await?, &format!("{repo}#{number}"))
                .await?
                .json()
                .await?;
            let last_page = files.len() < PER_PAGE;
            paths.extend(
                files
                    .into_iter()
                    .filter(|f| f.status != "removed")
                    .map(|f| f.filename),
            );
            if last_page {
                break;
            }
        }
        debug!(repo = %repo, number, files = paths.len(), "listed pull request files");
        Ok(paths)
    }

    /// Commit sha a ref (`refs/heads/x`, `heads/x`, `refs/pull/1/head`) points to.
    pub async fn resolve_ref(&self, repo: &RepoRef, git_ref: &str) -> Result<String> {
        let trimmed = git_ref.strip_prefix("refs/").unwrap_or(git_ref);
        let mut segments = vec!["git", "ref"];
        segments.extend(trimmed.split('/').filter(|s| !s.is_empty()));
        let url = self.repo_url(repo, &segments)?;
        let resp: GitRefResponse = self
            .send(self.request(Method::GET, url).await?, &format!("{repo}@{git_ref}"))
            .await?
            .json()
            .await?;
        Ok(resp.object.sha)
    }

    pub async fn create_ref(&self, repo: &RepoRef, branch: &str, from: &str) -> Result<()> {
        let sha = if is_commit_sha(from) {
            from.to_string()
        } else {
            self.resolve_ref(repo, from).await?
        };
        let url = self.repo_url(repo, &["git", "refs"])?;
        let body = CreateRefRequest {
            git_ref: format!("refs/heads/{branch}"),
            sha: &sha,
        };
        self.send(
            self.request(Method::POST, url).await?.json(&body),
            &format!("{repo}@{sha}"),
        )
        .await?;
        debug!(repo = %repo, branch = %branch, sha = %sha, "created branch");
        Ok(())
    }

    pub async fn put_file(&self, repo: &RepoRef, update: &FileUpdate) -> Result<()> {
        let url = self.contents_url(repo, &update.path)?;
        let body = PutContentsRequest {
            message: &update.message,
            content: STANDARD.encode(update.content.as_bytes()),
            branch: &update.branch,
            sha: update.sha.as_deref(),
        };
        self.send(
            self.request(Method::PUT, url).await?.json(&body),
            &format!("{repo}:{}", update.path),
        )
        .await?;
        Ok(())
    }

    pub async fn open_pull_request(&self, repo: &RepoRef, pr: &NewPullRequest) -> Result<PullRequestRef> {
        let url = self.repo_url(repo, &["pulls"])?;
        let body = CreatePrRequest {
            title: &pr.title,
            body: &pr.body,
            head: &pr.head,
            base: &pr.base,
        };
        let created: CreatePrResponse = self
            .send(
                self.request(Method::POST, url).await?.json(&body),
                &repo.to_string(),
            )
            .await?
            .json()
            .await?;
        Ok(PullRequestRef {
            url: created.html_url,
            number: created.number,
        })
    }

    pub async fn comment(&self, repo: &RepoRef, issue_number: u64, body: &str) -> Result<()> {
        let number = issue_number.to_string();
        let url = self.repo_url(repo, &["issues", &number, "comments"])?;
        self.send(
            self.request(Method::POST, url)
                .await?
                .json(&CreateCommentRequest { body }),
            &format!("{repo}#{issue_number}"),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl HostingService for GitHubClient {
    async fn fetch_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> HostingResult<FileContent> {
        Ok(self.get_file(repo, path, git_ref).await?)
    }

    async fn list_pull_request_files(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> HostingResult<Vec<String>> {
        Ok(self.pull_request_files(repo, number).await?)
    }

    async fn create_branch(&self, repo: &RepoRef, name: &str, from_sha: &str) -> HostingResult<()> {
        Ok(self.create_ref(repo, name, from_sha).await?)
    }

    async fn upsert_file(&self, repo: &RepoRef, update: FileUpdate) -> HostingResult<()> {
        Ok(self.put_file(repo, &update).await?)
    }

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        request: NewPullRequest,
    ) -> HostingResult<PullRequestRef> {
        Ok(self.open_pull_request(repo, &request).await?)
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> HostingResult<()> {
        Ok(self.comment(repo, issue_number, body).await?)
    }
}
