//! Hosting service contract and shared client lifecycle.
//!
//! `HostingService` is the capability set the pipeline needs from the source
//! control host. [`LazyHosting`] wraps a factory so the process builds exactly
//! one authenticated client, on first use, and can drop it explicitly on
//! shutdown.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use crate::domain::RepoRef;

/// Failure reported by the hosting service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HostingError {
    #[error("hosting API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("could not decode hosting response: {0}")]
    Decode(String),

    #[error("hosting client initialisation failed: {0}")]
    Init(String),
}

/// Result type for hosting operations.
pub type HostingResult<T> = std::result::Result<T, HostingError>;

/// File content at a ref, with the blob sha when known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub content: String,
    pub sha: Option<String>,
}

/// A create-or-update of one file on a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileUpdate {
    pub path: String,
    pub content: String,
    pub branch: String,
    pub message: String,
    /// Blob sha being replaced; `None` creates the file.
    pub sha: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPullRequest {
    pub title: String,
    pub body: String,
    pub head: String,
    pub base: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestRef {
    pub url: String,
    pub number: u64,
}

/// Source-control host operations used by extraction and publishing.
#[async_trait]
pub trait HostingService: Send + Sync {
    /// Read a file, optionally at a ref or commit sha.
    async fn fetch_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> HostingResult<FileContent>;

    /// Paths changed by a pull request (removed files excluded).
    async fn list_pull_request_files(&self, repo: &RepoRef, number: u64)
        -> HostingResult<Vec<String>>;

    /// Create branch `name` pointing at `from_sha`.
    async fn create_branch(&self, repo: &RepoRef, name: &str, from_sha: &str)
        -> HostingResult<()>;

    async fn upsert_file(&self, repo: &RepoRef, update: FileUpdate) -> HostingResult<()>;

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        request: NewPullRequest,
    ) -> HostingResult<PullRequestRef>;

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> HostingResult<()>;
}

type HostingFactory = Box<dyn Fn() -> HostingResult<Arc<dyn HostingService>> + Send + Sync>;

/// Process-wide hosting client, built on first use.
///
/// Concurrent first calls race on a single initialisation; every caller
/// observes the same client afterwards. [`LazyHosting::teardown`] drops the
/// client so the next call rebuilds it.
pub struct LazyHosting {
    cell: OnceCell<Arc<dyn HostingService>>,
    factory: HostingFactory,
}

impl LazyHosting {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> HostingResult<Arc<dyn HostingService>> + Send + Sync + 'static,
    {
        Self {
            cell: OnceCell::new(),
            factory: Box::new(factory),
        }
    }

    /// Return the shared client, initialising it if needed.
    pub async fn client(&self) -> HostingResult<Arc<dyn HostingService>> {
        self.cell
            .get_or_try_init(|| async {
                debug!("initialising hosting client");
                (self.factory)()
            })
            .await
            .map(Arc::clone)
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }

    /// Drop the shared client. Returns whether one was live.
    pub fn teardown(&mut self) -> bool {
        let live = self.cell.take().is_some();
        if live {
            debug!("hosting client torn down");
        }
        live
    }
}

#[async_trait]
impl HostingService for LazyHosting {
    async fn fetch_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> HostingResult<FileContent> {
        self.client()
            .await?
            .fetch_file_content(repo, path, git_ref)
            .await
    }

    async fn list_pull_request_files(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> HostingResult<Vec<String>> {
        self.client()
            .await?
            .list_pull_request_files(repo, number)
            .await
    }

    async fn create_branch(
        &self,
        repo: &RepoRef,
        name: &str,
        from_sha: &str,
    ) -> HostingResult<()> {
        self.client()
            .await?
            .create_branch(repo, name, from_sha)
            .await
    }

    async fn upsert_file(&self, repo: &RepoRef, update: FileUpdate) -> HostingResult<()> {
        self.client().await?.upsert_file(repo, update).await
    }

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        request: NewPullRequest,
    ) -> HostingResult<PullRequestRef> {
        self.client()
            .await?
            .create_pull_request(repo, request)
            .await
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> HostingResult<()> {
        self.client()
            .await?
            .create_issue_comment(repo, issue_number, body)
            .await
    }
}
