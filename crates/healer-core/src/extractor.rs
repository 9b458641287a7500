//! Change-set extraction: events to code artifacts.
//!
//! Push and pull request events yield one artifact per changed source file
//! (fetched through the hosting service); issue events yield one artifact per
//! fenced code block in the issue body. Encounter order is preserved and
//! repeated paths are not deduplicated.

use std::sync::{Arc, OnceLock};

use futures::stream::{self, StreamExt};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{
    language_for_path, CodeArtifact, Event, FileLocation, IssueEvent, IssueLocation, Origin,
    PullRequestEvent, PushEvent, RepoRef, Result,
};
use crate::hosting::HostingService;

/// Extensions processed when no configuration is given.
pub const DEFAULT_EXTENSIONS: [&str; 5] = [".js", ".py", ".ts", ".jsx", ".tsx"];

/// Language tag for fences without an annotation.
pub const UNTAGGED_LANGUAGE: &str = "text";

/// Concurrent file fetches per event.
const FETCH_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Path suffixes eligible for remediation, e.g. `.js`.
    pub extensions: Vec<String>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl ExtractorConfig {
    pub fn is_processable(&self, path: &str) -> bool {
        self.extensions.iter().any(|ext| path.ends_with(ext.as_str()))
    }
}

/// A fenced code block found in markdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeBlock {
    pub language: String,
    pub code: String,
}

/// Extract fenced code blocks in source order.
///
/// The language is the fence annotation, or `"text"` when absent; code is
/// trimmed.
pub fn extract_code_blocks(markdown: &str) -> Vec<CodeBlock> {
    static FENCE: OnceLock<Regex> = OnceLock::new();
    let fence = FENCE.get_or_init(|| {
        Regex::new(r"(?s)```(\w+)?\s*(.*?)```").expect("code fence pattern is valid")
    });

    fence
        .captures_iter(markdown)
        .map(|caps| CodeBlock {
            language: caps
                .get(1)
                .map_or(UNTAGGED_LANGUAGE, |m| m.as_str())
                .to_string(),
            code: caps
                .get(2)
                .map_or("", |m| m.as_str())
                .trim()
                .to_string(),
        })
        .collect()
}

/// Turns an event into the artifacts that need evaluation.
#[derive(Clone)]
pub struct ChangeSetExtractor {
    hosting: Arc<dyn HostingService>,
    config: ExtractorConfig,
}

/// Where and how the files of one event are read.
struct FetchPlan<'a> {
    repo: &'a RepoRef,
    fetch_ref: String,
    base_branch: String,
    commit_sha: String,
    pull_request: Option<u64>,
}

impl ChangeSetExtractor {
    pub fn new(hosting: Arc<dyn HostingService>) -> Self {
        Self {
            hosting,
            config: ExtractorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ExtractorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Extract the artifacts of `event`.
    ///
    /// Fails only when the file list itself cannot be obtained; individual
    /// files that cannot be fetched are logged and skipped.
    pub async fn extract(&self, event: &Event) -> Result<Vec<CodeArtifact>> {
        match event {
            Event::Push(push) => Ok(self.extract_push(push).await),
            Event::PullRequest(pr) => self.extract_pull_request(pr).await,
            Event::Issue(issue) => Ok(extract_issue(issue)),
        }
    }

    async fn extract_push(&self, push: &PushEvent) -> Vec<CodeArtifact> {
        let paths: Vec<String> = push
            .commits
            .iter()
            .flat_map(|c| c.added.iter().chain(c.modified.iter()))
            .filter(|p| self.config.is_processable(p))
            .cloned()
            .collect();

        let commit = push.after.clone().unwrap_or_else(|| push.git_ref.clone());
        let plan = FetchPlan {
            repo: &push.repo,
            fetch_ref: commit.clone(),
            base_branch: push.default_branch.clone(),
            commit_sha: commit,
            pull_request: None,
        };
        self.fetch_all(&plan, paths).await
    }

    async fn extract_pull_request(&self, pr: &PullRequestEvent) -> Result<Vec<CodeArtifact>> {
        let paths: Vec<String> = self
            .hosting
            .list_pull_request_files(&pr.repo, pr.number)
            .await?
            .into_iter()
            .filter(|p| self.config.is_processable(p))
            .collect();

        let head = pr
            .head_sha
            .clone()
            .unwrap_or_else(|| format!("refs/pull/{}/head", pr.number));
        let base_branch = if pr.same_repo {
            pr.head_ref.clone()
        } else {
            pr.base_ref.clone()
        };
        let plan = FetchPlan {
            repo: &pr.repo,
            fetch_ref: head.clone(),
            base_branch,
            commit_sha: head,
            pull_request: Some(pr.number),
        };
        Ok(self.fetch_all(&plan, paths).await)
    }

    async fn fetch_all(&self, plan: &FetchPlan<'_>, paths: Vec<String>) -> Vec<CodeArtifact> {
        debug!(repo = %plan.repo, files = paths.len(), git_ref = %plan.fetch_ref, "fetching change set");

        stream::iter(paths)
            .map(|path| self.fetch_one(plan, path))
            .buffered(FETCH_CONCURRENCY)
            .filter_map(|artifact| async move { artifact })
            .collect()
            .await
    }

    async fn fetch_one(&self, plan: &FetchPlan<'_>, path: String) -> Option<CodeArtifact> {
        match self
            .hosting
            .fetch_file_content(plan.repo, &path, Some(&plan.fetch_ref))
            .await
        {
            Ok(file) => {
                let language = language_for_path(&path);
                let origin = Origin::File(FileLocation {
                    repo: plan.repo.clone(),
                    path,
                    base_branch: plan.base_branch.clone(),
                    commit_sha: plan.commit_sha.clone(),
                    blob_sha: file.sha,
                    pull_request: plan.pull_request,
                });
                Some(CodeArtifact::new(file.content, language, origin))
            }
            Err(e) => {
                warn!(repo = %plan.repo, path = %path, error = %e, "skipping file that could not be fetched");
                None
            }
        }
    }
}

fn extract_issue(issue: &IssueEvent) -> Vec<CodeArtifact> {
    extract_code_blocks(&issue.body)
        .into_iter()
        .map(|block| {
            CodeArtifact::new(
                block.code,
                block.language,
                Origin::Issue(IssueLocation {
                    repo: issue.repo.clone(),
                    issue_number: issue.number,
                }),
            )
        })
        .collect()
}
