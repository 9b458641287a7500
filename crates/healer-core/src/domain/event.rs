//! Inbound change events and their webhook payload mapping.
//!
//! [`Event::from_webhook`] turns a delivery (`x-github-event` kind plus JSON
//! body) into a typed [`Event`], rejecting incomplete payloads with a
//! [`ValidationError`] before any side effect is attempted.

use serde::{Deserialize, Serialize};

use super::artifact::RepoRef;
use super::error::ValidationError;

/// One commit of a push, as listed in the push payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushCommit {
    pub id: Option<String>,
    pub added: Vec<String>,
    pub modified: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushEvent {
    pub repo: RepoRef,
    /// Full ref name, e.g. `refs/heads/main`.
    pub git_ref: String,
    pub default_branch: String,
    /// Head commit after the push.
    pub after: Option<String>,
    pub commits: Vec<PushCommit>,
}

impl PushEvent {
    pub fn targets_default_branch(&self) -> bool {
        self.git_ref == format!("refs/heads/{}", self.default_branch)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequestEvent {
    pub repo: RepoRef,
    pub action: String,
    pub number: u64,
    pub head_ref: String,
    pub head_sha: Option<String>,
    pub base_ref: String,
    /// Head branch lives in the same repository as the base.
    pub same_repo: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueEvent {
    pub repo: RepoRef,
    pub action: String,
    pub number: u64,
    pub title: String,
    pub body: String,
}

impl IssueEvent {
    /// Title or body asks for a code review (case-insensitive).
    pub fn requests_code_review(&self) -> bool {
        self.title.to_lowercase().contains("code review")
            || self.body.to_lowercase().contains("code review")
    }
}

/// A typed change event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Event {
    Push(PushEvent),
    PullRequest(PullRequestEvent),
    Issue(IssueEvent),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Push(_) => "push",
            Event::PullRequest(_) => "pull_request",
            Event::Issue(_) => "issues",
        }
    }

    pub fn repo(&self) -> &RepoRef {
        match self {
            Event::Push(e) => &e.repo,
            Event::PullRequest(e) => &e.repo,
            Event::Issue(e) => &e.repo,
        }
    }

    /// Parse a webhook delivery.
    ///
    /// `kind` is the `x-github-event` header value (`push`, `pull_request`,
    /// `issues`).
    pub fn from_webhook(kind: &str, payload: serde_json::Value) -> Result<Self, ValidationError> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(ValidationError::EmptyKind);
        }

        match kind {
            "push" => parse_push(payload).map(Event::Push),
            "pull_request" => parse_pull_request(payload).map(Event::PullRequest),
            "issues" => parse_issue(payload).map(Event::Issue),
            other => Err(ValidationError::UnknownEventKind {
                kind: other.to_string(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Raw webhook payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawOwner {
    login: Option<String>,
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawRepository {
    name: Option<String>,
    full_name: Option<String>,
    default_branch: Option<String>,
    owner: Option<RawOwner>,
}

#[derive(Debug, Deserialize)]
struct RawCommit {
    id: Option<String>,
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawPush {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    after: Option<String>,
    commits: Option<Vec<RawCommit>>,
    repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawBranchRef {
    #[serde(rename = "ref")]
    git_ref: Option<String>,
    sha: Option<String>,
    repo: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequest {
    number: Option<u64>,
    head: Option<RawBranchRef>,
    base: Option<RawBranchRef>,
}

#[derive(Debug, Deserialize)]
struct RawPullRequestEvent {
    action: Option<String>,
    pull_request: Option<RawPullRequest>,
    repository: Option<RawRepository>,
}

#[derive(Debug, Deserialize)]
struct RawIssue {
    number: Option<u64>,
    title: Option<String>,
    body: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawIssueEvent {
    action: Option<String>,
    issue: Option<RawIssue>,
    repository: Option<RawRepository>,
}

fn require<T>(value: Option<T>, kind: &str, field: &str) -> Result<T, ValidationError> {
    value.ok_or_else(|| ValidationError::MissingPayloadField {
        kind: kind.to_string(),
        field: field.to_string(),
    })
}

fn decode<T: serde::de::DeserializeOwned>(
    kind: &str,
    payload: serde_json::Value,
) -> Result<T, ValidationError> {
    serde_json::from_value(payload).map_err(|e| ValidationError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

fn repo_ref(raw: Option<&RawRepository>, kind: &str) -> Result<RepoRef, ValidationError> {
    let repo = require(raw, kind, "repository")?;
    let owner = repo
        .owner
        .as_ref()
        .and_then(|o| o.login.clone().or_else(|| o.name.clone()));
    let owner = require(owner, kind, "repository.owner")?;
    let name = require(repo.name.clone(), kind, "repository.name")?;
    Ok(RepoRef::new(owner, name))
}

fn parse_push(payload: serde_json::Value) -> Result<PushEvent, ValidationError> {
    const KIND: &str = "push";
    let raw: RawPush = decode(KIND, payload)?;
    let repo = repo_ref(raw.repository.as_ref(), KIND)?;
    let default_branch = require(
        raw.repository.and_then(|r| r.default_branch),
        KIND,
        "repository.default_branch",
    )?;
    let git_ref = require(raw.git_ref, KIND, "ref")?;
    let commits = require(raw.commits, KIND, "commits")?
        .into_iter()
        .map(|c| PushCommit {
            id: c.id,
            added: c.added,
            modified: c.modified,
        })
        .collect();

    Ok(PushEvent {
        repo,
        git_ref,
        default_branch,
        after: raw.after,
        commits,
    })
}

fn parse_pull_request(payload: serde_json::Value) -> Result<PullRequestEvent, ValidationError> {
    const KIND: &str = "pull_request";
    let raw: RawPullRequestEvent = decode(KIND, payload)?;
    let action = require(raw.action, KIND, "action")?;
    let repo = repo_ref(raw.repository.as_ref(), KIND)?;
    let pr = require(raw.pull_request, KIND, "pull_request")?;
    let number = require(pr.number, KIND, "pull_request.number")?;
    let head = require(pr.head, KIND, "pull_request.head")?;
    let base = require(pr.base, KIND, "pull_request.base")?;
    let head_ref = require(head.git_ref, KIND, "pull_request.head.ref")?;
    let base_ref = require(base.git_ref, KIND, "pull_request.base.ref")?;

    let head_repo = head.repo.as_ref().and_then(|r| r.full_name.as_deref());
    let base_repo = base
        .repo
        .as_ref()
        .and_then(|r| r.full_name.clone())
        .unwrap_or_else(|| repo.to_string());
    let same_repo = head_repo.map_or(true, |h| h == base_repo);

    Ok(PullRequestEvent {
        repo,
        action,
        number,
        head_ref,
        head_sha: head.sha,
        base_ref,
        same_repo,
    })
}

fn parse_issue(payload: serde_json::Value) -> Result<IssueEvent, ValidationError> {
    const KIND: &str = "issues";
    let raw: RawIssueEvent = decode(KIND, payload)?;
    let action = require(raw.action, KIND, "action")?;
    let repo = repo_ref(raw.repository.as_ref(), KIND)?;
    let issue = require(raw.issue, KIND, "issue")?;
    let number = require(issue.number, KIND, "issue.number")?;

    Ok(IssueEvent {
        repo,
        action,
        number,
        title: issue.title.unwrap_or_default(),
        body: issue.body.unwrap_or_default(),
    })
}
