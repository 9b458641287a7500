//! In-memory fakes for gateway and hosting traits (testing only)
//!
//! Provides scripted `AnalysisGateway`, `FixGateway` and `TestGateway`
//! implementations plus a `MemoryHosting` store that records every write, so
//! the pipeline can be exercised without any network collaborator.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::domain::{AnalysisResult, CodeArtifact, RepoRef, TestReport};
use crate::gateway::{AnalysisGateway, FixGateway, GatewayError, GatewayResult, TestGateway};
use crate::hosting::{
    FileContent, FileUpdate, HostingError, HostingResult, HostingService, NewPullRequest,
    PullRequestRef,
};

// ---------------------------------------------------------------------------
// Script: queued responses with a fallback
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct Script<T: Clone> {
    queue: Mutex<VecDeque<GatewayResult<T>>>,
    fallback: GatewayResult<T>,
}

impl<T: Clone> Script<T> {
    fn new(fallback: GatewayResult<T>) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    fn push(&self, response: GatewayResult<T>) {
        self.queue.lock().unwrap().push_back(response);
    }

    fn next(&self) -> GatewayResult<T> {
        self.queue
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

// ---------------------------------------------------------------------------
// ScriptedAnalysis
// ---------------------------------------------------------------------------

/// Analysis gateway answering from a queue, then from a fallback.
#[derive(Debug)]
pub struct ScriptedAnalysis {
    script: Script<AnalysisResult>,
    seen: Mutex<Vec<CodeArtifact>>,
}

impl ScriptedAnalysis {
    /// Every call passes unless responses are queued.
    pub fn passing() -> Self {
        Self {
            script: Script::new(Ok(AnalysisResult::from_suggestions(Vec::new()))),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call reports `suggestions` unless responses are queued.
    pub fn failing(suggestions: Vec<String>) -> Self {
        Self {
            script: Script::new(Ok(AnalysisResult::from_suggestions(suggestions))),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Every call fails with `error` unless responses are queued.
    pub fn erroring(error: GatewayError) -> Self {
        Self {
            script: Script::new(Err(error)),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, response: GatewayResult<AnalysisResult>) -> Self {
        self.script.push(response);
        self
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn seen(&self) -> Vec<CodeArtifact> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnalysisGateway for ScriptedAnalysis {
    async fn analyze(&self, artifact: &CodeArtifact) -> GatewayResult<AnalysisResult> {
        self.seen.lock().unwrap().push(artifact.clone());
        self.script.next()
    }
}

// ---------------------------------------------------------------------------
// ScriptedFix
// ---------------------------------------------------------------------------

/// A recorded `FixGateway::fix` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixCall {
    pub language: String,
    pub code: String,
    pub suggestions: Vec<String>,
}

/// Fix gateway answering from a queue, then by appending a marker comment.
#[derive(Debug)]
pub struct ScriptedFix {
    script: Script<String>,
    echo_fallback: bool,
    calls: Mutex<Vec<FixCall>>,
}

impl ScriptedFix {
    /// Unqueued calls return the input code with `// fixed` appended.
    pub fn echo() -> Self {
        Self {
            script: Script::new(Ok(String::new())),
            echo_fallback: true,
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Unqueued calls fail with `error`.
    pub fn erroring(error: GatewayError) -> Self {
        Self {
            script: Script::new(Err(error)),
            echo_fallback: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, response: GatewayResult<String>) -> Self {
        self.script.push(response);
        self
    }

    pub fn calls(&self) -> Vec<FixCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FixGateway for ScriptedFix {
    async fn fix(
        &self,
        language: &str,
        code: &str,
        suggestions: &[String],
    ) -> GatewayResult<String> {
        let queued = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(FixCall {
                language: language.to_string(),
                code: code.to_string(),
                suggestions: suggestions.to_vec(),
            });
            self.script.queue.lock().unwrap().pop_front()
        };
        match queued {
            Some(response) => response,
            None if self.echo_fallback => Ok(format!("{code}\n// fixed")),
            None => self.script.fallback.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// ScriptedTest
// ---------------------------------------------------------------------------

/// A recorded `TestGateway::test` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestCall {
    pub language: String,
    pub code: String,
}

/// Test gateway answering from a queue, then from a fallback.
#[derive(Debug)]
pub struct ScriptedTest {
    script: Script<TestReport>,
    calls: Mutex<Vec<TestCall>>,
}

impl ScriptedTest {
    pub fn passing() -> Self {
        Self::with_fallback(Ok(TestReport::pass()))
    }

    pub fn failing(suggestions: Vec<String>) -> Self {
        Self::with_fallback(Ok(TestReport::fail(suggestions)))
    }

    pub fn erroring(error: GatewayError) -> Self {
        Self::with_fallback(Err(error))
    }

    fn with_fallback(fallback: GatewayResult<TestReport>) -> Self {
        Self {
            script: Script::new(fallback),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn then(self, response: GatewayResult<TestReport>) -> Self {
        self.script.push(response);
        self
    }

    pub fn calls(&self) -> Vec<TestCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl TestGateway for ScriptedTest {
    async fn test(&self, language: &str, code: &str) -> GatewayResult<TestReport> {
        self.calls.lock().unwrap().push(TestCall {
            language: language.to_string(),
            code: code.to_string(),
        });
        self.script.next()
    }
}

// ---------------------------------------------------------------------------
// MemoryHosting
// ---------------------------------------------------------------------------

/// A branch created through [`HostingService::create_branch`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedBranch {
    pub repo: String,
    pub name: String,
    pub from_sha: String,
}

/// A comment posted through [`HostingService::create_issue_comment`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub repo: String,
    pub issue_number: u64,
    pub body: String,
}

#[derive(Debug, Default)]
struct HostingState {
    files: HashMap<(String, String), String>,
    pr_files: HashMap<(String, u64), Vec<String>>,
    fetches: Vec<(String, Option<String>)>,
    branches: Vec<CreatedBranch>,
    updates: Vec<(String, FileUpdate)>,
    pull_requests: Vec<(String, NewPullRequest)>,
    comments: Vec<PostedComment>,
    missing: HashSet<String>,
    reject_writes: bool,
}

/// In-memory hosting service keyed by `"owner/name"`.
#[derive(Debug, Default)]
pub struct MemoryHosting {
    state: Mutex<HostingState>,
}

impl MemoryHosting {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_file(&self, repo: &str, path: &str, content: &str) {
        let mut state = self.state.lock().unwrap();
        state
            .files
            .insert((repo.to_string(), path.to_string()), content.to_string());
    }

    pub fn put_pr_files(&self, repo: &str, number: u64, paths: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state.pr_files.insert(
            (repo.to_string(), number),
            paths.iter().map(|p| p.to_string()).collect(),
        );
    }

    /// Make fetches of `path` fail with `NotFound`.
    pub fn mark_missing(&self, path: &str) {
        self.state.lock().unwrap().missing.insert(path.to_string());
    }

    /// Make every branch/file/PR/comment write fail.
    pub fn reject_writes(&self) {
        self.state.lock().unwrap().reject_writes = true;
    }

    /// `(path, ref)` of every fetch, in call order.
    pub fn fetches(&self) -> Vec<(String, Option<String>)> {
        self.state.lock().unwrap().fetches.clone()
    }

    pub fn branches(&self) -> Vec<CreatedBranch> {
        self.state.lock().unwrap().branches.clone()
    }

    pub fn updates(&self) -> Vec<FileUpdate> {
        self.state
            .lock()
            .unwrap()
            .updates
            .iter()
            .map(|(_, u)| u.clone())
            .collect()
    }

    pub fn pull_requests(&self) -> Vec<NewPullRequest> {
        self.state
            .lock()
            .unwrap()
            .pull_requests
            .iter()
            .map(|(_, pr)| pr.clone())
            .collect()
    }

    pub fn comments(&self) -> Vec<PostedComment> {
        self.state.lock().unwrap().comments.clone()
    }

    fn check_writable(state: &HostingState) -> HostingResult<()> {
        if state.reject_writes {
            return Err(HostingError::Api {
                status: 403,
                message: "Resource not accessible by integration".to_string(),
            });
        }
        Ok(())
    }
}

fn blob_sha(content: &str) -> String {
    crate::publish::content_digest(content)
}

#[async_trait]
impl HostingService for MemoryHosting {
    async fn fetch_file_content(
        &self,
        repo: &RepoRef,
        path: &str,
        git_ref: Option<&str>,
    ) -> HostingResult<FileContent> {
        let mut state = self.state.lock().unwrap();
        state
            .fetches
            .push((path.to_string(), git_ref.map(str::to_string)));
        if state.missing.contains(path) {
            return Err(HostingError::NotFound(path.to_string()));
        }
        state
            .files
            .get(&(repo.to_string(), path.to_string()))
            .map(|content| FileContent {
                content: content.clone(),
                sha: Some(blob_sha(content)),
            })
            .ok_or_else(|| HostingError::NotFound(path.to_string()))
    }

    async fn list_pull_request_files(
        &self,
        repo: &RepoRef,
        number: u64,
    ) -> HostingResult<Vec<String>> {
        let state = self.state.lock().unwrap();
        state
            .pr_files
            .get(&(repo.to_string(), number))
            .cloned()
            .ok_or_else(|| HostingError::NotFound(format!("{repo}#{number}")))
    }

    async fn create_branch(
        &self,
        repo: &RepoRef,
        name: &str,
        from_sha: &str,
    ) -> HostingResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        if state
            .branches
            .iter()
            .any(|b| b.repo == repo.to_string() && b.name == name)
        {
            return Err(HostingError::Api {
                status: 422,
                message: "Reference already exists".to_string(),
            });
        }
        state.branches.push(CreatedBranch {
            repo: repo.to_string(),
            name: name.to_string(),
            from_sha: from_sha.to_string(),
        });
        Ok(())
    }

    async fn upsert_file(&self, repo: &RepoRef, update: FileUpdate) -> HostingResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        state.updates.push((repo.to_string(), update));
        Ok(())
    }

    async fn create_pull_request(
        &self,
        repo: &RepoRef,
        request: NewPullRequest,
    ) -> HostingResult<PullRequestRef> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        state.pull_requests.push((repo.to_string(), request));
        let number = state.pull_requests.len() as u64;
        Ok(PullRequestRef {
            url: format!("https://github.com/{repo}/pull/{number}"),
            number,
        })
    }

    async fn create_issue_comment(
        &self,
        repo: &RepoRef,
        issue_number: u64,
        body: &str,
    ) -> HostingResult<()> {
        let mut state = self.state.lock().unwrap();
        Self::check_writable(&state)?;
        state.comments.push(PostedComment {
            repo: repo.to_string(),
            issue_number,
            body: body.to_string(),
        });
        Ok(())
    }
}
