use std::sync::Arc;

use healer_core::fakes::MemoryHosting;
use healer_core::{
    ChangeSetExtractor, Event, ExtractorConfig, HealerError, IssueEvent, Origin,
    PullRequestEvent, PushCommit, PushEvent, RepoRef,
};

const REPO: &str = "octo/demo";

fn repo() -> RepoRef {
    RepoRef::new("octo", "demo")
}

fn push(commits: Vec<PushCommit>) -> Event {
    Event::Push(PushEvent {
        repo: repo(),
        git_ref: "refs/heads/main".to_string(),
        default_branch: "main".to_string(),
        after: Some("c0ffee".to_string()),
        commits,
    })
}

fn commit(added: &[&str], modified: &[&str]) -> PushCommit {
    PushCommit {
        id: None,
        added: added.iter().map(|s| s.to_string()).collect(),
        modified: modified.iter().map(|s| s.to_string()).collect(),
    }
}

fn pull_request(same_repo: bool) -> Event {
    Event::PullRequest(PullRequestEvent {
        repo: repo(),
        action: "opened".to_string(),
        number: 12,
        head_ref: "feature/x".to_string(),
        head_sha: Some("feedbeef".to_string()),
        base_ref: "main".to_string(),
        same_repo,
    })
}

fn paths(artifacts: &[healer_core::CodeArtifact]) -> Vec<String> {
    artifacts
        .iter()
        .map(|a| a.file_location().unwrap().path.clone())
        .collect()
}

#[tokio::test]
async fn push_yields_added_then_modified_in_commit_order() {
    let hosting = Arc::new(MemoryHosting::new());
    for path in ["a.js", "b.py", "c.ts", "d.tsx"] {
        hosting.put_file(REPO, path, &format!("// {path}"));
    }
    let extractor = ChangeSetExtractor::new(hosting.clone());

    let artifacts = extractor
        .extract(&push(vec![
            commit(&["a.js", "README.md"], &["b.py"]),
            commit(&["c.ts"], &["d.tsx", "Cargo.toml"]),
        ]))
        .await
        .unwrap();

    assert_eq!(paths(&artifacts), vec!["a.js", "b.py", "c.ts", "d.tsx"]);
    let languages: Vec<_> = artifacts.iter().map(|a| a.language.as_str()).collect();
    assert_eq!(languages, vec!["javascript", "python", "typescript", "typescript"]);
    assert_eq!(artifacts[1].code, "// b.py");

    let fetches = hosting.fetches();
    assert_eq!(fetches.len(), 4);
    assert!(fetches.iter().all(|(_, r)| r.as_deref() == Some("c0ffee")));

    let loc = artifacts[0].file_location().unwrap();
    assert_eq!(loc.base_branch, "main");
    assert_eq!(loc.commit_sha, "c0ffee");
    assert!(loc.blob_sha.is_some());
    assert_eq!(loc.pull_request, None);
}

#[tokio::test]
async fn repeated_paths_are_not_deduplicated() {
    let hosting = Arc::new(MemoryHosting::new());
    hosting.put_file(REPO, "a.js", "x");
    let extractor = ChangeSetExtractor::new(hosting.clone());

    let artifacts = extractor
        .extract(&push(vec![commit(&["a.js"], &[]), commit(&[], &["a.js"])]))
        .await
        .unwrap();

    assert_eq!(paths(&artifacts), vec!["a.js", "a.js"]);
}

#[tokio::test]
async fn unfetchable_file_is_skipped() {
    let hosting = Arc::new(MemoryHosting::new());
    hosting.put_file(REPO, "a.js", "x");
    hosting.put_file(REPO, "c.js", "z");
    hosting.mark_missing("b.js");
    let extractor = ChangeSetExtractor::new(hosting.clone());

    let artifacts = extractor
        .extract(&push(vec![commit(&["a.js", "b.js", "c.js"], &[])]))
        .await
        .unwrap();

    assert_eq!(paths(&artifacts), vec!["a.js", "c.js"]);
}

#[tokio::test]
async fn configured_extensions_replace_defaults() {
    let hosting = Arc::new(MemoryHosting::new());
    hosting.put_file(REPO, "lib.rs", "fn main() {}");
    hosting.put_file(REPO, "a.js", "x");
    let extractor = ChangeSetExtractor::new(hosting.clone()).with_config(ExtractorConfig {
        extensions: vec![".rs".to_string()],
    });

    let artifacts = extractor
        .extract(&push(vec![commit(&["lib.rs", "a.js"], &[])]))
        .await
        .unwrap();

    assert_eq!(paths(&artifacts), vec!["lib.rs"]);
    assert_eq!(artifacts[0].language, "rs");
}

#[tokio::test]
async fn same_repo_pull_request_targets_head_branch() {
    let hosting = Arc::new(MemoryHosting::new());
    hosting.put_pr_files(REPO, 12, &["src/app.jsx", "docs/guide.md"]);
    hosting.put_file(REPO, "src/app.jsx", "<App />");
    let extractor = ChangeSetExtractor::new(hosting.clone());

    let artifacts = extractor.extract(&pull_request(true)).await.unwrap();

    assert_eq!(paths(&artifacts), vec!["src/app.jsx"]);
    let loc = artifacts[0].file_location().unwrap();
    assert_eq!(loc.base_branch, "feature/x");
    assert_eq!(loc.commit_sha, "feedbeef");
    assert_eq!(loc.pull_request, Some(12));
    assert_eq!(hosting.fetches()[0].1.as_deref(), Some("feedbeef"));
}

#[tokio::test]
async fn fork_pull_request_targets_base_branch() {
    let hosting = Arc::new(MemoryHosting::new());
    hosting.put_pr_files(REPO, 12, &["src/app.jsx"]);
    hosting.put_file(REPO, "src/app.jsx", "<App />");
    let extractor = ChangeSetExtractor::new(hosting);

    let artifacts = extractor.extract(&pull_request(false)).await.unwrap();

    assert_eq!(artifacts[0].file_location().unwrap().base_branch, "main");
}

#[tokio::test]
async fn pull_request_listing_failure_is_an_error() {
    let hosting = Arc::new(MemoryHosting::new());
    let extractor = ChangeSetExtractor::new(hosting);

    let err = extractor.extract(&pull_request(true)).await.unwrap_err();

    assert!(matches!(err, HealerError::Hosting(_)));
}

#[tokio::test]
async fn issue_blocks_become_artifacts_without_fetching() {
    let hosting = Arc::new(MemoryHosting::new());
    let extractor = ChangeSetExtractor::new(hosting.clone());
    let event = Event::Issue(IssueEvent {
        repo: repo(),
        action: "opened".to_string(),
        number: 5,
        title: "Code review".to_string(),
        body: "```js\nvar a = 1\n```\ntext\n```python\nprint(a)\n```".to_string(),
    });

    let artifacts = extractor.extract(&event).await.unwrap();

    assert_eq!(artifacts.len(), 2);
    assert_eq!(artifacts[0].language, "js");
    assert_eq!(artifacts[0].code, "var a = 1");
    assert_eq!(artifacts[1].language, "python");
    assert!(matches!(
        &artifacts[1].origin,
        Origin::Issue(loc) if loc.issue_number == 5
    ));
    assert!(hosting.fetches().is_empty());
}
