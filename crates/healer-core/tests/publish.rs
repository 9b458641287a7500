use std::sync::Arc;

use healer_core::fakes::{MemoryHosting, ScriptedAnalysis, ScriptedFix, ScriptedTest};
use healer_core::{
    content_digest, plan_publication, CodeArtifact, FileLocation, GatewayError, HealerError,
    HostingError, IssueLocation, Origin, PublishCoordinator, PublishPlan, PublishReceipt,
    RemediationOrchestrator, RemediationOutcome, RepoRef,
};

fn file_origin() -> Origin {
    Origin::File(FileLocation {
        repo: RepoRef::new("octo", "demo"),
        path: "src/loop.js".to_string(),
        base_branch: "main".to_string(),
        commit_sha: "0123456789abcdef".to_string(),
        blob_sha: Some("blob-1".to_string()),
        pull_request: None,
    })
}

fn pr_file_origin(number: u64) -> Origin {
    match file_origin() {
        Origin::File(loc) => Origin::File(FileLocation {
            pull_request: Some(number),
            ..loc
        }),
        other => other,
    }
}

/// Outcome of a run whose fix gateway is down: unchanged code, findings left.
async fn unfixable_outcome(origin: &Origin) -> RemediationOutcome {
    let orchestrator = RemediationOrchestrator::new(
        Arc::new(ScriptedAnalysis::failing(vec!["undeclared variable 'i'".into()])),
        Arc::new(ScriptedFix::erroring(GatewayError::Unavailable("502".into()))),
        Arc::new(ScriptedTest::passing()),
    );
    let artifact = CodeArtifact::new("for (i = 0; i < 3; i++) {}", "javascript", origin.clone());
    orchestrator.remediate(&artifact).await.unwrap()
}

fn issue_origin() -> Origin {
    Origin::Issue(IssueLocation {
        repo: RepoRef::new("octo", "demo"),
        issue_number: 9,
    })
}

fn outcome(converged: bool, iterations_used: u32, residual: &[&str]) -> RemediationOutcome {
    RemediationOutcome {
        final_code: "for (let i = 0; i < 3; i++) {}".to_string(),
        converged,
        iterations_used,
        residual_suggestions: residual.iter().map(|s| s.to_string()).collect(),
        addressed_suggestions: vec!["declare i with let".to_string()],
        cycles: Vec::new(),
    }
}

#[tokio::test]
async fn converged_file_fix_opens_pull_request() {
    let hosting = Arc::new(MemoryHosting::new());
    let publisher = PublishCoordinator::new(hosting.clone());

    let receipt = publisher
        .publish(&outcome(true, 1, &[]), &file_origin(), "javascript")
        .await
        .unwrap();

    let PublishReceipt::PullRequest { url, number, branch } = receipt else {
        panic!("expected a pull request receipt");
    };
    assert_eq!(number, 1);
    assert_eq!(url, "https://github.com/octo/demo/pull/1");

    let branches = hosting.branches();
    assert_eq!(branches.len(), 1);
    assert_eq!(branches[0].name, branch);
    assert_eq!(branches[0].from_sha, "0123456789abcdef");
    let digest = content_digest("for (let i = 0; i < 3; i++) {}");
    assert!(branch.starts_with(&format!("healer/fix-src-loop-js-{}", &digest[..8])));

    let updates = hosting.updates();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0].path, "src/loop.js");
    assert_eq!(updates[0].branch, branch);
    assert_eq!(updates[0].sha.as_deref(), Some("blob-1"));
    assert_eq!(updates[0].content, "for (let i = 0; i < 3; i++) {}");

    let prs = hosting.pull_requests();
    assert_eq!(prs[0].title, "Fix issues in src/loop.js");
    assert_eq!(prs[0].head, branch);
    assert_eq!(prs[0].base, "main");
    assert!(prs[0].body.contains("- declare i with let"));
}

#[tokio::test]
async fn exhausted_file_fix_still_publishes_residuals() {
    let hosting = Arc::new(MemoryHosting::new());
    let publisher = PublishCoordinator::new(hosting.clone());

    let receipt = publisher
        .publish(
            &outcome(false, 3, &["still uses a global"]),
            &file_origin(),
            "javascript",
        )
        .await
        .unwrap();

    assert!(matches!(receipt, PublishReceipt::PullRequest { .. }));
    let body = &hosting.pull_requests()[0].body;
    assert!(body.contains("### Remaining issues"));
    assert!(body.contains("- still uses a global"));
    assert!(body.contains("best-effort"));
}

#[tokio::test]
async fn unchanged_file_is_skipped() {
    let hosting = Arc::new(MemoryHosting::new());
    let publisher = PublishCoordinator::new(hosting.clone());

    let receipt = publisher
        .publish(
            &RemediationOutcome::clean("let a = 1;"),
            &file_origin(),
            "javascript",
        )
        .await
        .unwrap();

    assert!(matches!(receipt, PublishReceipt::Skipped { .. }));
    assert!(hosting.branches().is_empty());
    assert!(hosting.pull_requests().is_empty());
}

#[tokio::test]
async fn issue_outcome_becomes_comment() {
    let hosting = Arc::new(MemoryHosting::new());
    let publisher = PublishCoordinator::new(hosting.clone());

    let receipt = publisher
        .publish(&outcome(true, 1, &[]), &issue_origin(), "js")
        .await
        .unwrap();

    assert!(matches!(
        receipt,
        PublishReceipt::Comment { issue_number: 9, .. }
    ));
    let comments = hosting.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].repo, "octo/demo");
    assert!(comments[0].body.starts_with("## Code Analysis Results"));
    assert!(comments[0].body.contains("```js\n"));
    assert!(comments[0].body.contains("### Issues Fixed:"));
}

#[tokio::test]
async fn clean_issue_block_still_gets_a_comment() {
    let hosting = Arc::new(MemoryHosting::new());
    let publisher = PublishCoordinator::new(hosting.clone());

    publisher
        .publish(&RemediationOutcome::clean("print(1)"), &issue_origin(), "python")
        .await
        .unwrap();

    assert!(hosting.comments()[0].body.contains("No issues found in the code!"));
}

#[tokio::test]
async fn unfixed_pushed_file_is_reported_unpublished() {
    let hosting = Arc::new(MemoryHosting::new());
    let publisher = PublishCoordinator::new(hosting.clone());
    let origin = file_origin();
    let outcome = unfixable_outcome(&origin).await;
    assert!(!outcome.converged);
    assert_eq!(outcome.iterations_used, 0);

    let receipt = publisher.publish(&outcome, &origin, "javascript").await.unwrap();

    match receipt {
        PublishReceipt::Unpublished {
            reason,
            residual_suggestions,
        } => {
            assert!(reason.contains("src/loop.js"));
            assert_eq!(residual_suggestions[0], "undeclared variable 'i'");
            assert!(residual_suggestions[1].starts_with("tooling failure during fix"));
        }
        other => panic!("expected unpublished receipt, got {other:?}"),
    }
    assert!(hosting.branches().is_empty());
    assert!(hosting.pull_requests().is_empty());
    assert!(hosting.comments().is_empty());
}

#[tokio::test]
async fn unfixed_pull_request_file_gets_residuals_as_comment() {
    let hosting = Arc::new(MemoryHosting::new());
    let publisher = PublishCoordinator::new(hosting.clone());
    let origin = pr_file_origin(12);
    let outcome = unfixable_outcome(&origin).await;

    let receipt = publisher.publish(&outcome, &origin, "javascript").await.unwrap();

    assert!(matches!(
        receipt,
        PublishReceipt::Comment { issue_number: 12, .. }
    ));
    let comments = hosting.comments();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].issue_number, 12);
    assert!(comments[0].body.contains("`src/loop.js`"));
    assert!(comments[0].body.contains("- undeclared variable 'i'"));
    assert!(comments[0].body.contains("- tooling failure during fix"));
    assert!(hosting.pull_requests().is_empty());
}

#[test]
fn clean_pull_request_file_is_still_skipped() {
    let plan = plan_publication(
        &RemediationOutcome::clean("let a = 1;"),
        &pr_file_origin(12),
        "javascript",
    );
    assert!(matches!(plan, PublishPlan::Skip { .. }));
}

#[tokio::test]
async fn rejected_write_is_a_publish_error() {
    let hosting = Arc::new(MemoryHosting::new());
    hosting.reject_writes();
    let publisher = PublishCoordinator::new(hosting.clone());

    let err = publisher
        .publish(&outcome(true, 1, &[]), &file_origin(), "javascript")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        HealerError::Publish(HostingError::Api { status: 403, .. })
    ));
}

#[test]
fn plan_is_pure_and_unique_per_call() {
    let first = plan_publication(&outcome(true, 1, &[]), &file_origin(), "javascript");
    let second = plan_publication(&outcome(true, 1, &[]), &file_origin(), "javascript");

    match (first, second) {
        (
            PublishPlan::PullRequest { branch: a, .. },
            PublishPlan::PullRequest { branch: b, .. },
        ) => assert_ne!(a, b),
        other => panic!("expected two pull request plans, got {other:?}"),
    }
}
