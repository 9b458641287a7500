use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use healer_core::fakes::{ScriptedAnalysis, ScriptedFix, ScriptedTest};
use healer_core::{
    AnalysisResult, CodeArtifact, FixGateway, GatewayError, GatewayResult, HealerError,
    IssueLocation, Origin, RemediationOrchestrator, RemediationPolicy, RepoRef, TestReport,
    MAX_DEPTH, METRICS,
};

fn artifact(code: &str) -> CodeArtifact {
    CodeArtifact::new(
        code,
        "javascript",
        Origin::Issue(IssueLocation {
            repo: RepoRef::new("octo", "demo"),
            issue_number: 1,
        }),
    )
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

struct Harness {
    analysis: Arc<ScriptedAnalysis>,
    fixer: Arc<ScriptedFix>,
    tester: Arc<ScriptedTest>,
}

impl Harness {
    fn new(analysis: ScriptedAnalysis, fixer: ScriptedFix, tester: ScriptedTest) -> Self {
        Self {
            analysis: Arc::new(analysis),
            fixer: Arc::new(fixer),
            tester: Arc::new(tester),
        }
    }

    fn orchestrator(&self) -> RemediationOrchestrator {
        RemediationOrchestrator::new(
            self.analysis.clone(),
            self.fixer.clone(),
            self.tester.clone(),
        )
    }
}

#[tokio::test]
async fn clean_analysis_skips_fix_and_test() {
    let h = Harness::new(
        ScriptedAnalysis::passing(),
        ScriptedFix::echo(),
        ScriptedTest::passing(),
    );

    let outcome = h.orchestrator().remediate(&artifact("let a = 1;")).await.unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations_used, 0);
    assert_eq!(outcome.final_code, "let a = 1;");
    assert!(outcome.residual_suggestions.is_empty());
    assert_eq!(h.analysis.calls(), 1);
    assert!(h.fixer.calls().is_empty());
    assert!(h.tester.calls().is_empty());
}

#[tokio::test]
async fn cosmetic_only_analysis_counts_as_clean() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["All good!", "✅ nothing to report"])),
        ScriptedFix::echo(),
        ScriptedTest::passing(),
    );

    let outcome = h.orchestrator().remediate(&artifact("x")).await.unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations_used, 0);
    assert!(h.fixer.calls().is_empty());
}

#[tokio::test]
async fn converges_on_first_cycle() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["use let", "add semicolon"])),
        ScriptedFix::echo(),
        ScriptedTest::passing(),
    );

    let outcome = h.orchestrator().remediate(&artifact("i = 0")).await.unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations_used, 1);
    assert_eq!(outcome.final_code, "i = 0\n// fixed");
    assert_eq!(outcome.addressed_suggestions, strings(&["use let", "add semicolon"]));

    let fixes = h.fixer.calls();
    assert_eq!(fixes.len(), 1);
    assert_eq!(fixes[0].language, "javascript");
    assert_eq!(fixes[0].suggestions, strings(&["use let", "add semicolon"]));

    let tests = h.tester.calls();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].code, "i = 0\n// fixed");
}

#[tokio::test]
async fn never_converging_stops_at_max_depth() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["s1"])),
        ScriptedFix::echo(),
        ScriptedTest::failing(strings(&["still broken"])),
    );

    let outcome = h.orchestrator().remediate(&artifact("code")).await.unwrap();

    assert!(!outcome.converged);
    assert!(outcome.exhausted(MAX_DEPTH));
    assert_eq!(outcome.iterations_used, MAX_DEPTH);
    assert_eq!(h.fixer.calls().len(), MAX_DEPTH as usize);
    assert_eq!(h.tester.calls().len(), MAX_DEPTH as usize);
    assert_eq!(outcome.residual_suggestions, strings(&["still broken"]));
    assert_eq!(
        outcome.final_code,
        "code\n// fixed\n// fixed\n// fixed"
    );
    assert_eq!(outcome.cycles.len(), MAX_DEPTH as usize);
}

#[tokio::test]
async fn test_findings_feed_the_next_fix_in_order() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["first"])),
        ScriptedFix::echo(),
        ScriptedTest::passing()
            .then(Ok(TestReport::fail(strings(&["b", "a"]))))
            .then(Ok(TestReport::pass())),
    );

    let outcome = h.orchestrator().remediate(&artifact("c")).await.unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations_used, 2);
    let fixes = h.fixer.calls();
    assert_eq!(fixes.len(), 2);
    assert_eq!(fixes[0].suggestions, strings(&["first"]));
    assert_eq!(fixes[1].suggestions, strings(&["b", "a"]));
    assert_eq!(fixes[1].code, "c\n// fixed");
}

#[tokio::test]
async fn cosmetic_test_findings_count_as_passed() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["issue"])),
        ScriptedFix::echo(),
        ScriptedTest::failing(strings(&["all good", "✅ done"])),
    );

    let outcome = h.orchestrator().remediate(&artifact("c")).await.unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations_used, 1);
}

#[tokio::test]
async fn analysis_failure_is_an_error() {
    let h = Harness::new(
        ScriptedAnalysis::erroring(GatewayError::Unavailable("503".to_string())),
        ScriptedFix::echo(),
        ScriptedTest::passing(),
    );

    let err = h.orchestrator().remediate(&artifact("c")).await.unwrap_err();

    assert!(matches!(err, HealerError::AnalysisUnavailable(_)));
    assert!(h.fixer.calls().is_empty());
}

#[tokio::test]
async fn fix_failure_on_first_cycle_keeps_original_code() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["a", "b"])),
        ScriptedFix::erroring(GatewayError::Unavailable("connection refused".to_string())),
        ScriptedTest::passing(),
    );

    let outcome = h.orchestrator().remediate(&artifact("orig")).await.unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.iterations_used, 0);
    assert_eq!(outcome.final_code, "orig");
    assert_eq!(outcome.residual_suggestions.len(), 3);
    assert_eq!(outcome.residual_suggestions[..2], strings(&["a", "b"])[..]);
    assert!(outcome.residual_suggestions[2].starts_with("tooling failure during fix"));
    assert!(h.tester.calls().is_empty());
}

#[tokio::test]
async fn test_failure_on_second_cycle_keeps_last_fixed_code() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["a"])),
        ScriptedFix::echo(),
        ScriptedTest::erroring(GatewayError::Malformed("not json".to_string()))
            .then(Ok(TestReport::fail(strings(&["b"])))),
    );

    let outcome = h.orchestrator().remediate(&artifact("x")).await.unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.iterations_used, 2);
    assert_eq!(outcome.final_code, "x\n// fixed\n// fixed");
    assert_eq!(outcome.residual_suggestions[0], "b");
    assert!(outcome.residual_suggestions[1].starts_with("tooling failure during test"));
}

#[tokio::test]
async fn empty_fix_is_a_tooling_failure() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["a"])),
        ScriptedFix::echo().then(Ok("   ".to_string())),
        ScriptedTest::passing(),
    );

    let outcome = h.orchestrator().remediate(&artifact("x")).await.unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.final_code, "x");
    assert!(outcome
        .residual_suggestions
        .last()
        .unwrap()
        .contains("malformed"));
}

#[tokio::test]
async fn policy_can_lower_depth() {
    let h = Harness::new(
        ScriptedAnalysis::failing(strings(&["a"])),
        ScriptedFix::echo(),
        ScriptedTest::failing(strings(&["b"])),
    );
    let orchestrator = h.orchestrator().with_policy(RemediationPolicy {
        max_depth: 1,
        ..Default::default()
    });

    let exhausted_before = METRICS.remediations_exhausted();
    let outcome = orchestrator.remediate(&artifact("x")).await.unwrap();

    assert_eq!(outcome.iterations_used, 1);
    assert_eq!(h.fixer.calls().len(), 1);
    assert!(!outcome.converged);
    assert!(outcome.exhausted(1));
    assert!(!outcome.exhausted(MAX_DEPTH));
    // Other tests share the global counters, so only the lower bound holds.
    assert!(METRICS.remediations_exhausted() > exhausted_before);
}

#[tokio::test]
async fn rerun_on_converged_code_is_a_no_op() {
    let first = Harness::new(
        ScriptedAnalysis::failing(strings(&["declare i with let"])),
        ScriptedFix::echo(),
        ScriptedTest::passing(),
    );
    let fixed = first
        .orchestrator()
        .remediate(&artifact("for (i = 0; i < 3; i++) {}"))
        .await
        .unwrap();
    assert!(fixed.converged);
    assert_eq!(fixed.iterations_used, 1);

    let second = Harness::new(
        ScriptedAnalysis::passing(),
        ScriptedFix::echo(),
        ScriptedTest::passing(),
    );
    let rerun = second
        .orchestrator()
        .remediate(&artifact(&fixed.final_code))
        .await
        .unwrap();

    assert!(rerun.converged);
    assert_eq!(rerun.iterations_used, 0);
    assert_eq!(rerun.final_code, fixed.final_code);
    assert!(rerun.residual_suggestions.is_empty());
    assert_eq!(second.analysis.calls(), 1);
    assert!(second.fixer.calls().is_empty());
    assert!(second.tester.calls().is_empty());
}

#[tokio::test]
async fn analysis_details_do_not_drive_the_loop() {
    let h = Harness::new(
        ScriptedAnalysis::passing().then(Ok(AnalysisResult::from_suggestions(Vec::new())
            .with_details(vec![serde_json::json!({"line": 1, "rule": "no-var"})]))),
        ScriptedFix::echo(),
        ScriptedTest::passing(),
    );

    let outcome = h.orchestrator().remediate(&artifact("x")).await.unwrap();

    assert!(outcome.converged);
    assert_eq!(outcome.iterations_used, 0);
}

struct SlowFix;

#[async_trait]
impl FixGateway for SlowFix {
    async fn fix(&self, _language: &str, code: &str, _suggestions: &[String]) -> GatewayResult<String> {
        tokio::time::sleep(Duration::from_secs(600)).await;
        Ok(code.to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn hung_fix_call_times_out() {
    let tester = Arc::new(ScriptedTest::passing());
    let orchestrator = RemediationOrchestrator::new(
        Arc::new(ScriptedAnalysis::failing(strings(&["a"]))),
        Arc::new(SlowFix),
        tester.clone(),
    )
    .with_policy(RemediationPolicy {
        max_depth: 3,
        call_timeout_secs: 5,
    });

    let outcome = orchestrator.remediate(&artifact("x")).await.unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.iterations_used, 0);
    assert!(outcome.residual_suggestions[1].contains("timed out after 5s"));
    assert!(tester.calls().is_empty());
}
