//! Bounded analyze → fix → test convergence loop.
//!
//! [`RemediationOrchestrator::remediate`] analyzes an artifact once, then runs
//! at most `max_depth` fix/test cycles. Termination is guaranteed by the depth
//! bound, not by convergence. Fix/test failures downgrade to a non-converged
//! outcome carrying the last good code; only analysis failure is an error.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::Instrument;
use uuid::Uuid;

use crate::domain::{
    filter_cosmetic, CodeArtifact, CycleRecord, HealerError, RemediationAttempt,
    RemediationOutcome, Result, MAX_DEPTH,
};
use crate::gateway::{AnalysisGateway, FixGateway, GatewayError, GatewayResult, TestGateway};
use crate::metrics::METRICS;
use crate::obs::{
    emit_analysis_unavailable, emit_cycle_completed, emit_remediation_finished,
    emit_remediation_started, emit_tooling_failure, remediation_span,
};

/// Bounds applied to every remediation run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationPolicy {
    /// Fix/test cycles allowed; values above [`MAX_DEPTH`] are clamped.
    pub max_depth: u32,
    /// Wall-clock limit per gateway call.
    pub call_timeout_secs: u64,
}

impl Default for RemediationPolicy {
    fn default() -> Self {
        Self {
            max_depth: MAX_DEPTH,
            call_timeout_secs: 60,
        }
    }
}

impl RemediationPolicy {
    pub fn effective_max_depth(&self) -> u32 {
        self.max_depth.clamp(1, MAX_DEPTH)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs.max(1))
    }
}

/// Drives one artifact from first analysis to a terminal outcome.
#[derive(Clone)]
pub struct RemediationOrchestrator {
    analysis: Arc<dyn AnalysisGateway>,
    fixer: Arc<dyn FixGateway>,
    tester: Arc<dyn TestGateway>,
    policy: RemediationPolicy,
}

impl RemediationOrchestrator {
    pub fn new(
        analysis: Arc<dyn AnalysisGateway>,
        fixer: Arc<dyn FixGateway>,
        tester: Arc<dyn TestGateway>,
    ) -> Self {
        Self {
            analysis,
            fixer,
            tester,
            policy: RemediationPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RemediationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> &RemediationPolicy {
        &self.policy
    }

    /// Remediate one artifact.
    ///
    /// Returns `HealerError::AnalysisUnavailable` when the initial analysis
    /// fails or times out; every later failure is folded into the outcome.
    pub async fn remediate(&self, artifact: &CodeArtifact) -> Result<RemediationOutcome> {
        let run_id = Uuid::new_v4().to_string();
        let origin = artifact.origin.describe();
        let span = remediation_span(&run_id, &origin, &artifact.language);
        self.run(&run_id, &origin, artifact).instrument(span).await
    }

    async fn run(
        &self,
        run_id: &str,
        origin: &str,
        artifact: &CodeArtifact,
    ) -> Result<RemediationOutcome> {
        emit_remediation_started(run_id, origin);
        let started = Instant::now();

        let analysis = bounded(
            "analysis",
            self.policy.call_timeout(),
            self.analysis.analyze(artifact),
        )
        .await
        .map_err(|e| {
            emit_analysis_unavailable(run_id, origin, &e);
            HealerError::AnalysisUnavailable(e)
        })?;

        let suggestions = analysis.actionable();
        let outcome = if suggestions.is_empty() {
            RemediationOutcome::clean(artifact.code.clone())
        } else {
            self.converge(run_id, RemediationAttempt::initial(artifact.clone(), suggestions))
                .await
        };

        METRICS.inc_artifacts_remediated();
        if outcome.converged {
            METRICS.inc_converged();
        } else if outcome.exhausted(self.policy.effective_max_depth()) {
            METRICS.inc_exhausted();
        }
        emit_remediation_finished(
            run_id,
            outcome.converged,
            outcome.iterations_used,
            outcome.residual_suggestions.len(),
            started.elapsed().as_millis() as u64,
        );
        Ok(outcome)
    }

    async fn converge(&self, run_id: &str, first: RemediationAttempt) -> RemediationOutcome {
        let max_depth = self.policy.effective_max_depth();
        let timeout = self.policy.call_timeout();
        let addressed = first.suggestions.clone();
        let mut cycles = Vec::new();
        let mut attempt = first;

        loop {
            let depth = attempt.depth;
            let language = attempt.artifact.language.as_str();

            let fixed = match bounded(
                "fix",
                timeout,
                self.fixer
                    .fix(language, &attempt.artifact.code, &attempt.suggestions),
            )
            .await
            .and_then(require_code)
            {
                Ok(code) => code,
                Err(e) => {
                    return tooling_failure(
                        run_id,
                        "fix",
                        e,
                        attempt.artifact.code.clone(),
                        depth,
                        attempt.suggestions,
                        addressed,
                        cycles,
                    );
                }
            };

            let report = match bounded("test", timeout, self.tester.test(language, &fixed)).await {
                Ok(report) => report,
                Err(e) => {
                    return tooling_failure(
                        run_id,
                        "test",
                        e,
                        fixed,
                        depth + 1,
                        attempt.suggestions,
                        addressed,
                        cycles,
                    );
                }
            };

            let remaining = filter_cosmetic(report.suggestions);
            let passed = report.passed || remaining.is_empty();
            emit_cycle_completed(run_id, depth, passed, remaining.len());
            cycles.push(CycleRecord {
                depth,
                suggestions_in: attempt.suggestions.clone(),
                suggestions_out: remaining.clone(),
                passed,
            });

            if passed {
                return RemediationOutcome {
                    final_code: fixed,
                    converged: true,
                    iterations_used: depth + 1,
                    residual_suggestions: Vec::new(),
                    addressed_suggestions: addressed,
                    cycles,
                };
            }

            if depth + 1 < max_depth {
                attempt = attempt.next(&fixed, remaining);
                continue;
            }

            return RemediationOutcome {
                final_code: fixed,
                converged: false,
                iterations_used: depth + 1,
                residual_suggestions: remaining,
                addressed_suggestions: addressed,
                cycles,
            };
        }
    }
}

/// Run a gateway call under a wall-clock limit; a timeout is a gateway failure.
async fn bounded<T, F>(gateway: &'static str, limit: Duration, call: F) -> GatewayResult<T>
where
    F: Future<Output = GatewayResult<T>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(GatewayError::Timeout {
            gateway,
            secs: limit.as_secs(),
        }),
    }
}

fn require_code(code: String) -> GatewayResult<String> {
    if code.trim().is_empty() {
        return Err(GatewayError::Malformed("fix returned no code".to_string()));
    }
    Ok(code)
}

/// Non-converged outcome for a fix/test failure mid-loop.
///
/// `final_code` is the most recent successfully fixed code (or the original
/// code when no fix succeeded); the outstanding findings are kept and a
/// synthetic finding describes the failure.
#[allow(clippy::too_many_arguments)]
fn tooling_failure(
    run_id: &str,
    stage: &'static str,
    error: GatewayError,
    final_code: String,
    iterations_used: u32,
    outstanding: Vec<String>,
    addressed: Vec<String>,
    cycles: Vec<CycleRecord>,
) -> RemediationOutcome {
    let synthetic = format!("tooling failure during {stage}: {error}");
    let failure = HealerError::FixOrTestUnavailable {
        stage,
        source: error,
    };
    emit_tooling_failure(run_id, stage, &failure);
    METRICS.inc_tooling_failures();

    let mut residual_suggestions = outstanding;
    residual_suggestions.push(synthetic);

    RemediationOutcome {
        final_code,
        converged: false,
        iterations_used,
        residual_suggestions,
        addressed_suggestions: addressed,
        cycles,
    }
}
