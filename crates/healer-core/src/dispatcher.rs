//! Event routing and per-artifact fan-out.
//!
//! [`EventDispatcher::dispatch`] applies the routing rules, extracts the
//! change set and runs remediate-then-publish for every artifact in its own
//! task. Nothing here returns an error: every failure is logged and counted
//! in the [`DispatchSummary`], so the webhook transport can always
//! acknowledge.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{warn, Instrument};

use crate::domain::{CodeArtifact, Event, ValidationError};
use crate::extractor::ChangeSetExtractor;
use crate::metrics::METRICS;
use crate::obs::{
    emit_artifacts_extracted, emit_event_ignored, emit_event_received, emit_event_rejected,
};
use crate::orchestrator::RemediationOrchestrator;
use crate::publish::{PublishCoordinator, PublishReceipt};

/// Pull request actions that trigger remediation.
pub const PULL_REQUEST_ACTIONS: [&str; 2] = ["opened", "synchronize"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatcherConfig {
    /// Artifacts of one event remediated at the same time.
    pub max_concurrency: usize,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self { max_concurrency: 4 }
    }
}

/// Terminal state of one artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ArtifactStatus {
    Published { receipt: PublishReceipt },
    Skipped { reason: String },
    Failed {
        stage: String,
        error: String,
        /// Findings left unreported when the failure is a publish with no target.
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        residual_suggestions: Vec<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReport {
    pub origin: String,
    pub language: String,
    pub converged: Option<bool>,
    pub iterations_used: Option<u32>,
    #[serde(flatten)]
    pub status: ArtifactStatus,
}

/// What happened to one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub kind: String,
    pub repo: Option<String>,
    pub received_at: DateTime<Utc>,
    /// Set when routing or parsing dropped the event.
    pub ignored: Option<String>,
    /// Set when the change set could not be listed.
    pub error: Option<String>,
    pub extracted: usize,
    pub remediated: usize,
    pub published: usize,
    pub skipped: usize,
    pub failed: usize,
    /// One entry per extracted artifact, in extraction order.
    pub artifacts: Vec<ArtifactReport>,
}

impl DispatchSummary {
    fn new(kind: &str, repo: Option<String>) -> Self {
        Self {
            kind: kind.to_string(),
            repo,
            received_at: Utc::now(),
            ignored: None,
            error: None,
            extracted: 0,
            remediated: 0,
            published: 0,
            skipped: 0,
            failed: 0,
            artifacts: Vec::new(),
        }
    }

    fn ignored(kind: &str, repo: Option<String>, reason: impl Into<String>) -> Self {
        let mut summary = Self::new(kind, repo);
        summary.ignored = Some(reason.into());
        summary
    }

    pub fn is_ignored(&self) -> bool {
        self.ignored.is_some()
    }

    fn record(&mut self, report: ArtifactReport) {
        if report.converged.is_some() {
            self.remediated += 1;
        }
        match report.status {
            ArtifactStatus::Published { .. } => self.published += 1,
            ArtifactStatus::Skipped { .. } => self.skipped += 1,
            ArtifactStatus::Failed { .. } => self.failed += 1,
        }
        self.artifacts.push(report);
    }
}

/// Why `event` is not processed, if it is not.
pub fn ignore_reason(event: &Event) -> Option<String> {
    match event {
        Event::Push(push) if !push.targets_default_branch() => Some(format!(
            "push to {} is not the default branch {}",
            push.git_ref, push.default_branch
        )),
        Event::PullRequest(pr) if !PULL_REQUEST_ACTIONS.contains(&pr.action.as_str()) => {
            Some(format!("pull request action {} is not handled", pr.action))
        }
        Event::Issue(issue) if issue.action != "opened" => {
            Some(format!("issue action {} is not handled", issue.action))
        }
        Event::Issue(issue) if !issue.requests_code_review() => {
            Some("issue does not request a code review".to_string())
        }
        _ => None,
    }
}

/// Routes events through extraction, remediation and publishing.
#[derive(Clone)]
pub struct EventDispatcher {
    extractor: ChangeSetExtractor,
    orchestrator: RemediationOrchestrator,
    publisher: PublishCoordinator,
    config: DispatcherConfig,
}

impl EventDispatcher {
    pub fn new(
        extractor: ChangeSetExtractor,
        orchestrator: RemediationOrchestrator,
        publisher: PublishCoordinator,
    ) -> Self {
        Self {
            extractor,
            orchestrator,
            publisher,
            config: DispatcherConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    /// Parse and dispatch one webhook delivery.
    ///
    /// Unknown kinds are dropped; malformed payloads are logged. Both yield
    /// an empty summary.
    pub async fn dispatch_webhook(&self, kind: &str, payload: serde_json::Value) -> DispatchSummary {
        match Event::from_webhook(kind, payload) {
            Ok(event) => self.dispatch(&event).await,
            Err(e @ ValidationError::UnknownEventKind { .. }) => {
                METRICS.inc_events_received();
                METRICS.inc_events_ignored();
                emit_event_ignored(kind, "", &e.to_string());
                DispatchSummary::ignored(kind, None, e.to_string())
            }
            Err(e) => {
                METRICS.inc_events_received();
                METRICS.inc_events_ignored();
                emit_event_rejected(kind, &e);
                DispatchSummary::ignored(kind, None, e.to_string())
            }
        }
    }

    /// Process one typed event.
    pub async fn dispatch(&self, event: &Event) -> DispatchSummary {
        let kind = event.kind();
        let repo = event.repo().to_string();
        METRICS.inc_events_received();
        emit_event_received(kind, &repo);

        if let Some(reason) = ignore_reason(event) {
            METRICS.inc_events_ignored();
            emit_event_ignored(kind, &repo, &reason);
            return DispatchSummary::ignored(kind, Some(repo), reason);
        }

        let mut summary = DispatchSummary::new(kind, Some(repo.clone()));
        let artifacts = match self.extractor.extract(event).await {
            Ok(artifacts) => artifacts,
            Err(e) => {
                warn!(kind = %kind, repo = %repo, error = %e, "change set extraction failed");
                summary.error = Some(e.to_string());
                return summary;
            }
        };
        summary.extracted = artifacts.len();
        emit_artifacts_extracted(kind, &repo, artifacts.len());

        for report in self.process_all(artifacts).await {
            summary.record(report);
        }
        summary
    }

    async fn process_all(&self, artifacts: Vec<CodeArtifact>) -> Vec<ArtifactReport> {
        let total = artifacts.len();
        let sem = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();

        for (idx, artifact) in artifacts.into_iter().enumerate() {
            let orchestrator = self.orchestrator.clone();
            let publisher = self.publisher.clone();
            let sem = Arc::clone(&sem);
            join_set.spawn(
                async move {
                    let _permit = sem.acquire_owned().await.ok();
                    (idx, process_artifact(&orchestrator, &publisher, artifact).await)
                }
                .in_current_span(),
            );
        }

        let mut ordered: Vec<Option<ArtifactReport>> = vec![None; total];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, report)) => ordered[idx] = Some(report),
                Err(e) => warn!(error = %e, "artifact task join error"),
            }
        }

        ordered
            .into_iter()
            .map(|slot| {
                slot.unwrap_or_else(|| ArtifactReport {
                    origin: String::new(),
                    language: String::new(),
                    converged: None,
                    iterations_used: None,
                    status: ArtifactStatus::Failed {
                        stage: "task".to_string(),
                        error: "artifact task did not complete".to_string(),
                        residual_suggestions: Vec::new(),
                    },
                })
            })
            .collect()
    }
}

async fn process_artifact(
    orchestrator: &RemediationOrchestrator,
    publisher: &PublishCoordinator,
    artifact: CodeArtifact,
) -> ArtifactReport {
    let mut report = ArtifactReport {
        origin: artifact.origin.describe(),
        language: artifact.language.clone(),
        converged: None,
        iterations_used: None,
        status: ArtifactStatus::Skipped {
            reason: String::new(),
        },
    };

    let outcome = match orchestrator.remediate(&artifact).await {
        Ok(outcome) => outcome,
        Err(e) => {
            report.status = ArtifactStatus::Failed {
                stage: "analysis".to_string(),
                error: e.to_string(),
                residual_suggestions: Vec::new(),
            };
            return report;
        }
    };
    report.converged = Some(outcome.converged);
    report.iterations_used = Some(outcome.iterations_used);

    report.status = match publisher
        .publish(&outcome, &artifact.origin, &artifact.language)
        .await
    {
        Ok(PublishReceipt::Skipped { reason }) => ArtifactStatus::Skipped { reason },
        Ok(PublishReceipt::Unpublished {
            reason,
            residual_suggestions,
        }) => ArtifactStatus::Failed {
            stage: "publish".to_string(),
            error: reason,
            residual_suggestions,
        },
        Ok(receipt) => ArtifactStatus::Published { receipt },
        Err(e) => ArtifactStatus::Failed {
            stage: "publish".to_string(),
            error: e.to_string(),
            residual_suggestions: Vec::new(),
        },
    };
    report
}
