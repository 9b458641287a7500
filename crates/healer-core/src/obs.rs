//! Structured observability hooks for the remediation pipeline.
//!
//! This module provides:
//! - A run-scoped tracing span for one remediation run (`remediation_span`)
//! - Emission functions for key lifecycle events: event routing, loop cycles,
//!   loop termination and publishing
//!
//! Events are emitted at `info!` level, failures at `warn!`.
//! For JSON output, initialise tracing with `json = true`.

use tracing::{info, warn};

/// Span tagging every log line of one remediation run with its `run_id`.
///
/// Attach with `tracing::Instrument::instrument` so it follows the future
/// across await points.
pub fn remediation_span(run_id: &str, origin: &str, language: &str) -> tracing::Span {
    tracing::info_span!(
        "healer.remediation",
        run_id = %run_id,
        origin = %origin,
        language = %language,
    )
}

/// Emit event: a webhook delivery was received.
pub fn emit_event_received(kind: &str, repo: &str) {
    info!(event = "event.received", kind = %kind, repo = %repo);
}

/// Emit event: a well-formed event was filtered out by routing rules.
pub fn emit_event_ignored(kind: &str, repo: &str, reason: &str) {
    info!(event = "event.ignored", kind = %kind, repo = %repo, reason = %reason);
}

/// Emit event: a delivery could not be parsed (warning level).
pub fn emit_event_rejected(kind: &str, error: &dyn std::fmt::Display) {
    warn!(event = "event.rejected", kind = %kind, error = %error);
}

/// Emit event: the change set of an event was extracted.
pub fn emit_artifacts_extracted(kind: &str, repo: &str, count: usize) {
    info!(event = "event.extracted", kind = %kind, repo = %repo, artifacts = count);
}

/// Emit event: a remediation run started.
pub fn emit_remediation_started(run_id: &str, origin: &str) {
    info!(event = "remediation.started", run_id = %run_id, origin = %origin);
}

/// Emit event: one fix/test cycle completed.
pub fn emit_cycle_completed(run_id: &str, depth: u32, passed: bool, remaining: usize) {
    info!(
        event = "remediation.cycle",
        run_id = %run_id,
        depth = depth,
        passed = passed,
        remaining = remaining,
    );
}

/// Emit event: a fix or test call failed mid-loop (warning level).
pub fn emit_tooling_failure(run_id: &str, stage: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "remediation.tooling_failure",
        run_id = %run_id,
        stage = %stage,
        error = %error,
    );
}

/// Emit event: the initial analysis failed; the artifact is abandoned (warning level).
pub fn emit_analysis_unavailable(run_id: &str, origin: &str, error: &dyn std::fmt::Display) {
    warn!(
        event = "remediation.analysis_unavailable",
        run_id = %run_id,
        origin = %origin,
        error = %error,
    );
}

/// Emit event: a remediation run finished.
pub fn emit_remediation_finished(
    run_id: &str,
    converged: bool,
    iterations_used: u32,
    residual: usize,
    duration_ms: u64,
) {
    info!(
        event = "remediation.finished",
        run_id = %run_id,
        converged = converged,
        iterations_used = iterations_used,
        residual = residual,
        duration_ms = duration_ms,
    );
}

/// Emit event: a result was published.
pub fn emit_publish_completed(origin: &str, target: &str) {
    info!(event = "publish.completed", origin = %origin, target = %target);
}

/// Emit event: nothing was published for an artifact.
pub fn emit_publish_skipped(origin: &str, reason: &str) {
    info!(event = "publish.skipped", origin = %origin, reason = %reason);
}

/// Emit event: the hosting service rejected a publish (warning level).
pub fn emit_publish_failed(origin: &str, error: &dyn std::fmt::Display) {
    warn!(event = "publish.failed", origin = %origin, error = %error);
}
