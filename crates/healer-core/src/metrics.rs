//! Global atomic counters for Healer observability.
//!
//! Counters are incremented silently at the call site. Call
//! [`Metrics::flush`] to emit current values as a single
//! `tracing::info!` event (e.g. after a delivery was processed).

use std::sync::atomic::{AtomicU64, Ordering};

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Process-wide atomic counters.
pub struct Metrics {
    events_received: AtomicU64,
    events_ignored: AtomicU64,
    artifacts_remediated: AtomicU64,
    remediations_converged: AtomicU64,
    remediations_exhausted: AtomicU64,
    tooling_failures: AtomicU64,
    publish_failures: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            events_received: AtomicU64::new(0),
            events_ignored: AtomicU64::new(0),
            artifacts_remediated: AtomicU64::new(0),
            remediations_converged: AtomicU64::new(0),
            remediations_exhausted: AtomicU64::new(0),
            tooling_failures: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }
    }

    pub fn inc_events_received(&self) {
        self.events_received.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_received", "counter incremented");
    }

    pub fn inc_events_ignored(&self) {
        self.events_ignored.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "events_ignored", "counter incremented");
    }

    pub fn inc_artifacts_remediated(&self) {
        self.artifacts_remediated.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "artifacts_remediated", "counter incremented");
    }

    pub fn inc_converged(&self) {
        self.remediations_converged.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "remediations_converged", "counter incremented");
    }

    pub fn inc_exhausted(&self) {
        self.remediations_exhausted.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "remediations_exhausted", "counter incremented");
    }

    pub fn inc_tooling_failures(&self) {
        self.tooling_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "tooling_failures", "counter incremented");
    }

    pub fn inc_publish_failures(&self) {
        self.publish_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(metric = "publish_failures", "counter incremented");
    }

    /// Emit all current counter values as a single `info!` event.
    ///
    /// Call this at natural boundaries (end of a delivery, CLI exit)
    /// rather than on every increment.
    pub fn flush(&self) {
        tracing::info!(
            metric = "flush",
            events_received = self.events_received(),
            events_ignored = self.events_ignored(),
            artifacts_remediated = self.artifacts_remediated(),
            remediations_converged = self.remediations_converged(),
            remediations_exhausted = self.remediations_exhausted(),
            tooling_failures = self.tooling_failures(),
            publish_failures = self.publish_failures(),
        );
    }

    pub fn events_received(&self) -> u64 {
        self.events_received.load(Ordering::Relaxed)
    }

    pub fn events_ignored(&self) -> u64 {
        self.events_ignored.load(Ordering::Relaxed)
    }

    pub fn artifacts_remediated(&self) -> u64 {
        self.artifacts_remediated.load(Ordering::Relaxed)
    }

    pub fn remediations_converged(&self) -> u64 {
        self.remediations_converged.load(Ordering::Relaxed)
    }

    pub fn remediations_exhausted(&self) -> u64 {
        self.remediations_exhausted.load(Ordering::Relaxed)
    }

    pub fn tooling_failures(&self) -> u64 {
        self.tooling_failures.load(Ordering::Relaxed)
    }

    pub fn publish_failures(&self) -> u64 {
        self.publish_failures.load(Ordering::Relaxed)
    }
}
