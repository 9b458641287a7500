//! Healer Core Library
//!
//! Event routing, change-set extraction, the bounded analyze → fix → test
//! loop and result publishing. Concrete hosting and gateway clients live in
//! `healer-github` and `healer-gateways`; this crate only sees their traits.

pub mod dispatcher;
pub mod domain;
pub mod extractor;
pub mod fakes;
pub mod gateway;
pub mod hosting;
pub mod metrics;
pub mod obs;
pub mod orchestrator;
pub mod publish;
pub mod telemetry;

pub use domain::{
    filter_cosmetic, is_cosmetic_marker, language_for_path, AnalysisResult, CodeArtifact,
    CycleRecord, Event, FileLocation, HealerError, IssueEvent, IssueLocation, Origin,
    PullRequestEvent, PushCommit, PushEvent, RemediationAttempt, RemediationOutcome, RepoRef,
    Result, TestReport, ValidationError, MAX_DEPTH,
};

pub use dispatcher::{
    ignore_reason, ArtifactReport, ArtifactStatus, DispatchSummary, DispatcherConfig,
    EventDispatcher,
};
pub use extractor::{extract_code_blocks, ChangeSetExtractor, CodeBlock, ExtractorConfig};
pub use gateway::{AnalysisGateway, FixGateway, GatewayError, GatewayResult, TestGateway};
pub use hosting::{
    FileContent, FileUpdate, HostingError, HostingResult, HostingService, LazyHosting,
    NewPullRequest, PullRequestRef,
};
pub use metrics::METRICS;
pub use orchestrator::{RemediationOrchestrator, RemediationPolicy};
pub use publish::{content_digest, plan_publication, PublishCoordinator, PublishPlan, PublishReceipt};

/// Healer version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
