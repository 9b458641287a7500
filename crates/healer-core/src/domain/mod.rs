//! Healer domain model.
//!
//! - [`artifact`]: `CodeArtifact`, `Origin`, `RepoRef`, language mapping
//! - [`analysis`]: `AnalysisResult`, `TestReport`, cosmetic-marker filtering
//! - [`outcome`]: `RemediationAttempt`, `RemediationOutcome`, `MAX_DEPTH`
//! - [`event`]: `Event` and webhook payload parsing
//! - [`error`]: `ValidationError`, `HealerError`

pub mod analysis;
pub mod artifact;
pub mod error;
pub mod event;
pub mod outcome;

pub use analysis::{filter_cosmetic, is_cosmetic_marker, AnalysisResult, TestReport};
pub use artifact::{language_for_path, CodeArtifact, FileLocation, IssueLocation, Origin, RepoRef};
pub use error::{HealerError, Result, ValidationError};
pub use event::{Event, IssueEvent, PullRequestEvent, PushCommit, PushEvent};
pub use outcome::{CycleRecord, RemediationAttempt, RemediationOutcome, MAX_DEPTH};
