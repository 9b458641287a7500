//! Loop iterations and terminal results of a remediation run.

use serde::{Deserialize, Serialize};

use super::artifact::CodeArtifact;

/// Hard upper bound on fix/test cycles per remediation run.
pub const MAX_DEPTH: u32 = 3;

/// One iteration of the fix/test loop.
///
/// `depth` counts the cycles already performed; it is carried explicitly
/// and never mixed into `suggestions`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemediationAttempt {
    pub depth: u32,
    pub artifact: CodeArtifact,
    pub suggestions: Vec<String>,
}

impl RemediationAttempt {
    pub fn initial(artifact: CodeArtifact, suggestions: Vec<String>) -> Self {
        Self {
            depth: 0,
            artifact,
            suggestions,
        }
    }

    /// The attempt that consumes this attempt's fixed code and test findings.
    pub fn next(&self, fixed_code: &str, suggestions: Vec<String>) -> Self {
        Self {
            depth: self.depth + 1,
            artifact: self.artifact.with_code(fixed_code),
            suggestions,
        }
    }
}

/// Audit record for one completed fix/test cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleRecord {
    pub depth: u32,
    pub suggestions_in: Vec<String>,
    pub suggestions_out: Vec<String>,
    pub passed: bool,
}

/// Terminal result of the remediation loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemediationOutcome {
    pub final_code: String,
    pub converged: bool,
    pub iterations_used: u32,
    pub residual_suggestions: Vec<String>,
    /// Findings of the initial analysis that the loop worked on.
    #[serde(default)]
    pub addressed_suggestions: Vec<String>,
    #[serde(default)]
    pub cycles: Vec<CycleRecord>,
}

impl RemediationOutcome {
    /// Outcome for code that passed its first analysis.
    pub fn clean(code: impl Into<String>) -> Self {
        Self {
            final_code: code.into(),
            converged: true,
            iterations_used: 0,
            residual_suggestions: Vec::new(),
            addressed_suggestions: Vec::new(),
            cycles: Vec::new(),
        }
    }

    /// Whether the loop changed the code at all.
    pub fn improved(&self) -> bool {
        self.iterations_used > 0
    }

    /// Whether the loop ran out of its `max_depth` cycles with findings left.
    pub fn exhausted(&self, max_depth: u32) -> bool {
        !self.converged && self.iterations_used >= max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::artifact::{IssueLocation, Origin, RepoRef};

    #[test]
    fn test_next_attempt_consumes_prior_step() {
        let artifact = CodeArtifact::new(
            "for (i = 0; i < 3; i++) {}",
            "javascript",
            Origin::Issue(IssueLocation {
                repo: RepoRef::new("o", "r"),
                issue_number: 1,
            }),
        );
        let first = RemediationAttempt::initial(artifact, vec!["a".to_string()]);
        let second = first.next("for (let i = 0; i < 3; i++) {}", vec!["b".to_string()]);

        assert_eq!(first.depth, 0);
        assert_eq!(second.depth, 1);
        assert_eq!(second.artifact.code, "for (let i = 0; i < 3; i++) {}");
        assert_eq!(second.suggestions, vec!["b".to_string()]);
        assert_eq!(second.artifact.origin, first.artifact.origin);
    }

    #[test]
    fn test_clean_outcome() {
        let outcome = RemediationOutcome::clean("x = 1");
        assert!(outcome.converged);
        assert!(!outcome.improved());
        assert!(!outcome.exhausted(MAX_DEPTH));
    }
}
