//! Analysis and test results reported by the gateways.

use serde::{Deserialize, Serialize};

/// Output of a static/dynamic quality analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub passed: bool,
    pub suggestions: Vec<String>,
    #[serde(default)]
    pub details: Vec<serde_json::Value>,
}

impl AnalysisResult {
    /// Build a result whose `passed` flag is derived from the filtered suggestions.
    pub fn from_suggestions(suggestions: Vec<String>) -> Self {
        let suggestions = filter_cosmetic(suggestions);
        Self {
            passed: suggestions.is_empty(),
            suggestions,
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<serde_json::Value>) -> Self {
        self.details = details;
        self
    }

    /// Filtered suggestions, in their original order.
    pub fn actionable(&self) -> Vec<String> {
        filter_cosmetic(self.suggestions.clone())
    }
}

/// Verdict of the "did the fix work" check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestReport {
    pub passed: bool,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

impl TestReport {
    pub fn pass() -> Self {
        Self {
            passed: true,
            suggestions: Vec::new(),
        }
    }

    pub fn fail(suggestions: Vec<String>) -> Self {
        Self {
            passed: false,
            suggestions,
        }
    }
}

impl From<AnalysisResult> for TestReport {
    fn from(result: AnalysisResult) -> Self {
        Self {
            passed: result.passed,
            suggestions: result.suggestions,
        }
    }
}

/// Whether a suggestion is an "all clear" marker rather than a finding.
pub fn is_cosmetic_marker(suggestion: &str) -> bool {
    suggestion.trim_start().starts_with('✅') || suggestion.to_lowercase().contains("all good")
}

/// Drop cosmetic pass markers, preserving the order of real findings.
pub fn filter_cosmetic(suggestions: Vec<String>) -> Vec<String> {
    suggestions
        .into_iter()
        .filter(|s| !is_cosmetic_marker(s))
        .collect()
}
