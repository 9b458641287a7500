//! Static-then-dynamic analysis.
//!
//! A configured linter runs first; any actionable finding it reports is the
//! result. Clean or unsupported code goes on to the dynamic probe.

use std::sync::Arc;

use async_trait::async_trait;
use healer_core::{
    AnalysisGateway, AnalysisResult, CodeArtifact, GatewayResult, TestGateway, TestReport,
};
use tracing::{debug, warn};

use crate::lint::CommandLinter;
use crate::probe::CodeProbe;

#[derive(Clone)]
pub struct CompositeAnalysisGateway {
    linter: Option<CommandLinter>,
    dynamic: Arc<dyn CodeProbe>,
}

impl CompositeAnalysisGateway {
    pub fn new(dynamic: Arc<dyn CodeProbe>) -> Self {
        Self {
            linter: None,
            dynamic,
        }
    }

    pub fn with_linter(mut self, linter: CommandLinter) -> Self {
        self.linter = Some(linter);
        self
    }

    async fn evaluate(&self, language: &str, code: &str) -> GatewayResult<AnalysisResult> {
        if let Some(linter) = &self.linter {
            match linter.lint(language, code).await {
                Ok(Some(findings)) => {
                    let result = AnalysisResult::from_suggestions(findings);
                    if !result.passed {
                        debug!(language, findings = result.suggestions.len(), "static analysis found issues");
                        return Ok(result);
                    }
                }
                Ok(None) => {}
                // The probe still gives a verdict without the linter.
                Err(err) => warn!(language, error = %err, "static analysis failed"),
            }
        }
        self.dynamic.probe(language, code).await
    }
}

#[async_trait]
impl AnalysisGateway for CompositeAnalysisGateway {
    async fn analyze(&self, artifact: &CodeArtifact) -> GatewayResult<AnalysisResult> {
        self.evaluate(&artifact.language, &artifact.code).await
    }
}

#[async_trait]
impl TestGateway for CompositeAnalysisGateway {
    async fn test(&self, language: &str, code: &str) -> GatewayResult<TestReport> {
        Ok(self.evaluate(language, code).await?.into())
    }
}
