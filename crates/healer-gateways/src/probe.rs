//! LLM-backed dynamic testing.
//!
//! The model is asked to generate test cases for the code, evaluate them and
//! answer with `{"passed": bool, "suggestions": [..], "details": [..]}`.

use std::sync::Arc;

use async_trait::async_trait;
use healer_core::{
    AnalysisGateway, AnalysisResult, CodeArtifact, GatewayResult, TestGateway, TestReport,
};
use serde::Deserialize;
use tracing::debug;

use crate::chat::{ChatModel, ChatPrompt};
use crate::error::LlmError;

const TEST_SYSTEM_PROMPT: &str =
    "You are a code testing expert that generates and evaluates test cases.";

/// Dynamic check of code without an artifact origin.
#[async_trait]
pub trait CodeProbe: Send + Sync {
    async fn probe(&self, language: &str, code: &str) -> GatewayResult<AnalysisResult>;
}

pub fn test_prompt(language: &str, code: &str) -> String {
    format!(
        "You are a senior {language} developer performing code review.\n\
         Test the following code for:\n\
         1. Logic errors\n\
         2. Edge cases\n\
         3. Performance issues\n\
         4. Security vulnerabilities\n\n\
         Code:\n```{language}\n{code}\n```\n\n\
         Generate 3-5 test cases that would check for these issues. For each test case include \
         the input values, the expected output and potential failure modes.\n\
         Then evaluate whether the code passes these tests. If not, explain why.\n\
         Format your response as a JSON object with the following structure:\n\
         {{\"passed\": boolean, \"suggestions\": [array of suggestions as strings], \"details\": [array of test case details]}}"
    )
}

#[derive(Deserialize)]
struct TestReply {
    passed: bool,
    #[serde(default)]
    suggestions: Vec<String>,
    #[serde(default)]
    details: Vec<serde_json::Value>,
}

/// Parse a model reply; tolerates prose around the JSON object.
///
/// The verdict is derived from the actionable suggestions. The model's own
/// `passed` flag is only logged when it disagrees.
pub fn parse_test_reply(reply: &str) -> Result<AnalysisResult, LlmError> {
    let json = match (reply.find('{'), reply.rfind('}')) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(LlmError::Parse("reply contains no JSON object".to_string())),
    };
    let parsed: TestReply = serde_json::from_str(json)?;
    let result =
        AnalysisResult::from_suggestions(parsed.suggestions).with_details(parsed.details);
    if parsed.passed != result.passed {
        debug!(
            reported = parsed.passed,
            derived = result.passed,
            "model verdict disagrees with its suggestions"
        );
    }
    Ok(result)
}

/// Tests code by asking a chat model to evaluate generated test cases.
#[derive(Clone)]
pub struct LlmTestGateway {
    model: Arc<dyn ChatModel>,
}

impl LlmTestGateway {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl CodeProbe for LlmTestGateway {
    async fn probe(&self, language: &str, code: &str) -> GatewayResult<AnalysisResult> {
        let prompt = ChatPrompt {
            system: TEST_SYSTEM_PROMPT.to_string(),
            user: test_prompt(language, code),
            json_object: true,
        };
        let reply = self.model.complete(&prompt).await?;
        Ok(parse_test_reply(&reply)?)
    }
}

#[async_trait]
impl TestGateway for LlmTestGateway {
    async fn test(&self, language: &str, code: &str) -> GatewayResult<TestReport> {
        Ok(self.probe(language, code).await?.into())
    }
}

#[async_trait]
impl AnalysisGateway for LlmTestGateway {
    async fn analyze(&self, artifact: &CodeArtifact) -> GatewayResult<AnalysisResult> {
        self.probe(&artifact.language, &artifact.code).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_json() {
        let reply = r#"{"passed": false, "suggestions": ["handle empty input"], "details": [{"case": 1}]}"#;
        let result = parse_test_reply(reply).unwrap();
        assert!(!result.passed);
        assert_eq!(result.suggestions, vec!["handle empty input"]);
        assert_eq!(result.details.len(), 1);
    }

    #[test]
    fn test_parse_json_wrapped_in_prose() {
        let reply = "Here you go:\n```json\n{\"passed\": true}\n```";
        let result = parse_test_reply(reply).unwrap();
        assert!(result.passed);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_cosmetic_suggestions_are_dropped() {
        let reply = r#"{"passed": true, "suggestions": ["All good", "✅ fine"]}"#;
        let result = parse_test_reply(reply).unwrap();
        assert!(result.passed);
        assert!(result.suggestions.is_empty());
    }

    #[test]
    fn test_verdict_follows_actionable_suggestions() {
        let cosmetic = parse_test_reply(r#"{"passed": false, "suggestions": ["All good"]}"#).unwrap();
        assert!(cosmetic.passed);
        assert!(cosmetic.actionable().is_empty());

        let flagged =
            parse_test_reply(r#"{"passed": true, "suggestions": ["off by one in loop bound"]}"#)
                .unwrap();
        assert!(!flagged.passed);
        assert_eq!(flagged.actionable(), vec!["off by one in loop bound"]);
    }

    #[test]
    fn test_unparseable_reply_is_error() {
        assert!(matches!(
            parse_test_reply("the code looks fine"),
            Err(LlmError::Parse(_))
        ));
        assert!(matches!(
            parse_test_reply(r#"{"suggestions": []}"#),
            Err(LlmError::Json(_))
        ));
    }

    #[test]
    fn test_prompt_mentions_json_shape() {
        let prompt = test_prompt("python", "print(1)");
        assert!(prompt.contains("```python\nprint(1)\n```"));
        assert!(prompt.contains("\"passed\": boolean"));
    }
}
