//! LLM-backed [`FixGateway`].

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use healer_core::{FixGateway, GatewayResult};
use regex::Regex;

use crate::chat::{ChatModel, ChatPrompt};
use crate::error::LlmError;

const FIX_SYSTEM_PROMPT: &str = "You are a helpful assistant that helps improve code.";

/// User prompt asking for the full corrected code and nothing else.
pub fn fix_prompt(language: &str, code: &str, suggestions: &[String]) -> String {
    let issues = suggestions
        .iter()
        .map(|s| format!("- {s}"))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "You are a skilled {language} developer. Fix the following code based on the issues described below.\n\n\
         Code:\n```{language}\n{code}\n```\n\n\
         Issues and Suggestions:\n{issues}\n\n\
         Apply the fixes and return the full corrected code.\n\
         Only return the fixed code without explanations or markdown formatting."
    )
}

/// Remove a markdown fence wrapping the whole reply, if present.
pub fn strip_code_fence(reply: &str) -> String {
    static WRAPPED: OnceLock<Regex> = OnceLock::new();
    let wrapped = WRAPPED.get_or_init(|| {
        Regex::new(r"(?s)\A\s*```[\w+#.-]*[ \t]*\r?\n(.*?)\r?\n?```\s*\z")
            .expect("fence pattern is valid")
    });

    match wrapped.captures(reply) {
        Some(caps) => caps.get(1).map_or("", |m| m.as_str()).trim().to_string(),
        None => reply.trim().to_string(),
    }
}

/// Rewrites code through a chat model.
#[derive(Clone)]
pub struct LlmFixGateway {
    model: Arc<dyn ChatModel>,
}

impl LlmFixGateway {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl FixGateway for LlmFixGateway {
    async fn fix(&self, language: &str, code: &str, suggestions: &[String]) -> GatewayResult<String> {
        let prompt = ChatPrompt {
            system: FIX_SYSTEM_PROMPT.to_string(),
            user: fix_prompt(language, code, suggestions),
            json_object: false,
        };
        let reply = self.model.complete(&prompt).await?;
        let fixed = strip_code_fence(&reply);
        if fixed.is_empty() {
            return Err(LlmError::EmptyResponse.into());
        }
        Ok(fixed)
    }
}
