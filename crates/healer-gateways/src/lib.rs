//! Healer Gateways
//!
//! Concrete analysis, fix and test gateways:
//! - `ChatClient`: OpenAI-compatible chat completions transport
//! - `LlmFixGateway`: rewrites code from a list of findings
//! - `LlmTestGateway`: generates and evaluates test cases
//! - `CommandLinter`: external static linters run as child processes
//! - `CompositeAnalysisGateway`: linter first, then the dynamic probe

pub mod chat;
pub mod composite;
pub mod error;
pub mod fix;
pub mod lint;
pub mod probe;

pub use chat::{first_choice, ChatClient, ChatConfig, ChatModel, ChatPrompt};
pub use composite::CompositeAnalysisGateway;
pub use error::LlmError;
pub use fix::{fix_prompt, strip_code_fence, LlmFixGateway};
pub use lint::{normalize_language, parse_linter_spec, CommandLinter, LinterConfig};
pub use probe::{parse_test_reply, test_prompt, CodeProbe, LlmTestGateway};
