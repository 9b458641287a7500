//! External static linters run as child processes.
//!
//! Each configured language maps to a command line. The code is written to
//! the command's stdin and every non-empty output line is one finding.

use std::collections::BTreeMap;
use std::process::Stdio;
use std::time::Duration;

use healer_core::{GatewayError, GatewayResult};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::LlmError;

/// Canonical language name for the aliases gateways receive.
pub fn normalize_language(language: &str) -> String {
    match language.trim().to_lowercase().as_str() {
        "js" | "jsx" | "node" | "javascript" => "javascript".to_string(),
        "ts" | "tsx" | "typescript" => "typescript".to_string(),
        "py" | "python" | "python3" => "python".to_string(),
        other => other.to_string(),
    }
}

/// Parse `language=command args...` as given on the command line.
pub fn parse_linter_spec(arg: &str) -> Result<(String, Vec<String>), String> {
    let (language, command) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected LANGUAGE=COMMAND, got '{arg}'"))?;
    let argv: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if language.trim().is_empty() || argv.is_empty() {
        return Err(format!("expected LANGUAGE=COMMAND, got '{arg}'"));
    }
    Ok((normalize_language(language), argv))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinterConfig {
    /// Command line per normalized language.
    pub commands: BTreeMap<String, Vec<String>>,
    pub timeout_secs: u64,
}

impl Default for LinterConfig {
    fn default() -> Self {
        Self {
            commands: BTreeMap::new(),
            timeout_secs: 30,
        }
    }
}

impl LinterConfig {
    pub fn with_command(mut self, language: &str, argv: Vec<String>) -> Self {
        self.commands.insert(normalize_language(language), argv);
        self
    }
}

/// Runs the linter configured for a language.
#[derive(Debug, Clone, Default)]
pub struct CommandLinter {
    config: LinterConfig,
}

impl CommandLinter {
    pub fn new(config: LinterConfig) -> Self {
        Self { config }
    }

    pub fn supports(&self, language: &str) -> bool {
        self.config
            .commands
            .contains_key(&normalize_language(language))
    }

    /// Findings for `code`, or `None` when no linter is configured for `language`.
    pub async fn lint(&self, language: &str, code: &str) -> GatewayResult<Option<Vec<String>>> {
        let Some(argv) = self.config.commands.get(&normalize_language(language)) else {
            return Ok(None);
        };
        let limit = Duration::from_secs(self.config.timeout_secs.max(1));
        match tokio::time::timeout(limit, run_linter(argv, code)).await {
            Ok(result) => Ok(Some(result?)),
            Err(_) => Err(GatewayError::Timeout {
                gateway: "lint",
                secs: limit.as_secs(),
            }),
        }
    }
}

async fn run_linter(argv: &[String], code: &str) -> Result<Vec<String>, LlmError> {
    let (exe, args) = argv
        .split_first()
        .ok_or_else(|| LlmError::Command("empty linter command".to_string()))?;

    let mut child = Command::new(exe)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        let input = code.as_bytes().to_vec();
        tokio::spawn(async move {
            // A linter that exits without reading stdin closes the pipe early.
            let _ = stdin.write_all(&input).await;
        });
    }

    let output = child.wait_with_output().await?;
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    debug!(command = %exe, status = ?output.status.code(), "linter finished");

    let findings = output_lines(&stdout);
    if !findings.is_empty() || output.status.success() {
        return Ok(findings);
    }
    let diagnostics = output_lines(&stderr);
    if diagnostics.is_empty() {
        return Err(LlmError::Command(format!(
            "{exe} exited with {} and no output",
            output.status
        )));
    }
    Ok(diagnostics)
}

fn output_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_normalize_language() {
        assert_eq!(normalize_language("JS"), "javascript");
        assert_eq!(normalize_language("node"), "javascript");
        assert_eq!(normalize_language("tsx"), "typescript");
        assert_eq!(normalize_language("py"), "python");
        assert_eq!(normalize_language("go"), "go");
    }

    #[test]
    fn test_parse_linter_spec() {
        let (lang, cmd) = parse_linter_spec("py=pyflakes -").unwrap();
        assert_eq!(lang, "python");
        assert_eq!(cmd, argv(&["pyflakes", "-"]));
        assert!(parse_linter_spec("pyflakes").is_err());
        assert!(parse_linter_spec("python=").is_err());
    }

    #[tokio::test]
    async fn test_unconfigured_language_is_none() {
        let linter = CommandLinter::default();
        assert!(!linter.supports("javascript"));
        assert_eq!(linter.lint("javascript", "x").await.unwrap(), None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_each_output_line_is_a_finding() {
        let linter = CommandLinter::new(
            LinterConfig::default().with_command("javascript", argv(&["cat"])),
        );
        let findings = linter
            .lint("js", "line 1: missing semicolon\n\nline 2: unused var\n")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            findings,
            vec!["line 1: missing semicolon", "line 2: unused var"]
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_success_is_clean() {
        let linter =
            CommandLinter::new(LinterConfig::default().with_command("python", argv(&["true"])));
        assert_eq!(linter.lint("python", "print(1)").await.unwrap(), Some(vec![]));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_failure_is_unavailable() {
        let linter =
            CommandLinter::new(LinterConfig::default().with_command("python", argv(&["false"])));
        assert!(matches!(
            linter.lint("python", "print(1)").await,
            Err(GatewayError::Unavailable(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let linter = CommandLinter::new(
            LinterConfig::default().with_command("python", argv(&["healer-no-such-linter"])),
        );
        assert!(matches!(
            linter.lint("python", "print(1)").await,
            Err(GatewayError::Unavailable(_))
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_hung_linter_times_out() {
        let mut config = LinterConfig::default().with_command("python", argv(&["sleep", "5"]));
        config.timeout_secs = 1;
        let linter = CommandLinter::new(config);
        assert!(matches!(
            linter.lint("python", "print(1)").await,
            Err(GatewayError::Timeout { gateway: "lint", secs: 1 })
        ));
    }
}
