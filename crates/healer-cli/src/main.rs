//! Healer CLI
//!
//! The `healer` command feeds change events through the remediation pipeline.
//!
//! ## Commands
//!
//! - `dispatch`: process one webhook delivery read from a JSON file
//! - `remediate`: run the fix/test loop on a local file
//! - `blocks`: list the fenced code blocks of a markdown file

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use healer_core::telemetry::init_tracing;
use healer_core::{
    extract_code_blocks, language_for_path, ChangeSetExtractor, CodeArtifact, CodeBlock,
    DispatchSummary, DispatcherConfig, EventDispatcher, ExtractorConfig, FileLocation,
    HostingService, LazyHosting, Origin, PublishCoordinator, RemediationOrchestrator,
    RemediationOutcome, RemediationPolicy, RepoRef, MAX_DEPTH, METRICS,
};
use healer_gateways::chat::{DEFAULT_BASE_URL, DEFAULT_MODEL};
use healer_gateways::{
    parse_linter_spec, ChatClient, ChatConfig, ChatModel, CommandLinter,
    CompositeAnalysisGateway, LinterConfig, LlmFixGateway, LlmTestGateway,
};
use healer_github::{AppCredentials, GitHubClient, GitHubConfig, DEFAULT_API_URL};
use serde::Serialize;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "healer")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Automated remediation for repository change events", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(flatten)]
    service: ServiceArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Credentials, endpoints and pipeline bounds.
#[derive(Args, Debug, Clone)]
struct ServiceArgs {
    /// GitHub token used for reads and writes
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true, global = true)]
    github_token: Option<String>,

    /// GitHub App id; with the installation id and private key it replaces the token
    #[arg(long, env = "GITHUB_APP_ID", global = true)]
    github_app_id: Option<String>,

    #[arg(long, env = "GITHUB_APP_INSTALLATION_ID", global = true)]
    github_app_installation_id: Option<String>,

    /// PEM private key of the GitHub App
    #[arg(long, env = "GITHUB_APP_PRIVATE_KEY", hide_env_values = true, global = true)]
    github_app_private_key: Option<String>,

    #[arg(long, env = "GITHUB_API_URL", default_value = DEFAULT_API_URL, global = true)]
    github_api_url: String,

    /// API key for the chat completions endpoint
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true, global = true)]
    llm_api_key: Option<String>,

    #[arg(long, env = "HEALER_LLM_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    llm_base_url: String,

    #[arg(long, env = "HEALER_LLM_MODEL", default_value = DEFAULT_MODEL, global = true)]
    llm_model: String,

    /// Wall-clock limit for each analysis, fix or test call
    #[arg(long, env = "HEALER_CALL_TIMEOUT_SECS", default_value_t = 60, global = true)]
    call_timeout_secs: u64,

    /// Fix/test cycles per artifact (at most 3)
    #[arg(long, env = "HEALER_MAX_DEPTH", default_value_t = MAX_DEPTH, global = true)]
    max_depth: u32,

    /// Artifacts of one event remediated at the same time
    #[arg(long, env = "HEALER_MAX_CONCURRENCY", default_value_t = 4, global = true)]
    max_concurrency: usize,

    /// File suffixes eligible for remediation (default: .js,.py,.ts,.jsx,.tsx)
    #[arg(long = "extension", env = "HEALER_EXTENSIONS", value_delimiter = ',', global = true)]
    extensions: Vec<String>,

    /// Static linter for a language, e.g. `python=pyflakes -`
    #[arg(
        long = "linter",
        value_name = "LANG=COMMAND",
        env = "HEALER_LINTERS",
        value_delimiter = ';',
        value_parser = parse_linter_spec,
        global = true
    )]
    linters: Vec<(String, Vec<String>)>,
}

#[derive(Subcommand)]
enum Commands {
    /// Process one webhook delivery and print the dispatch summary
    Dispatch {
        /// Event kind (push, pull_request, issues)
        #[arg(long)]
        event: String,

        /// Path to the JSON payload
        #[arg(long)]
        payload: PathBuf,
    },

    /// Run the fix/test loop on a local file and print the outcome
    Remediate {
        /// Source file to remediate
        file: PathBuf,

        /// Language override (default: inferred from the extension)
        #[arg(short, long)]
        language: Option<String>,

        /// Write the improved code back to the file
        #[arg(short, long)]
        write: bool,
    },

    /// Print the fenced code blocks of a markdown file
    Blocks {
        /// Markdown file, e.g. an issue body
        file: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(cli.json, level);

    let result = match cli.command {
        Commands::Dispatch { event, payload } => cmd_dispatch(&cli.service, &event, &payload).await,
        Commands::Remediate {
            file,
            language,
            write,
        } => cmd_remediate(&cli.service, &file, language.as_deref(), write).await,
        Commands::Blocks { file } => cmd_blocks(&file),
    };

    METRICS.flush();
    result
}

impl ServiceArgs {
    fn github_config(&self) -> GitHubConfig {
        let mut config =
            GitHubConfig::new(&self.github_api_url).with_timeout_secs(self.call_timeout_secs);
        if let Some(token) = &self.github_token {
            config = config.with_token(token);
        }
        if let (Some(app_id), Some(installation_id), Some(key)) = (
            &self.github_app_id,
            &self.github_app_installation_id,
            &self.github_app_private_key,
        ) {
            config = config.with_app(AppCredentials::new(app_id, installation_id, key));
        }
        config
    }

    fn chat_config(&self) -> ChatConfig {
        let config = ChatConfig::new(&self.llm_base_url, &self.llm_model);
        match &self.llm_api_key {
            Some(key) => config.with_api_key(key),
            None => config,
        }
    }

    fn linter_config(&self) -> LinterConfig {
        self.linters
            .iter()
            .fold(LinterConfig::default(), |config, (language, argv)| {
                config.with_command(language, argv.clone())
            })
    }

    fn extractor_config(&self) -> ExtractorConfig {
        let extensions: Vec<String> = self
            .extensions
            .iter()
            .map(|e| e.trim())
            .filter(|e| !e.is_empty())
            .map(|e| {
                if e.starts_with('.') {
                    e.to_string()
                } else {
                    format!(".{e}")
                }
            })
            .collect();
        if extensions.is_empty() {
            ExtractorConfig::default()
        } else {
            ExtractorConfig { extensions }
        }
    }

    fn policy(&self) -> RemediationPolicy {
        RemediationPolicy {
            max_depth: self.max_depth,
            call_timeout_secs: self.call_timeout_secs,
        }
    }
}

/// Shared GitHub client, built on the first hosting call.
fn github_hosting(service: &ServiceArgs) -> LazyHosting {
    let config = service.github_config();
    LazyHosting::new(move || {
        let client = GitHubClient::new(config.clone())?;
        Ok(Arc::new(client) as Arc<dyn HostingService>)
    })
}

fn build_orchestrator(service: &ServiceArgs) -> Result<RemediationOrchestrator> {
    let chat: Arc<dyn ChatModel> = Arc::new(
        ChatClient::new(service.chat_config())
            .context("LLM client is not configured (set OPENAI_API_KEY or --llm-api-key)")?,
    );
    let tester = Arc::new(LlmTestGateway::new(chat.clone()));
    let analysis = Arc::new(
        CompositeAnalysisGateway::new(tester).with_linter(CommandLinter::new(service.linter_config())),
    );

    Ok(RemediationOrchestrator::new(
        analysis.clone(),
        Arc::new(LlmFixGateway::new(chat)),
        analysis,
    )
    .with_policy(service.policy()))
}

fn build_dispatcher(
    service: &ServiceArgs,
    hosting: Arc<dyn HostingService>,
) -> Result<EventDispatcher> {
    let extractor =
        ChangeSetExtractor::new(hosting.clone()).with_config(service.extractor_config());
    let publisher = PublishCoordinator::new(hosting);
    Ok(
        EventDispatcher::new(extractor, build_orchestrator(service)?, publisher).with_config(
            DispatcherConfig {
                max_concurrency: service.max_concurrency.max(1),
            },
        ),
    )
}

fn read_payload(path: &Path) -> Result<serde_json::Value> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Payload {} is not valid JSON", path.display()))
}

async fn dispatch_payload(
    service: &ServiceArgs,
    event: &str,
    payload: serde_json::Value,
) -> Result<DispatchSummary> {
    let mut hosting = Arc::new(github_hosting(service));
    let summary = {
        let dispatcher = build_dispatcher(service, hosting.clone())?;
        dispatcher.dispatch_webhook(event, payload).await
    };
    if let Some(hosting) = Arc::get_mut(&mut hosting) {
        hosting.teardown();
    }
    Ok(summary)
}

async fn cmd_dispatch(service: &ServiceArgs, event: &str, payload: &Path) -> Result<()> {
    let payload = read_payload(payload)?;
    let summary = dispatch_payload(service, event, payload).await?;
    info!(
        kind = %summary.kind,
        published = summary.published,
        failed = summary.failed,
        "dispatch finished"
    );
    print_json(&summary)
}

/// Origin label for a file that lives outside any hosted repository.
fn local_origin(path: &Path) -> Origin {
    Origin::File(FileLocation {
        repo: RepoRef::new("local", "workspace"),
        path: path.display().to_string(),
        base_branch: "HEAD".to_string(),
        commit_sha: String::new(),
        blob_sha: None,
        pull_request: None,
    })
}

fn local_artifact(path: &Path, language: Option<&str>) -> Result<CodeArtifact> {
    let code = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let language = match language {
        Some(language) => language.to_string(),
        None => language_for_path(&path.to_string_lossy()),
    };
    if language.is_empty() {
        bail!(
            "Cannot infer the language of {}; pass --language",
            path.display()
        );
    }
    Ok(CodeArtifact::new(code, language, local_origin(path)))
}

async fn remediate_file(
    orchestrator: &RemediationOrchestrator,
    path: &Path,
    language: Option<&str>,
    write: bool,
) -> Result<RemediationOutcome> {
    let artifact = local_artifact(path, language)?;
    let outcome = orchestrator
        .remediate(&artifact)
        .await
        .with_context(|| format!("Failed to remediate {}", path.display()))?;

    if write && outcome.improved() {
        std::fs::write(path, &outcome.final_code)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), "improved code written");
    }
    Ok(outcome)
}

async fn cmd_remediate(
    service: &ServiceArgs,
    path: &Path,
    language: Option<&str>,
    write: bool,
) -> Result<()> {
    let orchestrator = build_orchestrator(service)?;
    let outcome = remediate_file(&orchestrator, path, language, write).await?;
    print_json(&outcome)
}

fn read_blocks(path: &Path) -> Result<Vec<CodeBlock>> {
    let markdown = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(extract_code_blocks(&markdown))
}

fn cmd_blocks(path: &Path) -> Result<()> {
    print_json(&read_blocks(path)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
