//! CLI command definitions for skill-eval.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::info;

use crate::cases::{load_cases, EvalCase, SearchIndexRef};
use crate::config::{EvalConfig, OrchestratorDeps, DEFAULT_MODEL};
use crate::error::{CaseError, ConfigError, LlmError};
use crate::eval::docs::DEFAULT_DOC_MAX_CHARS;
use crate::eval::{Approach, HttpDocFetcher};
use crate::llm::{LiteLlmClient, DEFAULT_API_BASE};
use crate::runner::{CleanupCoordinator, CleanupOutcome, NodeSandbox, NodeSyntaxChecker};
use crate::store::MongoCatalog;

/// Default location of case files.
const DEFAULT_CASES_DIR: &str = "./cases";

/// Default output directory for run reports.
const DEFAULT_OUTPUT_DIR: &str = "./eval-results";

/// Three-way evaluation harness for LLM-generated MongoDB code.
#[derive(Parser)]
#[command(name = "skill-eval")]
#[command(about = "Compare baseline, documentation and skill-assisted code generation")]
#[command(version)]
#[command(
    long_about = "skill-eval runs every case three times (baseline, with documentation, with skill),\nexecutes the generated code against MongoDB, verifies the search indexes it creates,\nand scores each run.\n\nExample usage:\n  skill-eval run --cases ./cases --tag atlas-search"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the full three-approach evaluation.
    Run(Box<RunArgs>),

    /// Load and validate case files without running anything.
    Validate(ValidateArgs),

    /// List cases with their tags and expectation groups.
    #[command(alias = "ls")]
    List(ListArgs),

    /// Drop every search index named in the cases' cleanup specs.
    Cleanup(CleanupArgs),
}

/// MongoDB connection options.
#[derive(clap::Args, Debug)]
pub struct MongoArgs {
    /// MongoDB connection string.
    #[arg(long, env = "MONGODB_URI")]
    pub mongodb_uri: Option<String>,

    /// Seconds to wait for a dropped search index to disappear.
    #[arg(long, default_value = "60")]
    pub cleanup_wait_secs: u64,

    /// Milliseconds between search index listings while waiting.
    #[arg(long, default_value = "2000")]
    pub poll_interval_ms: u64,
}

/// Arguments for `skill-eval run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Case file or directory of case files.
    #[arg(short = 'c', long, default_value = DEFAULT_CASES_DIR)]
    pub cases: PathBuf,

    /// Only run cases with this tag (repeatable).
    #[arg(short = 't', long = "tag")]
    pub tags: Vec<String>,

    /// Only run these approaches (repeatable; run order is fixed).
    #[arg(short = 'a', long = "approach")]
    pub approaches: Vec<Approach>,

    /// Generation model.
    #[arg(short = 'm', long, env = "SKILL_EVAL_MODEL", default_value = DEFAULT_MODEL)]
    pub model: String,

    /// Sampling temperature.
    #[arg(long, default_value = "0.0")]
    pub temperature: f64,

    /// Maximum tokens per completion (provider default when omitted).
    #[arg(long)]
    pub max_tokens: Option<u32>,

    /// OpenRouter API key (can also be set via OPENROUTER_API_KEY env var).
    #[arg(long, env = "OPENROUTER_API_KEY")]
    pub api_key: Option<String>,

    /// OpenAI-compatible API base URL.
    #[arg(long, env = "LITELLM_API_BASE", default_value = DEFAULT_API_BASE)]
    pub api_base: String,

    /// Maximum documentation length in characters.
    #[arg(long, env = "DOC_MAX_CHARS", default_value_t = DEFAULT_DOC_MAX_CHARS)]
    pub doc_max_chars: usize,

    #[command(flatten)]
    pub mongo: MongoArgs,

    /// Seconds each sandboxed execution may run.
    #[arg(long, default_value = "30")]
    pub timeout_secs: u64,

    /// Seconds the verifier waits for an expected index to be listed.
    #[arg(long, default_value = "10")]
    pub verify_wait_secs: u64,

    /// Node.js executable.
    #[arg(long, env = "SKILL_EVAL_NODE", default_value = "node")]
    pub node_binary: String,

    /// Directory containing the `mongodb` npm package (defaults to
    /// ./node_modules when present).
    #[arg(long, env = "SKILL_EVAL_NODE_MODULES")]
    pub node_modules: Option<PathBuf>,

    /// Output directory for the JSON report.
    #[arg(short = 'o', long, default_value = DEFAULT_OUTPUT_DIR)]
    pub output: PathBuf,

    /// Print the report as JSON instead of a table.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `skill-eval validate`.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Case file or directory of case files.
    #[arg(short = 'c', long, default_value = DEFAULT_CASES_DIR)]
    pub cases: PathBuf,
}

/// Arguments for `skill-eval list`.
#[derive(Parser, Debug)]
pub struct ListArgs {
    /// Case file or directory of case files.
    #[arg(short = 'c', long, default_value = DEFAULT_CASES_DIR)]
    pub cases: PathBuf,

    /// Only list cases with this tag (repeatable).
    #[arg(short = 't', long = "tag")]
    pub tags: Vec<String>,

    /// Output JSON.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Arguments for `skill-eval cleanup`.
#[derive(Parser, Debug)]
pub struct CleanupArgs {
    /// Case file or directory of case files.
    #[arg(short = 'c', long, default_value = DEFAULT_CASES_DIR)]
    pub cases: PathBuf,

    #[command(flatten)]
    pub mongo: MongoArgs,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_eval_command(*args).await,
        Commands::Validate(args) => run_validate_command(args),
        Commands::List(args) => run_list_command(args),
        Commands::Cleanup(args) => run_cleanup_command(args).await,
    }
}

// ============================================================================
// Run
// ============================================================================

fn eval_config(args: &RunArgs) -> EvalConfig {
    let mut config = EvalConfig::new(args.mongo.mongodb_uri.clone().unwrap_or_default())
        .with_model(&args.model)
        .with_temperature(args.temperature)
        .with_api(&args.api_base, args.api_key.clone())
        .with_doc_max_chars(args.doc_max_chars)
        .with_node(&args.node_binary, args.node_modules.clone())
        .with_execution_timeout(Duration::from_secs(args.timeout_secs))
        .with_waits(
            Duration::from_secs(args.mongo.cleanup_wait_secs),
            Duration::from_secs(args.verify_wait_secs),
        )
        .with_poll_interval(Duration::from_millis(args.mongo.poll_interval_ms))
        .with_tags(args.tags.clone())
        .with_output_dir(&args.output);
    if !args.approaches.is_empty() {
        config = config.with_approaches(&args.approaches);
    }
    if let Some(max_tokens) = args.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    config
}

async fn run_eval_command(args: RunArgs) -> anyhow::Result<()> {
    let config = eval_config(&args);
    config.validate()?;
    if config.api_key.is_none() {
        return Err(LlmError::MissingApiKey.into());
    }

    let cases = load_cases(&args.cases)?;
    info!(
        cases = cases.len(),
        model = %config.model,
        approaches = ?config.approaches,
        "Loaded cases"
    );

    let llm = LiteLlmClient::new(&config.api_base, config.api_key.clone());
    let deps = OrchestratorDeps {
        llm: Arc::new(llm),
        docs: Arc::new(HttpDocFetcher::new(config.doc_max_chars)),
        executor: Arc::new(NodeSandbox::new(config.sandbox_config())),
        syntax_checker: Arc::new(NodeSyntaxChecker::new(&config.node_binary)),
        catalog: Arc::new(MongoCatalog::new(&config.mongodb_uri)),
    };
    let orchestrator = config.build_orchestrator(deps);

    let report = orchestrator.run(&cases, &config.tags).await;
    let path = report.write_json(&config.output_dir)?;

    if args.json {
        let json_output = serde_json::to_string_pretty(&report)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
    } else {
        println!("\n=== Evaluation Results ({}) ===", report.model);
        print!("{}", report.render_table());
        println!();
        for summary in &report.summary {
            println!(
                "{:<20} cases: {:>3}  errors: {:>3}",
                summary.approach.display_name(),
                summary.cases,
                summary.errors
            );
        }
        println!("\nReport written to {}", path.display());
    }
    Ok(())
}

// ============================================================================
// Validate / List
// ============================================================================

fn run_validate_command(args: ValidateArgs) -> anyhow::Result<()> {
    match load_cases(&args.cases) {
        Ok(cases) => {
            println!("✓ {} case(s) valid in {}", cases.len(), args.cases.display());
            Ok(())
        }
        Err(CaseError::Schema { errors }) => {
            for error in &errors {
                eprintln!("✗ {}", error);
            }
            anyhow::bail!("{} schema error(s) in {}", errors.len(), args.cases.display())
        }
        Err(e) => Err(e.into()),
    }
}

#[derive(Debug, Serialize)]
struct CaseListing<'a> {
    name: &'a str,
    tags: &'a BTreeSet<String>,
    expectations: Vec<&'static str>,
    needs_execution: bool,
    cleanup: Option<String>,
}

impl<'a> CaseListing<'a> {
    fn from_case(case: &'a EvalCase) -> Self {
        let expected = &case.expected;
        let expectations = [
            ("syntax", expected.syntax.is_some()),
            ("semantic", expected.semantic.is_some()),
            ("execution", expected.execution.is_some()),
            ("result", expected.result.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, present)| present.then_some(name))
        .collect();

        Self {
            name: &case.name,
            tags: &case.tags,
            expectations,
            needs_execution: case.needs_execution(),
            cleanup: case.cleanup_target().map(|t| t.to_string()),
        }
    }
}

fn run_list_command(args: ListArgs) -> anyhow::Result<()> {
    let cases = load_cases(&args.cases)?;
    let listings: Vec<CaseListing<'_>> = cases
        .iter()
        .filter(|c| c.matches_tags(&args.tags))
        .map(CaseListing::from_case)
        .collect();

    if args.json {
        let json_output = serde_json::to_string_pretty(&listings)
            .map_err(|e| anyhow::anyhow!("Failed to serialize JSON output: {}", e))?;
        println!("{}", json_output);
        return Ok(());
    }

    for listing in &listings {
        let tags: Vec<&str> = listing.tags.iter().map(String::as_str).collect();
        println!("{}", listing.name);
        println!("  tags:         {}", display_list(&tags));
        println!("  expectations: {}", display_list(&listing.expectations));
        if let Some(ref cleanup) = listing.cleanup {
            println!("  cleanup:      {}", cleanup);
        }
    }
    println!("\n{} case(s)", listings.len());
    Ok(())
}

fn display_list(items: &[&str]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

// ============================================================================
// Cleanup
// ============================================================================

fn cleanup_targets(cases: &[EvalCase]) -> Vec<&SearchIndexRef> {
    let mut targets: Vec<&SearchIndexRef> = Vec::new();
    for target in cases.iter().filter_map(EvalCase::cleanup_target) {
        if !targets.contains(&target) {
            targets.push(target);
        }
    }
    targets
}

async fn run_cleanup_command(args: CleanupArgs) -> anyhow::Result<()> {
    let uri = args
        .mongo
        .mongodb_uri
        .filter(|uri| !uri.trim().is_empty())
        .ok_or(ConfigError::MissingMongoUri)?;
    let cases = load_cases(&args.cases)?;

    let coordinator = CleanupCoordinator::new(Arc::new(MongoCatalog::new(uri)))
        .with_poll_interval(Duration::from_millis(args.mongo.poll_interval_ms));
    let max_wait = Duration::from_secs(args.mongo.cleanup_wait_secs);

    let targets = cleanup_targets(&cases);
    let mut failed = 0;
    for target in &targets {
        let outcome = coordinator.cleanup(target, max_wait).await;
        let label = match outcome {
            CleanupOutcome::Absent => "absent",
            CleanupOutcome::Removed => "removed",
            CleanupOutcome::TimedOut => "still deleting",
            CleanupOutcome::Failed => {
                failed += 1;
                "failed"
            }
        };
        println!("{:<16} {}", label, target);
    }
    println!("\n{} target(s), {} failed", targets.len(), failed);
    Ok(())
}
