//! CLI command definitions for deckbench.
//!
//! Each benchmark command builds immutable [`Configuration`] values, loads a
//! task window, runs the orchestrator and writes a timestamped report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use crate::benchmark::{
    analyze, BenchmarkOrchestrator, BenchmarkSuite, Configuration, Report, ReportSink,
    DEFAULT_CONCURRENCY,
};
use crate::corpus::{
    open_local, HuggingFaceRowsSource, Task, TaskSelection, TaskSource, DEFAULT_SPLIT,
};
use crate::error::LlmError;
use crate::llm::{OpenRouterProvider, OPENROUTER_BASE_URL};
use crate::metrics::{init_metrics, write_metrics};
use crate::routing::{
    PromptRouter, PromptVariant, RoutingClassifier, RoutingTable, DEFAULT_EMBEDDING_MODEL,
};
use crate::runner::{
    GenerationInvoker, ProcessSandbox, SandboxConfig, TaskRunner, DEFAULT_WORK_DIR,
};

/// Corpus used by `try`, `models` and `prompts`.
const DEFAULT_DATASET: &str = "mikeoxmaul/opengamma-prs";

/// Deduplicated corpus used by `routed`.
const DEFAULT_ROUTED_DATASET: &str = "mikeoxmaul/opengamma-prs-dedup";

/// Models compared by `models` when none are given.
const DEFAULT_MODELS: [&str; 3] = [
    "openai/gpt-oss-20b:free",
    "nvidia/nemotron-nano-12b-v2-vl:free",
    "kwaipilot/kat-coder-pro:free",
];

const DEFAULT_PROMPT_MODEL: &str = "openai/gpt-oss-20b:free";
const DEFAULT_ROUTED_MODEL: &str = "ibm-granite/granite-4.0-h-micro";
const DEFAULT_TRY_MODEL: &str = "kwaipilot/kat-coder-pro:free";
const DEFAULT_CLASSIFIER: &str = "classifier_tensors.json";

/// Benchmark LLM configurations on slide-deck code generation.
#[derive(Parser)]
#[command(name = "deckbench")]
#[command(about = "Benchmark LLM model, prompt and routing configurations on slide-deck code generation")]
#[command(version)]
#[command(
    long_about = "deckbench asks a model for a python-pptx script per task, runs the script in a scratch directory and counts it as a pass when it exits zero and writes its deck.\n\nExample usage:\n  deckbench models --take 3\n  deckbench routed --classifier classifier_tensors.json --concurrency 4"
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
    /// Run a single task once and print Success or Failed.
    Try(TryArgs),

    /// Compare models under one prompt.
    Models(ModelsArgs),

    /// Compare prompt variants under one model.
    Prompts(PromptsArgs),

    /// Pick the prompt per task with the routing classifier.
    Routed(RoutedArgs),

    /// Run configurations listed in a YAML suite file.
    Suite(SuiteArgs),

    /// Analyze how much a report's configurations add over a baseline.
    Coverage(CoverageArgs),
}

/// Backend, corpus, sandbox and output options shared by the benchmark commands.
#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// OpenRouter API key (can also be set via OPENROUTER_API_KEY env var).
    #[arg(long, env = "OPENROUTER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Chat and embedding endpoint base URL.
    #[arg(long, default_value = OPENROUTER_BASE_URL)]
    pub base_url: String,

    /// HuggingFace dataset id (each command has its own default).
    #[arg(long)]
    pub dataset: Option<String>,

    /// Dataset split.
    #[arg(long, default_value = DEFAULT_SPLIT)]
    pub split: String,

    /// Local .jsonl or .parquet corpus; overrides --dataset.
    #[arg(long)]
    pub tasks_file: Option<PathBuf>,

    /// Root directory for reports.
    #[arg(long, default_value = "results")]
    pub results_dir: PathBuf,

    /// Explicit report file name instead of a timestamped one.
    #[arg(short = 'o', long)]
    pub output: Option<String>,

    /// Scratch directory for generated scripts and decks. Decks from passing
    /// runs stay here as test_<run id>.pptx unless --discard-artifacts is set.
    #[arg(long, default_value = DEFAULT_WORK_DIR)]
    pub work_dir: PathBuf,

    /// Delete every deck after checking it instead of keeping passing ones.
    #[arg(long)]
    pub discard_artifacts: bool,

    /// Interpreter command; the script path is appended.
    #[arg(long, default_value = "uv run")]
    pub interpreter: String,

    /// Per-script time limit in seconds. No limit when omitted.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Tasks in flight per configuration.
    #[arg(short = 'c', long, default_value_t = DEFAULT_CONCURRENCY)]
    pub concurrency: usize,

    /// Run scripts inside this Docker image instead of a local process.
    #[arg(long)]
    pub docker_image: Option<String>,

    /// Write Prometheus metrics to this file when the run ends.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,
}

/// Arguments for `deckbench try`.
#[derive(Parser, Debug)]
pub struct TryArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Model to query.
    #[arg(short = 'm', long, default_value = DEFAULT_TRY_MODEL)]
    pub model: String,

    /// Position of the task in the corpus.
    #[arg(long, default_value_t = 0)]
    pub index: usize,

    /// Built-in system prompt.
    #[arg(long, value_enum, default_value_t = PromptVariant::Original)]
    pub prompt: PromptVariant,
}

/// Arguments for `deckbench models`.
#[derive(Parser, Debug)]
pub struct ModelsArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Comma-separated model ids.
    #[arg(short = 'm', long, value_delimiter = ',')]
    pub models: Vec<String>,

    /// Built-in system prompt shared by every model.
    #[arg(long, value_enum, default_value_t = PromptVariant::Default)]
    pub prompt: PromptVariant,

    /// Tasks to skip before the window.
    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    /// Tasks in the window.
    #[arg(long, default_value_t = 3)]
    pub take: usize,
}

/// Arguments for `deckbench prompts`.
#[derive(Parser, Debug)]
pub struct PromptsArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Model shared by every prompt.
    #[arg(short = 'm', long, default_value = DEFAULT_PROMPT_MODEL)]
    pub model: String,

    /// Comma-separated prompt variants (default: basic,detailed,minimal,structured).
    #[arg(long, value_enum, value_delimiter = ',')]
    pub variants: Vec<PromptVariant>,

    #[arg(long, default_value_t = 0)]
    pub skip: usize,

    #[arg(long, default_value_t = 1)]
    pub take: usize,
}

/// Arguments for `deckbench routed`.
#[derive(Parser, Debug)]
pub struct RoutedArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// Model used for every routed prompt.
    #[arg(short = 'm', long, default_value = DEFAULT_ROUTED_MODEL)]
    pub model: String,

    /// Classifier artifact with `weights` and `bias`.
    #[arg(long, default_value = DEFAULT_CLASSIFIER)]
    pub classifier: PathBuf,

    /// Embedding model the classifier was trained against.
    #[arg(long, default_value = DEFAULT_EMBEDDING_MODEL)]
    pub embedding_model: String,

    /// Also run the fixed `original` prompt as a baseline configuration.
    #[arg(long)]
    pub with_baseline: bool,

    #[arg(long, default_value_t = 100)]
    pub skip: usize,

    #[arg(long, default_value_t = 100)]
    pub take: usize,
}

/// Arguments for `deckbench suite`.
#[derive(Parser, Debug)]
pub struct SuiteArgs {
    #[command(flatten)]
    pub run: RunArgs,

    /// YAML suite file.
    pub path: PathBuf,
}

/// Arguments for `deckbench coverage`.
#[derive(Parser, Debug)]
pub struct CoverageArgs {
    /// Report JSON produced by a previous run.
    pub report: PathBuf,

    /// Configuration the others are compared against.
    #[arg(long, default_value = "original")]
    pub baseline: String,

    /// Comma-separated configurations included in the union (default: all).
    #[arg(long, value_delimiter = ',')]
    pub include: Vec<String>,

    /// Output JSON to stdout instead of text lines.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Parse arguments and run the selected command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with already-parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    init_metrics().context("Failed to initialize metrics")?;

    match cli.command {
        Commands::Try(args) => run_try_command(args).await,
        Commands::Models(args) => run_models_command(args).await,
        Commands::Prompts(args) => run_prompts_command(args).await,
        Commands::Routed(args) => run_routed_command(args).await,
        Commands::Suite(args) => run_suite_command(args).await,
        Commands::Coverage(args) => run_coverage_command(args),
    }
}

// ============================================================================
// Command implementations
// ============================================================================

async fn run_try_command(args: TryArgs) -> anyhow::Result<()> {
    let provider = build_provider(&args.run)?;
    let runner = build_runner(&args.run, provider)?;
    let tasks = load_tasks(&args.run, DEFAULT_DATASET, TaskSelection::window(args.index, 1)).await?;
    let task = tasks
        .first()
        .with_context(|| format!("No task at index {}", args.index))?;
    info!(task = %task.preview(100), "Loaded task from corpus");

    let result = runner.run(&args.model, args.prompt.text(), task).await;
    if let Some(error) = result.error() {
        warn!(error = %error, "Task hit an infrastructure error");
    }
    println!("{}", if result.success() { "Success" } else { "Failed" });

    finish_metrics(&args.run)
}

async fn run_models_command(args: ModelsArgs) -> anyhow::Result<()> {
    let models = if args.models.is_empty() {
        DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
    } else {
        args.models
    };
    let configurations: Vec<Configuration> = models
        .iter()
        .map(|model| Configuration::fixed(model.clone(), model.clone(), args.prompt))
        .collect();

    let tasks = load_tasks(&args.run, DEFAULT_DATASET, TaskSelection::window(args.skip, args.take)).await?;
    let provider = build_provider(&args.run)?;
    let orchestrator = build_orchestrator(&args.run, provider)?;
    let sink = ReportSink::new(args.run.results_dir.join("model_benchmark"), "benchmark_results");

    execute(&args.run, &orchestrator, &configurations, &tasks, &sink).await
}

async fn run_prompts_command(args: PromptsArgs) -> anyhow::Result<()> {
    let variants = if args.variants.is_empty() {
        PromptVariant::COMPARED.to_vec()
    } else {
        args.variants
    };
    let configurations: Vec<Configuration> = variants
        .iter()
        .map(|variant| Configuration::fixed(variant.name(), args.model.clone(), *variant))
        .collect();

    let tasks = load_tasks(&args.run, DEFAULT_DATASET, TaskSelection::window(args.skip, args.take)).await?;
    let provider = build_provider(&args.run)?;
    let orchestrator = build_orchestrator(&args.run, provider)?;
    let sink = ReportSink::new(
        args.run.results_dir.join("prompt_benchmark"),
        "prompt_benchmark_results",
    );

    execute(&args.run, &orchestrator, &configurations, &tasks, &sink).await
}

async fn run_routed_command(args: RoutedArgs) -> anyhow::Result<()> {
    let provider = build_provider(&args.run)?;
    let router = build_router(provider.clone(), &args.classifier, &args.embedding_model)?;

    let mut configurations = Vec::new();
    if args.with_baseline {
        configurations.push(Configuration::fixed(
            PromptVariant::Original.name(),
            args.model.clone(),
            PromptVariant::Original,
        ));
    }
    configurations.push(Configuration::routed("routed", args.model.clone()));

    let tasks = load_tasks(
        &args.run,
        DEFAULT_ROUTED_DATASET,
        TaskSelection::window(args.skip, args.take),
    )
    .await?;
    let orchestrator = build_orchestrator(&args.run, provider)?.with_router(Arc::new(router));
    let sink = ReportSink::new(
        args.run.results_dir.join("prompt_classifier"),
        "prompt_classifier_benchmark_results",
    );

    execute(&args.run, &orchestrator, &configurations, &tasks, &sink).await
}

async fn run_suite_command(args: SuiteArgs) -> anyhow::Result<()> {
    let suite = BenchmarkSuite::from_yaml_file(&args.path)
        .with_context(|| format!("Failed to load suite {}", args.path.display()))?;
    info!(suite = %suite.name, configurations = suite.configurations.len(), "Loaded suite");

    let mut run = args.run.clone();
    if run.dataset.is_none() {
        run.dataset = suite.dataset.clone();
    }
    if let Some(concurrency) = suite.concurrency {
        run.concurrency = concurrency;
    }

    let provider = build_provider(&run)?;
    let mut orchestrator = build_orchestrator(&run, provider.clone())?;
    if let Some(routing) = suite.routing.as_ref().filter(|_| suite.has_routed()) {
        let embedding_model = routing
            .embedding_model
            .as_deref()
            .unwrap_or(DEFAULT_EMBEDDING_MODEL);
        let router = build_router(provider, &routing.classifier, embedding_model)?;
        orchestrator = orchestrator.with_router(Arc::new(router));
    }

    let tasks = load_tasks(&run, DEFAULT_DATASET, suite.selection).await?;
    let sink = ReportSink::new(
        run.results_dir.join("suite"),
        format!("{}_results", suite.name),
    );

    execute(&run, &orchestrator, &suite.configurations, &tasks, &sink).await
}

fn run_coverage_command(args: CoverageArgs) -> anyhow::Result<()> {
    let report = ReportSink::load(&args.report)
        .with_context(|| format!("Failed to read report {}", args.report.display()))?;
    let include = (!args.include.is_empty()).then_some(args.include.as_slice());
    let analysis = analyze(&report, &args.baseline, include)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    for (name, new) in &analysis.new_per_configuration {
        println!("{name} new: {new}");
    }
    println!(
        "Theoretical max: {}; {}: {}; Diff +{}",
        analysis.theoretical_max, analysis.baseline, analysis.baseline_count, analysis.gain
    );
    Ok(())
}

// ============================================================================
// Shared helpers
// ============================================================================

fn build_provider(args: &RunArgs) -> anyhow::Result<Arc<OpenRouterProvider>> {
    let api_key = args
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or(LlmError::MissingApiKey)?;
    let provider = OpenRouterProvider::with_base_url(api_key, &args.base_url)?;
    info!(base_url = provider.base_url(), api_key = %provider.api_key_masked(), "Using OpenRouter backend");
    Ok(Arc::new(provider))
}

fn sandbox_config(args: &RunArgs) -> anyhow::Result<SandboxConfig> {
    let interpreter: Vec<&str> = args.interpreter.split_whitespace().collect();
    if interpreter.is_empty() {
        anyhow::bail!("--interpreter must name a command");
    }

    let mut config = SandboxConfig::new(&args.work_dir).with_interpreter(interpreter);
    if let Some(secs) = args.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    if let Some(image) = &args.docker_image {
        config = config.with_docker(image);
    }
    if args.discard_artifacts {
        config = config.discard_artifacts();
    }
    Ok(config)
}

fn build_runner(args: &RunArgs, provider: Arc<OpenRouterProvider>) -> anyhow::Result<TaskRunner> {
    let sandbox = ProcessSandbox::new(sandbox_config(args)?);
    Ok(TaskRunner::new(
        GenerationInvoker::new(provider),
        Arc::new(sandbox),
    ))
}

fn build_orchestrator(
    args: &RunArgs,
    provider: Arc<OpenRouterProvider>,
) -> anyhow::Result<BenchmarkOrchestrator> {
    let runner = build_runner(args, provider)?;
    Ok(BenchmarkOrchestrator::new(Arc::new(runner)).with_concurrency(args.concurrency))
}

fn build_router(
    provider: Arc<OpenRouterProvider>,
    classifier_path: &Path,
    embedding_model: &str,
) -> anyhow::Result<PromptRouter> {
    let classifier = RoutingClassifier::from_file(classifier_path).with_context(|| {
        format!("Failed to load classifier {}", classifier_path.display())
    })?;
    info!(
        classes = classifier.num_classes(),
        dimension = classifier.dimension(),
        "Loaded routing classifier"
    );
    Ok(PromptRouter::new(
        provider,
        embedding_model,
        classifier,
        RoutingTable::default(),
    )?)
}

async fn load_tasks(
    args: &RunArgs,
    default_dataset: &str,
    selection: TaskSelection,
) -> anyhow::Result<Vec<Task>> {
    let tasks = match &args.tasks_file {
        Some(path) => open_local(path)?.load(&selection).await,
        None => {
            let dataset = args.dataset.as_deref().unwrap_or(default_dataset);
            HuggingFaceRowsSource::new(dataset, &args.split)?
                .load(&selection)
                .await
        }
    }
    .context("Failed to load tasks")?;

    if tasks.is_empty() {
        warn!(skip = selection.skip, take = ?selection.take, "Task window is empty");
    }
    Ok(tasks)
}

async fn execute(
    args: &RunArgs,
    orchestrator: &BenchmarkOrchestrator,
    configurations: &[Configuration],
    tasks: &[Task],
    sink: &ReportSink,
) -> anyhow::Result<()> {
    let report = orchestrator.run(configurations, tasks).await?;
    let path = sink
        .save(&report, args.output.as_deref())
        .context("Failed to save report")?;

    print_summary(&report);
    println!("Results saved to: {}", path.display());
    finish_metrics(args)
}

fn finish_metrics(args: &RunArgs) -> anyhow::Result<()> {
    if let Some(path) = &args.metrics_file {
        write_metrics(path)
            .with_context(|| format!("Failed to write metrics to {}", path.display()))?;
    }
    Ok(())
}

fn print_summary(report: &Report) {
    for (name, result) in &report.configurations {
        println!(
            "{name}: SR={:.1}% ({}/{}), avg {:.2}s, {} tokens",
            result.success_rate * 100.0,
            result.success_count,
            result.total_tasks,
            result.avg_time,
            result.token_usage.total_tokens
        );
        if let Some(counts) = &result.routing_counts {
            let histogram: Vec<String> = counts.iter().map(|(c, n)| format!("{c}:{n}")).collect();
            println!("  routing: {}", histogram.join(" "));
        }
        if !result.errors.is_empty() {
            println!("  errors: {}", result.errors.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_models_defaults() {
        let cli = Cli::try_parse_from(["deckbench", "models"]).expect("parse");
        let Commands::Models(args) = cli.command else {
            panic!("expected models");
        };
        assert!(args.models.is_empty());
        assert_eq!(args.prompt, PromptVariant::Default);
        assert_eq!(args.take, 3);
        assert_eq!(args.run.concurrency, 1);
        assert_eq!(args.run.interpreter, "uv run");
        assert_eq!(args.run.split, "train");
        assert!(args.run.timeout_secs.is_none());
    }

    #[test]
    fn test_prompts_variant_list() {
        let cli = Cli::try_parse_from([
            "deckbench",
            "prompts",
            "--variants",
            "basic,structured",
            "--take",
            "5",
        ])
        .expect("parse");
        let Commands::Prompts(args) = cli.command else {
            panic!("expected prompts");
        };
        assert_eq!(
            args.variants,
            vec![PromptVariant::Basic, PromptVariant::Structured]
        );
        assert_eq!(args.take, 5);
        assert_eq!(args.model, DEFAULT_PROMPT_MODEL);
    }

    #[test]
    fn test_routed_defaults() {
        let cli = Cli::try_parse_from(["deckbench", "routed", "-c", "4"]).expect("parse");
        let Commands::Routed(args) = cli.command else {
            panic!("expected routed");
        };
        assert_eq!(args.skip, 100);
        assert_eq!(args.take, 100);
        assert_eq!(args.classifier, PathBuf::from(DEFAULT_CLASSIFIER));
        assert_eq!(args.embedding_model, DEFAULT_EMBEDDING_MODEL);
        assert_eq!(args.run.concurrency, 4);
        assert!(!args.with_baseline);
    }

    #[test]
    fn test_global_log_level() {
        let cli = Cli::try_parse_from(["deckbench", "coverage", "r.json", "--log-level", "debug"])
            .expect("parse");
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_sandbox_config_from_args() {
        let cli = Cli::try_parse_from([
            "deckbench",
            "try",
            "--interpreter",
            "python3 -u",
            "--timeout-secs",
            "30",
        ])
        .expect("parse");
        let Commands::Try(args) = cli.command else {
            panic!("expected try");
        };
        let config = sandbox_config(&args.run).expect("config");
        assert_eq!(config.interpreter, vec!["python3", "-u"]);
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert!(config.keep_artifacts);
    }

    #[test]
    fn test_discard_artifacts_flag() {
        let cli = Cli::try_parse_from(["deckbench", "models", "--discard-artifacts"])
            .expect("parse");
        let Commands::Models(args) = cli.command else {
            panic!("expected models");
        };
        let config = sandbox_config(&args.run).expect("config");
        assert!(!config.keep_artifacts);
    }

    #[test]
    fn test_blank_interpreter_rejected() {
        let cli = Cli::try_parse_from(["deckbench", "try", "--interpreter", " "]).expect("parse");
        let Commands::Try(args) = cli.command else {
            panic!("expected try");
        };
        assert!(sandbox_config(&args.run).is_err());
    }

    #[test]
    fn test_missing_api_key() {
        let cli = Cli::try_parse_from(["deckbench", "try", "--api-key", "  "]).expect("parse");
        let Commands::Try(args) = cli.command else {
            panic!("expected try");
        };
        assert!(build_provider(&args.run).is_err());
    }

    #[test]
    fn test_coverage_command_on_saved_report() {
        use crate::benchmark::ConfigurationResult;

        let dir = tempfile::TempDir::new().expect("tempdir");
        let mut report = Report::new(chrono::Utc::now());
        for (name, indices) in [("original", vec![1, 2]), ("basic", vec![2, 3])] {
            let mut result = ConfigurationResult::new();
            result.successful_indices = indices;
            report.insert(name, result);
        }
        let path = ReportSink::new(dir.path(), "r")
            .save(&report, Some("report.json"))
            .expect("save");

        let args = CoverageArgs {
            report: path,
            baseline: "original".to_string(),
            include: Vec::new(),
            json: true,
        };
        run_coverage_command(args).expect("coverage");
    }
}
