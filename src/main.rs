//! courtside - CLI entry point

use anyhow::{bail, Context as _, Result};
use clap::Parser;
use colored::Colorize;
use courtside::{
    bootstrap::{build_pipeline, Bootstrap, BootstrapStatus, EXIT_CODE_SETUP_NEEDED},
    cli::{eval_progress_bar, format_answer, format_report, format_stats, Args, Commands, ConfigCommand},
    config::Config,
    evaluation::{load_dataset, BatchHarness, CheckpointStore, RetryPolicy},
    types::{Question, Turn},
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(&args);

    // Init writes the file that load would otherwise require
    if let Commands::Config(ConfigCommand::Init { force }) = &args.command {
        return init_config(&args, *force);
    }
    let config = Config::load(args.config.as_deref())?;

    match &args.command {
        Commands::Ask {
            question,
            history,
            explain,
        } => ask(&args, &config, question, history.as_deref(), *explain).await,
        Commands::Eval {
            dataset,
            resume,
            checkpoint,
            concurrency,
            report,
        } => {
            let mut config = config.clone();
            if let Some(path) = checkpoint {
                config.evaluation.checkpoint_path = Some(path.clone());
            }
            if let Some(n) = concurrency {
                config.evaluation.concurrency = *n;
            }
            config.validate()?;
            eval(&args, &config, dataset, *resume, report.as_deref()).await
        }
        Commands::Doctor => doctor(&config).await,
        Commands::Config(ConfigCommand::Show) => show_config(&args, &config),
        Commands::Config(ConfigCommand::Init { force }) => init_config(&args, *force),
    }
}

fn init_tracing(args: &Args) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.verbosity().log_filter()));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Exit with setup instructions unless Ollama and the model are ready
async fn ensure_ready(config: &Config) {
    let bootstrap = Bootstrap::new(&config.model.ollama_url);
    let status = bootstrap.check(&config.model.name).await;
    if let Some(instructions) = Bootstrap::instructions(&status) {
        eprintln!("{} {}", "✗".red(), instructions);
        std::process::exit(EXIT_CODE_SETUP_NEEDED);
    }
}

async fn ask(
    args: &Args,
    config: &Config,
    question: &str,
    history: Option<&Path>,
    explain: bool,
) -> Result<()> {
    if question.trim().is_empty() {
        bail!("Question must not be empty");
    }
    ensure_ready(config).await;

    let history = match history {
        Some(path) => load_history(path)?,
        None => Vec::new(),
    };
    debug!(turns = history.len(), "loaded history");

    let pipeline = build_pipeline(config)?;
    let answer = pipeline
        .orchestrator
        .answer(&Question::with_history(question, history))
        .await?;

    print!("{}", format_answer(&answer, explain));
    if args.verbosity().show_progress() && explain {
        println!("\n{}", format_stats(&pipeline.telemetry.get_stats()).dimmed());
    }
    Ok(())
}

fn load_history(path: &Path) -> Result<Vec<Turn>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read history file {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("History file {} is not a JSON array of turns", path.display()))
}

async fn eval(
    args: &Args,
    config: &Config,
    dataset: &Path,
    resume: bool,
    report_path: Option<&Path>,
) -> Result<()> {
    let questions = load_dataset(dataset)?;
    ensure_ready(config).await;

    let pipeline = build_pipeline(config)?;
    let checkpoint_path = config.evaluation.checkpoint_for(dataset)?;
    let checkpoint = CheckpointStore::open(&checkpoint_path).await?;
    info!(path = %checkpoint_path.display(), resume, "using checkpoint");

    let mut harness = BatchHarness::new(pipeline.orchestrator, pipeline.evaluator, checkpoint)
        .with_policy(RetryPolicy::from_settings(&config.evaluation.retry))
        .with_config(config.evaluation.to_harness_config());
    if args.verbosity().show_progress() {
        harness = harness.with_progress(eval_progress_bar());
    }

    let report = harness.run(&questions, resume).await?;
    print!("{}", format_report(&report));
    println!("\nCheckpoint: {}", checkpoint_path.display());
    debug!(stats = %format_stats(&harness.telemetry().get_stats()), "telemetry");

    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report {}", path.display()))?;
        println!("Report:     {}", path.display());
    }
    Ok(())
}

async fn doctor(config: &Config) -> Result<()> {
    let bootstrap = Bootstrap::new(&config.model.ollama_url);

    println!("\nChecking Ollama at {}...\n", config.model.ollama_url);
    match bootstrap.list_models().await {
        Some(models) => {
            println!("{} Ollama is running", "✓".green());
            if models.is_empty() {
                println!("  No models installed.");
            } else {
                for model in &models {
                    println!("  • {}", model);
                }
            }
        }
        None => println!("{} Ollama is not reachable", "✗".red()),
    }

    let status = bootstrap.check(&config.model.name).await;
    match &status {
        BootstrapStatus::Ready => println!("{} Model {} is available", "✓".green(), config.model.name),
        _ => {
            if let Some(instructions) = Bootstrap::instructions(&status) {
                println!("\n{}", instructions);
            }
        }
    }
    println!();

    std::process::exit(if status == BootstrapStatus::Ready { 0 } else { EXIT_CODE_SETUP_NEEDED });
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    let path: PathBuf = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    println!("{}", format!("# {}", path.display()).dimmed());
    println!("{}", toml::to_string_pretty(config).context("Failed to serialize config")?);
    Ok(())
}

fn init_config(args: &Args, force: bool) -> Result<()> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => Config::config_path()?,
    };
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    Config::default().save_to(&path)?;
    println!("{} Wrote {}", "✓".green(), path.display());
    Ok(())
}
