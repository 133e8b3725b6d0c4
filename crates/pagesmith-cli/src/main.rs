//! Pagesmith CLI - brief in, hosted site out
//!
//! Usage:
//!   pagesmith serve                Accept tasks over HTTP
//!   pagesmith run <task.json>      Run one task in the foreground
//!   pagesmith check-config         Print the loaded configuration, secrets masked
//!   pagesmith init-config          Write a default pagesmith.toml

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pagesmith_core::config::DEFAULT_CONFIG_FILE;
use pagesmith_core::{PagesmithConfig, ServiceSettings, Task};
use pagesmith_orchestrator::Coordinator;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pagesmith")]
#[command(author, version, about = "Generate, publish and host small sites from a brief")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Tunables file
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Accept tasks on POST /api/process-task
    Serve {
        /// Override the bind address, e.g. 0.0.0.0:7860
        #[arg(long)]
        bind: Option<String>,
    },

    /// Run one task from a JSON submission file and wait for it
    Run {
        /// Submission in the same shape the HTTP endpoint accepts
        task: PathBuf,
    },

    /// Load the configuration and print it with secrets masked
    CheckConfig,

    /// Write the default tunables file
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging; RUST_LOG wins over --verbose
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { bind } => cmd_serve(cli.config, bind).await,
        Commands::Run { task } => cmd_run(cli.config, task).await,
        Commands::CheckConfig => cmd_check_config(cli.config),
        Commands::InitConfig { force } => cmd_init_config(cli.config, force),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<PagesmithConfig> {
    PagesmithConfig::load(path.as_deref()).context("Failed to load configuration")
}

async fn cmd_serve(path: Option<PathBuf>, bind: Option<String>) -> Result<()> {
    let mut config = load_config(path)?;
    if let Some(bind) = bind {
        config.service.bind_addr = bind;
    }
    info!("{}", config.summary());

    pagesmith_server::serve(Arc::new(config)).await
}

async fn cmd_run(path: Option<PathBuf>, task_path: PathBuf) -> Result<()> {
    let config = Arc::new(load_config(path)?);

    let content = tokio::fs::read_to_string(&task_path)
        .await
        .with_context(|| format!("Failed to read {}", task_path.display()))?;
    let task: Task = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse task {}", task_path.display()))?;

    let coordinator = Coordinator::from_config(Arc::clone(&config))?;
    let outcome = coordinator.run(&task).await;

    match (&outcome.result, outcome.error()) {
        (Some(result), None) => {
            println!("Task:      {} (round {})", result.task, result.round);
            println!("Repo:      {}", result.repo_url);
            println!("Commit:    {}", result.commit_sha);
            println!("Pages:     {}", result.pages_url);
            if let Some(notification) = &outcome.notification {
                println!("Notified:  {}", notification.is_delivered());
            }
            Ok(())
        }
        (_, Some(error)) => bail!("Task {} failed: {}", task.id, error),
        (None, None) => bail!("Task {} ended without a result", task.id),
    }
}

fn cmd_check_config(path: Option<PathBuf>) -> Result<()> {
    let config = load_config(path)?;
    println!("{}", config.summary());
    println!("  pages: {}", config.pages_url("<task>"));
    Ok(())
}

fn cmd_init_config(path: Option<PathBuf>, force: bool) -> Result<()> {
    let path = path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    ServiceSettings::write_default(&path)
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}
