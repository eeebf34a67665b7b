//! commitwatch - announce every new commit exactly once
//!
//! CLI entry point for watching repositories and inspecting state.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use colored::*;
use eyre::{Context, Result};
use tracing::{debug, info, warn};

use commitwatch::cli::{Cli, Command, get_log_path};
use commitwatch::config::Config;
use commitwatch::engine::{CycleOutcome, Engine, EngineState, Scheduler};
use commitwatch::fetcher::Fetcher;
use commitwatch::governor::Governor;
use commitwatch::notify::create_notifier;
use commitwatch::shutdown::{self, Shutdown, ShutdownTrigger};
use commitwatch::source::{CommitSource, GitHubClient};
use commitwatch::store::{self, CommitLogStore};

fn setup_logging(cli_log_level: Option<&str>, config_log_level: Option<&str>, to_file: bool) -> Result<()> {
    // Note: Can't log params here since logging isn't initialized yet
    // Determine log level with priority: CLI --log-level > config file > default (INFO)
    let level = match cli_log_level.or(config_log_level) {
        Some(s) => match s.to_uppercase().as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
        None => tracing::Level::INFO,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    if to_file {
        let log_path = get_log_path();
        if let Some(log_dir) = log_path.parent() {
            fs::create_dir_all(log_dir).context("Failed to create log directory")?;
        }
        let log_file = fs::File::create(&log_path).context("Failed to create log file")?;

        tracing_subscriber::fmt()
            .with_writer(log_file)
            .with_ansi(false)
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter)
            .init();
    }

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;

    // Setup logging with priority: CLI > config > INFO default
    setup_logging(cli.log_level.as_deref(), config.log_level.as_deref(), cli.log_file)
        .context("Failed to setup logging")?;

    // Dispatch command
    let command = cli.command.unwrap_or(Command::Run);
    debug!(?command, "main: dispatching command");
    match command {
        Command::Run => cmd_run(&config).await,
        Command::Once => cmd_once(&config).await,
        Command::Quota => cmd_quota(&config).await,
        Command::Log => cmd_log(&config),
    }
}

/// Build the engine and resolve configured repositories into keys
async fn start_engine(config: &Config, shutdown: Shutdown) -> Result<(Arc<Engine>, EngineState, CommitLogStore)> {
    debug!("start_engine: called");
    config.validate().context("Invalid configuration")?;
    let specs = config.repo_specs()?;

    let source: Arc<dyn CommitSource> =
        Arc::new(GitHubClient::from_config(&config.github).context("Failed to create GitHub client")?);
    let governor = Arc::new(Governor::new(source.clone(), config.poll.governor_config()));
    let fetcher = Fetcher::new(source, governor.clone(), shutdown);

    let store = CommitLogStore::spawn(&config.storage.log_path).context(format!(
        "Failed to open commit log at {}",
        config.storage.log_path.display()
    ))?;
    let notifier = create_notifier(&config.notify).context("Failed to create notifier")?;

    let engine = Arc::new(Engine::new(fetcher, governor, store.clone(), notifier));
    let state = engine
        .configure(&specs)
        .await
        .context("Failed to resolve watched repositories")?;

    Ok((engine, state, store))
}

/// Trigger shutdown on SIGINT or SIGTERM
fn spawn_signal_handler(trigger: ShutdownTrigger) -> Result<()> {
    debug!("spawn_signal_handler: called");
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::spawn(async move {
            tokio::select! {
                _ = sigint.recv() => info!("SIGINT received"),
                _ = sigterm.recv() => info!("SIGTERM received"),
            }
            trigger.trigger();
        });
    }

    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Ctrl+C received");
                trigger.trigger();
            }
        });
    }

    Ok(())
}

/// Watch until a shutdown signal arrives
async fn cmd_run(config: &Config) -> Result<()> {
    debug!("cmd_run: called");
    let (trigger, shutdown) = shutdown::channel();
    spawn_signal_handler(trigger)?;

    let (engine, state, store) = start_engine(config, shutdown.clone()).await?;
    info!(keys = state.len(), "commitwatch running. Press Ctrl+C to stop.");

    let mut scheduler = Scheduler::new(config.poll.scheduler_config(), engine, state, shutdown);
    scheduler.run().await;

    store.shutdown().await.context("Failed to close commit log")?;
    info!("commitwatch stopped");
    Ok(())
}

/// Run one cycle and wait for every key to finish
async fn cmd_once(config: &Config) -> Result<()> {
    debug!("cmd_once: called");
    let (trigger, shutdown) = shutdown::channel();
    spawn_signal_handler(trigger)?;

    let (engine, state, store) = start_engine(config, shutdown.clone()).await?;
    let mut scheduler = Scheduler::new(config.poll.scheduler_config(), engine, state, shutdown);

    match scheduler.run_cycle().await {
        CycleOutcome::Dispatched { dispatched, .. } => {
            scheduler.drain().await;
            println!("{} Checked {} repositories", "✓".green(), dispatched);
        }
        CycleOutcome::BackedOff { budget } => {
            warn!(remaining = budget.remaining_requests, "Cycle skipped for low quota");
            println!(
                "{} Quota too low ({} left), resets {}",
                "!".yellow(),
                budget.remaining_requests,
                budget.reset_display()
            );
        }
        CycleOutcome::Cancelled => {
            println!("{} Cancelled", "!".yellow());
        }
    }

    store.shutdown().await.context("Failed to close commit log")?;
    Ok(())
}

/// Print the current request quota
async fn cmd_quota(config: &Config) -> Result<()> {
    debug!("cmd_quota: called");
    let client = GitHubClient::from_config(&config.github).context("Failed to create GitHub client")?;
    let budget = client.quota().await.context("Failed to query rate limit")?;

    let remaining = budget.remaining_requests.to_string();
    let remaining = if budget.remaining_requests == 0 {
        remaining.red()
    } else if budget.remaining_requests.saturating_mul(10) < budget.limit {
        remaining.yellow()
    } else {
        remaining.green()
    };

    println!("{} {}/{}", "Remaining:".bold(), remaining, budget.limit);
    println!("{} {}", "Resets:".bold(), budget.reset_display());
    Ok(())
}

/// Print seen-commit counts per key from the durable log
fn cmd_log(config: &Config) -> Result<()> {
    debug!("cmd_log: called");
    let path: &PathBuf = &config.storage.log_path;
    let log = store::inspect(path)
        .context(format!("Failed to read commit log at {}", path.display()))?
        .unwrap_or_default();

    if log.is_empty() {
        println!("No commits recorded in {}", path.display());
        return Ok(());
    }

    println!("{}", path.display().to_string().dimmed());
    for (key, count) in log.summary() {
        println!("{:<50} {}", key.to_string().cyan(), count);
    }
    Ok(())
}
