use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use repomirror::config::LoggingConfig;
use repomirror::{Config, RunContext, RunSummary, SyncEngine};

#[derive(Parser)]
#[command(name = "repomirror")]
#[command(about = "Mirror git repositories between hosting providers, directories and archives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Mirror repositories according to configuration
    Sync {
        /// Log what would be mirrored without writing anything
        #[arg(long)]
        dry_run: bool,

        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// List source repositories that would be mirrored
    List {
        /// Show every repository, skipping the filters
        #[arg(long)]
        all: bool,
    },

    /// Check the configuration file
    Validate,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    init_logging(cli.verbose, &config.logging)?;
    info!("Starting repomirror v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Sync { dry_run, json } => cmd_sync(config, dry_run, json).await,
        Commands::List { all } => cmd_list(config, all).await,
        Commands::Validate => cmd_validate(&config),
    }
}

/// Initialize logging from verbosity and the logging config
fn init_logging(verbose: bool, logging: &LoggingConfig) -> Result<()> {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let layer = fmt::layer().with_ansi(logging.color).with_writer(std::io::stderr);
    let registry = tracing_subscriber::registry().with(filter);

    match logging.format.as_str() {
        "pretty" => registry.with(layer.pretty()).try_init(),
        "full" => registry.with(layer).try_init(),
        _ => registry.with(layer.compact()).try_init(),
    }
    .context("Failed to initialise logging")?;

    Ok(())
}

/// Load configuration from specified path or default location
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config> {
    match config_path {
        Some(path) => Config::load(path),
        None => Config::load_default(),
    }
}

/// Run one mirror pass; Ctrl+C stops repositories that have not started yet
async fn cmd_sync(mut config: Config, dry_run: bool, json: bool) -> Result<()> {
    if dry_run {
        config.sync.dry_run = true;
    }

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl+C, finishing in-flight repositories");
            signal_cancel.cancel();
        }
    });

    let ctx = RunContext::with_cancellation(cancel);
    let engine = SyncEngine::new(config);

    if !json {
        println!("🔄 Mirroring from {}", engine.config().source.describe());
    }

    let outcome = engine.run(&ctx).await?;
    let summary = RunSummary::new(engine.config(), &outcome);
    summary.log();

    if json {
        println!("{}", summary.to_json().context("Failed to serialize summary")?);
    } else {
        println!();
        print!("{}", summary.render());
        println!("   ⏱️  Duration: {:.2}s", outcome.duration.as_secs_f64());
    }

    if summary.has_failures() {
        anyhow::bail!(
            "{} repositories failed to synchronize",
            summary.failures.get("failed").map_or(0, |f| f.count)
        );
    }

    Ok(())
}

/// List repositories of the configured source
async fn cmd_list(config: Config, all: bool) -> Result<()> {
    let engine = SyncEngine::new(config);
    let ctx = RunContext::new();
    let projects = engine.list_source(&ctx, !all).await?;

    println!("Repositories ({}): ", projects.len());
    for project in &projects {
        let fork = if project.is_fork { " (fork)" } else { "" };
        println!("  📁 {} [{}]{}", project.name(), project.visibility, fork);
        if let Some(description) = &project.description {
            println!("     📝 {}", description);
        }
    }

    if !all {
        let skipped = ctx.snapshot();
        for (category, names) in skipped.fail.iter().filter(|(_, n)| !n.is_empty()) {
            println!("  ⏭️  {}: {}", category, names.join(", "));
        }
    }

    Ok(())
}

fn cmd_validate(config: &Config) -> Result<()> {
    config.validate()?;

    println!("✅ Configuration is valid");
    println!("   Source: {}", config.source.describe());
    for target in &config.targets {
        println!("   Target: {}", target.describe());
    }
    println!(
        "   Parallel transfers: {}, dry run: {}",
        config.sync.max_parallel, config.sync.dry_run
    );

    Ok(())
}
