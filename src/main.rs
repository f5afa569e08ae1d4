//! Swapi-Harvest main entry point
//!
//! This is the command-line interface for the Swapi-Harvest batch harvester.

use clap::Parser;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use swapi_harvest::config::{compute_config_hash, load_config_or_default, Config};
use swapi_harvest::harvest::{harvest, partition_batches};
use swapi_harvest::storage::{RunStatus, SqliteStorage};
use swapi_harvest::{Character, HarvestError};
use tracing_subscriber::EnvFilter;

/// Swapi-Harvest: a rate-limited, link-resolving batch harvester
///
/// Swapi-Harvest fetches a range of characters from the Star Wars API,
/// resolves the planets, films, species, starships and vehicles they link
/// to, and stores the flattened records in SQLite.
#[derive(Parser, Debug)]
#[command(name = "swapi-harvest")]
#[command(version)]
#[command(about = "A rate-limited, link-resolving batch harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (built-in defaults when missing)
    #[arg(short, long, value_name = "CONFIG", default_value = "harvest.toml")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Drop and recreate all tables before harvesting
    #[arg(long)]
    fresh: bool,

    /// Validate config and show the batch plan without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::from(2)
        }
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("swapi_harvest=info,warn"),
            1 => EnvFilter::new("swapi_harvest=debug,info"),
            2 => EnvFilter::new("swapi_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Runs the selected mode; `Ok(false)` means the harvest finished incomplete
async fn run(cli: Cli) -> Result<bool, HarvestError> {
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config_or_default(&cli.config)?;
    let config_hash = compute_config_hash(&config)?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
        Ok(true)
    } else if cli.stats {
        handle_stats(&config)?;
        Ok(true)
    } else {
        handle_harvest(config, &config_hash, cli.fresh).await
    }
}

/// Handles the --dry-run mode: shows the effective config and batch plan
fn handle_dry_run(config: &Config) {
    println!("=== Swapi-Harvest Dry Run ===\n");

    println!("Fetcher:");
    println!(
        "  Max concurrent requests: {}",
        config.fetcher.max_concurrent_requests
    );
    println!(
        "  Minimum time per request: {}ms",
        config.fetcher.minimum_time_per_request
    );
    println!("  Request timeout: {}s", config.fetcher.request_timeout);
    println!("  User agent: {}", config.fetcher.user_agent);

    println!("\nCollection:");
    println!("  Base URL: {}", config.collection.base_url);
    println!(
        "  Ids: {}..={}",
        config.collection.first_id, config.collection.last_id
    );
    println!("  Batch size: {}", config.collection.batch_size);
    println!(
        "  Dropped resources fail the run: {}",
        config.collection.report_dropped
    );

    println!("\nLink fields ({}):", config.links.len());
    for entry in &config.links {
        println!("  - {} -> {}", entry.field, entry.attribute);
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let batches = partition_batches(
        config.collection.first_id,
        config.collection.last_id,
        config.collection.batch_size,
    );
    println!("\n✓ Configuration is valid");
    println!("✓ Would harvest in {} batches", batches.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), HarvestError> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    println!("Characters stored: {}", storage.count_characters()?);

    match storage.latest_run()? {
        Some(run) => {
            println!("Latest run: #{} ({})", run.id, run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Config hash: {}", run.config_hash);
        }
        None => println!("No runs recorded"),
    }

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: &str,
    fresh: bool,
) -> Result<bool, HarvestError> {
    let storage = Arc::new(SqliteStorage::new(Path::new(&config.output.database_path))?);
    if fresh {
        tracing::info!("Starting fresh harvest (dropping existing tables)");
        storage.reset()?;
    }

    let run_id = storage.create_run(config_hash)?;
    tracing::info!("Starting harvest run {}", run_id);

    let report = match harvest::<Character, _>(&config, Arc::clone(&storage)).await {
        Ok(report) => report,
        Err(e) => {
            storage.finish_run(run_id, RunStatus::Failed)?;
            return Err(e);
        }
    };

    if report.is_complete() {
        storage.finish_run(run_id, RunStatus::Completed)?;
        tracing::info!("Harvest completed successfully");
        Ok(true)
    } else {
        storage.finish_run(run_id, RunStatus::Incomplete)?;
        for dropped in &report.dropped {
            tracing::warn!("Resource {} was dropped: {}", dropped.id, dropped.reason);
        }
        tracing::error!(
            "{}",
            HarvestError::Incomplete {
                failures: report.failures.len(),
                dropped: report.dropped.len(),
            }
        );
        Ok(false)
    }
}
