//! Crossword Harvest main entry point
//!
//! This is the command-line interface for the crossword-answers crawler.

use anyhow::Context;
use clap::Parser;
use crossword_harvest::config::{load_config_with_hash, validate, Config, DEFAULT_CONFIG_HASH};
use crossword_harvest::crawler::harvest;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Crossword Harvest: a resumable crossword-answers crawler
///
/// Walks the site's sitemaps, stores one crossword page per date and extracts
/// every clue/answer pair into a SQLite database. Re-running resumes where the
/// previous run stopped.
#[derive(Parser, Debug)]
#[command(name = "crossword-harvest")]
#[command(version)]
#[command(about = "A resumable crossword-answers crawler", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (defaults are used when omitted)
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Path to the SQLite database (overrides the configuration)
    #[arg(long, value_name = "PATH")]
    database: Option<PathBuf>,

    /// Discard the existing database and start over
    #[arg(long, conflicts_with = "stats")]
    rebuild: bool,

    /// Show statistics from the database and exit
    #[arg(long)]
    stats: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, hash)
        }
        None => (Config::default(), DEFAULT_CONFIG_HASH.to_string()),
    };

    if let Some(database) = &cli.database {
        config.output.database_path = database.display().to_string();
    }
    validate(&config).context("Invalid configuration")?;

    if cli.stats {
        handle_stats(&config)
    } else {
        handle_harvest(&config, cli.rebuild, &config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("crossword_harvest=info,warn"),
            1 => EnvFilter::new("crossword_harvest=debug,info"),
            2 => EnvFilter::new("crossword_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use crossword_harvest::output::{load_statistics, print_statistics};
    use crossword_harvest::storage::SqliteStorage;
    use std::path::Path;

    let path = Path::new(&config.output.database_path);
    if !path.exists() {
        anyhow::bail!("No database at {}", path.display());
    }

    println!("Database: {}\n", path.display());
    let storage = SqliteStorage::open_or_create(path, false)?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: &Config, rebuild: bool, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Harvesting {} into {}",
        config.site.base_url,
        config.output.database_path
    );

    match harvest(config, rebuild, config_hash).await {
        Ok(summary) => {
            tracing::info!(
                "Run finished: {} new sitemaps, {} new pages, {} pages extracted ({} skipped)",
                summary.sitemaps_discovered,
                summary.pages_discovered,
                summary.pages_processed,
                summary.pages_failed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
