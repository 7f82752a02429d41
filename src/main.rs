//! Wiki-Graph main entry point
//!
//! This is the command-line interface for the Wiki-Graph link crawler.

use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use wiki_graph::config::{load_config_with_hash, Config};
use wiki_graph::crawler::run_crawl;

/// Wiki-Graph: an incremental wiki link-graph crawler
///
/// Wiki-Graph walks a wiki through its query API, recording which pages
/// link to which. Progress is checkpointed to a JSON document so an
/// interrupted crawl picks up where it left off.
#[derive(Parser, Debug)]
#[command(name = "wiki-graph")]
#[command(version = "1.0.0")]
#[command(about = "An incremental wiki link-graph crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Start a fresh crawl, ignoring the existing checkpoint
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the checkpoint and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_crawl(config, config_hash, cli.fresh).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("wiki_graph=info,warn"),
            1 => EnvFilter::new("wiki_graph=debug,info"),
            2 => EnvFilter::new("wiki_graph=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) {
    println!("=== Wiki-Graph Dry Run ===\n");

    println!("Crawler Configuration:");
    println!(
        "  Checkpoint interval: {} pages",
        config.crawler.checkpoint_interval
    );
    println!("  Retry delay: {}ms", config.crawler.retry_delay_ms);
    if config.crawler.max_retries == 0 {
        println!("  Max retries: unlimited");
    } else {
        println!("  Max retries: {}", config.crawler.max_retries);
    }
    println!(
        "  Max recovery attempts: {}",
        config.crawler.max_recovery_attempts
    );
    if let Some(expected) = config.crawler.expected_total_pages {
        println!("  Expected total pages: {}", expected);
    }

    println!("\nAPI:");
    println!("  Endpoint: {}", config.api.endpoint);
    println!("  Request timeout: {}s", config.api.request_timeout_secs);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Checkpoint: {}", config.output.checkpoint_path);
    println!("  Write retries: {}", config.output.checkpoint_retries);

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would start crawling with {} seed titles",
        config.seeds.len()
    );
}

/// Handles the --stats mode: shows statistics from the checkpoint
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use wiki_graph::output::{load_statistics, print_statistics};
    use wiki_graph::storage::JsonCheckpointStore;

    let store = JsonCheckpointStore::new(&config.output.checkpoint_path)
        .with_max_recovery_attempts(config.crawler.max_recovery_attempts);
    println!("Checkpoint: {}\n", store.path().display());

    let stats = load_statistics(&store)?;
    print_statistics(&stats, config.crawler.expected_total_pages);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: Config,
    config_hash: String,
    fresh: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Endpoint: {}, seeds: {}",
        config.api.endpoint,
        config.seeds.len()
    );

    // Ctrl-C asks the crawl to stop after the current page
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, saving and shutting down");
            signal_token.cancel();
        }
    });

    match run_crawl(&config, Some(config_hash), fresh, cancel).await {
        Ok(report) => {
            if report.cancelled {
                tracing::info!(
                    "Crawl interrupted; {} pages still queued, rerun to resume",
                    report.remaining
                );
            } else {
                tracing::info!("Crawl completed successfully");
            }
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
