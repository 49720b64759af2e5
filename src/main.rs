//! Listing Harvester main entry point
//!
//! This is the command-line interface for the Listing Harvester crawler.

use anyhow::Context;
use clap::Parser;
use listing_harvester::config::{load_config_with_hash, Config};
use listing_harvester::crawler::{formatted_locations, run, RunMode};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Listing Harvester: a paginated listing crawler
///
/// Walks the search-result pages of a listing site for each configured
/// location, collects detail-page links and optionally downloads the pages
/// behind them, under a shared rate limit and a rotating proxy pool.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version)]
#[command(about = "A paginated listing crawler", long_about = None)]
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

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["export", "scrape"])]
    dry_run: bool,

    /// Download each detail page after collecting URLs
    #[arg(long, conflicts_with_all = ["dry_run", "scrape"])]
    export: bool,

    /// Download each page under a dated, numbered name after collecting URLs
    #[arg(long, conflicts_with_all = ["dry_run", "export"])]
    scrape: bool,

    /// Send requests directly instead of through the proxy pool
    #[arg(long)]
    no_proxy: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.no_proxy {
        config.proxy.enabled = false;
    }

    if cli.dry_run {
        return handle_dry_run(&config);
    }

    let mode = if cli.export {
        RunMode::Export
    } else if cli.scrape {
        RunMode::Scrape
    } else {
        RunMode::Collect
    };

    handle_crawl(config, mode).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let locations = formatted_locations(config)?;

    println!("=== Listing Harvester Dry Run ===\n");

    println!("Site: {}", config.crawl.site);
    if let Some(site) = config.active_site() {
        println!("  Search template: {}", site.search_template);
        println!("  Detail prefix: {}", site.detail_prefix);
    }
    println!("  Depth per location: {}", config.crawl.depth);
    println!("  On stall: {:?}", config.crawl.on_stall);

    println!("\nRequests:");
    println!(
        "  Rate limit: {} per {}ms",
        config.rate_limit.requests, config.rate_limit.window_ms
    );
    println!("  Timeout: {}ms", config.request.timeout_ms);
    println!("  Max attempts: {}", config.request.max_attempts);

    println!("\nProxies:");
    if config.proxy.enabled {
        println!("  Source: {}", config.proxy.source_url);
        println!("  Country: {}", config.proxy.country);
    } else {
        println!("  Disabled");
    }

    println!("\nLocations ({}):", locations.len());
    for (raw, formatted) in config.crawl.locations.iter().zip(&locations) {
        println!("  - {} -> {}", raw, formatted);
    }

    println!("\nOutput: {}", config.output.directory);
    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, mode: RunMode) -> anyhow::Result<()> {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, stopping after the current request");
            trigger.cancel();
        }
    });

    let summary = run(&config, mode, cancel).await.context("crawl failed")?;

    println!(
        "Collected {} URLs into {}",
        summary.navigate.collected(),
        summary.url_list.display()
    );
    if let Some(pages) = &summary.pages {
        println!(
            "Saved {} pages ({} failed)",
            pages.saved.len(),
            pages.failed.len()
        );
    }

    if !summary.navigate.is_success() {
        let stalled: Vec<&str> = summary
            .navigate
            .stalled()
            .map(|l| l.location.as_str())
            .collect();
        anyhow::bail!("crawl stalled for: {}", stalled.join(", "));
    }

    tracing::info!("Crawl completed successfully");
    Ok(())
}
