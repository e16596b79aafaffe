//! Sumi-Sift main entry point
//!
//! This is the command-line interface for the Sumi-Sift record harvester.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use sumi_sift::config::{load_config_with_hash, Config};
use sumi_sift::output::{print_statistics, write_outputs};
use sumi_sift::url::parse_seed;
use sumi_sift::Harvester;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Sumi-Sift: A polite structured-data harvester
///
/// Sumi-Sift fetches pages while respecting robots.txt and per-host delays,
/// extracts records through the configured field selectors, drops
/// duplicates and writes the results to JSON or SQLite.
#[derive(Parser, Debug)]
#[command(name = "sumi-sift")]
#[command(version = "1.0.0")]
#[command(about = "A polite structured-data harvester", long_about = None)]
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

    /// Validate config and show what would be harvested without fetching
    #[arg(long)]
    dry_run: bool,

    /// Add the pages listed in a sitemap (and its nested sitemaps) as seeds
    #[arg(long, value_name = "URL")]
    sitemap: Vec<String>,

    /// Add the sitemaps declared in each seed host's robots.txt
    #[arg(long)]
    robots_sitemaps: bool,

    /// Follow pagination from every seed instead of fetching seeds as a batch
    #[arg(long)]
    paginate: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.paginate {
        config.seeds.paginate = true;
    }

    if cli.dry_run {
        handle_dry_run(&config, &cli);
        return Ok(());
    }

    handle_harvest(config, &cli).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("sumi_sift=info,warn"),
            1 => EnvFilter::new("sumi_sift=debug,info"),
            2 => EnvFilter::new("sumi_sift=trace,debug"),
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

/// Handles the --dry-run mode: shows what would be harvested
fn handle_dry_run(config: &Config, cli: &Cli) {
    println!("=== Sumi-Sift Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Base delay: {}s", config.crawler.base_delay);
    println!("  Concurrency limit: {}", config.crawler.concurrency_limit);
    println!("  Max retries: {}", config.crawler.max_retries);
    println!("  Timeout: {}s", config.crawler.timeout);
    println!("  Respect robots.txt: {}", config.crawler.respect_robots);
    println!("  Fetch mode: {:?}", config.crawler.fetch_mode);
    if config.seeds.paginate {
        println!("  Pagination: up to {} page(s) per seed", config.crawler.max_pages);
    }

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.header_value());
    println!("  Robots token: {}", config.user_agent.robots_token);

    println!("\nProxies ({}):", config.proxy.proxy_list.len());
    for proxy in &config.proxy.proxy_list {
        println!("  - {}", proxy);
    }

    println!("\nFields ({}):", config.fields.len());
    if config.fields.is_empty() {
        println!("  (none configured, recording page URL and title)");
    }
    for (name, spec) in &config.fields {
        let mode = if spec.multiple { "all" } else { "first" };
        println!("  - {}: {} [{}, {}]", name, spec.selector, spec.attribute, mode);
    }

    println!("\nOutput:");
    println!("  Directory: {}", config.output.directory);
    println!("  Formats: {:?}", config.output.formats);

    println!("\nSeeds ({}):", config.seeds.urls.len());
    for seed in &config.seeds.urls {
        println!("  * {}", seed);
    }
    for sitemap in &cli.sitemap {
        println!("  * sitemap {}", sitemap);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let harvester = Harvester::from_config(&config)?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight fetches");
            on_signal.cancel();
        }
    });

    let mut sitemaps = cli.sitemap.clone();
    if cli.robots_sitemaps {
        for seed in &config.seeds.urls {
            let url = parse_seed(seed)?;
            sitemaps.extend(harvester.robots_sitemaps(&url).await);
        }
    }

    let mut seeds = config.seeds.urls.clone();
    for sitemap in &sitemaps {
        let pages = harvester.discover_from_sitemap(sitemap, &cancel).await?;
        tracing::info!("Sitemap {} contributed {} URL(s)", sitemap, pages.len());
        seeds.extend(pages);
    }

    if seeds.is_empty() {
        anyhow::bail!("No seed URLs configured; add [seeds].urls or pass --sitemap");
    }

    tracing::info!("Total seed URLs: {}", seeds.len());
    let report = harvester
        .harvest(&seeds, config.seeds.paginate, cancel.clone())
        .await?;

    write_outputs(&report, &config.output)
        .with_context(|| format!("Failed to write output to {}", config.output.directory))?;

    for proxy in harvester.proxy_stats() {
        tracing::info!(
            "Proxy {}: {} request(s), {} failure(s), {}",
            proxy.address,
            proxy.requests_count,
            proxy.failure_count,
            if proxy.active { "active" } else { "disabled" }
        );
    }

    if !cli.quiet {
        println!();
        print_statistics(&report.statistics);
    }

    if cancel.is_cancelled() {
        tracing::warn!("Harvest was interrupted; results are partial");
    }

    Ok(())
}
