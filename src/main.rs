//! Skein main entry point
//!
//! This is the command-line interface for the skein crawl scheduler.

use anyhow::Context;
use clap::Parser;
use skein::config::{load_config_with_hash, Config, ThrottleKind};
use skein::crawler::Crawler;
use skein::output::{print_report, report_to_json};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Skein: a concurrent crawl scheduler
///
/// Skein crawls from a set of seed URLs with a bounded pool of workers,
/// following links within the configured scope until the frontier runs dry,
/// the visit budget is used up, or the crawl goes silent.
#[derive(Parser, Debug)]
#[command(name = "skein")]
#[command(version)]
#[command(about = "A concurrent crawl scheduler", long_about = None)]
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

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long)]
    dry_run: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Override the maximum number of URLs to visit (-1 = unlimited)
    #[arg(long, value_name = "N", allow_negative_numbers = true)]
    stop_count: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", hash);

    if let Some(stop_count) = cli.stop_count {
        config.crawler.stop_count = stop_count;
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(&config, cli.json).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("skein=info,warn"),
            1 => EnvFilter::new("skein=debug,info"),
            2 => EnvFilter::new("skein=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config) {
    let crawler = &config.crawler;
    println!("=== Skein Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Workers: {}", crawler.max_threads);
    if crawler.stop_count < 0 {
        println!("  Stop count: unlimited");
    } else {
        println!("  Stop count: {}", crawler.stop_count);
    }
    println!("  Silent stop: {} min", crawler.silent_stop_minutes);
    println!("  Poll interval: {}ms", crawler.poll_interval_ms);
    if crawler.retry_failed {
        println!("  Retry failed: up to {} times", crawler.max_retries);
    } else {
        println!("  Retry failed: no");
    }
    println!(
        "  Scope: in-domain={} sub-domain={} out-domain={}",
        crawler.in_domain, crawler.sub_domain, crawler.out_domain
    );

    let throttle = &config.throttle;
    println!("\nThrottle:");
    match throttle.kind {
        ThrottleKind::None => println!("  none"),
        ThrottleKind::Fixed => println!("  fixed interval of {}ms", throttle.interval_ms),
        ThrottleKind::Window => println!(
            "  {} requests per {}ms",
            throttle.max_requests, throttle.window_ms
        ),
    }
    if throttle.per_host {
        println!("  (per host)");
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.name);
    println!("  Version: {}", config.user_agent.version);
    println!("  Contact URL: {}", config.user_agent.contact_url);

    let filter = &config.filter;
    println!("\nFilters:");
    println!("  File type whitelist: {:?}", filter.file_type_whitelist);
    println!("  File type blacklist: {:?}", filter.file_type_blacklist);
    println!("  URL whitelist patterns: {}", filter.url_whitelist.len());
    println!("  URL blacklist patterns: {}", filter.url_blacklist.len());
    println!("  Allowed domains: {:?}", filter.allowed_domains);
    println!("  Rewrite rules: {}", filter.rewrite.len());

    println!("\nSeeds ({}):", config.seeds.len());
    for seed in &config.seeds {
        println!("  - {}", seed);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, json: bool) -> anyhow::Result<()> {
    let crawler = Crawler::from_config(config).context("Failed to set up the crawler")?;

    let stop = crawler.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, finishing in-flight pages");
            stop.stop();
        }
    });

    let settings = &config.crawler;
    let report = crawler
        .start(
            &config.seeds,
            settings.in_domain,
            settings.out_domain,
            settings.sub_domain,
        )
        .await
        .context("Crawl failed")?;

    if json {
        println!("{}", report_to_json(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}
