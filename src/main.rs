//! Linkdump main entry point
//!
//! This is the command-line interface for the Linkdump page dumper.

use anyhow::{Context, Result};
use clap::Parser;
use linkdump::config::{load_config_with_hash, resolve_seed, Config};
use linkdump::output::print_statistics;
use linkdump::storage::open_store;
use linkdump::{ConfigError, Coordinator};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Linkdump: a polite, resumable link-following page dumper
///
/// Linkdump fetches a seed page, follows its links breadth-first up to a
/// maximum depth and writes the raw body of every fetched page to disk,
/// keeping per-host concurrency and delay limits.
#[derive(Parser, Debug)]
#[command(name = "linkdump")]
#[command(version)]
#[command(about = "A polite, resumable link-following page dumper", long_about = None)]
struct Cli {
    /// URL to start crawling from (overrides `seed` in the config file)
    #[arg(value_name = "SEED")]
    seed: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Maximum link depth from the seed
    #[arg(long, value_name = "N")]
    max_depth: Option<u32>,

    /// Number of concurrent workers
    #[arg(long, value_name = "N")]
    parallelism: Option<u32>,

    /// Minimum delay between fetch starts to the same host
    #[arg(long, value_name = "MS")]
    per_host_delay_ms: Option<u64>,

    /// Maximum concurrent fetches to the same host
    #[arg(long, value_name = "N")]
    per_host_concurrency: Option<u32>,

    /// Timeout for a single fetch
    #[arg(long, value_name = "MS")]
    fetch_timeout_ms: Option<u64>,

    /// Stop enqueueing after this many pages
    #[arg(long, value_name = "N")]
    max_pages: Option<u64>,

    /// Only follow links to matching hosts (`example.com` or `*.example.com`); repeatable
    #[arg(long = "allow-domain", value_name = "PATTERN")]
    allow_domains: Vec<String>,

    /// Directory pages are written to
    #[arg(short, long, value_name = "OUTPUT_DIR")]
    output: Option<PathBuf>,

    /// SQLite file journaling the crawl so it can be resumed
    #[arg(long, value_name = "PATH")]
    state: Option<PathBuf>,

    /// Start a fresh crawl, ignoring any interrupted run in the state file
    #[arg(long)]
    fresh: bool,

    /// Validate the configuration and show what would be crawled
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(seed) = &self.seed {
            config.seed = Some(seed.clone());
        }
        if let Some(v) = self.max_depth {
            config.crawler.max_depth = v;
        }
        if let Some(v) = self.parallelism {
            config.crawler.parallelism = v;
        }
        if let Some(v) = self.per_host_delay_ms {
            config.crawler.per_host_delay_ms = v;
        }
        if let Some(v) = self.per_host_concurrency {
            config.crawler.per_host_concurrency = v;
        }
        if let Some(v) = self.fetch_timeout_ms {
            config.crawler.fetch_timeout_ms = v;
        }
        if let Some(v) = self.max_pages {
            config.crawler.max_pages = Some(v);
        }
        if !self.allow_domains.is_empty() {
            config.crawler.allowed_domains = self.allow_domains.clone();
        }
        if let Some(dir) = &self.output {
            config.output.output_dir = dir.clone();
        }
        if let Some(path) = &self.state {
            config.output.state_path = Some(path.clone());
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    let (mut config, file_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (config, Some(hash))
        }
        None => (Config::default(), None),
    };

    cli.apply_overrides(&mut config);
    config.validate().context("Invalid configuration")?;

    let seed = match config.seed.as_deref() {
        Some(seed) => resolve_seed(seed)?,
        None => return Err(ConfigError::MissingSeed.into()),
    };

    if cli.dry_run {
        handle_dry_run(&config, &seed);
        return Ok(());
    }

    let config_hash = file_hash.unwrap_or_else(|| config.fingerprint());
    handle_crawl(config, config_hash, seed, cli.fresh).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkdump=info,warn"),
            1 => EnvFilter::new("linkdump=debug,info"),
            2 => EnvFilter::new("linkdump=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config, seed: &Url) {
    println!("=== Linkdump Dry Run ===\n");

    println!("Seed: {}", seed);

    println!("\nCrawler Configuration:");
    println!("  Max depth: {}", config.crawler.max_depth);
    println!("  Parallelism: {}", config.crawler.parallelism);
    println!("  Per-host delay: {}ms", config.crawler.per_host_delay_ms);
    println!(
        "  Per-host concurrency: {}",
        config.crawler.per_host_concurrency
    );
    println!("  Fetch timeout: {}ms", config.crawler.fetch_timeout_ms);
    println!("  Max body size: {} bytes", config.crawler.max_body_bytes);
    match config.crawler.max_pages {
        Some(n) => println!("  Max pages: {}", n),
        None => println!("  Max pages: unlimited"),
    }

    println!(
        "\nAllowed Domains ({}):",
        config.crawler.allowed_domains.len()
    );
    if config.crawler.allowed_domains.is_empty() {
        println!("  (any host)");
    }
    for pattern in &config.crawler.allowed_domains {
        println!("  - {}", pattern);
    }

    println!("\nUser Agent: {}", config.user_agent.header_value());

    println!("\nOutput:");
    println!("  Pages: {}", config.output.output_dir.display());
    match &config.output.state_path {
        Some(path) => println!("  Crawl state: {}", path.display()),
        None => println!("  Crawl state: none (crawl cannot be resumed)"),
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, seed: Url, fresh: bool) -> Result<()> {
    let state_path = config.output.state_path.clone();
    let mut coordinator = Coordinator::new(config)
        .with_config_hash(config_hash)
        .fresh(fresh);

    if let Some(path) = state_path {
        let store = open_store(&path)
            .with_context(|| format!("Failed to open crawl state {}", path.display()))?;
        if fresh {
            tracing::info!("Starting fresh crawl (ignoring previous state)");
        } else {
            tracing::info!("Crawl state: {} (will resume an interrupted run)", path.display());
        }
        coordinator = coordinator.with_store(store);
    }

    let shutdown = coordinator.shutdown_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing in-flight work...");
            shutdown.cancel();
        }
    });

    let stats = coordinator.run(&seed).await.context("Crawl failed to start")?;

    println!();
    print_statistics(&stats);

    Ok(())
}
