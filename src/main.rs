//! Review-Cascade main entry point
//!
//! This is the command-line interface for the Review-Cascade crawler.

use anyhow::Context as _;
use clap::Parser;
use review_cascade::config::{load_config_with_hash, Config};
use review_cascade::crawler::run_crawl;
use review_cascade::output::{
    export_records, generate_markdown_summary, generate_summary, load_statistics,
    print_statistics,
};
use review_cascade::state::CrawlLevel;
use review_cascade::storage::SqliteStorage;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Review-Cascade: a hierarchical crawl-and-extract pipeline
///
/// Review-Cascade walks a paginated listing, follows every entity it links
/// to, follows every review each entity links to, and stores one record per
/// review. What to extract at each level is described in the configuration.
#[derive(Parser, Debug)]
#[command(name = "review-cascade")]
#[command(version)]
#[command(about = "A hierarchical crawl-and-extract pipeline", long_about = None)]
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

    /// Validate config and show the crawl plan without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "export_summary", "export_records"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary", "export_records"])]
    stats: bool,

    /// Generate markdown summary from existing data and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_records"])]
    export_summary: bool,

    /// Write a run's records as JSON lines to PATH and exit
    #[arg(long, value_name = "PATH", conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    export_records: Option<PathBuf>,

    /// Run to report on; defaults to the latest run
    #[arg(long, value_name = "ID")]
    run: Option<i64>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config, cli.run)?;
    } else if cli.export_summary {
        handle_export_summary(&config, cli.run)?;
    } else if let Some(path) = &cli.export_records {
        handle_export_records(&config, cli.run, path)?;
    } else {
        handle_crawl(&config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("review_cascade=info,warn"),
            1 => EnvFilter::new("review_cascade=debug,info"),
            2 => EnvFilter::new("review_cascade=trace,debug"),
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

/// Handles the --dry-run mode: shows the crawl plan
fn handle_dry_run(config: &Config) {
    println!("=== Review-Cascade Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start URL: {}", config.crawler.start_url);
    println!("  Max listing pages: {}", config.crawler.max_page_listing);
    println!("  Max pages per entity: {}", config.crawler.max_page_entity);
    if let Some(max) = config.crawler.max_detail_per_entity {
        println!("  Max detail pages per entity: {}", max);
    }
    println!("  Workers: {}", config.crawler.worker_count);
    if let Some(deadline) = config.crawler.deadline_secs {
        println!("  Deadline: {}s", deadline);
    }
    println!(
        "  Request timeout: {}s, {} retries every {}ms",
        config.crawler.request_timeout_secs,
        config.crawler.retries,
        config.crawler.retry_delay_ms
    );

    let budgets = config.budget.limits();
    if !budgets.is_empty() {
        println!("\nPage Budgets:");
        for level in CrawlLevel::all() {
            if let Some(limit) = budgets.get(&level) {
                println!("  {}: {}", level, limit);
            }
        }
    }

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Summary: {}", config.output.summary_path);

    for level in CrawlLevel::all() {
        let level_config = config.level(level);
        println!("\n[{}] ({} rules)", level, level_config.rules.len());
        for rule in &level_config.rules {
            println!("  - {}: {:?}", rule.name, rule.mode);
        }
        if let Some(links) = &level_config.links {
            println!("  follows: {}", links);
        }
        if let Some(pagination) = &level_config.pagination {
            println!("  next page: {}", pagination.next_url);
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config, run_id: Option<i64>) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let stats = load_statistics(&storage, run_id)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --export-summary mode: generates markdown summary
fn handle_export_summary(config: &Config, run_id: Option<i64>) -> anyhow::Result<()> {
    println!("=== Exporting Crawl Summary ===\n");
    println!("Database: {}", config.output.database_path);
    println!("Output: {}", config.output.summary_path);
    println!();

    write_summary(config, run_id)?;

    println!("✓ Summary exported to: {}", config.output.summary_path);

    Ok(())
}

/// Handles the --export-records mode: writes records as JSON lines
fn handle_export_records(config: &Config, run_id: Option<i64>, path: &Path) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let run = match run_id {
        Some(id) => id,
        None => {
            use review_cascade::storage::Storage;
            storage
                .get_latest_run()?
                .context("No crawl runs found in database")?
                .id
        }
    };

    let written = export_records(&storage, run, path)
        .with_context(|| format!("Failed to export records to {}", path.display()))?;
    println!("✓ Exported {} records from run {} to: {}", written, run, path.display());

    Ok(())
}

fn write_summary(config: &Config, run_id: Option<i64>) -> anyhow::Result<()> {
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    tracing::info!("Loading crawl data from database...");
    let summary = generate_summary(&storage, run_id)?;

    tracing::info!("Generating markdown summary...");
    generate_markdown_summary(&summary, Path::new(&config.output.summary_path))?;

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, config_hash: &str) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling from {} with {} workers",
        config.crawler.start_url,
        config.crawler.worker_count
    );

    let (run_id, report) = run_crawl(config, config_hash).await.context("Crawl failed")?;

    if report.cancelled {
        tracing::warn!(
            "Crawl stopped early by its page budget or deadline; {} tasks were dropped",
            report.counters.tasks_dropped
        );
    }

    write_summary(config, Some(run_id))?;
    tracing::info!(
        "Run {} finished: {} records, summary written to {}",
        run_id,
        report.counters.records_emitted,
        config.output.summary_path
    );

    Ok(())
}
