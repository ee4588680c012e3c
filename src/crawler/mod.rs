//! Crawler module for hierarchical page fetching and extraction
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - HTML parsing behind the `PageModel` seam
//! - The Listing → Entity → Detail state machine
//! - The frontier, its pagination caps and the crawl budget
//! - Overall crawl coordination

mod coordinator;
mod counters;
mod fetcher;
mod machine;
mod parser;
mod scheduler;

pub use coordinator::{Coordinator, CrawlReport};
pub use counters::{CounterSnapshot, Counters, LevelSnapshot};
pub use fetcher::{build_http_client, Fetcher, HttpFetcher, PageBody};
pub use machine::{
    transition, CrawlPlan, CrawlState, LevelPlan, PaginationRule, PaginationState, Transition,
};
pub use parser::{HtmlPage, PageModel, SelectorExpr};
pub use scheduler::{should_follow_next_page, Admission, CrawlBudget, Frontier, FrontierLimits};

use crate::config::Config;
use crate::output::{ChannelSink, RecordSink, SqliteSink};
use crate::storage::{RunStatus, SqliteStorage, Storage};
use crate::Result;
use std::path::Path;
use std::sync::Arc;

/// Runs a complete crawl operation
///
/// This is the main entry point for starting a crawl. It will:
/// 1. Initialize the storage layer
/// 2. Create a crawl run
/// 3. Build the HTTP fetcher
/// 4. Drain the frontier with the worker pool
/// 5. Finalize the run with the counters, marking it interrupted if a
///    page budget or the deadline stopped it
///
/// # Arguments
///
/// * `config` - The validated crawler configuration
/// * `config_hash` - Hash of the configuration file, stored with the run
///
/// # Returns
///
/// * `Ok((run_id, report))` - Crawl completed
/// * `Err(CascadeError)` - Storage or client setup failed, or the sink
///   could not be finalized
pub async fn run_crawl(config: &Config, config_hash: &str) -> Result<(i64, CrawlReport)> {
    let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
    let run_id = storage.create_run(config_hash, &config.crawler.start_url)?;
    tracing::info!("Starting crawl run {}", run_id);

    let database: Arc<dyn RecordSink> = Arc::new(SqliteSink::new(storage, run_id));
    let sink = Arc::new(ChannelSink::spawn(database, config.output.channel_capacity));
    let fetcher = Arc::new(HttpFetcher::from_config(config)?);

    let coordinator = Coordinator::new(config, fetcher, sink);
    let outcome = coordinator.run().await;

    // The sink marks the run completed; record an early stop or a failure on top
    let final_status = match &outcome {
        Ok(report) if report.cancelled => Some(RunStatus::Interrupted),
        Ok(_) => None,
        Err(_) => Some(RunStatus::Failed),
    };
    if let Some(status) = final_status {
        let mut storage = SqliteStorage::new(Path::new(&config.output.database_path))?;
        storage.update_run_status(run_id, status)?;
        tracing::info!("Run {} marked {}", run_id, status.to_db_string());
    }

    Ok((run_id, outcome?))
}
