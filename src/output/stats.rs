//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::{CrawlLevel, PageState};
use crate::storage::{RunRecord, Storage};
use crate::{CascadeError, Result};
use std::collections::{BTreeMap, HashMap};

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// The run these statistics describe
    pub run: RunRecord,

    /// Total number of page visits recorded
    pub total_pages: u64,

    /// Count of pages by level
    pub pages_by_level: BTreeMap<CrawlLevel, u64>,

    /// Count of pages by state
    pub pages_by_state: HashMap<PageState, u64>,

    /// Number of records stored
    pub records: u64,

    /// Error summary (error states and their counts)
    pub error_summary: HashMap<PageState, u64>,
}

/// Loads statistics for a run from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
/// * `run_id` - The run to describe; the latest run when `None`
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(CascadeError)` - No such run, or the query failed
pub fn load_statistics(storage: &dyn Storage, run_id: Option<i64>) -> Result<CrawlStatistics> {
    let run = match run_id {
        Some(id) => storage.get_run(id)?,
        None => storage
            .get_latest_run()?
            .ok_or_else(|| CascadeError::Storage("No crawl runs found in database".to_string()))?,
    };

    let mut pages_by_level = BTreeMap::new();
    for level in CrawlLevel::all() {
        pages_by_level.insert(level, storage.count_pages_by_level(run.id, level)?);
    }
    let total_pages = pages_by_level.values().sum();

    let mut pages_by_state = HashMap::new();
    for state in PageState::all_states() {
        let count = storage.count_pages_by_state(run.id, state)?;
        if count > 0 {
            pages_by_state.insert(state, count);
        }
    }

    let records = storage.count_records(run.id)?;
    let error_summary = storage.get_error_summary(run.id)?;

    Ok(CrawlStatistics {
        run,
        total_pages,
        pages_by_level,
        pages_by_state,
        records,
        error_summary,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics (run {}) ===\n", stats.run.id);

    println!("Overview:");
    println!("  Start URL: {}", stats.run.start_url);
    println!("  Status: {}", stats.run.status.to_db_string());
    println!("  Total pages visited: {}", stats.total_pages);
    println!("  Records extracted: {}", stats.records);
    println!();

    println!("Pages by Level:");
    for (level, count) in &stats.pages_by_level {
        println!("  {}: {}", level, count);
    }
    println!();

    println!("Pages by State:");
    // Sort states by count (descending)
    let mut state_counts: Vec<_> = stats.pages_by_state.iter().collect();
    state_counts.sort_by(|a, b| b.1.cmp(a.1));

    for (state, count) in state_counts {
        let percentage = if stats.total_pages > 0 {
            (*count as f64 / stats.total_pages as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", state, count, percentage);
    }
    println!();

    if !stats.error_summary.is_empty() {
        println!("Error Summary:");
        let mut error_counts: Vec<_> = stats.error_summary.iter().collect();
        error_counts.sort_by(|a, b| b.1.cmp(a.1));

        for (state, count) in error_counts {
            println!("  {}: {}", state, count);
        }
        println!();
    }

    if let Some(counters) = &stats.run.counters {
        if counters.tasks_dropped > 0 {
            println!("Tasks dropped by budget or deadline: {}", counters.tasks_dropped);
        }
        if counters.emit_failures > 0 {
            println!("Records lost on emission: {}", counters.emit_failures);
        }
    }

    let processed = stats
        .pages_by_state
        .get(&PageState::Processed)
        .unwrap_or(&0);
    let success_rate = if stats.total_pages > 0 {
        (*processed as f64 / stats.total_pages as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Success Rate: {:.1}% ({} / {} pages successfully processed)",
        success_rate, processed, stats.total_pages
    );
}
