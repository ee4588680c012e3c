//! Output module: record sinks and crawl reports
//!
//! This module handles:
//! - The `RecordSink` seam workers emit records through
//! - In-memory, bounded-channel and SQLite sinks
//! - Statistics, markdown summaries and JSON-lines record export

mod channel;
mod markdown;
mod memory;
mod sqlite_output;
pub mod stats;
mod traits;

pub use channel::ChannelSink;
pub use markdown::{format_markdown_summary, generate_markdown_summary};
pub use memory::MemorySink;
pub use sqlite_output::SqliteSink;
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use traits::{
    CrawlSummary, FailedPage, FieldCoverage, OutputError, OutputResult, RecordSink,
};

use crate::extract::ExtractedRecord;
use crate::state::PageState;
use crate::storage::Storage;
use crate::Result;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Failed pages listed in a summary
const MAX_FAILED_PAGES: usize = 20;

/// Generates a crawl summary from storage
///
/// # Arguments
///
/// * `storage` - The storage backend containing crawl data
/// * `run_id` - The run to summarize; the latest run when `None`
///
/// # Returns
///
/// * `Ok(CrawlSummary)` - Successfully generated summary
/// * `Err(CascadeError)` - Failed to generate summary
pub fn generate_summary(storage: &dyn Storage, run_id: Option<i64>) -> Result<CrawlSummary> {
    let stats = stats::load_statistics(storage, run_id)?;
    let run = &stats.run;

    // Calculate duration if finished
    let duration_seconds = match (
        run.started_at.parse::<chrono::DateTime<chrono::Utc>>(),
        run.finished_at
            .as_deref()
            .map(|f| f.parse::<chrono::DateTime<chrono::Utc>>()),
    ) {
        (Ok(started), Some(Ok(finished))) => Some((finished - started).num_seconds().max(0) as u64),
        _ => None,
    };

    let records = storage.load_records(run.id)?;
    let failed_pages = storage
        .get_failed_pages(run.id)?
        .into_iter()
        .take(MAX_FAILED_PAGES)
        .map(|page| FailedPage {
            url: page.url,
            level: page.level,
            state: page.state,
            message: page.error_message,
        })
        .collect();

    Ok(CrawlSummary {
        run_id: run.id,
        started_at: run.started_at.clone(),
        finished_at: run.finished_at.clone(),
        duration_seconds,
        status: run.status.to_db_string().to_string(),
        config_hash: run.config_hash.clone(),
        start_url: run.start_url.clone(),
        total_pages: stats.total_pages,
        pages_processed: stats
            .pages_by_state
            .get(&PageState::Processed)
            .copied()
            .unwrap_or(0),
        total_errors: stats.error_summary.values().sum(),
        records_emitted: stats.records,
        tasks_dropped: run.counters.map_or(0, |c| c.tasks_dropped),
        pages_by_level: stats.pages_by_level.clone(),
        error_summary: stats.error_summary.clone(),
        field_coverage: field_coverage(&records),
        failed_pages,
    })
}

/// Counts, per field name, how many records carry a value
///
/// A field missing from a record counts as absent for that record.
pub fn field_coverage(records: &[ExtractedRecord]) -> BTreeMap<String, FieldCoverage> {
    let mut coverage: BTreeMap<String, FieldCoverage> = BTreeMap::new();

    for record in records {
        for name in record.fields().keys() {
            coverage.entry(name.clone()).or_default();
        }
    }

    for record in records {
        for (name, entry) in coverage.iter_mut() {
            if record.get(name).is_absent() {
                entry.absent += 1;
            } else {
                entry.present += 1;
            }
        }
    }

    coverage
}

/// Writes a run's records as JSON lines
///
/// # Returns
///
/// The number of records written
pub fn export_records(storage: &dyn Storage, run_id: i64, path: &Path) -> Result<usize> {
    let records = storage.load_records(run_id)?;

    let mut writer = BufWriter::new(File::create(path)?);
    for record in &records {
        let line = serde_json::to_string(record)
            .map_err(|e| OutputError::Format(e.to_string()))?;
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    Ok(records.len())
}
