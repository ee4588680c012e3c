//! Record sink trait and report types
//!
//! This module defines the trait interface record sinks implement and the
//! data structures used for crawl summaries.

use crate::crawler::CounterSnapshot;
use crate::extract::ExtractedRecord;
use crate::state::{CrawlLevel, PageState};
use crate::storage::PageVisit;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to format output: {0}")]
    Format(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Sink is closed")]
    Closed,
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;

/// Destination for completed records
///
/// Workers emit concurrently, so implementations must be thread-safe and
/// must not depend on emission order. `emit` may wait for buffer space but
/// must not block a worker indefinitely.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Takes ownership of one completed record
    async fn emit(&self, record: ExtractedRecord) -> OutputResult<()>;

    /// Records the outcome of a page fetch
    async fn record_visit(&self, _visit: PageVisit) -> OutputResult<()> {
        Ok(())
    }

    /// Called once after the last emission with the final counters
    ///
    /// Returns the counters as the sink recorded them, which may differ from
    /// the input when records were lost on the way to storage.
    async fn finalize(&self, counters: CounterSnapshot) -> OutputResult<CounterSnapshot> {
        Ok(counters)
    }
}

/// How often a field was present across a run's records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldCoverage {
    pub present: u64,
    pub absent: u64,
}

impl FieldCoverage {
    /// Percentage of records carrying the field
    pub fn percent_present(&self) -> f64 {
        let total = self.present + self.absent;
        if total == 0 {
            return 0.0;
        }
        (self.present as f64 / total as f64) * 100.0
    }
}

/// A page that failed, as listed in reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedPage {
    pub url: String,
    pub level: CrawlLevel,
    pub state: PageState,
    pub message: Option<String>,
}

/// Summary statistics for a crawl
#[derive(Debug, Clone, Default)]
pub struct CrawlSummary {
    // Run metadata
    pub run_id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub duration_seconds: Option<u64>,
    pub status: String,
    pub config_hash: String,
    pub start_url: String,

    // Overall statistics
    pub total_pages: u64,
    pub pages_processed: u64,
    pub total_errors: u64,
    pub records_emitted: u64,
    pub tasks_dropped: u64,

    // Level breakdown
    pub pages_by_level: BTreeMap<CrawlLevel, u64>,

    // Error summary (state -> count)
    pub error_summary: HashMap<PageState, u64>,

    // Field name -> coverage across records
    pub field_coverage: BTreeMap<String, FieldCoverage>,

    // First failed pages, in visit order
    pub failed_pages: Vec<FailedPage>,
}

impl CrawlSummary {
    /// Creates a new empty crawl summary
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the success rate as a percentage
    pub fn success_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.pages_processed as f64 / self.total_pages as f64) * 100.0
    }

    /// Returns the error rate as a percentage
    pub fn error_rate(&self) -> f64 {
        if self.total_pages == 0 {
            return 0.0;
        }
        (self.total_errors as f64 / self.total_pages as f64) * 100.0
    }
}
