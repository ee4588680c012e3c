//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::CounterSnapshot;
use crate::extract::ExtractedRecord;
use crate::state::{CrawlLevel, PageState};
use crate::storage::{PageRecord, PageVisit, RunRecord, RunStatus};
use std::collections::HashMap;
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all database operations needed by the crawler and
/// its reports.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    /// * `start_url` - The listing page the run is seeded from
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str, start_url: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Updates the status of a run
    fn update_run_status(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Marks a run as completed, storing its final counters
    fn complete_run(&mut self, run_id: i64, counters: &CounterSnapshot) -> StorageResult<()>;

    // ===== Page Visits =====

    /// Records the outcome of one page fetch
    fn record_page(&mut self, run_id: i64, visit: &PageVisit) -> StorageResult<()>;

    /// Gets all pages of a run that ended in an error state
    fn get_failed_pages(&self, run_id: i64) -> StorageResult<Vec<PageRecord>>;

    // ===== Records =====

    /// Stores an extracted record
    ///
    /// # Returns
    ///
    /// The row ID of the stored record
    fn insert_record(&mut self, run_id: i64, record: &ExtractedRecord) -> StorageResult<i64>;

    /// Loads every record of a run, in emission order
    fn load_records(&self, run_id: i64) -> StorageResult<Vec<ExtractedRecord>>;

    // ===== Statistics =====

    /// Counts records emitted by a run
    fn count_records(&self, run_id: i64) -> StorageResult<u64>;

    /// Counts pages of a run by state
    fn count_pages_by_state(&self, run_id: i64, state: PageState) -> StorageResult<u64>;

    /// Counts pages of a run by level
    fn count_pages_by_level(&self, run_id: i64, level: CrawlLevel) -> StorageResult<u64>;

    /// Gets error summary (state -> count) for a run
    fn get_error_summary(&self, run_id: i64) -> StorageResult<HashMap<PageState, u64>>;
}
