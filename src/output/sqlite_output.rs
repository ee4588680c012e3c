//! SQLite-backed record sink
//!
//! This module provides a sink that writes records, page visits and the
//! final run counters directly to the SQLite storage backend.

use crate::crawler::CounterSnapshot;
use crate::extract::ExtractedRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use crate::storage::{PageVisit, SqliteStorage, Storage};
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// SQLite-backed sink
///
/// Writes go through a mutex; put a `ChannelSink` in front of it so workers
/// never wait on the database directly.
pub struct SqliteSink {
    storage: Mutex<SqliteStorage>,
    run_id: i64,
}

impl SqliteSink {
    /// Creates a new SQLite sink
    ///
    /// # Arguments
    ///
    /// * `storage` - The storage backend to use
    /// * `run_id` - The current run ID
    pub fn new(storage: SqliteStorage, run_id: i64) -> Self {
        Self {
            storage: Mutex::new(storage),
            run_id,
        }
    }

    pub fn run_id(&self) -> i64 {
        self.run_id
    }

    fn storage(&self) -> OutputResult<MutexGuard<'_, SqliteStorage>> {
        self.storage
            .lock()
            .map_err(|e| OutputError::Storage(format!("Failed to lock storage: {}", e)))
    }
}

#[async_trait]
impl RecordSink for SqliteSink {
    async fn emit(&self, record: ExtractedRecord) -> OutputResult<()> {
        self.storage()?
            .insert_record(self.run_id, &record)
            .map_err(|e| OutputError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn record_visit(&self, visit: PageVisit) -> OutputResult<()> {
        self.storage()?
            .record_page(self.run_id, &visit)
            .map_err(|e| OutputError::Storage(e.to_string()))
    }

    async fn finalize(&self, counters: CounterSnapshot) -> OutputResult<CounterSnapshot> {
        self.storage()?
            .complete_run(self.run_id, &counters)
            .map_err(|e| OutputError::Storage(e.to_string()))?;

        tracing::info!(
            "Run {} finalized: {} records, {} pages",
            self.run_id,
            counters.records_emitted,
            counters.total_visited() + counters.total_failed()
        );
        Ok(counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{CrawlLevel, PageState};
    use crate::storage::RunStatus;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sink_persists_run() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("cascade.db");

        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let run_id = storage.create_run("hash", "https://example.com/").unwrap();
        let sink = SqliteSink::new(storage, run_id);

        sink.record_visit(PageVisit {
            url: "https://example.com/rev1".to_string(),
            level: CrawlLevel::Detail,
            state: PageState::Processed,
            status_code: Some(200),
            error: None,
        })
        .await
        .unwrap();
        sink.emit(ExtractedRecord::new("https://example.com/rev1", BTreeMap::new()))
            .await
            .unwrap();
        sink.finalize(CounterSnapshot::default()).await.unwrap();

        let reopened = SqliteStorage::new(&db_path).unwrap();
        assert_eq!(reopened.count_records(run_id).unwrap(), 1);
        assert_eq!(
            reopened.count_pages_by_level(run_id, CrawlLevel::Detail).unwrap(),
            1
        );
        assert_eq!(reopened.get_run(run_id).unwrap().status, RunStatus::Completed);
    }
}
