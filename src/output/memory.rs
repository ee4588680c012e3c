//! In-memory record sink

use crate::crawler::CounterSnapshot;
use crate::extract::ExtractedRecord;
use crate::output::traits::{OutputResult, RecordSink};
use crate::storage::PageVisit;
use async_trait::async_trait;
use std::sync::{Mutex, MutexGuard};

/// Collects everything it receives, for library callers and tests
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<ExtractedRecord>>,
    visits: Mutex<Vec<PageVisit>>,
    counters: Mutex<Option<CounterSnapshot>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records received so far, in arrival order
    pub fn records(&self) -> Vec<ExtractedRecord> {
        lock(&self.records).clone()
    }

    pub fn visits(&self) -> Vec<PageVisit> {
        lock(&self.visits).clone()
    }

    /// Counters passed to `finalize`, if it has been called
    pub fn final_counters(&self) -> Option<CounterSnapshot> {
        *lock(&self.counters)
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn emit(&self, record: ExtractedRecord) -> OutputResult<()> {
        lock(&self.records).push(record);
        Ok(())
    }

    async fn record_visit(&self, visit: PageVisit) -> OutputResult<()> {
        lock(&self.visits).push(visit);
        Ok(())
    }

    async fn finalize(&self, counters: CounterSnapshot) -> OutputResult<CounterSnapshot> {
        *lock(&self.counters) = Some(counters);
        Ok(counters)
    }
}
