//! Bounded channel sink
//!
//! Workers hand records to a bounded `tokio::sync::mpsc` channel and a single
//! drain task forwards them to the real sink. When the buffer is full,
//! `emit` waits for space, which throttles the workers instead of letting
//! memory grow.

use crate::crawler::CounterSnapshot;
use crate::extract::ExtractedRecord;
use crate::output::traits::{OutputError, OutputResult, RecordSink};
use crate::storage::PageVisit;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

enum SinkMessage {
    Record(ExtractedRecord),
    Visit(PageVisit),
}

/// Messages the downstream sink refused while draining
#[derive(Debug, Default, Clone, Copy)]
struct DrainLosses {
    records: u64,
    visits: u64,
}

/// Sink that decouples workers from a slower downstream sink
pub struct ChannelSink {
    sender: Mutex<Option<mpsc::Sender<SinkMessage>>>,
    drain: Mutex<Option<JoinHandle<DrainLosses>>>,
    inner: Arc<dyn RecordSink>,
}

impl ChannelSink {
    /// Starts the drain task in front of `inner`
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `inner` - The sink records are forwarded to
    /// * `capacity` - Maximum number of buffered messages
    pub fn spawn(inner: Arc<dyn RecordSink>, capacity: usize) -> Self {
        let (sender, mut receiver) = mpsc::channel(capacity.max(1));
        let downstream = Arc::clone(&inner);

        let drain = tokio::spawn(async move {
            let mut losses = DrainLosses::default();
            while let Some(message) = receiver.recv().await {
                match message {
                    SinkMessage::Record(record) => {
                        if let Err(e) = downstream.emit(record).await {
                            losses.records += 1;
                            tracing::warn!("Downstream sink rejected a record: {}", e);
                        }
                    }
                    SinkMessage::Visit(visit) => {
                        if let Err(e) = downstream.record_visit(visit).await {
                            losses.visits += 1;
                            tracing::warn!("Downstream sink rejected a page visit: {}", e);
                        }
                    }
                }
            }
            losses
        });

        Self {
            sender: Mutex::new(Some(sender)),
            drain: Mutex::new(Some(drain)),
            inner,
        }
    }

    fn sender(&self) -> OutputResult<mpsc::Sender<SinkMessage>> {
        self.sender
            .lock()
            .map_err(|e| OutputError::Write(format!("Failed to lock sender: {}", e)))?
            .clone()
            .ok_or(OutputError::Closed)
    }

    async fn send(&self, message: SinkMessage) -> OutputResult<()> {
        self.sender()?
            .send(message)
            .await
            .map_err(|_| OutputError::Closed)
    }
}

#[async_trait]
impl RecordSink for ChannelSink {
    async fn emit(&self, record: ExtractedRecord) -> OutputResult<()> {
        self.send(SinkMessage::Record(record)).await
    }

    async fn record_visit(&self, visit: PageVisit) -> OutputResult<()> {
        self.send(SinkMessage::Visit(visit)).await
    }

    /// Closes the channel, waits for the buffer to drain, then finalizes
    /// the downstream sink
    ///
    /// Records accepted by `emit` but refused downstream are moved from
    /// `records_emitted` to `emit_failures` before the counters go on.
    async fn finalize(&self, counters: CounterSnapshot) -> OutputResult<CounterSnapshot> {
        let sender = self
            .sender
            .lock()
            .map_err(|e| OutputError::Write(format!("Failed to lock sender: {}", e)))?
            .take();
        drop(sender);

        let drain = self
            .drain
            .lock()
            .map_err(|e| OutputError::Write(format!("Failed to lock drain task: {}", e)))?
            .take();

        let mut counters = counters;
        if let Some(drain) = drain {
            let losses = drain
                .await
                .map_err(|e| OutputError::Write(format!("Drain task failed: {}", e)))?;
            if losses.records > 0 {
                tracing::warn!("{} records were lost downstream", losses.records);
                counters.records_emitted = counters.records_emitted.saturating_sub(losses.records);
                counters.emit_failures += losses.records;
            }
            if losses.visits > 0 {
                tracing::warn!("{} page visits were lost downstream", losses.visits);
            }
        }

        self.inner.finalize(counters).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::MemorySink;
    use crate::state::{CrawlLevel, PageState};
    use std::collections::BTreeMap;

    fn record(i: usize) -> ExtractedRecord {
        ExtractedRecord::new(format!("https://example.com/{}", i), BTreeMap::new())
    }

    #[tokio::test]
    async fn test_forwards_everything_before_finalize() {
        let memory = Arc::new(MemorySink::new());
        let sink = ChannelSink::spawn(memory.clone(), 2);

        for i in 0..10 {
            sink.emit(record(i)).await.unwrap();
        }
        sink.record_visit(PageVisit {
            url: "https://example.com/0".to_string(),
            level: CrawlLevel::Detail,
            state: PageState::Processed,
            status_code: None,
            error: None,
        })
        .await
        .unwrap();

        sink.finalize(CounterSnapshot::default()).await.unwrap();

        assert_eq!(memory.records().len(), 10);
        assert_eq!(memory.visits().len(), 1);
        assert!(memory.final_counters().is_some());
    }

    #[tokio::test]
    async fn test_emit_after_finalize_is_rejected() {
        let memory = Arc::new(MemorySink::new());
        let sink = ChannelSink::spawn(memory, 4);

        sink.finalize(CounterSnapshot::default()).await.unwrap();
        assert!(matches!(sink.emit(record(0)).await, Err(OutputError::Closed)));
    }

    #[tokio::test]
    async fn test_refused_records_are_not_counted_as_emitted() {
        /// Refuses every other record, keeps the final counters
        #[derive(Default)]
        struct Picky {
            seen: std::sync::atomic::AtomicUsize,
            memory: MemorySink,
        }

        #[async_trait]
        impl RecordSink for Picky {
            async fn emit(&self, record: ExtractedRecord) -> OutputResult<()> {
                let n = self.seen.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                if n % 2 == 1 {
                    return Err(OutputError::Write("disk full".to_string()));
                }
                self.memory.emit(record).await
            }

            async fn finalize(&self, counters: CounterSnapshot) -> OutputResult<CounterSnapshot> {
                self.memory.finalize(counters).await
            }
        }

        let picky = Arc::new(Picky::default());
        let sink = ChannelSink::spawn(picky.clone(), 2);
        for i in 0..4 {
            sink.emit(record(i)).await.unwrap();
        }

        let queued = CounterSnapshot {
            records_emitted: 4,
            ..CounterSnapshot::default()
        };
        let recorded = sink.finalize(queued).await.unwrap();

        assert_eq!(recorded.records_emitted, 2);
        assert_eq!(recorded.emit_failures, 2);
        assert_eq!(picky.memory.records().len(), 2);
        assert_eq!(picky.memory.final_counters(), Some(recorded));
    }

    #[tokio::test]
    async fn test_full_buffer_applies_backpressure() {
        struct Stalled;

        #[async_trait]
        impl RecordSink for Stalled {
            async fn emit(&self, _record: ExtractedRecord) -> OutputResult<()> {
                std::future::pending::<()>().await;
                Ok(())
            }
        }

        let sink = ChannelSink::spawn(Arc::new(Stalled), 1);

        // One message is held by the stalled drain, one fills the buffer
        sink.emit(record(0)).await.unwrap();
        sink.emit(record(1)).await.unwrap();

        let blocked = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            sink.emit(record(2)),
        )
        .await;
        assert!(blocked.is_err(), "emit should wait while the buffer is full");
    }
}
