//! Process-wide crawl statistics
//!
//! Counters only ever increase. They feed progress logs and the final
//! report; the frontier's own page counters are what enforce caps.

use crate::state::CrawlLevel;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct LevelCounters {
    visited: AtomicU64,
    failed: AtomicU64,
}

/// Shared counters, updated by every worker
#[derive(Debug, Default)]
pub struct Counters {
    listing: LevelCounters,
    entity: LevelCounters,
    detail: LevelCounters,
    records_emitted: AtomicU64,
    emit_failures: AtomicU64,
    tasks_dropped: AtomicU64,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    fn level(&self, level: CrawlLevel) -> &LevelCounters {
        match level {
            CrawlLevel::Listing => &self.listing,
            CrawlLevel::Entity => &self.entity,
            CrawlLevel::Detail => &self.detail,
        }
    }

    /// Records a fetched and processed page
    pub fn record_visit(&self, level: CrawlLevel) {
        self.level(level).visited.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a page whose fetch failed
    pub fn record_failure(&self, level: CrawlLevel) {
        self.level(level).failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emitted(&self) {
        self.records_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_emit_failure(&self) {
        self.emit_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Records tasks discarded by the budget or by cancellation
    pub fn record_dropped(&self, count: u64) {
        self.tasks_dropped.fetch_add(count, Ordering::Relaxed);
    }

    /// Pages attempted so far, across all levels and outcomes
    pub fn pages_completed(&self) -> u64 {
        CrawlLevel::all()
            .into_iter()
            .map(|level| {
                let c = self.level(level);
                c.visited.load(Ordering::Relaxed) + c.failed.load(Ordering::Relaxed)
            })
            .sum()
    }

    pub fn snapshot(&self) -> CounterSnapshot {
        let level = |l: CrawlLevel| LevelSnapshot {
            visited: self.level(l).visited.load(Ordering::Relaxed),
            failed: self.level(l).failed.load(Ordering::Relaxed),
        };

        CounterSnapshot {
            listing: level(CrawlLevel::Listing),
            entity: level(CrawlLevel::Entity),
            detail: level(CrawlLevel::Detail),
            records_emitted: self.records_emitted.load(Ordering::Relaxed),
            emit_failures: self.emit_failures.load(Ordering::Relaxed),
            tasks_dropped: self.tasks_dropped.load(Ordering::Relaxed),
        }
    }
}

/// Per-level page counts at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSnapshot {
    pub visited: u64,
    pub failed: u64,
}

/// Point-in-time copy of [`Counters`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CounterSnapshot {
    pub listing: LevelSnapshot,
    pub entity: LevelSnapshot,
    pub detail: LevelSnapshot,
    pub records_emitted: u64,
    pub emit_failures: u64,
    pub tasks_dropped: u64,
}

impl CounterSnapshot {
    pub fn level(&self, level: CrawlLevel) -> LevelSnapshot {
        match level {
            CrawlLevel::Listing => self.listing,
            CrawlLevel::Entity => self.entity,
            CrawlLevel::Detail => self.detail,
        }
    }

    pub fn total_visited(&self) -> u64 {
        self.listing.visited + self.entity.visited + self.detail.visited
    }

    pub fn total_failed(&self) -> u64 {
        self.listing.failed + self.entity.failed + self.detail.failed
    }
}
