//! Crawler coordinator - main crawl orchestration logic
//!
//! This module runs the worker pool that drains the frontier:
//! - Seeding the frontier with the start URL
//! - Dispatching tasks to at most `worker-count` concurrent workers
//! - Fetching, parsing and stepping the state machine for each page
//! - Handing records and page visits to the sink
//! - Finalizing the sink with the counters once the frontier is empty

use crate::config::Config;
use crate::crawler::counters::{CounterSnapshot, Counters};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::machine::{transition, CrawlPlan, Transition};
use crate::crawler::parser::HtmlPage;
use crate::crawler::scheduler::{Admission, CrawlBudget, Frontier, FrontierLimits};
use crate::output::RecordSink;
use crate::state::{FollowTask, PageState};
use crate::storage::PageVisit;
use crate::{CascadeError, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Outcome of a finished crawl
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrawlReport {
    /// Final counter values
    pub counters: CounterSnapshot,

    /// Wall-clock time from seeding to finalization
    pub elapsed: Duration,

    /// Whether a page budget or the deadline stopped the crawl early
    pub cancelled: bool,
}

/// State shared by the coordinator and every worker
struct Shared {
    fetcher: Arc<dyn Fetcher>,
    sink: Arc<dyn RecordSink>,
    plan: CrawlPlan,
    frontier: Frontier,
    budget: CrawlBudget,
    counters: Counters,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    shared: Arc<Shared>,
    start_url: String,
    worker_count: usize,
}

impl Coordinator {
    /// Creates a coordinator from a validated configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fetcher` - Where page bodies come from
    /// * `sink` - Where records and page visits go
    pub fn new(config: &Config, fetcher: Arc<dyn Fetcher>, sink: Arc<dyn RecordSink>) -> Self {
        Self::with_parts(
            config.plan(),
            config.frontier_limits(),
            config.budget(),
            &config.crawler.start_url,
            config.crawler.worker_count,
            fetcher,
            sink,
        )
    }

    /// Creates a coordinator from its individual parts
    pub fn with_parts(
        plan: CrawlPlan,
        limits: FrontierLimits,
        budget: CrawlBudget,
        start_url: &str,
        worker_count: usize,
        fetcher: Arc<dyn Fetcher>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                fetcher,
                sink,
                plan,
                frontier: Frontier::new(limits),
                budget,
                counters: Counters::new(),
            }),
            start_url: start_url.to_string(),
            worker_count: worker_count.max(1),
        }
    }

    /// Counter values so far
    pub fn counters(&self) -> CounterSnapshot {
        self.shared.counters.snapshot()
    }

    /// Runs the crawl until the frontier is empty, a page budget is spent,
    /// or the deadline passes
    ///
    /// Per-page failures never abort the run; they are counted and reported
    /// to the sink. Only a failure to finalize the sink is returned as an
    /// error.
    pub async fn run(&self) -> Result<CrawlReport> {
        let start_time = Instant::now();
        let shared = &self.shared;

        tracing::info!(
            "Starting crawl at {} with {} workers",
            self.start_url,
            self.worker_count
        );

        if !shared.frontier.enqueue(FollowTask::seed(&self.start_url)) {
            tracing::warn!("Start URL {} was not admitted", self.start_url);
        }

        let mut workers = JoinSet::new();
        let mut last_progress = 0;

        loop {
            while workers.len() < self.worker_count {
                let Some(task) = shared.frontier.pop() else {
                    break;
                };

                match shared.budget.admit(task.level) {
                    Admission::Go => {
                        let worker = Arc::clone(shared);
                        workers.spawn(async move { worker.process(task).await });
                    }
                    Admission::Cancelled => {
                        let dropped = 1 + shared.frontier.drain_pending();
                        tracing::info!("Crawl stopped early; dropping {} pending tasks", dropped);
                        shared.counters.record_dropped(dropped as u64);
                        break;
                    }
                }
            }

            match workers.join_next().await {
                None => break,
                Some(Ok(())) => {}
                Some(Err(e)) => tracing::error!("Worker task failed: {}", e),
            }

            let completed = shared.counters.pages_completed();
            if completed / 10 > last_progress / 10 {
                last_progress = completed;
                let rate = completed as f64 / start_time.elapsed().as_secs_f64().max(f64::EPSILON);
                tracing::info!(
                    "Progress: {} pages crawled, {} pending, {:.2} pages/sec",
                    completed,
                    shared.frontier.pending_len(),
                    rate
                );
            }
        }

        let counters = shared
            .sink
            .finalize(shared.counters.snapshot())
            .await
            .map_err(CascadeError::from)?;

        let report = CrawlReport {
            counters,
            elapsed: start_time.elapsed(),
            cancelled: shared.budget.was_cancelled(),
        };

        tracing::info!(
            "Crawl completed: {} pages visited, {} failed, {} records in {:?}",
            counters.total_visited(),
            counters.total_failed(),
            counters.records_emitted,
            report.elapsed
        );

        Ok(report)
    }
}

impl Shared {
    /// Processes a single task
    ///
    /// This method:
    /// 1. Fetches the page
    /// 2. Parses it and runs the state machine step
    /// 3. Reports the visit and emits the record, if any
    /// 4. Offers discovered tasks to the frontier
    async fn process(&self, task: FollowTask) {
        tracing::debug!("Processing {} page {}", task.level, task.url);

        let page = match self.fetcher.fetch(&task.url).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!("Failed to fetch {} page {}: {}", task.level, task.url, e);
                self.counters.record_failure(task.level);
                self.report_visit(PageVisit {
                    url: task.url.clone(),
                    level: task.level,
                    state: PageState::from_fetch_error(&e),
                    status_code: e.status_code(),
                    error: Some(e.to_string()),
                })
                .await;
                return;
            }
        };

        // The parsed document is not Send; keep it inside this block
        let stepped = match HtmlPage::parse(&page.body, &page.final_url) {
            Ok(html) => Ok(transition(&task, &html, &self.plan)),
            Err(e) => Err(e),
        };

        let Transition { follows, record } = match stepped {
            Ok(t) => t,
            Err(e) => {
                tracing::warn!("Failed to parse {} page {}: {}", task.level, task.url, e);
                self.counters.record_failure(task.level);
                self.report_visit(PageVisit {
                    url: task.url.clone(),
                    level: task.level,
                    state: PageState::Unreachable,
                    status_code: Some(page.status),
                    error: Some(format!("Parse error: {}", e)),
                })
                .await;
                return;
            }
        };

        self.counters.record_visit(task.level);
        self.report_visit(PageVisit {
            url: task.url.clone(),
            level: task.level,
            state: PageState::Processed,
            status_code: Some(page.status),
            error: None,
        })
        .await;

        if let Some(record) = record {
            match self.sink.emit(record).await {
                Ok(()) => self.counters.record_emitted(),
                Err(e) => {
                    tracing::warn!("Failed to emit record for {}: {}", task.url, e);
                    self.counters.record_emit_failure();
                }
            }
        }

        if follows.is_empty() {
            return;
        }

        if self.budget.is_cancelled() {
            tracing::debug!(
                "Crawl cancelled; dropping {} tasks found on {}",
                follows.len(),
                task.url
            );
            self.counters.record_dropped(follows.len() as u64);
            return;
        }

        let found = follows.len();
        let mut accepted = 0;
        for follow in follows {
            if self.frontier.enqueue(follow) {
                accepted += 1;
            }
        }
        tracing::debug!(
            "{} page {} yielded {} tasks, {} new",
            task.level,
            task.url,
            found,
            accepted
        );
    }

    async fn report_visit(&self, visit: PageVisit) {
        if let Err(e) = self.sink.record_visit(visit).await {
            tracing::warn!("Failed to record page visit: {}", e);
        }
    }
}
