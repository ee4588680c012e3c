//! Frontier Scheduler
//!
//! This module handles:
//! - Per-level visited sets, so no URL is fetched twice at the same level
//! - Per-parent page counters enforcing the pagination caps
//! - The pending task queue, dispatched Detail first, then Entity, then Listing
//! - The global page budget and wall-clock deadline checked before each dispatch

use crate::state::{CrawlLevel, FollowTask};
use crate::url::visit_key;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering as AtomicOrdering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Returns true iff a next page exists, is numbered, and is within the cap
///
/// This is the only pagination gate; every level calls it the same way.
///
/// # Examples
///
/// ```
/// use review_cascade::crawler::should_follow_next_page;
///
/// assert!(should_follow_next_page(Some("p2.html"), Some(2), 10));
/// assert!(!should_follow_next_page(Some("p11.html"), Some(11), 10));
/// assert!(!should_follow_next_page(None, Some(2), 10));
/// ```
pub fn should_follow_next_page(
    next_page_url: Option<&str>,
    next_page_number: Option<u32>,
    max_page: u32,
) -> bool {
    match (next_page_url, next_page_number) {
        (Some(_), Some(number)) => number <= max_page,
        _ => false,
    }
}

/// Per-parent page caps for each level
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrontierLimits {
    /// Listing pages per crawl
    pub max_page_listing: u32,

    /// Pages per entity, counting pagination continuations
    pub max_page_entity: u32,

    /// Detail pages per entity; unbounded when `None`
    pub max_detail_per_entity: Option<u32>,
}

impl FrontierLimits {
    pub fn cap_for(&self, level: CrawlLevel) -> Option<u32> {
        match level {
            CrawlLevel::Listing => Some(self.max_page_listing),
            CrawlLevel::Entity => Some(self.max_page_entity),
            CrawlLevel::Detail => self.max_detail_per_entity,
        }
    }
}

/// A task waiting in the pending queue
#[derive(Debug, Clone)]
struct QueuedTask {
    task: FollowTask,

    /// Insertion order, for FIFO within a level
    seq: u64,
}

impl QueuedTask {
    fn rank(&self) -> u8 {
        match self.task.level {
            CrawlLevel::Detail => 2,
            CrawlLevel::Entity => 1,
            CrawlLevel::Listing => 0,
        }
    }
}

// Deeper levels pop first from the max-heap; older tasks pop first within a level
impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank()
            .cmp(&other.rank())
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

#[derive(Debug, Default)]
struct FrontierState {
    visited: HashMap<CrawlLevel, HashSet<String>>,
    page_counts: HashMap<(CrawlLevel, String), u32>,
    pending: BinaryHeap<QueuedTask>,
    next_seq: u64,
}

/// The crawl frontier
///
/// Visited sets, page counters and the pending queue sit behind one mutex,
/// so concurrent `enqueue` calls for the same parent serialize their counter
/// increments. The lock is never held across an await.
#[derive(Debug)]
pub struct Frontier {
    limits: FrontierLimits,
    state: Mutex<FrontierState>,
}

impl Frontier {
    pub fn new(limits: FrontierLimits) -> Self {
        Self {
            limits,
            state: Mutex::new(FrontierState::default()),
        }
    }

    pub fn limits(&self) -> &FrontierLimits {
        &self.limits
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FrontierState> {
        // A worker that panicked mid-enqueue leaves the sets consistent
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Admits a task into the frontier
    ///
    /// # Returns
    ///
    /// * `true` - The URL is new at this level and the parent is under its
    ///   cap; the task is now visited and pending
    /// * `false` - Already visited at this level, or the parent's cap is
    ///   reached (the URL stays unvisited in that case)
    pub fn enqueue(&self, task: FollowTask) -> bool {
        let key = visit_key(&task.url);
        let cap = self.limits.cap_for(task.level);
        let mut state = self.lock();

        if state
            .visited
            .get(&task.level)
            .is_some_and(|set| set.contains(&key))
        {
            tracing::trace!("Already visited at {}: {}", task.level, task.url);
            return false;
        }

        let count_key = (task.level, task.parent.clone());
        let count = state.page_counts.get(&count_key).copied().unwrap_or(0);
        if let Some(cap) = cap {
            if count >= cap {
                tracing::debug!(
                    "Cap of {} reached for {} parent {}; skipping {}",
                    cap,
                    task.level,
                    task.parent,
                    task.url
                );
                return false;
            }
        }

        state.page_counts.insert(count_key, count + 1);
        state.visited.entry(task.level).or_default().insert(key);

        let seq = state.next_seq;
        state.next_seq += 1;
        state.pending.push(QueuedTask { task, seq });

        true
    }

    /// Takes the highest-priority pending task
    pub fn pop(&self) -> Option<FollowTask> {
        self.lock().pending.pop().map(|queued| queued.task)
    }

    /// Discards every pending task, returning how many were dropped
    pub fn drain_pending(&self) -> usize {
        let mut state = self.lock();
        let dropped = state.pending.len();
        state.pending.clear();
        dropped
    }

    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    /// Number of distinct URLs admitted at a level
    pub fn visited_count(&self, level: CrawlLevel) -> usize {
        self.lock().visited.get(&level).map_or(0, HashSet::len)
    }

    /// Number of pages admitted for a parent at a level
    pub fn page_count(&self, level: CrawlLevel, parent: &str) -> u32 {
        self.lock()
            .page_counts
            .get(&(level, parent.to_string()))
            .copied()
            .unwrap_or(0)
    }
}

/// Outcome of the pre-dispatch budget check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Fetch the page
    Go,

    /// A page budget or the deadline is spent; dispatch nothing more
    Cancelled,
}

/// Global page budget per level plus an optional wall-clock deadline
///
/// Spending any one level's budget ends the crawl, the same way the
/// deadline does.
#[derive(Debug)]
pub struct CrawlBudget {
    limits: HashMap<CrawlLevel, u32>,
    dispatched: HashMap<CrawlLevel, AtomicU32>,
    deadline: Option<Instant>,
    cancelled: AtomicBool,
}

impl CrawlBudget {
    /// Creates a budget
    ///
    /// # Arguments
    ///
    /// * `limits` - Maximum dispatches per level; missing levels are unbounded
    /// * `deadline` - Time after which nothing new is dispatched
    pub fn new(limits: HashMap<CrawlLevel, u32>, deadline: Option<Duration>) -> Self {
        let dispatched = CrawlLevel::all()
            .into_iter()
            .map(|level| (level, AtomicU32::new(0)))
            .collect();

        Self {
            limits,
            dispatched,
            deadline: deadline.map(|d| Instant::now() + d),
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(HashMap::new(), None)
    }

    /// Checks the budget for one dispatch at `level`, consuming it on `Go`
    ///
    /// The dispatch that reaches a level's limit is still admitted; the
    /// budget is cancelled right after it, so nothing follows.
    pub fn admit(&self, level: CrawlLevel) -> Admission {
        if self.is_cancelled() {
            return Admission::Cancelled;
        }

        let Some(counter) = self.dispatched.get(&level) else {
            return Admission::Go;
        };

        match self.limits.get(&level) {
            Some(&limit) => {
                let spent = counter.fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| {
                    (n < limit).then_some(n + 1)
                });
                match spent {
                    Ok(before) => {
                        if before + 1 >= limit {
                            tracing::info!(
                                "{} budget of {} pages spent; no new pages will be dispatched",
                                level,
                                limit
                            );
                            self.cancel();
                        }
                        Admission::Go
                    }
                    Err(_) => {
                        self.cancel();
                        Admission::Cancelled
                    }
                }
            }
            None => {
                counter.fetch_add(1, AtomicOrdering::SeqCst);
                Admission::Go
            }
        }
    }

    /// Returns true once the deadline has passed or `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        if self.cancelled.load(AtomicOrdering::SeqCst) {
            return true;
        }

        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            tracing::info!("Crawl deadline reached; no new pages will be dispatched");
            self.cancel();
            return true;
        }

        false
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, AtomicOrdering::SeqCst);
    }

    /// Returns true if the crawl was cancelled, without checking the clock
    pub fn was_cancelled(&self) -> bool {
        self.cancelled.load(AtomicOrdering::SeqCst)
    }

    /// Pages dispatched so far at a level
    pub fn dispatched(&self, level: CrawlLevel) -> u32 {
        self.dispatched
            .get(&level)
            .map_or(0, |c| c.load(AtomicOrdering::SeqCst))
    }
}
