//! Crawl State Machine
//!
//! Pure, synchronous transitions from a fetched page to the follow tasks and
//! record it produces. Workers call [`transition`] between the fetch and the
//! frontier update; nothing here touches the network or shared state.

use super::parser::PageModel;
use super::scheduler::should_follow_next_page;
use crate::extract::{extract, ExtractedRecord, FieldRule, FieldValue};
use crate::state::{Context, CrawlLevel, FollowTask};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Where the crawl is for one page
#[derive(Debug, Clone, PartialEq)]
pub enum CrawlState {
    AtListing { page_number: u32 },
    AtEntity { context: Arc<Context>, page_number: u32 },
    AtDetail { context: Arc<Context> },
}

impl CrawlState {
    pub fn from_task(task: &FollowTask) -> Self {
        match task.level {
            CrawlLevel::Listing => Self::AtListing {
                page_number: task.page_number,
            },
            CrawlLevel::Entity => Self::AtEntity {
                context: Arc::clone(&task.context),
                page_number: task.page_number,
            },
            CrawlLevel::Detail => Self::AtDetail {
                context: Arc::clone(&task.context),
            },
        }
    }
}

/// Selectors locating the next page of a paginated level
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationRule {
    /// Selector yielding the next page's href
    pub next_url: String,

    /// Selector yielding the next page's number; `current + 1` when unset
    pub next_number: Option<String>,
}

/// Pagination as observed on one page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page_number: u32,
    pub has_next_page: bool,
    pub next_page_url: Option<String>,
    pub next_page_number: Option<u32>,
}

impl PaginationState {
    fn observe<P: PageModel + ?Sized>(page: &P, current: u32, rule: &PaginationRule) -> Self {
        let next_page_url = page
            .evaluate(&rule.next_url)
            .into_iter()
            .find(|href| !href.trim().is_empty())
            .and_then(|href| page.resolve_url(&href));

        let next_page_number = match &rule.next_number {
            Some(selector) => page.evaluate(selector).into_iter().next().and_then(|raw| {
                let parsed = raw.trim().parse::<u32>().ok();
                if parsed.is_none() {
                    tracing::debug!(
                        "Unreadable next page number {:?} on {}; treating as last page",
                        raw,
                        page.url()
                    );
                }
                parsed
            }),
            None => next_page_url.as_ref().and_then(|_| current.checked_add(1)),
        };

        Self {
            current_page_number: current,
            has_next_page: next_page_url.is_some(),
            next_page_url,
            next_page_number,
        }
    }

    /// Returns the next page to follow if the gate lets it through
    pub fn follow(&self, max_page: u32) -> Option<(&str, u32)> {
        if !should_follow_next_page(self.next_page_url.as_deref(), self.next_page_number, max_page) {
            return None;
        }
        Some((self.next_page_url.as_deref()?, self.next_page_number?))
    }
}

/// Rules for one level of the hierarchy
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LevelPlan {
    pub rules: Vec<FieldRule>,

    /// Name of the rule whose values are the links to the next level
    pub links: Option<String>,

    pub pagination: Option<PaginationRule>,
}

/// Everything the state machine needs to interpret pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlPlan {
    pub listing: LevelPlan,
    pub entity: LevelPlan,
    pub detail: LevelPlan,
    pub max_page_listing: u32,
    pub max_page_entity: u32,
}

impl CrawlPlan {
    pub fn level(&self, level: CrawlLevel) -> &LevelPlan {
        match level {
            CrawlLevel::Listing => &self.listing,
            CrawlLevel::Entity => &self.entity,
            CrawlLevel::Detail => &self.detail,
        }
    }
}

/// What one page produced
#[derive(Debug, Default)]
pub struct Transition {
    /// Candidate tasks, in discovery order; the frontier decides which run
    pub follows: Vec<FollowTask>,

    /// The record, for detail pages
    pub record: Option<ExtractedRecord>,
}

/// Runs one state machine step for a fetched page
pub fn transition<P: PageModel + ?Sized>(task: &FollowTask, page: &P, plan: &CrawlPlan) -> Transition {
    let level_plan = plan.level(task.level);
    let mut fields = extract(page, &level_plan.rules);

    match CrawlState::from_task(task) {
        CrawlState::AtListing { page_number } => {
            let links = take_links(&mut fields, level_plan, page);
            let empty = Arc::new(Context::new());

            let mut follows: Vec<FollowTask> = links
                .into_iter()
                .map(|url| FollowTask {
                    parent: url.clone(),
                    url,
                    level: CrawlLevel::Entity,
                    page_number: 1,
                    context: Arc::clone(&empty),
                })
                .collect();

            if let Some(rule) = &level_plan.pagination {
                let pagination = PaginationState::observe(page, page_number, rule);
                if let Some((url, number)) = pagination.follow(plan.max_page_listing) {
                    follows.push(FollowTask {
                        url: url.to_string(),
                        level: CrawlLevel::Listing,
                        parent: task.parent.clone(),
                        page_number: number,
                        context: empty,
                    });
                }
            }

            Transition {
                follows,
                record: None,
            }
        }

        CrawlState::AtEntity {
            context,
            page_number,
        } => {
            let links = take_links(&mut fields, level_plan, page);
            let context = Arc::new(entity_context(&context, fields));

            let mut follows: Vec<FollowTask> = links
                .into_iter()
                .map(|url| FollowTask {
                    url,
                    level: CrawlLevel::Detail,
                    parent: task.parent.clone(),
                    page_number: 1,
                    context: Arc::clone(&context),
                })
                .collect();

            if let Some(rule) = &level_plan.pagination {
                let pagination = PaginationState::observe(page, page_number, rule);
                if let Some((url, number)) = pagination.follow(plan.max_page_entity) {
                    follows.push(FollowTask {
                        url: url.to_string(),
                        level: CrawlLevel::Entity,
                        parent: task.parent.clone(),
                        page_number: number,
                        context,
                    });
                }
            }

            Transition {
                follows,
                record: None,
            }
        }

        CrawlState::AtDetail { context } => {
            for (name, value) in context.iter() {
                if !value.is_absent() || !fields.contains_key(name) {
                    fields.insert(name.clone(), value.clone());
                }
            }

            Transition {
                follows: Vec::new(),
                record: Some(ExtractedRecord::new(page.url(), fields)),
            }
        }
    }
}

/// Removes the link field from the extracted fields and resolves its hrefs
fn take_links<P: PageModel + ?Sized>(
    fields: &mut BTreeMap<String, FieldValue>,
    level_plan: &LevelPlan,
    page: &P,
) -> Vec<String> {
    let Some(name) = &level_plan.links else {
        return Vec::new();
    };

    let hrefs = match fields.remove(name) {
        Some(FieldValue::List(items)) => items,
        Some(FieldValue::Text(href)) => vec![href],
        Some(FieldValue::Absent) | None => {
            tracing::debug!("No '{}' links on {}", name, page.url());
            Vec::new()
        }
    };

    hrefs
        .iter()
        .filter_map(|href| page.resolve_url(href))
        .collect()
}

/// Context for an entity page and its details
///
/// Continuation pages keep what the first page established; a value the
/// inherited context lacks is filled from this page.
fn entity_context(inherited: &Context, fresh: BTreeMap<String, FieldValue>) -> Context {
    let mut context = inherited.clone();
    for (name, value) in fresh {
        let slot = context.entry(name).or_default();
        if slot.is_absent() {
            *slot = value;
        }
    }
    context
}
