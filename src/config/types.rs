use crate::crawler::{CrawlBudget, CrawlPlan, FrontierLimits, LevelPlan, PaginationRule};
use crate::extract::FieldRule;
use crate::state::CrawlLevel;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// Main configuration structure for Review-Cascade
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub budget: BudgetConfig,
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
    pub listing: LevelConfig,
    pub entity: LevelConfig,
    pub detail: LevelConfig,
}

impl Config {
    /// Field rules, link fields and pagination selectors for every level
    pub fn plan(&self) -> CrawlPlan {
        CrawlPlan {
            listing: self.listing.to_plan(),
            entity: self.entity.to_plan(),
            detail: self.detail.to_plan(),
            max_page_listing: self.crawler.max_page_listing,
            max_page_entity: self.crawler.max_page_entity,
        }
    }

    pub fn frontier_limits(&self) -> FrontierLimits {
        FrontierLimits {
            max_page_listing: self.crawler.max_page_listing,
            max_page_entity: self.crawler.max_page_entity,
            max_detail_per_entity: self.crawler.max_detail_per_entity,
        }
    }

    /// A fresh budget; the deadline clock starts now
    pub fn budget(&self) -> CrawlBudget {
        CrawlBudget::new(
            self.budget.limits(),
            self.crawler.deadline_secs.map(Duration::from_secs),
        )
    }

    pub fn level(&self, level: CrawlLevel) -> &LevelConfig {
        match level {
            CrawlLevel::Listing => &self.listing,
            CrawlLevel::Entity => &self.entity,
            CrawlLevel::Detail => &self.detail,
        }
    }
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// The single listing URL the crawl starts from
    pub start_url: String,

    /// Maximum listing pages, counting the start page
    pub max_page_listing: u32,

    /// Maximum pages per entity, counting pagination continuations
    pub max_page_entity: u32,

    /// Maximum number of concurrent page fetches
    pub worker_count: usize,

    /// Maximum detail pages per entity
    #[serde(default)]
    pub max_detail_per_entity: Option<u32>,

    /// Wall-clock limit after which nothing new is dispatched
    #[serde(default)]
    pub deadline_secs: Option<u64>,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Extra attempts for timeouts, network errors and 5xx responses
    #[serde(default = "default_retries")]
    pub retries: u32,

    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_retries() -> u32 {
    2
}

fn default_retry_delay_ms() -> u64 {
    500
}

/// Global page budgets, per level
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetConfig {
    pub listing: Option<u32>,
    pub entity: Option<u32>,
    pub detail: Option<u32>,
}

impl BudgetConfig {
    pub fn limits(&self) -> HashMap<CrawlLevel, u32> {
        [
            (CrawlLevel::Listing, self.listing),
            (CrawlLevel::Entity, self.entity),
            (CrawlLevel::Detail, self.detail),
        ]
        .into_iter()
        .filter_map(|(level, limit)| limit.map(|l| (level, l)))
        .collect()
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct UserAgentConfig {
    /// Name of the crawler
    pub crawler_name: String,

    /// Version of the crawler
    pub crawler_version: String,

    /// URL with information about the crawler
    pub contact_url: String,

    /// Email address for crawler-related contact
    pub contact_email: String,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Path to the markdown summary file
    pub summary_path: String,

    /// Records buffered between workers and the database
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

fn default_channel_capacity() -> usize {
    256
}

/// Extraction and traversal rules for one level
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct LevelConfig {
    /// Name of the rule whose values link to the next level
    #[serde(default)]
    pub links: Option<String>,

    #[serde(default)]
    pub pagination: Option<PaginationConfig>,

    #[serde(default)]
    pub rules: Vec<FieldRule>,
}

impl LevelConfig {
    fn to_plan(&self) -> LevelPlan {
        LevelPlan {
            rules: self.rules.clone(),
            links: self.links.clone(),
            pagination: self.pagination.as_ref().map(|p| PaginationRule {
                next_url: p.next_url.clone(),
                next_number: p.next_number.clone(),
            }),
        }
    }
}

/// Selectors for a level's "next page" link
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PaginationConfig {
    pub next_url: String,

    /// Selector for the next page's number; the current number plus one when unset
    #[serde(default)]
    pub next_number: Option<String>,
}
