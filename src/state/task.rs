use super::CrawlLevel;
use crate::extract::FieldValue;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Fields inherited from an ancestor page
///
/// Entity-level values such as price and cuisine tags travel down to every
/// detail record derived from that entity.
pub type Context = BTreeMap<String, FieldValue>;

/// A unit of crawl work: one URL to fetch at one level
///
/// The context is a shared read-only snapshot; tasks spawned from the same
/// entity page point at the same allocation.
#[derive(Debug, Clone)]
pub struct FollowTask {
    /// URL to fetch, already resolved against the page it was found on
    pub url: String,

    /// Level the fetched page will be interpreted at
    pub level: CrawlLevel,

    /// Key of the logical parent whose page counter this task counts against
    pub parent: String,

    /// 1-based page number within the parent's pagination run
    pub page_number: u32,

    pub context: Arc<Context>,
}

impl FollowTask {
    /// Creates the initial listing task for a crawl
    pub fn seed(start_url: &str) -> Self {
        Self {
            url: start_url.to_string(),
            level: CrawlLevel::Listing,
            parent: start_url.to_string(),
            page_number: 1,
            context: Arc::new(Context::new()),
        }
    }
}
