//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlLevel`: Listing, Entity or Detail
//! - `FollowTask`: a URL to fetch at a level, with its inherited context
//! - `PageState`: the recorded outcome of a page visit

mod level;
mod page_state;
mod task;

// Re-export main types
pub use level::CrawlLevel;
pub use page_state::PageState;
pub use task::{Context, FollowTask};
