//! Configuration module for Review-Cascade
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Field rules, link fields and pagination selectors all live here,
//! so pointing the crawler at a different site is a configuration change.
//!
//! # Example
//!
//! ```no_run
//! use review_cascade::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("configs/restaurants.toml")).unwrap();
//! println!("Listing pages: {}", config.crawler.max_page_listing);
//! ```

mod parser;
mod types;
mod validation;

pub use types::{
    BudgetConfig, Config, CrawlerConfig, LevelConfig, OutputConfig, PaginationConfig,
    UserAgentConfig,
};

pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
