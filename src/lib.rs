//! Review-Cascade: a hierarchical crawl-and-extract pipeline
//!
//! This crate walks a review site in three nested levels: a paginated listing
//! page links to entity pages, each entity page links to paginated detail pages,
//! and each detail page yields one structured record. Extraction is driven by
//! declarative field rules, so the crawler carries no site-specific selectors.

pub mod config;
pub mod crawler;
pub mod extract;
pub mod output;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Review-Cascade operations
#[derive(Debug, Error)]
pub enum CascadeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Storage error: {0}")]
    StorageError(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),
}

/// Failure kinds reported by a [`crawler::Fetcher`]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("HTTP status {status}")]
    Http { status: u16 },

    #[error("network error: {0}")]
    Network(String),
}

impl FetchError {
    /// Returns true if a retry has a chance of succeeding
    ///
    /// Timeouts, network failures and 5xx responses are transient;
    /// every other HTTP status is final.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) => true,
            Self::Http { status } => *status >= 500,
        }
    }

    /// HTTP status code, if the failure carried one
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status } => Some(*status),
            _ => None,
        }
    }
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Review-Cascade operations
pub type Result<T> = std::result::Result<T, CascadeError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, CrawlReport};
pub use extract::{ExtractedRecord, FieldRule, FieldValue, MatchMode};
pub use state::{Context, CrawlLevel, FollowTask, PageState};
pub use url::normalize_url;
