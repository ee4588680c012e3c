use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of a page in the three-tier traversal
///
/// Listing pages link to entities, entity pages link to details, and only
/// detail pages produce records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CrawlLevel {
    Listing,
    Entity,
    Detail,
}

impl CrawlLevel {
    /// All levels in traversal order
    pub fn all() -> [CrawlLevel; 3] {
        [Self::Listing, Self::Entity, Self::Detail]
    }

    /// Level of the pages this level links to, if any
    pub fn child(&self) -> Option<CrawlLevel> {
        match self {
            Self::Listing => Some(Self::Entity),
            Self::Entity => Some(Self::Detail),
            Self::Detail => None,
        }
    }

    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Listing => "listing",
            Self::Entity => "entity",
            Self::Detail => "detail",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "listing" => Some(Self::Listing),
            "entity" => Some(Self::Entity),
            "detail" => Some(Self::Detail),
            _ => None,
        }
    }
}

impl fmt::Display for CrawlLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
