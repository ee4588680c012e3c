/// Page state definitions for recording fetch outcomes
///
/// Every page the crawler attempts ends in exactly one of these states.
use crate::FetchError;
use std::fmt;

/// Outcome of a single page visit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageState {
    /// Page was fetched and run through the state machine
    Processed,

    // ===== Terminal Error States =====
    /// Page returned HTTP 4xx (permanent failure)
    DeadLink,

    /// Page returned HTTP 5xx after all retries
    ServerError,

    /// Request exceeded the configured timeout after all retries
    TimedOut,

    /// Page could not be reached (connection refused, DNS failure, TLS error)
    Unreachable,
}

impl PageState {
    /// Maps a fetch failure onto the state recorded for the page
    pub fn from_fetch_error(error: &FetchError) -> Self {
        match error {
            FetchError::Timeout => Self::TimedOut,
            FetchError::Http { status } if *status >= 500 => Self::ServerError,
            FetchError::Http { .. } => Self::DeadLink,
            FetchError::Network(_) => Self::Unreachable,
        }
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Processed)
    }

    /// Returns true if this represents an error state
    pub fn is_error(&self) -> bool {
        !self.is_success()
    }

    /// Converts the page state to a database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Processed => "processed",
            Self::DeadLink => "dead_link",
            Self::ServerError => "server_error",
            Self::TimedOut => "timed_out",
            Self::Unreachable => "unreachable",
        }
    }

    /// Parses a page state from a database string representation
    ///
    /// Returns None if the string doesn't match any known state.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "processed" => Some(Self::Processed),
            "dead_link" => Some(Self::DeadLink),
            "server_error" => Some(Self::ServerError),
            "timed_out" => Some(Self::TimedOut),
            "unreachable" => Some(Self::Unreachable),
            _ => None,
        }
    }

    /// Returns all possible page states
    pub fn all_states() -> [PageState; 5] {
        [
            Self::Processed,
            Self::DeadLink,
            Self::ServerError,
            Self::TimedOut,
            Self::Unreachable,
        ]
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
