//! Error taxonomy for loading and aggregation.

use thiserror::Error;

/// Failure while loading a resource or computing a chart.
///
/// `Clone` so a single failed load can be handed to every caller that was
/// waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Network or storage failure. The cache entry is evicted and the next
    /// request retries from scratch.
    #[error("failed to fetch {key}: {reason}")]
    Fetch { key: String, reason: String },

    #[error("failed to decompress {key}: {reason}")]
    Decompress { key: String, reason: String },

    /// Payload decoded but its contents are unusable.
    #[error("failed to parse {key}: {reason}")]
    Parse { key: String, reason: String },

    /// Aggregation could not run against the loaded data.
    #[error("chart computation failed: {0}")]
    Compute(String),
}

impl Error {
    pub fn fetch(key: &str, reason: impl ToString) -> Self {
        Error::Fetch {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn decompress(key: &str, reason: impl ToString) -> Self {
        Error::Decompress {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(key: &str, reason: impl ToString) -> Self {
        Error::Parse {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether retrying the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Fetch { .. } | Error::Decompress { .. })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
