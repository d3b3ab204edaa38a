//! Error types for each layer.
//!
//! None of these reach the outermost caller: fetch errors degrade to cached
//! data or `None`, storage errors degrade to cache misses, and record errors
//! skip a single week or record during aggregation.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Failure of a single upstream request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Non-success HTTP status other than an exhausted quota
    #[error("HTTP {status} from {endpoint}")]
    Network { endpoint: String, status: u16 },
    /// The request never produced a status (DNS, TLS, timeout, body decode)
    #[error("transport failure for {endpoint}: {message}")]
    Transport { endpoint: String, message: String },
    /// 403 with zero remaining quota
    #[error("rate limited until {}", reset_at.map(|t| t.to_rfc3339()).unwrap_or_else(|| "unknown".to_string()))]
    RateLimited { reset_at: Option<DateTime<Utc>> },
    /// 202 Accepted: statistics are still being computed upstream
    #[error("statistics for {endpoint} are still being computed")]
    Pending { endpoint: String },
}

impl FetchError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, FetchError::RateLimited { .. })
    }
}

/// Failure of the backing key/value store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The store refused the write because its quota is exhausted
    #[error("storage quota exceeded ({needed} bytes needed, {available} available)")]
    Full { needed: usize, available: usize },
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed cache entry: {0}")]
    Parse(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_full(&self) -> bool {
        matches!(self, StorageError::Full { .. })
    }
}

/// An incomplete statistics record; only the offending record or week is skipped.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record has no author login")]
    MissingAuthor,
    #[error("week entry has no start timestamp")]
    MissingWeekStart,
    #[error("week start {0} is not a representable date")]
    InvalidWeekStart(i64),
    #[error("week entry has no positive count")]
    NonPositiveCount,
    #[error("record is not a JSON object of the expected shape")]
    Malformed,
}
