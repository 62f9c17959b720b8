use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("rate limited by feed (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("feed rejected credentials with HTTP {status}")]
    Auth { status: u16 },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid collection window: start {start} is after end {end}")]
    InvalidWindow {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
}

impl CollectError {
    /// Returns `true` for errors the collection loop treats as transient:
    /// the loop stops early and returns whatever was collected so far
    /// instead of failing the worker.
    ///
    /// Transient: rate limiting, network-level failures, 5xx responses.
    /// Everything else — auth rejections, unexpected 4xx, malformed
    /// responses, bad windows — propagates and fails the run.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            CollectError::RateLimited { .. } | CollectError::Http(_) => true,
            CollectError::UnexpectedStatus { status, .. } => (500..=599).contains(status),
            CollectError::Deserialize { .. }
            | CollectError::Auth { .. }
            | CollectError::InvalidWindow { .. } => false,
        }
    }
}
