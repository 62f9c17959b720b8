//! Source capability traits consumed by the window collector.
//!
//! A feed source implements both traits on one object: [`PageFetcher`] pulls
//! the next page of raw records, [`SourceAdvancer`] nudges the source to
//! surface more content and reports whether it actually grew. The collector
//! itself is source-agnostic; everything platform-specific lives behind this
//! pair.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CollectError;

/// One raw record as parsed from a feed page, before window filtering.
///
/// `source_timestamp` is `None` when the feed's timestamp could not be
/// parsed; such records are skipped rather than failing the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub author: String,
    pub content: String,
    pub source_timestamp: Option<DateTime<Utc>>,
}

/// One fetched page: zero or more records plus an opaque continuation
/// cursor. A missing cursor does not mean "end of results" — the sources
/// this crate targets never signal that explicitly.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub records: Vec<RawRecord>,
    pub next_cursor: Option<String>,
}

#[async_trait]
pub trait PageFetcher {
    /// Fetches the next page of records, starting from `cursor` (or the
    /// first page when `None`).
    async fn fetch(&self, cursor: Option<&str>) -> Result<FetchedPage, CollectError>;
}

#[async_trait]
pub trait SourceAdvancer {
    /// Triggers the source to surface more content (e.g. a scroll) and
    /// reports whether the underlying source actually grew since the last
    /// advance.
    async fn advance(&self) -> Result<bool, CollectError>;
}
