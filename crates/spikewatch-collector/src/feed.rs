//! HTTP client for a cursor-paginated search feed.
//!
//! This is the one source-specific implementation of the
//! [`PageFetcher`]/[`SourceAdvancer`] capability pair. The feed exposes
//! `GET {base_url}/search?q=<query>` returning a JSON page of posts plus an
//! opaque continuation cursor; it never reports a total count or an explicit
//! end of results.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::error::CollectError;
use crate::normalize::clean_content;
use crate::retry::retry_with_backoff;
use crate::traits::{FetchedPage, PageFetcher, RawRecord, SourceAdvancer};

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    posts: Vec<FeedPost>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FeedPost {
    author: Option<String>,
    content: Option<String>,
    posted_at: Option<String>,
}

/// Search-feed client for one query.
///
/// Transient failures (429, network errors, 5xx) are retried with
/// exponential backoff before being surfaced to the collection loop;
/// credential rejections (401/403) map to [`CollectError::Auth`] and are
/// never retried.
pub struct SearchFeedClient {
    client: reqwest::Client,
    base_url: String,
    query: String,
    max_retries: u32,
    backoff_base_ms: u64,
    // Source-growth bookkeeping for the SourceAdvancer observation: a
    // cursor feed has no scroll action, so "did the source grow" means
    // "did fetching surface any records since the last advance".
    records_seen: AtomicUsize,
    records_at_last_advance: AtomicUsize,
}

impl SearchFeedClient {
    /// Creates a feed client with configured timeout, `User-Agent`, and
    /// retry policy.
    ///
    /// # Errors
    ///
    /// Returns [`CollectError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        base_url: &str,
        query: &str,
        timeout_secs: u64,
        user_agent: &str,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, CollectError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            query: query.to_string(),
            max_retries,
            backoff_base_ms,
            records_seen: AtomicUsize::new(0),
            records_at_last_advance: AtomicUsize::new(0),
        })
    }

    async fn fetch_page(&self, cursor: Option<&str>) -> Result<FeedResponse, CollectError> {
        let url = format!("{}/search", self.base_url);

        let mut params: Vec<(&str, &str)> = vec![("q", self.query.as_str()), ("filter", "recent")];
        if let Some(cursor) = cursor {
            params.push(("cursor", cursor));
        }

        let response = self.client.get(&url).query(&params).send().await?;
        let status = response.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after_secs = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(60);
            return Err(CollectError::RateLimited { retry_after_secs });
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(CollectError::Auth {
                status: status.as_u16(),
            });
        }
        if !status.is_success() {
            return Err(CollectError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|source| CollectError::Deserialize {
            context: format!("search page for '{}'", self.query),
            source,
        })
    }

    fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
        let raw = raw?;
        DateTime::parse_from_rfc3339(raw)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

#[async_trait]
impl PageFetcher for SearchFeedClient {
    async fn fetch(&self, cursor: Option<&str>) -> Result<FetchedPage, CollectError> {
        let response = retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            self.fetch_page(cursor)
        })
        .await?;

        self.records_seen
            .fetch_add(response.posts.len(), Ordering::SeqCst);

        let records = response
            .posts
            .into_iter()
            .filter_map(|post| {
                let author = post.author.unwrap_or_default();
                let content = clean_content(post.content.as_deref().unwrap_or(""), &author);
                // Chrome-only cards with neither author nor text carry no signal.
                if author.is_empty() && content.is_empty() {
                    return None;
                }
                Some(RawRecord {
                    author,
                    content,
                    source_timestamp: Self::parse_timestamp(post.posted_at.as_deref()),
                })
            })
            .collect();

        Ok(FetchedPage {
            records,
            next_cursor: response.next_cursor,
        })
    }
}

#[async_trait]
impl SourceAdvancer for SearchFeedClient {
    async fn advance(&self) -> Result<bool, CollectError> {
        let seen = self.records_seen.load(Ordering::SeqCst);
        let previous = self.records_at_last_advance.swap(seen, Ordering::SeqCst);
        Ok(seen > previous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timestamp_accepts_rfc3339() {
        let ts = SearchFeedClient::parse_timestamp(Some("2026-08-07T10:05:00Z")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-08-07T10:05:00+00:00");
    }

    #[test]
    fn parse_timestamp_accepts_offsets() {
        let ts = SearchFeedClient::parse_timestamp(Some("2026-08-07T19:05:00+09:00")).unwrap();
        assert_eq!(ts.to_rfc3339(), "2026-08-07T10:05:00+00:00");
    }

    #[test]
    fn parse_timestamp_rejects_garbage() {
        assert!(SearchFeedClient::parse_timestamp(Some("yesterday")).is_none());
        assert!(SearchFeedClient::parse_timestamp(None).is_none());
    }
}
