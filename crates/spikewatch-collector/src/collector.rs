//! The bounded incremental collection loop.
//!
//! Drives one worker's scrape of a paginated feed that never signals "end of
//! results". Each round fetches a page, filters records to the collection
//! window, deduplicates them, advances the source, and then lets several
//! independent termination signals race to stop the loop. Every signal
//! except the hard round cap is guarded by "at least one in-window item has
//! ever been seen": a cold start — the feed is sorted newest-first and the
//! window has not scrolled into view yet — must not be mistaken for an
//! exhausted window.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};

use spikewatch_core::CollectedItem;

use crate::error::CollectError;
use crate::traits::{PageFetcher, SourceAdvancer};
use crate::window::CollectionWindow;

/// Tuning knobs for one collection run.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Hard cap on fetch rounds.
    pub max_rounds: u32,
    /// Consecutive rounds with zero in-window additions before the window
    /// is considered exhausted.
    pub exhausted_rounds: u32,
    /// Consecutive no-growth advances tolerated before stopping.
    pub no_growth_limit: u32,
    /// How far past the window start the page's newest timestamp must fall
    /// before the run is considered to have scrolled off the back of the
    /// window.
    pub cutoff_buffer_secs: u64,
    /// Bounds for the jittered inter-round delay.
    pub round_delay_min_ms: u64,
    pub round_delay_max_ms: u64,
    /// Overall wall-clock budget; checked before each round, never
    /// mid-fetch. `None` disables the deadline.
    pub budget: Option<Duration>,
}

impl CollectorConfig {
    /// Builds collector settings from the loaded application config.
    #[must_use]
    pub fn from_app_config(config: &spikewatch_core::AppConfig) -> Self {
        Self {
            max_rounds: config.max_rounds,
            exhausted_rounds: config.exhausted_rounds,
            no_growth_limit: config.no_growth_limit,
            cutoff_buffer_secs: config.cutoff_buffer_secs,
            round_delay_min_ms: config.round_delay_min_ms,
            round_delay_max_ms: config.round_delay_max_ms,
            budget: Some(Duration::from_secs(config.worker_budget_secs)),
        }
    }
}

/// Why a collection run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The round cap was reached.
    MaxRounds,
    /// In-window items were seen, then `exhausted_rounds` consecutive
    /// rounds added nothing new.
    WindowExhausted,
    /// The page's newest timestamp fell more than the cutoff buffer behind
    /// the window start.
    FellBehindWindow,
    /// The source stopped growing for `no_growth_limit` consecutive
    /// advances.
    NoGrowth,
    /// The wall-clock budget ran out between rounds.
    BudgetExhausted,
    /// A transient fetch error stopped the run early; the items collected
    /// so far were returned.
    TransientError,
}

/// The result of one collection run.
#[derive(Debug)]
pub struct CollectionOutcome {
    pub items: Vec<CollectedItem>,
    pub rounds: u32,
    pub stop_reason: StopReason,
}

/// Drives the collection loop against one source.
pub struct WindowCollector<'a, S> {
    source: &'a S,
    config: CollectorConfig,
}

impl<'a, S> WindowCollector<'a, S>
where
    S: PageFetcher + SourceAdvancer + Sync,
{
    pub fn new(source: &'a S, config: CollectorConfig) -> Self {
        Self { source, config }
    }

    /// Collects deduplicated in-window items for `(channel, query)`.
    ///
    /// Transient source errors stop the loop and return partial results;
    /// fatal errors (auth rejection, malformed responses) propagate.
    ///
    /// # Errors
    ///
    /// Returns the underlying [`CollectError`] only for non-transient
    /// failures.
    pub async fn collect(
        &self,
        window: &CollectionWindow,
        channel: &str,
        query: &str,
    ) -> Result<CollectionOutcome, CollectError> {
        // Clamp the cutoff buffer so a misconfigured value cannot overflow
        // the timestamp arithmetic.
        const MAX_CUTOFF_BUFFER_SECS: i64 = 30 * 86_400;

        let started = Instant::now();
        let observed_at = Utc::now();
        let cutoff_secs = i64::try_from(self.config.cutoff_buffer_secs)
            .unwrap_or(MAX_CUTOFF_BUFFER_SECS)
            .min(MAX_CUTOFF_BUFFER_SECS);
        let cutoff = window.start() - chrono::Duration::seconds(cutoff_secs);

        let mut collected: HashMap<(DateTime<Utc>, String), CollectedItem> = HashMap::new();
        let mut cursor: Option<String> = None;
        let mut saw_in_window = false;
        let mut zero_added_rounds = 0u32;
        let mut no_growth_rounds = 0u32;
        let mut rounds = 0u32;

        let stop_reason = loop {
            if rounds >= self.config.max_rounds {
                break StopReason::MaxRounds;
            }
            if let Some(budget) = self.config.budget {
                if started.elapsed() >= budget {
                    tracing::warn!(
                        query,
                        rounds,
                        collected = collected.len(),
                        "wall-clock budget exhausted — returning partial results"
                    );
                    break StopReason::BudgetExhausted;
                }
            }
            rounds += 1;

            let page = match self.source.fetch(cursor.as_deref()).await {
                Ok(page) => page,
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        query,
                        rounds,
                        collected = collected.len(),
                        error = %err,
                        "transient fetch error — stopping with partial results"
                    );
                    break StopReason::TransientError;
                }
                Err(err) => return Err(err),
            };

            // A page without a continuation keeps the previous cursor; the
            // termination signals decide when re-fetching stops being useful.
            if page.next_cursor.is_some() {
                cursor = page.next_cursor.clone();
            }

            let mut added_in_window = 0u32;
            let mut page_max_ts: Option<DateTime<Utc>> = None;

            for record in &page.records {
                let Some(ts) = record.source_timestamp else {
                    continue;
                };
                page_max_ts = Some(page_max_ts.map_or(ts, |m| m.max(ts)));

                if !window.contains(ts) {
                    continue;
                }

                let key = (ts, record.author.clone());
                if let std::collections::hash_map::Entry::Vacant(entry) = collected.entry(key) {
                    entry.insert(CollectedItem {
                        author: record.author.clone(),
                        content: record.content.clone(),
                        source_timestamp: ts,
                        observed_timestamp: observed_at,
                        channel: channel.to_string(),
                        query: query.to_string(),
                    });
                    added_in_window += 1;
                    saw_in_window = true;
                }
            }

            if added_in_window == 0 {
                zero_added_rounds += 1;
            } else {
                zero_added_rounds = 0;
            }

            let grew = match self.source.advance().await {
                Ok(grew) => grew,
                Err(err) if err.is_transient() => {
                    tracing::warn!(
                        query,
                        rounds,
                        error = %err,
                        "transient advance error — stopping with partial results"
                    );
                    break StopReason::TransientError;
                }
                Err(err) => return Err(err),
            };
            if grew {
                no_growth_rounds = 0;
            } else {
                no_growth_rounds += 1;
            }

            tracing::debug!(
                query,
                round = rounds,
                added_in_window,
                total = collected.len(),
                zero_added_rounds,
                no_growth_rounds,
                grew,
                "collection round finished"
            );

            if saw_in_window && zero_added_rounds >= self.config.exhausted_rounds {
                break StopReason::WindowExhausted;
            }
            if saw_in_window && page_max_ts.is_some_and(|ts| ts < cutoff) {
                break StopReason::FellBehindWindow;
            }
            if saw_in_window && no_growth_rounds >= self.config.no_growth_limit {
                break StopReason::NoGrowth;
            }

            self.sleep_between_rounds().await;
        };

        tracing::info!(
            query,
            rounds,
            collected = collected.len(),
            stop_reason = ?stop_reason,
            "collection run finished"
        );

        Ok(CollectionOutcome {
            items: collected.into_values().collect(),
            rounds,
            stop_reason,
        })
    }

    /// Bounded jittered pause between rounds, a courtesy to the source's
    /// rate limits.
    async fn sleep_between_rounds(&self) {
        let min = self.config.round_delay_min_ms;
        let max = self.config.round_delay_max_ms.max(min);
        let delay_ms = if min == max {
            min
        } else {
            rand::random_range(min..=max)
        };
        if delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        }
    }
}

#[cfg(test)]
#[path = "collector_test.rs"]
mod collector_test;
