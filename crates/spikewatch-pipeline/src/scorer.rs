//! Multi-signal trend scoring over snapshot history.
//!
//! Given a freshly aggregated category snapshot at bucket `T`, the scorer
//! point-reads history at `T-1 … T-6`, computes the signal set from
//! [`crate::signals`], and folds the weighted signals into one composite
//! score. The computation is replayable: the same snapshot history always
//! produces a bit-identical score.

use spikewatch_core::{CategorySnapshot, ScoreWeights};

use crate::signals;
use crate::stores::SnapshotStore;
use crate::PipelineError;

/// How many historical buckets feed the signal set.
const HISTORY_DEPTH: u32 = 6;

/// The computed signal values for one category/bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendSignals {
    pub short_term_growth: f64,
    pub long_term_ratio: f64,
    pub ratio_to_total: f64,
    pub volatility: f64,
    pub acceleration: f64,
    pub duration_above_threshold: u8,
    pub score: f64,
}

/// A scored category snapshot, ready for threshold selection.
#[derive(Debug, Clone, PartialEq)]
pub struct TrendReport {
    pub snapshot: CategorySnapshot,
    /// The previous bucket's count as used in the growth signal (damped to
    /// 1 when missing or zero).
    pub prev_count: u64,
    pub signals: TrendSignals,
}

pub struct TrendScorer<'a, S: SnapshotStore + ?Sized> {
    store: &'a S,
    weights: ScoreWeights,
    growth_threshold: f64,
}

impl<'a, S: SnapshotStore + ?Sized> TrendScorer<'a, S> {
    pub fn new(store: &'a S, weights: ScoreWeights, growth_threshold: f64) -> Self {
        Self {
            store,
            weights,
            growth_threshold,
        }
    }

    /// Scores one category snapshot against its stored history.
    ///
    /// Missing history buckets are absent data handled per-signal; only a
    /// store *failure* is an error.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a history read fails.
    pub async fn score_category(
        &self,
        snapshot: &CategorySnapshot,
    ) -> Result<TrendReport, PipelineError> {
        let mut history: Vec<Option<u64>> = Vec::new();
        for k in 1..=HISTORY_DEPTH {
            history.push(
                self.store
                    .get(&snapshot.key, snapshot.bucket.previous(k))
                    .await?,
            );
        }

        let total = self
            .store
            .sum_categories(&snapshot.key.channel, &snapshot.key.query, snapshot.bucket)
            .await?;

        let cur = snapshot.count;
        let growth_series = signals::growth_series(&history);

        let short_term_growth = signals::short_term_growth(cur, history[0]);
        let long_term_ratio = signals::long_term_ratio(cur, &history);
        let volatility = signals::volatility(&history);
        let duration_above_threshold =
            signals::duration_above_threshold(&growth_series, self.growth_threshold);
        let ratio_to_total = signals::ratio_to_total(cur, total);
        let acceleration =
            signals::acceleration(short_term_growth, growth_series.first().copied().flatten());

        let score = self.weights.short_term_growth * short_term_growth
            + self.weights.long_term_ratio * long_term_ratio
            + self.weights.ratio_to_total * ratio_to_total
            + self.weights.volatility * volatility
            + self.weights.acceleration * acceleration;

        let prev_count = match history[0] {
            Some(p) if p > 0 => p,
            _ => 1,
        };

        tracing::debug!(
            key = %snapshot.key,
            bucket = %snapshot.bucket.start(),
            cur,
            prev_count,
            score,
            "scored category"
        );

        Ok(TrendReport {
            snapshot: snapshot.clone(),
            prev_count,
            signals: TrendSignals {
                short_term_growth,
                long_term_ratio,
                ratio_to_total,
                volatility,
                acceleration,
                duration_above_threshold,
                score,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};

    use spikewatch_core::{CategoryKey, TimeBucket};

    use super::*;
    use crate::stores::MemorySnapshotStore;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC 3339 timestamp")
    }

    fn key(category: &str) -> CategoryKey {
        CategoryKey {
            channel: "threads".to_string(),
            query: "hyundai".to_string(),
            category: category.to_string(),
        }
    }

    fn bucket() -> TimeBucket {
        TimeBucket::containing(ts("2026-08-07T10:00:00Z"), 30)
    }

    /// Seeds the store with the spiking "safety" series [T-3=10, T-2=12,
    /// T-1=11, T=40] and the flat "style" series [10, 10, 10, 11].
    fn seeded_store() -> (MemorySnapshotStore, CategorySnapshot, CategorySnapshot) {
        let store = MemorySnapshotStore::new();
        let bucket = bucket();

        let safety = key("safety");
        store.seed_category(&safety, bucket.previous(3), 10);
        store.seed_category(&safety, bucket.previous(2), 12);
        store.seed_category(&safety, bucket.previous(1), 11);
        store.seed_category(&safety, bucket, 40);

        let style = key("style");
        store.seed_category(&style, bucket.previous(3), 10);
        store.seed_category(&style, bucket.previous(2), 10);
        store.seed_category(&style, bucket.previous(1), 10);
        store.seed_category(&style, bucket, 11);

        let safety_snapshot = CategorySnapshot {
            key: safety,
            bucket,
            count: 40,
        };
        let style_snapshot = CategorySnapshot {
            key: style,
            bucket,
            count: 11,
        };
        (store, safety_snapshot, style_snapshot)
    }

    #[tokio::test]
    async fn spiking_category_exceeds_alert_threshold() {
        let (store, safety, _) = seeded_store();
        let scorer = TrendScorer::new(&store, ScoreWeights::default(), 2.0);

        let report = scorer.score_category(&safety).await.unwrap();

        assert!(
            report.signals.score > 2.0,
            "expected score above 2.0, got {}",
            report.signals.score
        );
        assert_eq!(report.prev_count, 11);
        assert!((report.signals.short_term_growth - 29.0 / 11.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn flat_category_stays_below_threshold() {
        let (store, _, style) = seeded_store();
        let scorer = TrendScorer::new(&store, ScoreWeights::default(), 2.0);

        let report = scorer.score_category(&style).await.unwrap();

        assert!(
            report.signals.score < 2.0,
            "expected score below 2.0, got {}",
            report.signals.score
        );
    }

    #[tokio::test]
    async fn score_is_deterministic_across_invocations() {
        let (store, safety, _) = seeded_store();
        let scorer = TrendScorer::new(&store, ScoreWeights::default(), 2.0);

        let first = scorer.score_category(&safety).await.unwrap();
        let second = scorer.score_category(&safety).await.unwrap();

        assert_eq!(
            first.signals.score.to_bits(),
            second.signals.score.to_bits(),
            "same history must produce a bit-identical score"
        );
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn empty_history_scores_without_error() {
        let store = MemorySnapshotStore::new();
        let snapshot = CategorySnapshot {
            key: key("safety"),
            bucket: bucket(),
            count: 10,
        };
        store.seed_category(&snapshot.key, snapshot.bucket, 10);
        let scorer = TrendScorer::new(&store, ScoreWeights::default(), 2.0);

        let report = scorer.score_category(&snapshot).await.unwrap();

        // prev missing → damped to 1; growth = 9.
        assert_eq!(report.prev_count, 1);
        assert!((report.signals.short_term_growth - 9.0).abs() < 1e-12);
        assert_eq!(report.signals.long_term_ratio, 0.0);
        assert_eq!(report.signals.volatility, 0.0);
        assert_eq!(report.signals.duration_above_threshold, 0);
        assert_eq!(report.signals.acceleration, 0.0);
        // The category is the only one at the bucket, so it is the total.
        assert!((report.signals.ratio_to_total - 1.0).abs() < 1e-12);
    }

    #[tokio::test]
    async fn ratio_to_total_spans_categories_at_same_bucket() {
        let (store, safety, _) = seeded_store();
        let scorer = TrendScorer::new(&store, ScoreWeights::default(), 2.0);

        let report = scorer.score_category(&safety).await.unwrap();

        // safety = 40, style = 11 at the same bucket → 40/51.
        assert!((report.signals.ratio_to_total - 40.0 / 51.0).abs() < 1e-12);
    }
}
