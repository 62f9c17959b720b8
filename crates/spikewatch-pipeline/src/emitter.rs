//! Alert selection and emission.
//!
//! Takes scored categories, keeps those above the configured threshold,
//! joins each against its keyword counts at the same bucket, and writes one
//! alert row per `(category, bucket, keyword)` — ordered by descending
//! score, then descending keyword count, for consumers that display top-N.

use spikewatch_core::AlertRecord;

use crate::scorer::TrendReport;
use crate::stores::{AlertSink, SnapshotStore};
use crate::PipelineError;

pub struct AlertEmitter<'a, S: SnapshotStore + ?Sized, K: AlertSink + ?Sized> {
    snapshots: &'a S,
    sink: &'a K,
    score_threshold: f64,
}

impl<'a, S: SnapshotStore + ?Sized, K: AlertSink + ?Sized> AlertEmitter<'a, S, K> {
    pub fn new(snapshots: &'a S, sink: &'a K, score_threshold: f64) -> Self {
        Self {
            snapshots,
            sink,
            score_threshold,
        }
    }

    /// Emits alert rows for every report whose score exceeds the threshold.
    ///
    /// Writing is idempotent per `(category, bucket, keyword)`: re-emitting
    /// the same reports overwrites rather than duplicates. Returns the
    /// emitted records in sink order.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] if a keyword lookup or sink write fails.
    pub async fn emit(&self, reports: &[TrendReport]) -> Result<Vec<AlertRecord>, PipelineError> {
        let mut passing: Vec<&TrendReport> = reports
            .iter()
            .filter(|report| report.signals.score > self.score_threshold)
            .collect();
        passing.sort_by(|a, b| {
            b.signals
                .score
                .partial_cmp(&a.signals.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut emitted = Vec::new();
        for report in passing {
            let keywords = self
                .snapshots
                .keyword_counts(&report.snapshot.key, report.snapshot.bucket)
                .await?;

            if keywords.is_empty() {
                tracing::warn!(
                    key = %report.snapshot.key,
                    bucket = %report.snapshot.bucket.start(),
                    "category passed threshold but has no keyword counts"
                );
                continue;
            }

            for (keyword, count_keyword) in keywords {
                let record = AlertRecord {
                    key: report.snapshot.key.clone(),
                    bucket: report.snapshot.bucket,
                    keyword,
                    cur_count: report.snapshot.count,
                    prev_count: report.prev_count,
                    count_keyword,
                    short_term_growth: report.signals.short_term_growth,
                    long_term_ratio: report.signals.long_term_ratio,
                    ratio_to_total: report.signals.ratio_to_total,
                    volatility: report.signals.volatility,
                    acceleration: report.signals.acceleration,
                    duration_above_threshold: report.signals.duration_above_threshold,
                    score: report.signals.score,
                };
                self.sink.put(&record).await?;
                emitted.push(record);
            }
        }

        tracing::info!(
            alerts = emitted.len(),
            threshold = self.score_threshold,
            "alert emission finished"
        );
        Ok(emitted)
    }
}
