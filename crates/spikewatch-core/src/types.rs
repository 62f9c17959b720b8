//! Domain types shared across the workspace.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// One post pulled from a social-media feed by a collection worker.
///
/// Items are immutable once created and owned by the worker that collected
/// them until they are persisted for aggregation. Two items are considered
/// the same post when they share the [`CollectedItem::dedup_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectedItem {
    pub author: String,
    pub content: String,
    /// When the post was published on the source platform.
    pub source_timestamp: DateTime<Utc>,
    /// When the collector observed the post.
    pub observed_timestamp: DateTime<Utc>,
    pub channel: String,
    pub query: String,
}

impl CollectedItem {
    /// Identity key used for deduplication within a collection run.
    #[must_use]
    pub fn dedup_key(&self) -> (DateTime<Utc>, String) {
        (self.source_timestamp, self.author.clone())
    }
}

/// A fixed-width discretization of a UTC timestamp.
///
/// A bucket is identified by its start instant; buckets of the same width
/// tile the timeline with no gaps. Snapshot rows are keyed by the bucket
/// start, so two timestamps in the same bucket aggregate into one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimeBucket {
    start: DateTime<Utc>,
    width_minutes: u32,
}

impl TimeBucket {
    /// Returns the bucket containing `ts` for the given width.
    ///
    /// The timeline is tiled from the Unix epoch, so bucket boundaries are
    /// stable across runs regardless of when aggregation happens.
    #[must_use]
    pub fn containing(ts: DateTime<Utc>, width_minutes: u32) -> Self {
        let width_secs = i64::from(width_minutes) * 60;
        let secs = ts.timestamp();
        let floored = secs - secs.rem_euclid(width_secs);
        Self {
            start: Utc
                .timestamp_opt(floored, 0)
                .single()
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            width_minutes,
        }
    }

    /// Reconstructs a bucket from a stored start instant.
    #[must_use]
    pub fn from_start(start: DateTime<Utc>, width_minutes: u32) -> Self {
        Self {
            start,
            width_minutes,
        }
    }

    /// The inclusive start instant of this bucket.
    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn width_minutes(&self) -> u32 {
        self.width_minutes
    }

    /// The bucket `k` steps earlier on the timeline.
    #[must_use]
    pub fn previous(&self, k: u32) -> Self {
        Self {
            start: self.start - Duration::minutes(i64::from(self.width_minutes) * i64::from(k)),
            width_minutes: self.width_minutes,
        }
    }
}

/// Addressing triple for snapshot and alert rows.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryKey {
    pub channel: String,
    pub query: String,
    pub category: String,
}

impl std::fmt::Display for CategoryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}#{}", self.channel, self.query, self.category)
    }
}

/// Per-bucket mention count for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorySnapshot {
    pub key: CategoryKey,
    pub bucket: TimeBucket,
    pub count: u64,
}

/// Per-bucket mention count for one keyword, joined to its category total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordSnapshot {
    pub key: CategoryKey,
    pub keyword: String,
    pub bucket: TimeBucket,
    pub count_keyword: u64,
    pub count_category: u64,
}

/// Lifecycle of a fan-out job's completion counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Completed,
}

impl JobStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Completed => "completed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "completed" => Ok(JobStatus::Completed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

/// One alert row, keyed by `(channel, query, category, bucket, keyword)`.
///
/// The key makes alert emission naturally idempotent: re-scoring the same
/// bucket overwrites the row instead of duplicating it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub key: CategoryKey,
    pub bucket: TimeBucket,
    pub keyword: String,
    pub cur_count: u64,
    pub prev_count: u64,
    pub count_keyword: u64,
    pub short_term_growth: f64,
    pub long_term_ratio: f64,
    pub ratio_to_total: f64,
    pub volatility: f64,
    pub acceleration: f64,
    pub duration_above_threshold: u8,
    pub score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> DateTime<Utc> {
        s.parse().expect("valid RFC 3339 timestamp")
    }

    #[test]
    fn bucket_floors_to_width_boundary() {
        let bucket = TimeBucket::containing(ts("2026-08-07T10:17:42Z"), 30);
        assert_eq!(bucket.start(), ts("2026-08-07T10:00:00Z"));
    }

    #[test]
    fn bucket_start_on_boundary_is_identity() {
        let bucket = TimeBucket::containing(ts("2026-08-07T10:30:00Z"), 30);
        assert_eq!(bucket.start(), ts("2026-08-07T10:30:00Z"));
    }

    #[test]
    fn timestamps_in_same_bucket_compare_equal() {
        let a = TimeBucket::containing(ts("2026-08-07T10:01:00Z"), 30);
        let b = TimeBucket::containing(ts("2026-08-07T10:29:59Z"), 30);
        assert_eq!(a, b);
    }

    #[test]
    fn previous_steps_back_k_buckets() {
        let bucket = TimeBucket::containing(ts("2026-08-07T10:00:00Z"), 30);
        assert_eq!(bucket.previous(1).start(), ts("2026-08-07T09:30:00Z"));
        assert_eq!(bucket.previous(6).start(), ts("2026-08-07T07:00:00Z"));
    }

    #[test]
    fn buckets_are_totally_ordered_by_start() {
        let older = TimeBucket::containing(ts("2026-08-07T09:00:00Z"), 30);
        let newer = TimeBucket::containing(ts("2026-08-07T10:00:00Z"), 30);
        assert!(older < newer);
    }

    #[test]
    fn category_key_display_joins_with_hash() {
        let key = CategoryKey {
            channel: "threads".to_string(),
            query: "hyundai".to_string(),
            category: "safety".to_string(),
        };
        assert_eq!(key.to_string(), "threads#hyundai#safety");
    }

    #[test]
    fn dedup_key_is_timestamp_and_author() {
        let item = CollectedItem {
            author: "user1".to_string(),
            content: "brake recall announced".to_string(),
            source_timestamp: ts("2026-08-07T10:01:00Z"),
            observed_timestamp: ts("2026-08-07T10:05:00Z"),
            channel: "threads".to_string(),
            query: "hyundai".to_string(),
        };
        assert_eq!(
            item.dedup_key(),
            (ts("2026-08-07T10:01:00Z"), "user1".to_string())
        );
    }

    #[test]
    fn job_status_round_trips_through_str() {
        assert_eq!("pending".parse::<JobStatus>().unwrap(), JobStatus::Pending);
        assert_eq!(
            "completed".parse::<JobStatus>().unwrap(),
            JobStatus::Completed
        );
        assert_eq!(JobStatus::Completed.as_str(), "completed");
        assert!("running".parse::<JobStatus>().is_err());
    }
}
