//! Store traits consumed by the pipeline, with Postgres and in-memory
//! implementations.
//!
//! The Postgres implementations are thin adapters over `spikewatch-db`; the
//! in-memory implementations back unit tests and the CLI's dry-run mode,
//! where scoring should happen without touching the database.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use spikewatch_core::{AlertRecord, CategoryKey, CategorySnapshot, KeywordSnapshot, TimeBucket};

use crate::PipelineError;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Point-addressable snapshot storage keyed by `(channel, query, category
/// [, keyword], bucket)`. A `get` miss is "no data for that bucket", not an
/// error; writes are idempotent upserts.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get(&self, key: &CategoryKey, bucket: TimeBucket)
        -> Result<Option<u64>, PipelineError>;

    /// Summed count of every category at one `(channel, query, bucket)`.
    async fn sum_categories(
        &self,
        channel: &str,
        query: &str,
        bucket: TimeBucket,
    ) -> Result<u64, PipelineError>;

    async fn put_category(&self, snapshot: &CategorySnapshot) -> Result<(), PipelineError>;

    async fn put_keyword(&self, snapshot: &KeywordSnapshot) -> Result<(), PipelineError>;

    /// Keyword counts for one category at a bucket, highest count first.
    async fn keyword_counts(
        &self,
        key: &CategoryKey,
        bucket: TimeBucket,
    ) -> Result<Vec<(String, u64)>, PipelineError>;
}

/// The atomic counter primitive behind the completion barrier.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increments the job's completion count and returns the
    /// post-increment `(completed, total_expected)` pair.
    async fn increment(&self, job_id: Uuid) -> Result<(u32, u32), PipelineError>;

    /// Transitions the job to completed; returns `false` when some other
    /// caller already made the transition.
    async fn mark_completed(&self, job_id: Uuid) -> Result<bool, PipelineError>;

    /// Writes the job's completion sentinel. Idempotent.
    async fn write_sentinel(&self, job_id: Uuid, location: &str) -> Result<(), PipelineError>;
}

/// Destination for emitted alert rows.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn put(&self, record: &AlertRecord) -> Result<(), PipelineError>;
}

// ---------------------------------------------------------------------------
// Postgres implementations
// ---------------------------------------------------------------------------

fn count_from_i64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

/// Snapshot storage backed by the `category_snapshots` and
/// `keyword_snapshots` tables.
pub struct PgSnapshotStore {
    pool: PgPool,
}

impl PgSnapshotStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SnapshotStore for PgSnapshotStore {
    async fn get(
        &self,
        key: &CategoryKey,
        bucket: TimeBucket,
    ) -> Result<Option<u64>, PipelineError> {
        let count = spikewatch_db::get_category_count(
            &self.pool,
            &key.channel,
            &key.query,
            &key.category,
            bucket.start(),
        )
        .await?;
        Ok(count.map(count_from_i64))
    }

    async fn sum_categories(
        &self,
        channel: &str,
        query: &str,
        bucket: TimeBucket,
    ) -> Result<u64, PipelineError> {
        let total =
            spikewatch_db::sum_category_counts(&self.pool, channel, query, bucket.start()).await?;
        Ok(count_from_i64(total))
    }

    async fn put_category(&self, snapshot: &CategorySnapshot) -> Result<(), PipelineError> {
        spikewatch_db::upsert_category_snapshot(&self.pool, snapshot).await?;
        Ok(())
    }

    async fn put_keyword(&self, snapshot: &KeywordSnapshot) -> Result<(), PipelineError> {
        spikewatch_db::upsert_keyword_snapshot(&self.pool, snapshot).await?;
        Ok(())
    }

    async fn keyword_counts(
        &self,
        key: &CategoryKey,
        bucket: TimeBucket,
    ) -> Result<Vec<(String, u64)>, PipelineError> {
        let rows = spikewatch_db::list_keyword_snapshots(
            &self.pool,
            &key.channel,
            &key.query,
            &key.category,
            bucket.start(),
        )
        .await?;
        Ok(rows
            .into_iter()
            .map(|row| (row.keyword, count_from_i64(row.count_keyword)))
            .collect())
    }
}

/// Counter storage backed by the `jobs` table; the increment maps to a
/// single `UPDATE ... RETURNING` statement.
pub struct PgCounterStore {
    pool: PgPool,
}

impl PgCounterStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CounterStore for PgCounterStore {
    async fn increment(&self, job_id: Uuid) -> Result<(u32, u32), PipelineError> {
        let (completed, total) = spikewatch_db::increment_completed(&self.pool, job_id).await?;
        Ok((
            u32::try_from(completed).unwrap_or(0),
            u32::try_from(total).unwrap_or(0),
        ))
    }

    async fn mark_completed(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        Ok(spikewatch_db::mark_job_completed(&self.pool, job_id).await?)
    }

    async fn write_sentinel(&self, job_id: Uuid, location: &str) -> Result<(), PipelineError> {
        spikewatch_db::write_sentinel(&self.pool, job_id, location).await?;
        Ok(())
    }
}

/// Alert sink backed by the `alerts` table.
pub struct PgAlertSink {
    pool: PgPool,
}

impl PgAlertSink {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertSink for PgAlertSink {
    async fn put(&self, record: &AlertRecord) -> Result<(), PipelineError> {
        spikewatch_db::upsert_alert(&self.pool, record).await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// In-memory implementations
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MemorySnapshots {
    categories: HashMap<(CategoryKey, DateTime<Utc>), u64>,
    keywords: HashMap<(CategoryKey, String, DateTime<Utc>), (u64, u64)>,
}

/// Snapshot store held entirely in memory.
#[derive(Default)]
pub struct MemorySnapshotStore {
    inner: Mutex<MemorySnapshots>,
}

impl MemorySnapshotStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds one category count, bypassing the trait — convenient for
    /// setting up scoring histories.
    pub fn seed_category(&self, key: &CategoryKey, bucket: TimeBucket, count: u64) {
        let mut inner = self.inner.lock().expect("snapshot store lock poisoned");
        inner
            .categories
            .insert((key.clone(), bucket.start()), count);
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get(
        &self,
        key: &CategoryKey,
        bucket: TimeBucket,
    ) -> Result<Option<u64>, PipelineError> {
        let inner = self.inner.lock().expect("snapshot store lock poisoned");
        Ok(inner.categories.get(&(key.clone(), bucket.start())).copied())
    }

    async fn sum_categories(
        &self,
        channel: &str,
        query: &str,
        bucket: TimeBucket,
    ) -> Result<u64, PipelineError> {
        let inner = self.inner.lock().expect("snapshot store lock poisoned");
        Ok(inner
            .categories
            .iter()
            .filter(|((key, start), _)| {
                key.channel == channel && key.query == query && *start == bucket.start()
            })
            .map(|(_, count)| count)
            .sum())
    }

    async fn put_category(&self, snapshot: &CategorySnapshot) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().expect("snapshot store lock poisoned");
        inner
            .categories
            .insert((snapshot.key.clone(), snapshot.bucket.start()), snapshot.count);
        Ok(())
    }

    async fn put_keyword(&self, snapshot: &KeywordSnapshot) -> Result<(), PipelineError> {
        let mut inner = self.inner.lock().expect("snapshot store lock poisoned");
        inner.keywords.insert(
            (
                snapshot.key.clone(),
                snapshot.keyword.clone(),
                snapshot.bucket.start(),
            ),
            (snapshot.count_keyword, snapshot.count_category),
        );
        Ok(())
    }

    async fn keyword_counts(
        &self,
        key: &CategoryKey,
        bucket: TimeBucket,
    ) -> Result<Vec<(String, u64)>, PipelineError> {
        let inner = self.inner.lock().expect("snapshot store lock poisoned");
        let mut counts: Vec<(String, u64)> = inner
            .keywords
            .iter()
            .filter(|((k, _, start), _)| k == key && *start == bucket.start())
            .map(|((_, keyword, _), (count_keyword, _))| (keyword.clone(), *count_keyword))
            .collect();
        counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        Ok(counts)
    }
}

struct MemoryJob {
    total_expected: u32,
    completed: u32,
    completed_status: bool,
}

/// Counter store held in memory, with the same increment/transition
/// semantics as the Postgres-backed one.
#[derive(Default)]
pub struct MemoryCounterStore {
    jobs: Mutex<HashMap<Uuid, MemoryJob>>,
    sentinels: Mutex<HashMap<Uuid, String>>,
    sentinel_writes: AtomicU32,
}

impl MemoryCounterStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a job counter, mirroring `jobs` row creation.
    pub fn register_job(&self, job_id: Uuid, total_expected: u32) {
        let mut jobs = self.jobs.lock().expect("counter store lock poisoned");
        jobs.insert(
            job_id,
            MemoryJob {
                total_expected,
                completed: 0,
                completed_status: false,
            },
        );
    }

    /// The stored completion count, for assertions.
    #[must_use]
    pub fn completed(&self, job_id: Uuid) -> Option<u32> {
        let jobs = self.jobs.lock().expect("counter store lock poisoned");
        jobs.get(&job_id).map(|job| job.completed)
    }

    /// Whether the job has transitioned to completed.
    #[must_use]
    pub fn is_completed(&self, job_id: Uuid) -> bool {
        let jobs = self.jobs.lock().expect("counter store lock poisoned");
        jobs.get(&job_id).is_some_and(|job| job.completed_status)
    }

    /// The sentinel location written for a job, if any.
    #[must_use]
    pub fn sentinel(&self, job_id: Uuid) -> Option<String> {
        let sentinels = self.sentinels.lock().expect("counter store lock poisoned");
        sentinels.get(&job_id).cloned()
    }

    /// Total number of sentinel writes across all jobs.
    #[must_use]
    pub fn sentinel_writes(&self) -> u32 {
        self.sentinel_writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, job_id: Uuid) -> Result<(u32, u32), PipelineError> {
        let mut jobs = self.jobs.lock().expect("counter store lock poisoned");
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| PipelineError::Store(format!("unknown job {job_id}")))?;
        job.completed += 1;
        Ok((job.completed, job.total_expected))
    }

    async fn mark_completed(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        let mut jobs = self.jobs.lock().expect("counter store lock poisoned");
        let job = jobs
            .get_mut(&job_id)
            .ok_or_else(|| PipelineError::Store(format!("unknown job {job_id}")))?;
        if job.completed_status {
            return Ok(false);
        }
        job.completed_status = true;
        Ok(true)
    }

    async fn write_sentinel(&self, job_id: Uuid, location: &str) -> Result<(), PipelineError> {
        let mut sentinels = self.sentinels.lock().expect("counter store lock poisoned");
        self.sentinel_writes.fetch_add(1, Ordering::SeqCst);
        sentinels.insert(job_id, location.to_string());
        Ok(())
    }
}

/// Alert sink held in memory, keyed like the `alerts` table.
#[derive(Default)]
pub struct MemoryAlertSink {
    rows: Mutex<HashMap<(CategoryKey, DateTime<Utc>, String), AlertRecord>>,
}

impl MemoryAlertSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().expect("alert sink lock poisoned").len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All stored rows, ordered by descending score then keyword count.
    #[must_use]
    pub fn records(&self) -> Vec<AlertRecord> {
        let rows = self.rows.lock().expect("alert sink lock poisoned");
        let mut records: Vec<AlertRecord> = rows.values().cloned().collect();
        records.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.count_keyword.cmp(&a.count_keyword))
        });
        records
    }
}

#[async_trait]
impl AlertSink for MemoryAlertSink {
    async fn put(&self, record: &AlertRecord) -> Result<(), PipelineError> {
        let mut rows = self.rows.lock().expect("alert sink lock poisoned");
        rows.insert(
            (
                record.key.clone(),
                record.bucket.start(),
                record.keyword.clone(),
            ),
            record.clone(),
        );
        Ok(())
    }
}
