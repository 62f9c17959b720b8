//! Database operations for `category_snapshots` and `keyword_snapshots`.
//!
//! Snapshots are keyed by `(channel, query, category[, keyword], bucket)`
//! and written with idempotent upserts: re-running aggregation for a bucket
//! overwrites the same rows instead of accumulating duplicates.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use spikewatch_core::{CategorySnapshot, KeywordSnapshot};

use crate::DbError;

/// A row from the `keyword_snapshots` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KeywordSnapshotRow {
    pub channel: String,
    pub query: String,
    pub category: String,
    pub keyword: String,
    pub bucket_start: DateTime<Utc>,
    pub count_keyword: i64,
    pub count_category: i64,
}

fn count_to_i64(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Upserts one per-bucket category count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_category_snapshot(
    pool: &PgPool,
    snapshot: &CategorySnapshot,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO category_snapshots \
             (channel, query, category, bucket_start, count_category) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (channel, query, category, bucket_start) DO UPDATE SET \
             count_category = EXCLUDED.count_category, \
             updated_at     = NOW()",
    )
    .bind(&snapshot.key.channel)
    .bind(&snapshot.key.query)
    .bind(&snapshot.key.category)
    .bind(snapshot.bucket.start())
    .bind(count_to_i64(snapshot.count))
    .execute(pool)
    .await?;

    Ok(())
}

/// Point read of one category count at a bucket.
///
/// Returns `None` when no snapshot exists for the key — absent history is a
/// normal condition for the trend scorer, not an error.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_category_count(
    pool: &PgPool,
    channel: &str,
    query: &str,
    category: &str,
    bucket_start: DateTime<Utc>,
) -> Result<Option<i64>, DbError> {
    let count: Option<i64> = sqlx::query_scalar(
        "SELECT count_category \
         FROM category_snapshots \
         WHERE channel = $1 AND query = $2 AND category = $3 AND bucket_start = $4",
    )
    .bind(channel)
    .bind(query)
    .bind(category)
    .bind(bucket_start)
    .fetch_optional(pool)
    .await?;

    Ok(count)
}

/// Sums the counts of every category at one `(channel, query, bucket)`.
///
/// Returns 0 when no categories were recorded for the bucket.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn sum_category_counts(
    pool: &PgPool,
    channel: &str,
    query: &str,
    bucket_start: DateTime<Utc>,
) -> Result<i64, DbError> {
    let total: Option<i64> = sqlx::query_scalar(
        "SELECT SUM(count_category)::BIGINT \
         FROM category_snapshots \
         WHERE channel = $1 AND query = $2 AND bucket_start = $3",
    )
    .bind(channel)
    .bind(query)
    .bind(bucket_start)
    .fetch_one(pool)
    .await?;

    Ok(total.unwrap_or(0))
}

/// Upserts one per-bucket keyword count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_keyword_snapshot(
    pool: &PgPool,
    snapshot: &KeywordSnapshot,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO keyword_snapshots \
             (channel, query, category, keyword, bucket_start, count_keyword, count_category) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) \
         ON CONFLICT (channel, query, category, keyword, bucket_start) DO UPDATE SET \
             count_keyword  = EXCLUDED.count_keyword, \
             count_category = EXCLUDED.count_category, \
             updated_at     = NOW()",
    )
    .bind(&snapshot.key.channel)
    .bind(&snapshot.key.query)
    .bind(&snapshot.key.category)
    .bind(&snapshot.keyword)
    .bind(snapshot.bucket.start())
    .bind(count_to_i64(snapshot.count_keyword))
    .bind(count_to_i64(snapshot.count_category))
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns the keyword counts for one category at a bucket, highest count
/// first — the join input for alert emission.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_keyword_snapshots(
    pool: &PgPool,
    channel: &str,
    query: &str,
    category: &str,
    bucket_start: DateTime<Utc>,
) -> Result<Vec<KeywordSnapshotRow>, DbError> {
    let rows = sqlx::query_as::<_, KeywordSnapshotRow>(
        "SELECT channel, query, category, keyword, bucket_start, count_keyword, count_category \
         FROM keyword_snapshots \
         WHERE channel = $1 AND query = $2 AND category = $3 AND bucket_start = $4 \
         ORDER BY count_keyword DESC, keyword ASC",
    )
    .bind(channel)
    .bind(query)
    .bind(category)
    .bind(bucket_start)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
