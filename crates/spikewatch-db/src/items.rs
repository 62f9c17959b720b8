//! Database operations for `collected_items`.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use spikewatch_core::CollectedItem;

use crate::DbError;

/// A row from the `collected_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CollectedItemRow {
    pub id: i64,
    pub job_id: Uuid,
    pub channel: String,
    pub query: String,
    pub author: String,
    pub content: String,
    pub source_timestamp: DateTime<Utc>,
    pub observed_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl CollectedItemRow {
    /// Converts the row back into the domain item for aggregation.
    #[must_use]
    pub fn into_item(self) -> CollectedItem {
        CollectedItem {
            author: self.author,
            content: self.content,
            source_timestamp: self.source_timestamp,
            observed_timestamp: self.observed_timestamp,
            channel: self.channel,
            query: self.query,
        }
    }
}

/// Inserts a worker's collected items for a job.
///
/// Conflicts on the `(job_id, channel, query, source_timestamp, author)`
/// dedup key are skipped, so replaying a worker's output is idempotent.
/// Returns the number of rows actually inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any insert fails.
pub async fn insert_items(
    pool: &PgPool,
    job_id: Uuid,
    items: &[CollectedItem],
) -> Result<u64, DbError> {
    let mut inserted = 0u64;

    for item in items {
        let result = sqlx::query(
            "INSERT INTO collected_items \
                 (job_id, channel, query, author, content, source_timestamp, observed_timestamp) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (job_id, channel, query, source_timestamp, author) DO NOTHING",
        )
        .bind(job_id)
        .bind(&item.channel)
        .bind(&item.query)
        .bind(&item.author)
        .bind(&item.content)
        .bind(item.source_timestamp)
        .bind(item.observed_timestamp)
        .execute(pool)
        .await?;

        inserted += result.rows_affected();
    }

    Ok(inserted)
}

/// Returns every collected item for a job, oldest source timestamp first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_items_for_job(
    pool: &PgPool,
    job_id: Uuid,
) -> Result<Vec<CollectedItemRow>, DbError> {
    let rows = sqlx::query_as::<_, CollectedItemRow>(
        "SELECT id, job_id, channel, query, author, content, \
                source_timestamp, observed_timestamp, created_at \
         FROM collected_items \
         WHERE job_id = $1 \
         ORDER BY source_timestamp ASC, id ASC",
    )
    .bind(job_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
