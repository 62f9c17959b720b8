//! Database operations for the `jobs` counter table and completion sentinels.
//!
//! The `completed` column is the fan-out barrier's only synchronization
//! point: workers bump it with a single atomic `UPDATE ... RETURNING`, and
//! Postgres row locking makes the post-increment values a strict sequence
//! even under concurrent callers.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `jobs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct JobRow {
    pub job_id: Uuid,
    pub total_expected: i32,
    pub completed: i32,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Creates a job counter in `pending` status with `completed = 0`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including duplicate
/// `job_id`).
pub async fn create_job(
    pool: &PgPool,
    job_id: Uuid,
    total_expected: i32,
) -> Result<JobRow, DbError> {
    let row = sqlx::query_as::<_, JobRow>(
        "INSERT INTO jobs (job_id, total_expected) \
         VALUES ($1, $2) \
         RETURNING job_id, total_expected, completed, status, created_at, completed_at",
    )
    .bind(job_id)
    .bind(total_expected)
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Fetches a job counter by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_job(pool: &PgPool, job_id: Uuid) -> Result<JobRow, DbError> {
    let row = sqlx::query_as::<_, JobRow>(
        "SELECT job_id, total_expected, completed, status, created_at, completed_at \
         FROM jobs \
         WHERE job_id = $1",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}

/// Atomically increments `completed` and returns the post-increment value
/// together with `total_expected`.
///
/// This is the single synchronization point between workers: each caller
/// observes a distinct post-increment value.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the job does not exist, or
/// [`DbError::Sqlx`] if the update fails.
pub async fn increment_completed(pool: &PgPool, job_id: Uuid) -> Result<(i32, i32), DbError> {
    let row: Option<(i32, i32)> = sqlx::query_as(
        "UPDATE jobs \
         SET completed = completed + 1 \
         WHERE job_id = $1 \
         RETURNING completed, total_expected",
    )
    .bind(job_id)
    .fetch_optional(pool)
    .await?;

    row.ok_or(DbError::NotFound)
}

/// Transitions a job to `completed` and stamps `completed_at`.
///
/// The transition is conditional on the current status, so it commits at
/// most once; returns `false` when the job was already completed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_job_completed(pool: &PgPool, job_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE jobs \
         SET status = 'completed', completed_at = NOW() \
         WHERE job_id = $1 AND status = 'pending'",
    )
    .bind(job_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Writes the completion sentinel for a job. Idempotent: a second write for
/// the same job is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn write_sentinel(pool: &PgPool, job_id: Uuid, location: &str) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO job_sentinels (job_id, location) \
         VALUES ($1, $2) \
         ON CONFLICT (job_id) DO NOTHING",
    )
    .bind(job_id)
    .bind(location)
    .execute(pool)
    .await?;

    Ok(())
}
