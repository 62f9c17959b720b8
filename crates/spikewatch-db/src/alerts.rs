//! Database operations for the `alerts` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use spikewatch_core::AlertRecord;

use crate::DbError;

/// A row from the `alerts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AlertRow {
    pub channel: String,
    pub query: String,
    pub category: String,
    pub bucket_start: DateTime<Utc>,
    pub keyword: String,
    pub cur_count: i64,
    pub prev_count: i64,
    pub count_keyword: i64,
    pub short_term_growth: f64,
    pub long_term_ratio: f64,
    pub ratio_to_total: f64,
    pub volatility: f64,
    pub acceleration: f64,
    pub duration_above_threshold: i16,
    pub score: f64,
    pub created_at: DateTime<Utc>,
}

fn count_to_i64(count: u64) -> i64 {
    i64::try_from(count).unwrap_or(i64::MAX)
}

/// Upserts one alert row.
///
/// The `(channel, query, category, bucket_start, keyword)` primary key makes
/// this idempotent: emitting the same alert twice overwrites the row rather
/// than duplicating it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_alert(pool: &PgPool, alert: &AlertRecord) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO alerts \
             (channel, query, category, bucket_start, keyword, cur_count, prev_count, \
              count_keyword, short_term_growth, long_term_ratio, ratio_to_total, \
              volatility, acceleration, duration_above_threshold, score) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (channel, query, category, bucket_start, keyword) DO UPDATE SET \
             cur_count                = EXCLUDED.cur_count, \
             prev_count               = EXCLUDED.prev_count, \
             count_keyword            = EXCLUDED.count_keyword, \
             short_term_growth        = EXCLUDED.short_term_growth, \
             long_term_ratio          = EXCLUDED.long_term_ratio, \
             ratio_to_total           = EXCLUDED.ratio_to_total, \
             volatility               = EXCLUDED.volatility, \
             acceleration             = EXCLUDED.acceleration, \
             duration_above_threshold = EXCLUDED.duration_above_threshold, \
             score                    = EXCLUDED.score",
    )
    .bind(&alert.key.channel)
    .bind(&alert.key.query)
    .bind(&alert.key.category)
    .bind(alert.bucket.start())
    .bind(&alert.keyword)
    .bind(count_to_i64(alert.cur_count))
    .bind(count_to_i64(alert.prev_count))
    .bind(count_to_i64(alert.count_keyword))
    .bind(alert.short_term_growth)
    .bind(alert.long_term_ratio)
    .bind(alert.ratio_to_total)
    .bind(alert.volatility)
    .bind(alert.acceleration)
    .bind(i16::from(alert.duration_above_threshold))
    .bind(alert.score)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns the most recent alerts, newest bucket first, then by descending
/// score and keyword count within a bucket.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_alerts(pool: &PgPool, limit: i64) -> Result<Vec<AlertRow>, DbError> {
    let rows = sqlx::query_as::<_, AlertRow>(
        "SELECT channel, query, category, bucket_start, keyword, cur_count, prev_count, \
                count_keyword, short_term_growth, long_term_ratio, ratio_to_total, \
                volatility, acceleration, duration_above_threshold, score, created_at \
         FROM alerts \
         ORDER BY bucket_start DESC, score DESC, count_keyword DESC \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
