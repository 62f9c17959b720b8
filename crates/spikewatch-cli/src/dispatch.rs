//! The fan-out dispatcher: one worker per configured keyword, bounded
//! concurrency, aggregation once the barrier fires.
//!
//! Per-keyword failures are logged and skipped rather than propagated so a
//! single bad keyword does not abort the full run; the run fails only when
//! every worker failed.

use futures::stream::{self, StreamExt};
use sqlx::PgPool;
use uuid::Uuid;

use spikewatch_core::{AppConfig, JobStatus};

use crate::aggregate;
use crate::worker::{self, WorkerOutcome};

pub(crate) async fn run_dispatch(
    pool: &PgPool,
    config: &AppConfig,
    within_minutes: Option<u32>,
    job_id: Option<Uuid>,
) -> anyhow::Result<()> {
    let mut config = config.clone();
    if let Some(minutes) = within_minutes {
        config.window_minutes = minutes;
    }

    let keywords = spikewatch_core::load_keywords(&config.keywords_path)?;
    let job_id = job_id.unwrap_or_else(Uuid::new_v4);
    let total_expected = i32::try_from(keywords.len())?;

    let job = spikewatch_db::create_job(pool, job_id, total_expected).await?;
    tracing::info!(
        %job_id,
        total_expected = job.total_expected,
        window_minutes = config.window_minutes,
        "dispatched fan-out job"
    );

    let max_concurrent = config.max_concurrent_workers.max(1);
    let outcomes: Vec<WorkerOutcome> = stream::iter(&keywords)
        .map(|keyword| worker::run_worker(pool, &config, Some(job_id), keyword))
        .buffer_unordered(max_concurrent)
        .collect()
        .await;

    let total_items: usize = outcomes.iter().map(|o| o.items).sum();
    let failed: Vec<&str> = outcomes
        .iter()
        .filter(|o| !o.succeeded)
        .map(|o| o.keyword.as_str())
        .collect();

    if !failed.is_empty() {
        tracing::warn!(
            failed = failed.len(),
            total_workers = keywords.len(),
            keywords = ?failed,
            "some workers failed during collection"
        );
    }
    if failed.len() == keywords.len() {
        anyhow::bail!("all {} workers failed collection", failed.len());
    }

    tracing::info!(%job_id, total_items, "fan-out finished");

    // The last worker's report flipped the job to completed; a pending job
    // here means some completion reports were lost to store failures.
    let job = spikewatch_db::get_job(pool, job_id).await?;
    if job.status.parse::<JobStatus>() == Ok(JobStatus::Completed) {
        aggregate::run_aggregation(pool, &config, job_id, false).await?;
    } else {
        tracing::warn!(
            %job_id,
            status = %job.status,
            completed = job.completed,
            total_expected = job.total_expected,
            "job did not complete — skipping aggregation"
        );
    }

    Ok(())
}
