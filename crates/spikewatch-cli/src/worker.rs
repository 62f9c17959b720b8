//! One collection worker: scrape a keyword, store the results, report to
//! the completion barrier.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use spikewatch_collector::{
    CollectionWindow, CollectorConfig, SearchFeedClient, WindowCollector,
};
use spikewatch_core::AppConfig;
use spikewatch_pipeline::{CompletionBarrier, PgCounterStore};

const CHANNEL: &str = "threads";

/// What one worker produced, for the dispatcher's tally.
pub(crate) struct WorkerOutcome {
    pub keyword: String,
    pub items: usize,
    pub succeeded: bool,
}

/// Runs one worker end to end.
///
/// The completion report happens unconditionally — success or failure —
/// because the barrier counts toward a fixed total: a silent worker would
/// leave the job pending forever. Without a job id the run is ad hoc:
/// nothing is persisted and coordination is skipped.
pub(crate) async fn run_worker(
    pool: &PgPool,
    config: &AppConfig,
    job_id: Option<Uuid>,
    keyword: &str,
) -> WorkerOutcome {
    let outcome = match collect_keyword(pool, config, job_id, keyword).await {
        Ok(items) => WorkerOutcome {
            keyword: keyword.to_string(),
            items,
            succeeded: true,
        },
        Err(err) => {
            let chain = format!("{err:#}");
            tracing::error!(keyword, error = %chain, "worker failed");
            WorkerOutcome {
                keyword: keyword.to_string(),
                items: 0,
                succeeded: false,
            }
        }
    };

    let counter_store = PgCounterStore::new(pool.clone());
    let barrier = CompletionBarrier::new(&counter_store);
    barrier.report_done(job_id).await;

    outcome
}

async fn collect_keyword(
    pool: &PgPool,
    config: &AppConfig,
    job_id: Option<Uuid>,
    keyword: &str,
) -> anyhow::Result<usize> {
    let feed = SearchFeedClient::new(
        &config.feed_base_url,
        keyword,
        config.feed_request_timeout_secs,
        &config.feed_user_agent,
        config.feed_max_retries,
        config.feed_retry_backoff_base_ms,
    )?;

    let window = CollectionWindow::rolling(config.window_minutes, Utc::now());
    let collector = WindowCollector::new(&feed, CollectorConfig::from_app_config(config));
    let outcome = collector.collect(&window, CHANNEL, keyword).await?;

    if let Some(job_id) = job_id {
        let inserted = spikewatch_db::insert_items(pool, job_id, &outcome.items).await?;
        tracing::info!(
            keyword,
            collected = outcome.items.len(),
            inserted,
            stop_reason = ?outcome.stop_reason,
            "worker stored results"
        );
    } else {
        tracing::info!(
            keyword,
            collected = outcome.items.len(),
            stop_reason = ?outcome.stop_reason,
            "ad hoc run — results not persisted"
        );
    }

    Ok(outcome.items.len())
}
