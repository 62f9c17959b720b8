//! Post-barrier aggregation: bucket counts → trend scores → alerts.

use sqlx::PgPool;
use uuid::Uuid;

use spikewatch_core::{AppConfig, CollectedItem};
use spikewatch_db::CollectedItemRow;
use spikewatch_pipeline::{
    count_mentions, persist_counts, AlertEmitter, MemorySnapshotStore, PgAlertSink,
    PgSnapshotStore, TrendScorer,
};

pub(crate) async fn run_aggregation(
    pool: &PgPool,
    config: &AppConfig,
    job_id: Uuid,
    dry_run: bool,
) -> anyhow::Result<()> {
    let wordbag = spikewatch_core::load_wordbag(&config.wordbag_path)?;
    let rows = spikewatch_db::list_items_for_job(pool, job_id).await?;
    let items: Vec<CollectedItem> = rows.into_iter().map(CollectedItemRow::into_item).collect();
    tracing::info!(%job_id, items = items.len(), "aggregating job");

    let counts = count_mentions(&items, &wordbag, config.bucket_width_minutes);

    if dry_run {
        // Score against an in-memory store: no history, no persistence —
        // a preview of what this job alone would produce.
        let store = MemorySnapshotStore::new();
        persist_counts(&store, &counts).await?;
        let scorer = TrendScorer::new(&store, config.score_weights, config.growth_threshold);
        for snapshot in &counts.categories {
            let report = scorer.score_category(snapshot).await?;
            println!(
                "[dry-run] {} bucket={} count={} score={:.3}",
                snapshot.key,
                snapshot.bucket.start(),
                snapshot.count,
                report.signals.score
            );
        }
        return Ok(());
    }

    let store = PgSnapshotStore::new(pool.clone());
    persist_counts(&store, &counts).await?;

    let scorer = TrendScorer::new(&store, config.score_weights, config.growth_threshold);
    let mut reports = Vec::with_capacity(counts.categories.len());
    for snapshot in &counts.categories {
        reports.push(scorer.score_category(snapshot).await?);
    }

    let sink = PgAlertSink::new(pool.clone());
    let emitter = AlertEmitter::new(&store, &sink, config.score_threshold);
    let emitted = emitter.emit(&reports).await?;

    tracing::info!(
        %job_id,
        categories = counts.categories.len(),
        alerts = emitted.len(),
        "aggregation finished"
    );
    Ok(())
}
