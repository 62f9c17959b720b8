//! Print recent alerts with the context a human responder needs.

use sqlx::PgPool;

pub(crate) async fn run_report(pool: &PgPool, limit: i64) -> anyhow::Result<()> {
    let alerts = spikewatch_db::list_recent_alerts(pool, limit).await?;

    if alerts.is_empty() {
        println!("no alerts recorded");
        return Ok(());
    }

    for alert in alerts {
        println!(
            "[{}] {} spike on '{}' at {} — {} -> {} mentions (growth {:+.1}%), \
             keyword '{}' ({} mentions), score {:.2}",
            alert.channel,
            alert.category,
            alert.query,
            alert.bucket_start,
            alert.prev_count,
            alert.cur_count,
            alert.short_term_growth * 100.0,
            alert.keyword,
            alert.count_keyword,
            alert.score,
        );
    }

    Ok(())
}
