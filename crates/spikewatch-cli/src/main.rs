mod aggregate;
mod dispatch;
mod report;
mod worker;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "spikewatch-cli")]
#[command(about = "Keyword-spike monitoring pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fan out one collection worker per configured keyword, then aggregate
    /// once the last worker reports in
    Dispatch {
        /// Override the rolling window size for this run
        #[arg(long)]
        within_minutes: Option<u32>,

        /// Reuse a job id instead of generating one
        #[arg(long)]
        job_id: Option<Uuid>,
    },
    /// Run a single collection worker for one keyword
    Collect {
        #[arg(long)]
        keyword: String,

        /// Join an existing fan-out job; without it the run is ad hoc and
        /// skips coordination and persistence
        #[arg(long)]
        job_id: Option<Uuid>,
    },
    /// Aggregate, score, and emit alerts for a collected job
    Aggregate {
        #[arg(long)]
        job_id: Uuid,

        /// Score in memory and print instead of persisting
        #[arg(long)]
        dry_run: bool,
    },
    /// Print recent alerts
    Report {
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config = spikewatch_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = spikewatch_db::PoolConfig::from_app_config(&config);
    let pool = spikewatch_db::connect_pool(&config.database_url, pool_config).await?;
    spikewatch_db::run_migrations(&pool).await?;

    match cli.command {
        Commands::Dispatch {
            within_minutes,
            job_id,
        } => dispatch::run_dispatch(&pool, &config, within_minutes, job_id).await,
        Commands::Collect { keyword, job_id } => {
            let outcome = worker::run_worker(&pool, &config, job_id, &keyword).await;
            if !outcome.succeeded {
                anyhow::bail!("collection failed for keyword '{keyword}'");
            }
            println!("collected {} items for '{keyword}'", outcome.items);
            Ok(())
        }
        Commands::Aggregate { job_id, dry_run } => {
            aggregate::run_aggregation(&pool, &config, job_id, dry_run).await
        }
        Commands::Report { limit } => report::run_report(&pool, limit).await,
    }
}
