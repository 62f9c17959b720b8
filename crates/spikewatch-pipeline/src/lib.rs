use thiserror::Error;

pub mod aggregate;
pub mod barrier;
pub mod emitter;
pub mod scorer;
pub mod signals;
pub mod stores;

pub use aggregate::{count_mentions, persist_counts, BucketCounts};
pub use barrier::{sentinel_location, BarrierOutcome, CompletionBarrier};
pub use emitter::AlertEmitter;
pub use scorer::{TrendReport, TrendScorer, TrendSignals};
pub use stores::{
    AlertSink, CounterStore, MemoryAlertSink, MemoryCounterStore, MemorySnapshotStore,
    PgAlertSink, PgCounterStore, PgSnapshotStore, SnapshotStore,
};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Db(#[from] spikewatch_db::DbError),

    #[error("coordination store error: {0}")]
    Store(String),
}
