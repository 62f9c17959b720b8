//! The fan-out completion barrier.
//!
//! Each of a job's `total_expected` workers calls [`CompletionBarrier::report_done`]
//! exactly once, success or failure, after its collection attempt. The
//! store's atomic increment is the only synchronization point: every caller
//! observes a distinct post-increment value, so the caller that sees the
//! count reach the target performs the finalize step. The status transition
//! is conditional (at most once) and the sentinel write is idempotent, so a
//! duplicate or retried report can never double-finalize.

use uuid::Uuid;

use crate::stores::CounterStore;
use crate::PipelineError;

/// Where a job's completion sentinel is written.
#[must_use]
pub fn sentinel_location(job_id: Uuid) -> String {
    format!("jobs/{job_id}/_SUCCESS")
}

/// What came of one completion report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarrierOutcome {
    /// No job id was supplied — coordination was not requested for this
    /// run (ad hoc and test invocations opt out this way).
    NoCoordination,
    /// The counter store could not be reached; the report was dropped.
    /// Coordination is advisory, so the worker's own output stands.
    Unavailable,
    /// The report was recorded.
    Reported {
        completed: u32,
        total_expected: u32,
        /// Whether this caller performed the completed transition.
        finalized: bool,
    },
}

pub struct CompletionBarrier<'a, S: CounterStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: CounterStore + ?Sized> CompletionBarrier<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Records that one worker of `job_id` finished.
    ///
    /// Never fails the caller: a missing job id means coordination was not
    /// requested, and a store failure is logged and swallowed — data the
    /// worker already produced must not be discarded because bookkeeping
    /// failed.
    pub async fn report_done(&self, job_id: Option<Uuid>) -> BarrierOutcome {
        let Some(job_id) = job_id else {
            tracing::info!("no job coordination requested — skipping completion report");
            return BarrierOutcome::NoCoordination;
        };

        let (completed, total_expected) = match self.store.increment(job_id).await {
            Ok(pair) => pair,
            Err(err) => {
                tracing::warn!(
                    %job_id,
                    error = %err,
                    "coordination store unavailable — completion not recorded"
                );
                return BarrierOutcome::Unavailable;
            }
        };

        let mut finalized = false;
        if completed >= total_expected {
            match self.finalize(job_id).await {
                Ok(first) => finalized = first,
                Err(err) => {
                    tracing::warn!(
                        %job_id,
                        error = %err,
                        "finalize failed — job may be missing its sentinel"
                    );
                }
            }
        }

        tracing::info!(%job_id, completed, total_expected, finalized, "completion reported");
        BarrierOutcome::Reported {
            completed,
            total_expected,
            finalized,
        }
    }

    /// The finalize step run by the last reporter: transition the job to
    /// completed and write the sentinel. Re-running it is harmless.
    async fn finalize(&self, job_id: Uuid) -> Result<bool, PipelineError> {
        let first = self.store.mark_completed(job_id).await?;
        self.store
            .write_sentinel(job_id, &sentinel_location(job_id))
            .await?;
        Ok(first)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use super::*;
    use crate::stores::MemoryCounterStore;

    /// A counter store that is always down.
    struct DownCounterStore;

    #[async_trait]
    impl CounterStore for DownCounterStore {
        async fn increment(&self, _job_id: Uuid) -> Result<(u32, u32), PipelineError> {
            Err(PipelineError::Store("connection refused".to_string()))
        }

        async fn mark_completed(&self, _job_id: Uuid) -> Result<bool, PipelineError> {
            Err(PipelineError::Store("connection refused".to_string()))
        }

        async fn write_sentinel(
            &self,
            _job_id: Uuid,
            _location: &str,
        ) -> Result<(), PipelineError> {
            Err(PipelineError::Store("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn missing_job_id_opts_out_of_coordination() {
        let store = MemoryCounterStore::new();
        let barrier = CompletionBarrier::new(&store);

        let outcome = barrier.report_done(None).await;

        assert_eq!(outcome, BarrierOutcome::NoCoordination);
        assert_eq!(store.sentinel_writes(), 0);
    }

    #[tokio::test]
    async fn store_failure_is_swallowed() {
        let store = DownCounterStore;
        let barrier = CompletionBarrier::new(&store);

        let outcome = barrier.report_done(Some(Uuid::new_v4())).await;

        assert_eq!(outcome, BarrierOutcome::Unavailable);
    }

    #[tokio::test]
    async fn single_worker_job_finalizes_on_first_report() {
        let store = MemoryCounterStore::new();
        let job_id = Uuid::new_v4();
        store.register_job(job_id, 1);
        let barrier = CompletionBarrier::new(&store);

        let outcome = barrier.report_done(Some(job_id)).await;

        assert_eq!(
            outcome,
            BarrierOutcome::Reported {
                completed: 1,
                total_expected: 1,
                finalized: true,
            }
        );
        assert!(store.is_completed(job_id));
        assert_eq!(
            store.sentinel(job_id).as_deref(),
            Some(sentinel_location(job_id).as_str())
        );
    }

    #[tokio::test]
    async fn only_the_last_of_sequential_reports_finalizes() {
        let store = MemoryCounterStore::new();
        let job_id = Uuid::new_v4();
        store.register_job(job_id, 3);
        let barrier = CompletionBarrier::new(&store);

        for expected_completed in 1..=2u32 {
            let outcome = barrier.report_done(Some(job_id)).await;
            assert_eq!(
                outcome,
                BarrierOutcome::Reported {
                    completed: expected_completed,
                    total_expected: 3,
                    finalized: false,
                }
            );
            assert!(!store.is_completed(job_id));
        }

        let outcome = barrier.report_done(Some(job_id)).await;
        assert_eq!(
            outcome,
            BarrierOutcome::Reported {
                completed: 3,
                total_expected: 3,
                finalized: true,
            }
        );
        assert!(store.is_completed(job_id));
    }

    #[tokio::test]
    async fn concurrent_reports_finalize_exactly_once() {
        let store = Arc::new(MemoryCounterStore::new());
        let job_id = Uuid::new_v4();
        store.register_job(job_id, 3);

        let mut handles = Vec::new();
        for _ in 0..3 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                let barrier = CompletionBarrier::new(store.as_ref());
                barrier.report_done(Some(job_id)).await
            }));
        }

        let mut finalize_count = 0;
        for handle in handles {
            let outcome = handle.await.expect("report task panicked");
            if let BarrierOutcome::Reported { finalized, .. } = outcome {
                if finalized {
                    finalize_count += 1;
                }
            } else {
                panic!("expected Reported, got {outcome:?}");
            }
        }

        assert_eq!(finalize_count, 1, "exactly one report must finalize");
        assert_eq!(store.completed(job_id), Some(3));
        assert!(store.is_completed(job_id));
        assert_eq!(store.sentinel_writes(), 1);
    }

    #[tokio::test]
    async fn report_past_the_target_rewrites_sentinel_but_not_status() {
        let store = MemoryCounterStore::new();
        let job_id = Uuid::new_v4();
        store.register_job(job_id, 2);
        let barrier = CompletionBarrier::new(&store);

        barrier.report_done(Some(job_id)).await;
        barrier.report_done(Some(job_id)).await;
        // A duplicate (third) report on a two-worker job: the sentinel write
        // repeats harmlessly, but the transition cannot happen twice.
        let outcome = barrier.report_done(Some(job_id)).await;

        assert_eq!(
            outcome,
            BarrierOutcome::Reported {
                completed: 3,
                total_expected: 2,
                finalized: false,
            }
        );
        assert_eq!(store.sentinel_writes(), 2);
        assert!(store.sentinel(job_id).is_some());
    }
}
