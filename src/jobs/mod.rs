//! Background Job Engine (spec §4.8): a polling loop that admits `pending`
//! jobs up to a concurrency cap, runs each job's items sequentially through
//! the Ingestion Orchestrator, and tracks progress/cancellation.

mod submit;
mod worker;

pub use submit::submit_job;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::ProcessorConfig;
use crate::db::{Db, Job};
use crate::ingest::Ingestor;
use crate::observability::Metrics;
use crate::Result;

/// Shared state the polling loop and each job's worker task draw on.
pub struct JobEngine {
    db: Db,
    ingestor: Arc<Ingestor>,
    metrics: Arc<Metrics>,
    config: ProcessorConfig,
    active: DashMap<String, CancellationToken>,
}

impl JobEngine {
    pub fn new(db: Db, ingestor: Arc<Ingestor>, metrics: Arc<Metrics>, config: ProcessorConfig) -> Arc<Self> {
        Arc::new(Self { db, ingestor, metrics, config, active: DashMap::new() })
    }

    /// Starts the polling loop as a background task. The loop stops once
    /// `shutdown` is cancelled; in-flight jobs are given
    /// `worker_shutdown_seconds` to finish their current item before the
    /// process exits around them.
    pub fn spawn(self: Arc<Self>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(self.config.polling_interval_seconds));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.reclaim_stuck_items().await;
                        self.poll_and_dispatch().await;
                    }
                    _ = shutdown.cancelled() => {
                        tracing::info!("job engine shutting down, waiting for in-flight workers");
                        break;
                    }
                }
            }
        })
    }

    async fn reclaim_stuck_items(&self) {
        let grace = Duration::from_secs(self.config.stuck_item_grace_seconds);
        match self.db.reclaim_stuck_items(grace).await {
            Ok(count) => self.metrics.items_reclaimed(count),
            Err(err) => tracing::warn!(error = %err, "failed to reclaim stuck job items"),
        }
    }

    async fn poll_and_dispatch(self: &Arc<Self>) {
        let capacity = self.config.max_concurrent_jobs.saturating_sub(self.active.len());
        if capacity == 0 {
            return;
        }

        let pending = match self.db.list_pending_jobs(capacity as i64).await {
            Ok(jobs) => jobs,
            Err(err) => {
                tracing::warn!(error = %err, "failed to list pending jobs");
                return;
            }
        };

        for job in pending {
            self.dispatch(job);
        }
    }

    fn dispatch(self: &Arc<Self>, job: Job) {
        let cancel = CancellationToken::new();
        self.active.insert(job.id.clone(), cancel.clone());
        self.metrics.job_accepted();

        let engine = Arc::clone(self);
        let job_id = job.id.clone();
        tokio::spawn(async move {
            if let Err(err) = engine.db.mark_job_running(&job_id).await {
                tracing::warn!(job_id = %job_id, error = %err, "failed to mark job running");
            }

            worker::run_job(&engine.db, &engine.ingestor, &engine.metrics, &job_id, &cancel).await;

            engine.active.remove(&job_id);
        });
    }

    /// Administrator action: cancel a job. If a worker is currently running
    /// it, signal its cancellation token so it unwinds on its own; otherwise
    /// (the job hasn't been picked up by a worker yet) fail it directly.
    pub async fn cancel(&self, job_id: &str) -> Result<()> {
        if let Some(token) = self.active.get(job_id) {
            token.cancel();
            return Ok(());
        }

        self.db.cancel_remaining_items(job_id, "cancelled by administrator").await?;
        self.db.fail_job(job_id, "cancelled by administrator").await?;
        self.metrics.job_failed();
        Ok(())
    }

    /// Administrator action: reset a failed job's failed items to `pending`
    /// and the job itself to `pending` so the next poll picks it back up.
    pub async fn retry(&self, job_id: &str) -> Result<u64> {
        self.db.retry_job(job_id).await
    }

    pub fn active_job_count(&self) -> usize {
        self.active.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::JobKind;
    use crate::fetcher::http_module::HttpModuleFetcher;
    use crate::fetcher::http_provider::HttpProviderFetcher;
    use crate::fetcher::RetryPolicy;
    use crate::storage::Storage;

    async fn test_engine() -> (Arc<JobEngine>, Db) {
        let db = Db::connect_in_memory().await.unwrap();
        let storage = Storage::in_memory();
        let ingestor = Arc::new(Ingestor {
            db: db.clone(),
            storage,
            provider_fetcher: HttpProviderFetcher::new("https://example.invalid".to_string(), RetryPolicy::default())
                .unwrap(),
            module_fetcher: HttpModuleFetcher::new("https://example.invalid".to_string(), RetryPolicy::default())
                .unwrap(),
            server: Arc::new(ServerConfig::default()),
        });
        let metrics = Arc::new(Metrics::new());
        let config = ProcessorConfig { polling_interval_seconds: 1, ..ProcessorConfig::default() };
        let engine = JobEngine::new(db.clone(), ingestor, metrics, config);
        (engine, db)
    }

    #[tokio::test]
    async fn cancelling_a_job_with_no_active_worker_fails_it_directly() {
        let (engine, db) = test_engine().await;
        let job = db.create_job(JobKind::Provider, "{}").await.unwrap();
        db.insert_job_items(
            &job.id,
            &[crate::db::Identity::Provider {
                namespace: "hashicorp".to_string(),
                r#type: "random".to_string(),
                version: "3.5.1".to_string(),
                os: "linux".to_string(),
                arch: "amd64".to_string(),
            }],
        )
        .await
        .unwrap();

        engine.cancel(&job.id).await.unwrap();

        let job = db.get_job(&job.id).await.unwrap().unwrap();
        assert_eq!(job.status, crate::db::JobStatus::Failed);
    }
}
