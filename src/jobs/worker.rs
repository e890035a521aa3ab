//! Per-job worker loop: claims items one at a time, in insertion order, and
//! runs each through the Ingestion Orchestrator (spec §4.8 — a job's items
//! are never processed concurrently with each other, only jobs are).

use tokio_util::sync::CancellationToken;

use crate::db::{Db, JobItem};
use crate::ingest::{IndexedArtifact, Ingestor};
use crate::observability::Metrics;

pub async fn run_job(db: &Db, ingestor: &Ingestor, metrics: &Metrics, job_id: &str, cancel: &CancellationToken) {
    loop {
        if cancel.is_cancelled() {
            if let Err(err) = db.cancel_remaining_items(job_id, "cancelled by administrator").await {
                tracing::warn!(job_id, error = %err, "failed to mark remaining items cancelled");
            }
            if let Err(err) = db.fail_job(job_id, "cancelled by administrator").await {
                tracing::warn!(job_id, error = %err, "failed to mark job cancelled");
            }
            metrics.job_failed();
            return;
        }

        let item = match db.claim_next_item(job_id).await {
            Ok(Some(item)) => item,
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(job_id, error = %err, "failed to claim next job item");
                break;
            }
        };

        process_item(db, ingestor, metrics, job_id, &item, cancel).await;

        if let Err(err) = db.recompute_job_progress(job_id).await {
            tracing::warn!(job_id, error = %err, "failed to recompute job progress");
        }
    }

    match db.finalize_job(job_id).await {
        Ok(()) => metrics.job_completed(),
        Err(err) => tracing::warn!(job_id, error = %err, "failed to finalize job"),
    }
}

async fn process_item(
    db: &Db,
    ingestor: &Ingestor,
    metrics: &Metrics,
    job_id: &str,
    item: &JobItem,
    cancel: &CancellationToken,
) {
    let identity = crate::db::Identity::from(item);

    let result = ingestor.try_ingest_one(&identity, cancel).await;
    match result {
        Ok(Some(IndexedArtifact::Provider(record))) => {
            if let Err(err) = db.mark_item_completed(item.id, Some(record.id), None).await {
                tracing::warn!(job_id, item_id = item.id, error = %err, "failed to mark item completed");
            }
            metrics.item_succeeded();
        }
        Ok(Some(IndexedArtifact::Module(record))) => {
            if let Err(err) = db.mark_item_completed(item.id, None, Some(record.id)).await {
                tracing::warn!(job_id, item_id = item.id, error = %err, "failed to mark item completed");
            }
            metrics.item_succeeded();
        }
        Ok(None) => {
            fail_item(db, metrics, job_id, item.id, "artifact vanished after a concurrent index").await;
        }
        Err(err) => {
            fail_item(db, metrics, job_id, item.id, &err.to_string()).await;
        }
    }
}

async fn fail_item(db: &Db, metrics: &Metrics, job_id: &str, item_id: i64, error: &str) {
    tracing::warn!(job_id, item_id, error, "job item failed");
    if let Err(err) = db.mark_item_failed(item_id, error).await {
        tracing::warn!(job_id, item_id, error = %err, "failed to mark item failed");
    }
    metrics.item_failed();
}
