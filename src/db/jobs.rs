use chrono::Utc;
use uuid::Uuid;

use super::{Db, Job, JobKind, JobStatus};
use crate::Result;

impl Db {
    /// Create a job row in `pending` status with no items yet; items are
    /// added separately via `insert_job_items` once the manifest has been
    /// expanded into identities.
    pub async fn create_job(&self, kind: JobKind, source: &str) -> Result<Job> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO jobs (id, kind, source, status, total, completed, failed, progress, created_at)
             VALUES (?, ?, ?, 'pending', 0, 0, 0, 0, ?)",
        )
        .bind(&id)
        .bind(kind)
        .bind(source)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.get_job(&id).await?.ok_or_else(|| crate::Error::Fatal("job vanished after insert".into()))
    }

    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(job)
    }

    pub async fn list_jobs(&self, limit: i64, offset: i64) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>("SELECT * FROM jobs ORDER BY created_at DESC LIMIT ? OFFSET ?")
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(jobs)
    }

    /// Jobs eligible for a worker: `pending`, oldest first, up to `limit`.
    pub async fn list_pending_jobs(&self, limit: i64) -> Result<Vec<Job>> {
        let jobs = sqlx::query_as::<_, Job>(
            "SELECT * FROM jobs WHERE status = 'pending' ORDER BY created_at ASC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(jobs)
    }

    pub async fn set_job_total(&self, id: &str, total: i64) -> Result<()> {
        sqlx::query("UPDATE jobs SET total = ? WHERE id = ?")
            .bind(total)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn mark_job_running(&self, id: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = 'running', started_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Recompute `completed`/`failed`/`progress` from the job's items and
    /// persist. Intermediate calls are allowed to fail without aborting the
    /// job (spec §4.8); callers should log and continue.
    pub async fn recompute_job_progress(&self, id: &str) -> Result<()> {
        let (completed, failed): (i64, i64) = {
            let row: (i64, i64) = sqlx::query_as(
                "SELECT
                    (SELECT COUNT(*) FROM job_items WHERE job_id = ? AND status = 'completed'),
                    (SELECT COUNT(*) FROM job_items WHERE job_id = ? AND status = 'failed')",
            )
            .bind(id)
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
            row
        };

        let job = self.get_job(id).await?.ok_or_else(|| crate::Error::NotFound(format!("job {id}")))?;
        let progress = if job.total > 0 { (completed * 100) / job.total } else { 0 };

        sqlx::query("UPDATE jobs SET completed = ?, failed = ?, progress = ? WHERE id = ?")
            .bind(completed)
            .bind(failed)
            .bind(progress)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Close out a job once every item has reached a terminal state.
    /// `completed` iff `failed == 0`; `failed` otherwise (including the
    /// zero-item case, which is terminally `failed` per spec §4.8).
    pub async fn finalize_job(&self, id: &str) -> Result<()> {
        let job = self.get_job(id).await?.ok_or_else(|| crate::Error::NotFound(format!("job {id}")))?;
        let status = if job.total > 0 && job.failed == 0 {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        let progress = if status == JobStatus::Completed { 100 } else { job.progress };

        sqlx::query("UPDATE jobs SET status = ?, progress = ?, completed_at = ? WHERE id = ?")
            .bind(status)
            .bind(progress)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn fail_job(&self, id: &str, error: &str) -> Result<()> {
        sqlx::query("UPDATE jobs SET status = 'failed', error = ?, completed_at = ? WHERE id = ?")
            .bind(error)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Administrator "retry": reset the job's failed items to `pending`
    /// (see `reset_failed_items_to_pending`) and make the job itself
    /// eligible for the next poll.
    pub async fn retry_job(&self, id: &str) -> Result<u64> {
        let reset_count = self.reset_failed_items_to_pending(id).await?;
        sqlx::query(
            "UPDATE jobs SET status = 'pending', failed = 0, error = NULL, completed_at = NULL WHERE id = ?",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(reset_count)
    }
}
