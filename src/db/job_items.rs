use chrono::{DateTime, Duration, Utc};

use super::{Db, Identity, JobItem, JobItemStatus};
use crate::Result;

impl Db {
    /// Expand a job's resolved identities into `job_items` rows, `pending`,
    /// in the given order (spec §5: items are processed in insertion order
    /// within a job).
    pub async fn insert_job_items(&self, job_id: &str, identities: &[Identity]) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (seq, identity) in identities.iter().enumerate() {
            let (namespace, name, system_or_type, version, platform) = match identity {
                Identity::Provider { namespace, r#type, version, os, arch } => {
                    (namespace.as_str(), "", r#type.as_str(), version.as_str(), Some(format!("{os}_{arch}")))
                }
                Identity::Module { namespace, name, system, version } => {
                    (namespace.as_str(), name.as_str(), system.as_str(), version.as_str(), None)
                }
            };

            sqlx::query(
                "INSERT INTO job_items
                    (job_id, seq, namespace, name, system_or_type, version, platform, status, created_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, 'pending', ?)",
            )
            .bind(job_id)
            .bind(seq as i64)
            .bind(namespace)
            .bind(name)
            .bind(system_or_type)
            .bind(version)
            .bind(platform)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        self.set_job_total(job_id, identities.len() as i64).await?;
        Ok(())
    }

    pub async fn list_job_items(&self, job_id: &str) -> Result<Vec<JobItem>> {
        let items = sqlx::query_as::<_, JobItem>("SELECT * FROM job_items WHERE job_id = ? ORDER BY seq ASC")
            .bind(job_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    /// Next `pending` item for a job, in insertion order, atomically
    /// claimed into `downloading`. Returns `None` once the job is drained.
    pub async fn claim_next_item(&self, job_id: &str) -> Result<Option<JobItem>> {
        let mut tx = self.pool.begin().await?;

        let item = sqlx::query_as::<_, JobItem>(
            "SELECT * FROM job_items WHERE job_id = ? AND status = 'pending' ORDER BY seq ASC LIMIT 1",
        )
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(item) = item else {
            tx.commit().await?;
            return Ok(None);
        };

        sqlx::query("UPDATE job_items SET status = 'downloading', started_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(item.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(self.get_job_item(item.id).await?)
    }

    pub async fn get_job_item(&self, id: i64) -> Result<Option<JobItem>> {
        let item = sqlx::query_as::<_, JobItem>("SELECT * FROM job_items WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(item)
    }

    pub async fn mark_item_completed(&self, id: i64, provider_id: Option<i64>, module_id: Option<i64>) -> Result<()> {
        sqlx::query(
            "UPDATE job_items SET status = 'completed', provider_id = ?, module_id = ?, completed_at = ?, error = NULL WHERE id = ?",
        )
        .bind(provider_id)
        .bind(module_id)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn mark_item_failed(&self, id: i64, error: &str) -> Result<()> {
        sqlx::query("UPDATE job_items SET status = 'failed', error = ?, completed_at = ? WHERE id = ?")
            .bind(error)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Administrator retry: reset every `failed` item in the job back to
    /// `pending`, clearing error/timestamps and bumping `retry_count`
    /// atomically. Returns the number of items reset.
    pub async fn reset_failed_items_to_pending(&self, job_id: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE job_items
             SET status = 'pending', error = NULL, started_at = NULL, completed_at = NULL, retry_count = retry_count + 1
             WHERE job_id = ? AND status = 'failed'",
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Reclaim items left in `downloading` by a crashed worker: anything
    /// whose `started_at` is older than `grace` is reset to `pending` so the
    /// next poll can re-admit the owning job (spec §9 open question,
    /// resolved via `processor.stuck_item_grace_seconds`).
    pub async fn reclaim_stuck_items(&self, grace: std::time::Duration) -> Result<u64> {
        let threshold: DateTime<Utc> = Utc::now() - Duration::from_std(grace).unwrap_or(Duration::zero());

        let result = sqlx::query(
            "UPDATE job_items SET status = 'pending', started_at = NULL
             WHERE status = 'downloading' AND started_at < ?",
        )
        .bind(threshold)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Mark a stuck `downloading` item `failed` with a cancellation message.
    /// Items still `pending` are left untouched — the worker loop simply
    /// never claims them once cancellation is observed, so they stay
    /// `pending` for a future retry, per spec §8 scenario 6.
    pub async fn cancel_remaining_items(&self, job_id: &str, reason: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE job_items SET status = 'failed', error = ?, completed_at = ?
             WHERE job_id = ? AND status = 'downloading'",
        )
        .bind(reason)
        .bind(Utc::now())
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

impl From<&JobItem> for Identity {
    fn from(item: &JobItem) -> Self {
        match &item.platform {
            Some(platform) => {
                let (os, arch) = platform.split_once('_').unwrap_or((platform.as_str(), ""));
                Identity::Provider {
                    namespace: item.namespace.clone(),
                    r#type: item.system_or_type.clone(),
                    version: item.version.clone(),
                    os: os.to_string(),
                    arch: arch.to_string(),
                }
            }
            None => Identity::Module {
                namespace: item.namespace.clone(),
                name: item.name.clone(),
                system: item.system_or_type.clone(),
                version: item.version.clone(),
            },
        }
    }
}
