use chrono::Utc;

use super::{AuditEntry, Db};
use crate::Result;

impl Db {
    pub async fn record_audit(
        &self,
        actor: &str,
        action: &str,
        resource: &str,
        success: bool,
        ip: Option<&str>,
        metadata: Option<&str>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT INTO audit_log (actor, action, resource, success, ip, metadata, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(actor)
        .bind(action)
        .bind(resource)
        .bind(success)
        .bind(ip)
        .bind(metadata)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_audit_entries(&self, limit: i64, offset: i64) -> Result<Vec<AuditEntry>> {
        let entries = sqlx::query_as::<_, AuditEntry>(
            "SELECT * FROM audit_log ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    #[tokio::test]
    async fn record_and_list_audit_entries() {
        let db = Db::connect_in_memory().await.unwrap();
        db.record_audit("admin", "job.retry", "jobs/1", true, Some("127.0.0.1"), None)
            .await
            .unwrap();

        let entries = db.list_audit_entries(10, 0).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "job.retry");
    }
}
