use chrono::Utc;

use super::{Db, ProviderRecord};
use crate::{Error, Result};

pub struct NewProvider<'a> {
    pub namespace: &'a str,
    pub r#type: &'a str,
    pub version: &'a str,
    pub os: &'a str,
    pub arch: &'a str,
    pub filename: &'a str,
    pub download_url: &'a str,
    pub shasum: &'a str,
    pub storage_key: &'a str,
    pub byte_size: i64,
}

impl Db {
    pub async fn find_provider(
        &self,
        namespace: &str,
        r#type: &str,
        version: &str,
        os: &str,
        arch: &str,
    ) -> Result<Option<ProviderRecord>> {
        let record = sqlx::query_as::<_, ProviderRecord>(
            "SELECT * FROM providers WHERE namespace = ? AND type = ? AND version = ? AND os = ? AND arch = ?",
        )
        .bind(namespace)
        .bind(r#type)
        .bind(version)
        .bind(os)
        .bind(arch)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    /// Insert a new provider row. On a unique-constraint violation (a
    /// concurrent writer indexed the same identity first), returns `Ok(None)`
    /// so the caller can treat the item as `Skipped` rather than failed.
    pub async fn insert_provider(&self, new: NewProvider<'_>) -> Result<Option<ProviderRecord>> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO providers
                (namespace, type, version, os, arch, filename, download_url, shasum, storage_key, byte_size, deprecated, blocked, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)",
        )
        .bind(new.namespace)
        .bind(new.r#type)
        .bind(new.version)
        .bind(new.os)
        .bind(new.arch)
        .bind(new.filename)
        .bind(new.download_url)
        .bind(new.shasum)
        .bind(new.storage_key)
        .bind(new.byte_size)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(self
                .find_provider(new.namespace, new.r#type, new.version, new.os, new.arch)
                .await?),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(None),
            Err(err) => Err(Error::from(err)),
        }
    }

    pub async fn list_provider_versions(&self, namespace: &str, r#type: &str) -> Result<Vec<String>> {
        let versions: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT version FROM providers WHERE namespace = ? AND type = ? AND blocked = 0",
        )
        .bind(namespace)
        .bind(r#type)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions.into_iter().map(|(v,)| v).collect())
    }

    pub async fn set_provider_flags(
        &self,
        id: i64,
        deprecated: Option<bool>,
        blocked: Option<bool>,
    ) -> Result<()> {
        if let Some(deprecated) = deprecated {
            sqlx::query("UPDATE providers SET deprecated = ?, updated_at = ? WHERE id = ?")
                .bind(deprecated)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(blocked) = blocked {
            sqlx::query("UPDATE providers SET blocked = ?, updated_at = ? WHERE id = ?")
                .bind(blocked)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_provider(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM providers WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_providers(&self, limit: i64, offset: i64) -> Result<Vec<ProviderRecord>> {
        let records = sqlx::query_as::<_, ProviderRecord>(
            "SELECT * FROM providers ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn count_providers(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM providers")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn sum_provider_bytes(&self) -> Result<i64> {
        let (sum,): (Option<i64>,) = sqlx::query_as("SELECT SUM(byte_size) FROM providers")
            .fetch_one(&self.pool)
            .await?;
        Ok(sum.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    fn sample<'a>() -> NewProvider<'a> {
        NewProvider {
            namespace: "hashicorp",
            r#type: "random",
            version: "3.5.1",
            os: "linux",
            arch: "amd64",
            filename: "terraform-provider-random_3.5.1_linux_amd64.zip",
            download_url: "https://example.com/provider.zip",
            shasum: "a".repeat(64).leak(),
            storage_key: "providers/registry.terraform.io/hashicorp/random/3.5.1/linux_amd64/terraform-provider-random_3.5.1_linux_amd64.zip",
            byte_size: 1024,
        }
    }

    #[tokio::test]
    async fn insert_then_find_roundtrips() {
        let db = Db::connect_in_memory().await.unwrap();
        let inserted = db.insert_provider(sample()).await.unwrap();
        assert!(inserted.is_some());

        let found = db
            .find_provider("hashicorp", "random", "3.5.1", "linux", "amd64")
            .await
            .unwrap();
        assert!(found.is_some());
    }

    #[tokio::test]
    async fn duplicate_insert_returns_none_not_error() {
        let db = Db::connect_in_memory().await.unwrap();
        db.insert_provider(sample()).await.unwrap();
        let second = db.insert_provider(sample()).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn list_versions_collapses_platforms() {
        let db = Db::connect_in_memory().await.unwrap();
        db.insert_provider(sample()).await.unwrap();

        let mut darwin = sample();
        darwin.os = "darwin";
        darwin.arch = "arm64";
        db.insert_provider(darwin).await.unwrap();

        let versions = db.list_provider_versions("hashicorp", "random").await.unwrap();
        assert_eq!(versions, vec!["3.5.1".to_string()]);
    }
}
