use chrono::Utc;

use super::{Db, ModuleRecord};
use crate::{Error, Result};

pub struct NewModule<'a> {
    pub namespace: &'a str,
    pub name: &'a str,
    pub system: &'a str,
    pub version: &'a str,
    pub storage_key: &'a str,
    pub filename: &'a str,
    pub byte_size: i64,
    pub source_url: &'a str,
}

impl Db {
    pub async fn find_module(
        &self,
        namespace: &str,
        name: &str,
        system: &str,
        version: &str,
    ) -> Result<Option<ModuleRecord>> {
        let record = sqlx::query_as::<_, ModuleRecord>(
            "SELECT * FROM modules WHERE namespace = ? AND name = ? AND system = ? AND version = ?",
        )
        .bind(namespace)
        .bind(name)
        .bind(system)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(record)
    }

    pub async fn insert_module(&self, new: NewModule<'_>) -> Result<Option<ModuleRecord>> {
        let now = Utc::now();

        let result = sqlx::query(
            "INSERT INTO modules
                (namespace, name, system, version, storage_key, filename, byte_size, source_url, deprecated, blocked, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, 0, ?, ?)",
        )
        .bind(new.namespace)
        .bind(new.name)
        .bind(new.system)
        .bind(new.version)
        .bind(new.storage_key)
        .bind(new.filename)
        .bind(new.byte_size)
        .bind(new.source_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(self.find_module(new.namespace, new.name, new.system, new.version).await?),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => Ok(None),
            Err(err) => Err(Error::from(err)),
        }
    }

    pub async fn list_module_versions(&self, namespace: &str, name: &str, system: &str) -> Result<Vec<String>> {
        let versions: Vec<(String,)> = sqlx::query_as(
            "SELECT DISTINCT version FROM modules WHERE namespace = ? AND name = ? AND system = ? AND blocked = 0",
        )
        .bind(namespace)
        .bind(name)
        .bind(system)
        .fetch_all(&self.pool)
        .await?;
        Ok(versions.into_iter().map(|(v,)| v).collect())
    }

    pub async fn set_module_flags(&self, id: i64, deprecated: Option<bool>, blocked: Option<bool>) -> Result<()> {
        if let Some(deprecated) = deprecated {
            sqlx::query("UPDATE modules SET deprecated = ?, updated_at = ? WHERE id = ?")
                .bind(deprecated)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(blocked) = blocked {
            sqlx::query("UPDATE modules SET blocked = ?, updated_at = ? WHERE id = ?")
                .bind(blocked)
                .bind(Utc::now())
                .bind(id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_module(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM modules WHERE id = ?").bind(id).execute(&self.pool).await?;
        Ok(())
    }

    pub async fn list_modules(&self, limit: i64, offset: i64) -> Result<Vec<ModuleRecord>> {
        let records = sqlx::query_as::<_, ModuleRecord>(
            "SELECT * FROM modules ORDER BY id DESC LIMIT ? OFFSET ?",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(records)
    }

    pub async fn count_modules(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM modules").fetch_one(&self.pool).await?;
        Ok(count)
    }

    pub async fn sum_module_bytes(&self) -> Result<i64> {
        let (sum,): (Option<i64>,) = sqlx::query_as("SELECT SUM(byte_size) FROM modules").fetch_one(&self.pool).await?;
        Ok(sum.unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    fn sample<'a>() -> NewModule<'a> {
        NewModule {
            namespace: "foo",
            name: "bar",
            system: "baz",
            version: "1.0.0",
            storage_key: "modules/foo/bar/baz/1.0.0/module.tar.gz",
            filename: "module.tar.gz",
            byte_size: 512,
            source_url: "https://example.com/module.tar.gz",
        }
    }

    #[tokio::test]
    async fn insert_then_find_roundtrips() {
        let db = Db::connect_in_memory().await.unwrap();
        assert!(db.insert_module(sample()).await.unwrap().is_some());
        assert!(db.find_module("foo", "bar", "baz", "1.0.0").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn duplicate_insert_returns_none() {
        let db = Db::connect_in_memory().await.unwrap();
        db.insert_module(sample()).await.unwrap();
        assert!(db.insert_module(sample()).await.unwrap().is_none());
    }
}
