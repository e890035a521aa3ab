use sqlx::SqlitePool;
use std::path::Path;

use crate::Result;

/// `VACUUM INTO <path>` is SQLite's documented mechanism for taking a
/// consistent online snapshot while readers and writers keep operating
/// against the live database.
pub async fn vacuum_into(pool: &SqlitePool, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|err| crate::Error::DatabaseIO(err.to_string()))?;
        }
    }

    let path_str = path
        .to_str()
        .ok_or_else(|| crate::Error::InvalidInput("backup path is not valid UTF-8".to_string()))?;

    sqlx::query(&format!("VACUUM INTO '{path_str}'")).execute(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Db;

    #[tokio::test]
    async fn vacuum_into_produces_a_readable_snapshot() {
        let db = Db::connect_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let snapshot_path = dir.path().join("snapshot.db");

        db.backup_to(&snapshot_path).await.unwrap();
        assert!(snapshot_path.exists());
    }
}
