//! Relational metadata store (spec §4.2): providers, modules, jobs, job
//! items, sessions, and audit log, backed by `sqlx`'s SQLite driver.
//!
//! Every mutation and query lives behind a typed `async fn` here; no SQL
//! leaks past this module.

mod audit;
mod backup;
mod job_items;
mod jobs;
mod models;
pub mod modules;
pub mod providers;
mod sessions;

pub use models::{
    AuditEntry, Identity, Job, JobItem, JobItemStatus, JobKind, JobStatus, ModuleRecord,
    ProviderRecord, Session,
};
pub use modules::NewModule;
pub use providers::NewProvider;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

use crate::config::DatabaseConfig;
use crate::Result;

#[derive(Clone)]
pub struct Db {
    pool: SqlitePool,
}

impl Db {
    /// Open (creating if absent) the SQLite database at `config.path`,
    /// apply pending migrations, and return a pool-backed handle.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|err| crate::Error::DatabaseIO(err.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", config.path.display()))
            .map_err(|err| crate::Error::DatabaseIO(err.to_string()))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    /// In-memory database for tests; migrations still run.
    pub async fn connect_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|err| crate::Error::DatabaseIO(err.to_string()))?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;
        Ok(db)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Online, concurrent-writer-safe snapshot via SQLite's `VACUUM INTO`.
    pub async fn backup_to(&self, path: &Path) -> Result<()> {
        backup::vacuum_into(&self.pool, path).await
    }

    pub async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
