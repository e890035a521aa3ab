//! Shared application state handed to the protocol and admin routers.

use std::sync::Arc;

use crate::autodownload::Coordinator;
use crate::cache::Cache;
use crate::config::Config;
use crate::db::Db;
use crate::fetcher::http_module::HttpModuleFetcher;
use crate::fetcher::http_provider::HttpProviderFetcher;
use crate::fetcher::RetryPolicy;
use crate::ingest::Ingestor;
use crate::jobs::JobEngine;
use crate::observability::Metrics;
use crate::storage::Storage;
use crate::Result;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub storage: Storage,
    pub cache: Arc<Cache>,
    pub coordinator: Arc<Coordinator>,
    pub job_engine: Arc<JobEngine>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wires every subsystem together from a loaded configuration: opens
    /// the Metadata Store (running migrations), builds the Object Store
    /// adapter, the Two-Tier Cache, the Ingestion Orchestrator shared by
    /// the job engine and the auto-download coordinator, and finally the
    /// Background Job Engine itself. Does not start the job engine's
    /// polling loop; callers spawn that separately once they hold a
    /// cancellation token for shutdown.
    pub async fn build(config: Config) -> Result<(Arc<Self>, Arc<JobEngine>)> {
        let config = Arc::new(config);
        let metrics = Arc::new(Metrics::new());

        let db = Db::connect(&config.database).await?;
        let storage = Storage::from_config(&config.storage).await?;
        let cache = Arc::new(Cache::from_config(&config.cache)?);

        let retry_policy = RetryPolicy {
            max_attempts: config.processor.retry_attempts,
            initial_delay: std::time::Duration::from_secs(config.processor.retry_delay_seconds),
        };
        let upstream_registry = config.server.upstream_registry.clone();
        let provider_fetcher =
            HttpProviderFetcher::new(upstream_registry.clone(), retry_policy).map_err(crate::Error::from)?;
        let module_fetcher = HttpModuleFetcher::new(upstream_registry, retry_policy).map_err(crate::Error::from)?;

        let ingestor = Arc::new(Ingestor {
            db: db.clone(),
            storage: storage.clone(),
            provider_fetcher,
            module_fetcher,
            server: Arc::new(config.server.clone()),
        });

        let job_engine = JobEngine::new(db.clone(), Arc::clone(&ingestor), Arc::clone(&metrics), config.processor.clone());
        let coordinator = Arc::new(Coordinator::new(ingestor, Arc::clone(&metrics), config.auto_download.clone()));

        let state = Arc::new(Self {
            db,
            storage,
            cache,
            coordinator,
            job_engine: Arc::clone(&job_engine),
            metrics,
            config,
        });

        Ok((state, job_engine))
    }
}
