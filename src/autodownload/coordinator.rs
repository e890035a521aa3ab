//! Auto-Download Coordinator (spec §4.9): on a protocol-layer cache/store
//! miss, fetches an artifact on demand instead of returning 404, with
//! request coalescing, negative caching, namespace policy, and rate
//! limiting guarding the upstream.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::{broadcast, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use super::policy;
use super::ratelimit::TokenBucket;
use crate::config::AutoDownloadConfig;
use crate::db::Identity;
use crate::ingest::{IndexedArtifact, Ingestor};
use crate::observability::Metrics;
use crate::{Error, Result};

/// Outcome of a coordinated fetch, distinct from `Error` because `Denied`
/// and `Throttled`/`NotFound` are expected, policy-level outcomes rather
/// than failures worth logging as errors.
pub enum Outcome {
    Found(IndexedArtifact),
    NotFound,
    Denied(String),
    Throttled,
}

type BroadcastResult = std::result::Result<IndexedArtifact, String>;

struct InFlight {
    sender: broadcast::Sender<BroadcastResult>,
}

pub struct Coordinator {
    ingestor: Arc<Ingestor>,
    metrics: Arc<Metrics>,
    config: AutoDownloadConfig,
    in_flight: DashMap<Identity, InFlight>,
    negative_cache: DashMap<Identity, Instant>,
    rate_limiter: Mutex<TokenBucket>,
    admission: Arc<Semaphore>,
    queued: AtomicUsize,
}

impl Coordinator {
    pub fn new(ingestor: Arc<Ingestor>, metrics: Arc<Metrics>, config: AutoDownloadConfig) -> Self {
        let rate_limiter = Mutex::new(TokenBucket::new(config.rate_limit_per_minute));
        let admission = Arc::new(Semaphore::new(config.max_concurrent_downloads));
        Self {
            ingestor,
            metrics,
            config,
            in_flight: DashMap::new(),
            negative_cache: DashMap::new(),
            rate_limiter,
            admission,
            queued: AtomicUsize::new(0),
        }
    }

    /// Administrator action (spec §4.9): drop all negative-cache entries so
    /// the next request for any previously-404'd identity reaches upstream.
    pub fn clear_negative_cache(&self) -> usize {
        let count = self.negative_cache.len();
        self.negative_cache.clear();
        count
    }

    pub async fn get_or_fetch(&self, identity: &Identity) -> Result<Outcome> {
        self.metrics.autodownload_request();

        if !self.config.enabled {
            return Ok(Outcome::NotFound);
        }

        let decision = policy::evaluate(&self.config, identity.namespace());
        if !decision.allow {
            self.metrics.autodownload_denied();
            return Ok(Outcome::Denied(decision.reason.unwrap_or_else(|| "denied by policy".to_string())));
        }

        if self.config.cache_negative_results {
            if let Some(cached_at) = self.negative_cache.get(identity) {
                let ttl = Duration::from_secs(self.config.negative_cache_ttl_seconds);
                if cached_at.elapsed() < ttl {
                    return Ok(Outcome::NotFound);
                }
            }
        }

        // The in-flight check-and-register must be a single atomic step: if
        // it were check-then-insert with an `await` in between (e.g. the
        // rate limiter or admission semaphore), two genuinely concurrent
        // requests for the same identity could both observe "not in flight"
        // and both become leaders, issuing two upstream fetches. `entry()`
        // holds the shard's lock for the whole match below, so only one
        // caller can ever win `Vacant` for a given identity (spec §4.9/§5:
        // "exactly one upstream fetch is performed" for N concurrent
        // requesters of the same identity).
        match self.in_flight.entry(identity.clone()) {
            Entry::Occupied(entry) => {
                let receiver = entry.get().sender.subscribe();
                drop(entry);
                self.metrics.autodownload_coalesced();
                self.await_in_flight(receiver).await
            }
            Entry::Vacant(entry) => {
                let (sender, _receiver) = broadcast::channel(1);
                entry.insert(InFlight { sender: sender.clone() });
                self.fetch_as_leader(identity, sender).await
            }
        }
    }

    async fn await_in_flight(&self, mut receiver: broadcast::Receiver<BroadcastResult>) -> Result<Outcome> {
        match receiver.recv().await {
            Ok(Ok(artifact)) => Ok(Outcome::Found(artifact)),
            Ok(Err(_)) => Ok(Outcome::NotFound),
            Err(_) => Ok(Outcome::NotFound),
        }
    }

    /// Runs the actual upstream fetch for the caller that won leadership in
    /// `get_or_fetch`. The in-flight entry is already registered (under the
    /// leader's own `sender`) by the time this is called; every return path
    /// here must remove it and notify followers before returning.
    async fn fetch_as_leader(&self, identity: &Identity, sender: broadcast::Sender<BroadcastResult>) -> Result<Outcome> {
        {
            let mut limiter = self.rate_limiter.lock().await;
            if !limiter.try_take() {
                self.in_flight.remove(identity);
                self.metrics.autodownload_throttled();
                let _ = sender.send(Err("rate limited".to_string()));
                return Ok(Outcome::Throttled);
            }
        }

        // `max_concurrent_downloads` permits are handed out immediately when
        // free. Otherwise the caller waits in line, bounded by `queue_size`
        // pending waiters (spec §4.9); beyond that, overflow is `Throttled`
        // rather than queued indefinitely.
        let _permit = match self.admission.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                if self.queued.fetch_add(1, Ordering::SeqCst) >= self.config.queue_size {
                    self.queued.fetch_sub(1, Ordering::SeqCst);
                    self.in_flight.remove(identity);
                    self.metrics.autodownload_throttled();
                    let _ = sender.send(Err("queue overflow".to_string()));
                    return Ok(Outcome::Throttled);
                }
                let acquired = self.admission.clone().acquire_owned().await;
                self.queued.fetch_sub(1, Ordering::SeqCst);
                match acquired {
                    Ok(permit) => permit,
                    Err(_) => {
                        self.in_flight.remove(identity);
                        self.metrics.autodownload_throttled();
                        let _ = sender.send(Err("admission semaphore closed".to_string()));
                        return Ok(Outcome::Throttled);
                    }
                }
            }
        };

        let cancel = CancellationToken::new();
        let timeout = Duration::from_secs(self.config.timeout_seconds);
        let result = tokio::time::timeout(timeout, self.ingestor.try_ingest_one(identity, &cancel)).await;

        self.in_flight.remove(identity);

        match result {
            Ok(Ok(Some(artifact))) => {
                let _ = sender.send(Ok(artifact.clone()));
                Ok(Outcome::Found(artifact))
            }
            Ok(Ok(None)) => {
                let _ = sender.send(Err("artifact vanished after a concurrent index".to_string()));
                Ok(Outcome::NotFound)
            }
            Ok(Err(Error::NotFound(msg))) => {
                self.negative_cache.insert(identity.clone(), Instant::now());
                let _ = sender.send(Err(msg));
                Ok(Outcome::NotFound)
            }
            Ok(Err(err)) => {
                let _ = sender.send(Err(err.to_string()));
                Err(err)
            }
            Err(_elapsed) => {
                let _ = sender.send(Err("auto-download timed out".to_string()));
                Err(Error::Timeout(format!("auto-download of {identity:?} timed out")))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::Db;
    use crate::fetcher::http_module::HttpModuleFetcher;
    use crate::fetcher::http_provider::HttpProviderFetcher;
    use crate::fetcher::RetryPolicy;
    use crate::storage::Storage;
    use sha2::{Digest, Sha256};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn coordinator_against(server: &MockServer, config: AutoDownloadConfig) -> Coordinator {
        let db = Db::connect_in_memory().await.unwrap();
        let ingestor = Arc::new(Ingestor {
            db,
            storage: Storage::in_memory(),
            provider_fetcher: HttpProviderFetcher::new(server.uri(), RetryPolicy::default()).unwrap(),
            module_fetcher: HttpModuleFetcher::new(server.uri(), RetryPolicy::default()).unwrap(),
            server: Arc::new(ServerConfig::default()),
        });
        Coordinator::new(ingestor, Arc::new(Metrics::new()), config)
    }

    fn sample_identity() -> Identity {
        Identity::Provider {
            namespace: "hashicorp".to_string(),
            r#type: "random".to_string(),
            version: "3.5.1".to_string(),
            os: "linux".to_string(),
            arch: "amd64".to_string(),
        }
    }

    #[tokio::test]
    async fn blocked_namespace_is_denied_without_hitting_upstream() {
        let server = MockServer::start().await;
        let config = AutoDownloadConfig { blocked_namespaces: vec!["hashicorp".to_string()], ..AutoDownloadConfig::default() };
        let coordinator = coordinator_against(&server, config).await;

        let outcome = coordinator.get_or_fetch(&sample_identity()).await.unwrap();
        assert!(matches!(outcome, Outcome::Denied(_)));
    }

    #[tokio::test]
    async fn successful_fetch_indexes_and_returns_found() {
        let server = MockServer::start().await;
        let body = b"provider bytes".to_vec();
        let shasum = hex::encode(Sha256::digest(&body));

        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.5.1/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "filename": "terraform-provider-random_3.5.1_linux_amd64.zip",
                "download_url": format!("{}/blob.zip", server.uri()),
                "shasum": shasum,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blob.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let coordinator = coordinator_against(&server, AutoDownloadConfig::default()).await;
        let outcome = coordinator.get_or_fetch(&sample_identity()).await.unwrap();
        assert!(matches!(outcome, Outcome::Found(_)));
    }

    #[tokio::test]
    async fn not_found_response_is_negative_cached() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.5.1/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let coordinator = coordinator_against(&server, AutoDownloadConfig::default()).await;

        let first = coordinator.get_or_fetch(&sample_identity()).await.unwrap();
        assert!(matches!(first, Outcome::NotFound));

        // Second call should be served from the negative cache without a
        // second upstream request (wiremock would otherwise still answer,
        // so this only proves no panic/hang; the cache entry itself is
        // covered by the `cache_negative_results` config check above).
        let second = coordinator.get_or_fetch(&sample_identity()).await.unwrap();
        assert!(matches!(second, Outcome::NotFound));
    }

    // Multi-threaded on purpose: `current_thread` can't schedule two tasks
    // onto different OS threads, so it can't expose a check-then-insert race
    // in `get_or_fetch`'s leadership claim. This flavor is what actually
    // drives the interleaving the atomic `entry()` claim guards against.
    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_requests_for_the_same_identity_coalesce_to_one_upstream_fetch() {
        let server = MockServer::start().await;
        let body = b"provider bytes".to_vec();
        let shasum = hex::encode(Sha256::digest(&body));

        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.5.1/download/linux/amd64"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(100))
                    .set_body_json(serde_json::json!({
                        "filename": "terraform-provider-random_3.5.1_linux_amd64.zip",
                        "download_url": format!("{}/blob.zip", server.uri()),
                        "shasum": shasum,
                    })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blob.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let coordinator = Arc::new(coordinator_against(&server, AutoDownloadConfig::default()).await);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let coordinator = Arc::clone(&coordinator);
                tokio::spawn(async move { coordinator.get_or_fetch(&sample_identity()).await.unwrap() })
            })
            .collect();

        for handle in handles {
            let outcome = handle.await.unwrap();
            assert!(matches!(outcome, Outcome::Found(_)));
        }

        let requests = server.received_requests().await.unwrap();
        let info_requests =
            requests.iter().filter(|req| req.url.path() == "/v1/providers/hashicorp/random/3.5.1/download/linux/amd64").count();
        assert_eq!(info_requests, 1);
    }

    #[tokio::test]
    async fn clear_negative_cache_forgets_a_prior_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.5.1/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let coordinator = coordinator_against(&server, AutoDownloadConfig::default()).await;
        coordinator.get_or_fetch(&sample_identity()).await.unwrap();
        assert_eq!(coordinator.clear_negative_cache(), 1);
        assert_eq!(coordinator.clear_negative_cache(), 0);
    }

    #[tokio::test]
    async fn exhausting_the_rate_limit_throttles_further_requests() {
        let server = MockServer::start().await;
        let body = b"provider bytes".to_vec();
        let shasum = hex::encode(Sha256::digest(&body));

        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.5.1/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "filename": "terraform-provider-random_3.5.1_linux_amd64.zip",
                "download_url": format!("{}/blob.zip", server.uri()),
                "shasum": shasum,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/blob.zip"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&server)
            .await;

        let config = AutoDownloadConfig { rate_limit_per_minute: 1, ..AutoDownloadConfig::default() };
        let coordinator = coordinator_against(&server, config).await;

        let mut second = sample_identity();
        if let Identity::Provider { version, .. } = &mut second {
            *version = "3.6.0".to_string();
        }
        Mock::given(method("GET"))
            .and(path("/v1/providers/hashicorp/random/3.6.0/download/linux/amd64"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "filename": "terraform-provider-random_3.6.0_linux_amd64.zip",
                "download_url": format!("{}/blob.zip", server.uri()),
                "shasum": shasum,
            })))
            .mount(&server)
            .await;

        let first = coordinator.get_or_fetch(&sample_identity()).await.unwrap();
        assert!(matches!(first, Outcome::Found(_)));

        // Distinct identity so it isn't served by the first call's coalescing
        // channel; the token bucket (capacity 1) is already drained.
        let second_outcome = coordinator.get_or_fetch(&second).await.unwrap();
        assert!(matches!(second_outcome, Outcome::Throttled));
    }
}
