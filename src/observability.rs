//! Observability stubs (metrics, tracing)

use std::sync::atomic::{AtomicU64, Ordering};

/// Metrics handle for recording counters/gauges
#[derive(Debug, Default)]
pub struct Metrics {
    jobs_accepted: AtomicU64,
    jobs_failed: AtomicU64,
    tasks_published: AtomicU64,
    jobs_completed: AtomicU64,
    items_succeeded: AtomicU64,
    items_failed: AtomicU64,
    items_reclaimed: AtomicU64,
    autodownload_requests: AtomicU64,
    autodownload_coalesced: AtomicU64,
    autodownload_denied: AtomicU64,
    autodownload_throttled: AtomicU64,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn job_accepted(&self) {
        self.jobs_accepted.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_accepted", "Metric incremented");
    }

    pub fn job_failed(&self) {
        self.jobs_failed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_failed", "Metric incremented");
    }

    pub fn job_completed(&self) {
        self.jobs_completed.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "jobs_completed", "Metric incremented");
    }

    pub fn task_published(&self) {
        self.tasks_published.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(counter = "tasks_published", "Metric incremented");
    }

    pub fn item_succeeded(&self) {
        self.items_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn item_failed(&self) {
        self.items_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn items_reclaimed(&self, count: u64) {
        if count > 0 {
            self.items_reclaimed.fetch_add(count, Ordering::Relaxed);
            tracing::debug!(counter = "items_reclaimed", count, "Metric incremented");
        }
    }

    pub fn autodownload_request(&self) {
        self.autodownload_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn autodownload_coalesced(&self) {
        self.autodownload_coalesced.fetch_add(1, Ordering::Relaxed);
    }

    pub fn autodownload_denied(&self) {
        self.autodownload_denied.fetch_add(1, Ordering::Relaxed);
    }

    pub fn autodownload_throttled(&self) {
        self.autodownload_throttled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            jobs_accepted: self.jobs_accepted.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            tasks_published: self.tasks_published.load(Ordering::Relaxed),
            items_succeeded: self.items_succeeded.load(Ordering::Relaxed),
            items_failed: self.items_failed.load(Ordering::Relaxed),
            items_reclaimed: self.items_reclaimed.load(Ordering::Relaxed),
            autodownload_requests: self.autodownload_requests.load(Ordering::Relaxed),
            autodownload_coalesced: self.autodownload_coalesced.load(Ordering::Relaxed),
            autodownload_denied: self.autodownload_denied.load(Ordering::Relaxed),
            autodownload_throttled: self.autodownload_throttled.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub jobs_accepted: u64,
    pub jobs_failed: u64,
    pub jobs_completed: u64,
    pub tasks_published: u64,
    pub items_succeeded: u64,
    pub items_failed: u64,
    pub items_reclaimed: u64,
    pub autodownload_requests: u64,
    pub autodownload_coalesced: u64,
    pub autodownload_denied: u64,
    pub autodownload_throttled: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counters() {
        let metrics = Metrics::new();
        metrics.job_accepted();
        metrics.item_succeeded();
        metrics.item_succeeded();
        metrics.autodownload_coalesced();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.jobs_accepted, 1);
        assert_eq!(snapshot.items_succeeded, 2);
        assert_eq!(snapshot.autodownload_coalesced, 1);
    }
}
