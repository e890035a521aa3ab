//! Two-tier read-through cache (spec §4.3) for small serialized responses —
//! version listings and download-info documents. Never caches blobs or
//! error responses.

mod l1;
mod l2;
mod noop;

use std::time::Duration;

use crate::config::CacheConfig;
use crate::Result;

#[derive(Debug, Clone)]
pub struct CachedValue {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Where a hit was served from, reported as `X-Cache` by the protocol layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

enum Inner {
    TwoTier { l1: l1::L1Cache, l2: l2::L2Cache },
    Noop(noop::NoopCache),
}

/// Read-through cache handle shared across the protocol layer.
pub struct Cache {
    inner: Inner,
}

impl Cache {
    pub fn from_config(config: &CacheConfig) -> Result<Self> {
        if config.ttl_seconds == 0 {
            return Ok(Self { inner: Inner::Noop(noop::NoopCache) });
        }

        let l1 = l1::L1Cache::new(config.memory_size_mb.as_u64());
        let l2 = l2::L2Cache::open(&config.disk_path, config.disk_size_gb.as_u64())?;
        Ok(Self { inner: Inner::TwoTier { l1, l2 } })
    }

    pub fn noop() -> Self {
        Self { inner: Inner::Noop(noop::NoopCache) }
    }

    /// L1 first, then L2; an L2 hit promotes the value into L1. Expired
    /// entries are treated as misses and removed lazily.
    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        match &self.inner {
            Inner::Noop(cache) => cache.get(key),
            Inner::TwoTier { l1, l2 } => {
                if let Some(value) = l1.get(key).await {
                    return Some(value);
                }
                let value = l2.get(key).await?;
                l1.set(key, value.clone(), l2.default_ttl()).await;
                Some(value)
            }
        }
    }

    /// Write-through: populate both tiers. L2 population is best-effort — a
    /// failure there doesn't fail the write.
    pub async fn set(&self, key: &str, value: CachedValue, ttl: Duration) {
        match &self.inner {
            Inner::Noop(_) => {}
            Inner::TwoTier { l1, l2 } => {
                l1.set(key, value.clone(), ttl).await;
                if let Err(err) = l2.set(key, value, ttl).await {
                    tracing::warn!(key, error = %err, "best-effort L2 cache write failed");
                }
            }
        }
    }

    /// Remove expired L2 entries; intended to be driven by a periodic
    /// `tokio::time::interval` sweep task.
    pub async fn sweep_expired(&self) {
        if let Inner::TwoTier { l2, .. } = &self.inner {
            l2.sweep_expired().await;
        }
    }
}
