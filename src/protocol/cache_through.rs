//! The cache -> Metadata Store -> Auto-Download Coordinator read-through
//! pipeline shared by the provider and module endpoints.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStatus, CachedValue};
use crate::state::AppState;
use crate::Result;

/// Looks `key` up in the two-tier cache; on a miss, runs `compute` and
/// writes the result back with `ttl`. `compute` is only invoked on a miss,
/// so it should itself consult the Metadata Store / Auto-Download
/// Coordinator and return the bytes to serve.
pub async fn fetch_or_compute<F, Fut>(
    state: &Arc<AppState>,
    key: &str,
    content_type: &str,
    compute: F,
) -> Result<(CacheStatus, Vec<u8>)>
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<u8>>>,
{
    if let Some(cached) = state.cache.get(key).await {
        state.metrics.cache_hit();
        return Ok((CacheStatus::Hit, cached.bytes));
    }

    state.metrics.cache_miss();
    let bytes = compute().await?;

    let ttl = Duration::from_secs(state.config.cache.ttl_seconds);
    state
        .cache
        .set(key, CachedValue { bytes: bytes.clone(), content_type: content_type.to_string() }, ttl)
        .await;

    Ok((CacheStatus::Miss, bytes))
}

/// Presigned-URL TTL always exceeds the cache TTL for the document that
/// embeds it, by a safety margin of at least 5 minutes (spec §5), so a
/// cached download-info document never outlives the signature it names.
const PRESIGN_SAFETY_MARGIN: Duration = Duration::from_secs(5 * 60);

pub fn presign_ttl(state: &Arc<AppState>) -> Duration {
    let cache_ttl = Duration::from_secs(state.config.cache.ttl_seconds);
    cache_ttl + PRESIGN_SAFETY_MARGIN
}
