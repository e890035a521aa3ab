use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::CachedValue;

struct Entry {
    value: CachedValue,
    expires_at: Instant,
}

fn entry_size(entry: &Entry) -> u64 {
    entry.value.bytes.len() as u64 + entry.value.content_type.len() as u64
}

/// In-memory LRU tier bounded by total byte size rather than entry count —
/// the cache holds a variable-size mix of small documents, so an
/// entry-count bound would under- or over-commit memory depending on
/// payload shape.
pub struct L1Cache {
    entries: Mutex<LruCache<String, Entry>>,
    max_bytes: u64,
    current_bytes: Mutex<u64>,
}

impl L1Cache {
    pub fn new(max_bytes: u64) -> Self {
        Self {
            // Unbounded entry count; byte budget is enforced on insert.
            entries: Mutex::new(LruCache::new(NonZeroUsize::new(usize::MAX).unwrap())),
            max_bytes,
            current_bytes: Mutex::new(0),
        }
    }

    pub async fn get(&self, key: &str) -> Option<CachedValue> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => Some(entry.value.clone()),
            Some(_) => {
                if let Some(stale) = entries.pop(key) {
                    drop(entries);
                    let mut current = self.current_bytes.lock().await;
                    *current = current.saturating_sub(entry_size(&stale));
                }
                None
            }
            None => None,
        }
    }

    pub async fn set(&self, key: &str, value: CachedValue, ttl: Duration) {
        let entry = Entry { value, expires_at: Instant::now() + ttl };
        let size = entry_size(&entry);

        let mut entries = self.entries.lock().await;
        let mut current = self.current_bytes.lock().await;

        if let Some(old) = entries.put(key.to_string(), entry) {
            *current = current.saturating_sub(entry_size(&old));
        }
        *current += size;

        while *current > self.max_bytes {
            match entries.pop_lru() {
                Some((_, evicted)) => *current = current.saturating_sub(entry_size(&evicted)),
                None => break,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn respects_byte_budget() {
        let cache = L1Cache::new(100);
        let big = CachedValue { bytes: vec![0u8; 80], content_type: "t".to_string() };
        cache.set("a", big, Duration::from_secs(60)).await;

        let big2 = CachedValue { bytes: vec![0u8; 80], content_type: "t".to_string() };
        cache.set("b", big2, Duration::from_secs(60)).await;

        // "a" should have been evicted to keep total under budget.
        assert!(cache.get("a").await.is_none());
        assert!(cache.get("b").await.is_some());
    }

    #[tokio::test]
    async fn expired_entries_are_misses() {
        let cache = L1Cache::new(1024);
        let value = CachedValue { bytes: b"x".to_vec(), content_type: "t".to_string() };
        cache.set("k", value, Duration::from_millis(1)).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(cache.get("k").await.is_none());
    }
}
