//! TTL-keyed response cache with single-flight de-duplication.

use filings_core::Result;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, instrument, warn};

type Erased = Arc<dyn Any + Send + Sync>;

/// Cache entry with timestamp for TTL-based expiry.
#[derive(Debug)]
struct CacheEntry {
    value: Erased,
    stored_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(value: Erased, ttl: Duration) -> Self {
        Self {
            value,
            stored_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.stored_at.elapsed() >= self.ttl
    }
}

/// Per-key slot. Holding its lock is what makes a producer call single-flight.
type Slot = Arc<Mutex<Option<CacheEntry>>>;

/// Memoizes the results of fallible async producers for a per-call TTL.
///
/// - At most one producer runs per key at a time; concurrent callers for the
///   same key wait for it and then read its stored result.
/// - Errors are never stored, so a transient failure does not poison the key.
/// - An entry read at or after `stored_at + ttl` is a miss and is dropped.
///
/// Values of any `Clone + Send + Sync + 'static` type can be cached; wrap large
/// documents in `Arc` to make hits cheap.
#[derive(Debug, Default)]
pub struct ResponseCache {
    slots: RwLock<HashMap<String, Slot>>,
}

impl ResponseCache {
    /// Create a new empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn slot(&self, key: &str) -> Slot {
        if let Some(slot) = self.slots.read().await.get(key) {
            return Arc::clone(slot);
        }
        let mut slots = self.slots.write().await;
        Arc::clone(slots.entry(key.to_string()).or_default())
    }

    /// Returns the cached value for `key`, or runs `producer` and caches its
    /// successful result for `ttl`.
    ///
    /// # Errors
    /// Returns whatever `producer` returns; the error is not cached.
    #[instrument(skip(self, producer), fields(ttl_secs = ttl.as_secs()))]
    pub async fn get_or_fetch<T, F, Fut>(&self, key: &str, ttl: Duration, producer: F) -> Result<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let slot = self.slot(key).await;
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref() {
            if cached.is_expired() {
                debug!("Cache entry expired");
                *entry = None;
            } else if let Some(value) = cached.value.downcast_ref::<T>() {
                debug!("Cache hit");
                return Ok(value.clone());
            } else {
                warn!("Cached value has a different type, refetching");
            }
        }

        debug!("Cache miss");
        let value = producer().await?;
        *entry = Some(CacheEntry::new(Arc::new(value.clone()), ttl));
        Ok(value)
    }

    /// Drops the value stored for `key`. Returns true if a live entry was
    /// dropped.
    ///
    /// The slot stays in place, so a producer running for `key` finishes first
    /// and its result is the one dropped; later callers queue behind it.
    pub async fn invalidate(&self, key: &str) -> bool {
        let Some(slot) = self.slots.read().await.get(key).map(Arc::clone) else {
            return false;
        };
        let mut entry = slot.lock().await;
        entry.take().is_some_and(|e| !e.is_expired())
    }

    /// Drops every expired entry.
    ///
    /// Expired entries are already ignored on read; this only reclaims memory.
    /// Slots whose producer is currently running are skipped.
    ///
    /// Returns the number of entries removed.
    #[instrument(skip(self))]
    pub async fn invalidate_stale(&self) -> usize {
        let mut slots = self.slots.write().await;
        let before = slots.len();
        slots.retain(|_, slot| match slot.try_lock() {
            Ok(entry) => entry.as_ref().is_some_and(|e| !e.is_expired()),
            Err(_) => true,
        });
        let removed = before - slots.len();
        if removed > 0 {
            debug!("Invalidated {} stale cache entries", removed);
        }
        removed
    }

    /// Number of live (unexpired) entries. Keys whose producer is still
    /// running are not counted.
    pub async fn len(&self) -> usize {
        self.slots
            .read()
            .await
            .values()
            .filter(|slot| {
                slot.try_lock()
                    .is_ok_and(|entry| entry.as_ref().is_some_and(|e| !e.is_expired()))
            })
            .count()
    }

    /// Returns true if no live entry is cached.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Clears all cached data.
    #[instrument(skip(self))]
    pub async fn clear(&self) {
        self.slots.write().await.clear();
        debug!("Cleared all cache entries");
    }
}
