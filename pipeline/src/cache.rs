//! Query-keyed caches shared by every connection.
//!
//! Backed by [`moka`], which evicts expired entries and enforces the capacity
//! bound on its own, so keys derived from free-form user input cannot pile up.

use std::time::Duration;

use moka::sync::Cache;

/// String-keyed cache whose entries expire a fixed time after insertion.
///
/// A zero TTL disables caching altogether.
#[derive(Debug, Clone)]
pub struct TtlCache<V: Clone + Send + Sync + 'static> {
    inner: Option<Cache<String, V>>,
}

impl<V: Clone + Send + Sync + 'static> TtlCache<V> {
    pub fn new(ttl: Duration, max_entries: u64) -> Self {
        let inner = (!ttl.is_zero()).then(|| {
            Cache::builder()
                .max_capacity(max_entries)
                .time_to_live(ttl)
                .build()
        });
        Self { inner }
    }

    pub fn with_ttl_secs(secs: u64, max_entries: u64) -> Self {
        Self::new(Duration::from_secs(secs), max_entries)
    }

    pub fn get(&self, key: &str) -> Option<V> {
        self.inner.as_ref()?.get(key)
    }

    pub fn set(&self, key: impl Into<String>, value: V) {
        if let Some(cache) = &self.inner {
            cache.insert(key.into(), value);
        }
    }

    /// Live entries, after flushing evictions moka has queued.
    pub fn entry_count(&self) -> u64 {
        match &self.inner {
            Some(cache) => {
                cache.run_pending_tasks();
                cache.entry_count()
            }
            None => 0,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }
}
