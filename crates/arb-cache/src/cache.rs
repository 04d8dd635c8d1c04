use std::{sync::Arc, time::Duration};

use arb_metrics::CacheMetrics;
use parking_lot::Mutex;
use tracing::warn;

use crate::{l2::DistributedStore, lru::LruCache};

#[derive(Debug, Clone, Copy)]
pub struct CacheConfig {
    pub l1_capacity:        usize,
    pub l3_enabled:         bool,
    pub l2_deadline_millis: u64
}

/// Three-level key -> blob store. L1 is synchronous and
/// allocation-free on the hot path; L2 (and optional L3) are asynchronous
/// and only ever reached through `get`/`set`, never from the warmer (C7),
/// which is restricted to L2 -> L1 promotion via `get_from_l1`/`set_in_l1`.
pub struct HierarchicalCache {
    l1:      Mutex<LruCache>,
    l2:      Option<Arc<dyn DistributedStore>>,
    l3:      Option<Arc<dyn DistributedStore>>,
    config:  CacheConfig,
    metrics: CacheMetrics
}

impl HierarchicalCache {
    pub fn new(config: CacheConfig, l2: Option<Arc<dyn DistributedStore>>, l3: Option<Arc<dyn DistributedStore>>) -> Self {
        let l3 = if config.l3_enabled { l3 } else { None };
        Self { l1: Mutex::new(LruCache::new(config.l1_capacity)), l2, l3, config, metrics: CacheMetrics::default() }
    }

    /// `getFromL1(key) -> Option<Value>`. Direct accessor for the warmer;
    /// never touches L2.
    pub fn get_from_l1(&self, key: &str) -> Option<Vec<u8>> {
        let mut l1 = self.l1.lock();
        let hit = l1.get(key);
        if hit.is_some() {
            self.metrics.l1_hit();
        } else {
            self.metrics.l1_miss();
        }
        hit
    }

    /// `setInL1(key, value)`. Direct accessor for the warmer — an L2 -> L1
    /// promotion only, never a new L2 write.
    pub fn set_in_l1(&self, key: &str, value: Vec<u8>) {
        self.l1.lock().put(key.to_string(), value);
    }

    /// `get(key) -> Option<Value>`: probes L1, then L2 with promote-on-hit.
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        if let Some(hit) = self.get_from_l1(key) {
            return Some(hit);
        }

        let Some(l2) = &self.l2 else { return None };
        let deadline = Duration::from_millis(self.config.l2_deadline_millis);
        let result = tokio::time::timeout(deadline, l2.get(key)).await;

        match result {
            Ok(Ok(Some(value))) => {
                self.metrics.l2_hit();
                self.set_in_l1(key, value.clone());
                Some(value)
            }
            Ok(Ok(None)) => {
                self.metrics.l2_miss();
                None
            }
            Ok(Err(err)) => {
                warn!(key, error = %err, "L2 get failed");
                self.metrics.l2_error("get");
                None
            }
            Err(_) => {
                warn!(key, "L2 get timed out");
                self.metrics.l2_error("get_timeout");
                None
            }
        }
    }

    /// `set(key, value, ttl?)`: writes L1 synchronously; L2/L3 writes are
    /// fire-and-forget and never block the caller or propagate errors.
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        self.l1.lock().put(key.to_string(), value.clone());

        for store in [&self.l2, &self.l3].into_iter().flatten() {
            let store = store.clone();
            let key = key.to_string();
            let value = value.clone();
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                if let Err(err) = store.set(&key, value, ttl).await {
                    warn!(key, error = %err, "L2/L3 set failed");
                    metrics.l2_error("set");
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    struct FlakyStore {
        fail_gets: bool,
        calls:     AtomicUsize
    }

    #[async_trait::async_trait]
    impl DistributedStore for FlakyStore {
        async fn get(&self, _key: &str) -> eyre::Result<Option<Vec<u8>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_gets { Err(eyre::eyre!("boom")) } else { Ok(Some(vec![42])) }
        }

        async fn set(&self, _key: &str, _value: Vec<u8>, _ttl: Option<Duration>) -> eyre::Result<()> {
            Ok(())
        }
    }

    fn config() -> CacheConfig {
        CacheConfig { l1_capacity: 16, l3_enabled: false, l2_deadline_millis: 200 }
    }

    #[tokio::test]
    async fn l1_hit_never_touches_l2() {
        let store = Arc::new(FlakyStore { fail_gets: true, calls: AtomicUsize::new(0) });
        let cache = HierarchicalCache::new(config(), Some(store.clone()), None);
        cache.set_in_l1("k", vec![1]);

        assert_eq!(cache.get("k").await, Some(vec![1]));
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn l2_hit_promotes_into_l1() {
        let store = Arc::new(FlakyStore { fail_gets: false, calls: AtomicUsize::new(0) });
        let cache = HierarchicalCache::new(config(), Some(store), None);

        assert_eq!(cache.get("k").await, Some(vec![42]));
        assert_eq!(cache.get_from_l1("k"), Some(vec![42]));
    }

    #[tokio::test]
    async fn l2_error_yields_miss_not_panic() {
        let store = Arc::new(FlakyStore { fail_gets: true, calls: AtomicUsize::new(0) });
        let cache = HierarchicalCache::new(config(), Some(store), None);
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn no_l2_configured_is_a_clean_miss() {
        let cache = HierarchicalCache::new(config(), None, None);
        assert_eq!(cache.get("k").await, None);
    }
}
