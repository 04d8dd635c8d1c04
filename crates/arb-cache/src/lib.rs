//! Hierarchical Cache (C5): synchronous allocation-free L1 LRU, async L2
//! distributed KV with promote-on-hit, and an optional disabled-by-default
//! L3.

pub mod cache;
pub mod l2;
pub mod lru;

pub use cache::{CacheConfig, HierarchicalCache};
pub use l2::{DistributedStore, RedisStore};
pub use lru::LruCache;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils {
    use std::time::Duration;

    use parking_lot::Mutex;
    use std::collections::HashMap;

    use crate::l2::DistributedStore;

    /// In-memory [`DistributedStore`] double for tests.
    #[derive(Default)]
    pub struct InMemoryStore {
        data: Mutex<HashMap<String, Vec<u8>>>
    }

    #[async_trait::async_trait]
    impl DistributedStore for InMemoryStore {
        async fn get(&self, key: &str) -> eyre::Result<Option<Vec<u8>>> {
            Ok(self.data.lock().get(key).cloned())
        }

        async fn set(&self, key: &str, value: Vec<u8>, _ttl: Option<Duration>) -> eyre::Result<()> {
            self.data.lock().insert(key.to_string(), value);
            Ok(())
        }
    }
}
