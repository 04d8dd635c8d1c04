use std::collections::HashMap;

use parking_lot::Mutex;

/// Bounded hash set with TTL ("a bounded hash set with TTL; inserts
/// and lookups under one lock"). Keyed by `String` so the same structure
/// serves both the live opportunity-id dedup and the
/// restart-time seeding from pending stream message ids.
pub struct DuplicateWindow {
    window_millis: u64,
    seen:          Mutex<HashMap<String, u64>>
}

impl DuplicateWindow {
    pub fn new(window_millis: u64) -> Self {
        Self { window_millis, seen: Mutex::new(HashMap::new()) }
    }

    /// Returns `true` if `key` was already seen within the window (a
    /// duplicate — caller should drop it), else records it as seen now.
    pub fn check_and_insert(&self, key: String, now_millis: u64) -> bool {
        let mut seen = self.seen.lock();
        seen.retain(|_, first_seen| now_millis.saturating_sub(*first_seen) < self.window_millis);

        if let Some(&first_seen) = seen.get(&key) {
            if now_millis.saturating_sub(first_seen) < self.window_millis {
                return true;
            }
        }
        seen.insert(key, now_millis);
        false
    }

    /// Seeds a key as seen without running the duplicate check — used at
    /// bootstrap to rehydrate from `pending()` before consuming new
    /// messages.
    pub fn seed(&self, key: String, now_millis: u64) {
        self.seen.lock().insert(key, now_millis);
    }

    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Hex-encodes a 32-byte opportunity id for use as a [`DuplicateWindow`] key.
pub fn id_key(id: [u8; 32]) -> String {
    id.iter().map(|b| format!("{b:02x}")).collect()
}
