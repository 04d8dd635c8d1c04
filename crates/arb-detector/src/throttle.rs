use std::collections::HashMap;

use arb_types::PoolId;
use parking_lot::Mutex;

/// Tracks per-pool update rate and the last time each scan kind ran, so
/// triangular/multi-leg scans stay off the hot path except for "hot pairs"
///.
pub struct ScanThrottle {
    min_interval_millis: HashMap<ScanKind, u64>,
    hot_pair_threshold_updates_per_sec: f64,
    state: Mutex<HashMap<ScanKind, u64>>,
    rate: Mutex<HashMap<PoolId, RateWindow>>
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScanKind {
    Triangular,
    MultiLeg
}

struct RateWindow {
    window_start_millis: u64,
    count:               u32
}

impl ScanThrottle {
    pub fn new(hot_pair_threshold_updates_per_sec: f64) -> Self {
        let mut min_interval_millis = HashMap::new();
        min_interval_millis.insert(ScanKind::Triangular, 500);
        min_interval_millis.insert(ScanKind::MultiLeg, 2_000);
        Self {
            min_interval_millis,
            hot_pair_threshold_updates_per_sec,
            state: Mutex::new(HashMap::new()),
            rate: Mutex::new(HashMap::new())
        }
    }

    /// Records one update for `pool`, returning whether it currently
    /// qualifies as a "hot pair" bypassing the throttle.
    pub fn record_update_and_is_hot(&self, pool: PoolId, now_millis: u64) -> bool {
        let mut rate = self.rate.lock();
        let window = rate.entry(pool).or_insert(RateWindow { window_start_millis: now_millis, count: 0 });
        if now_millis.saturating_sub(window.window_start_millis) > 1_000 {
            window.window_start_millis = now_millis;
            window.count = 0;
        }
        window.count += 1;
        (window.count as f64) > self.hot_pair_threshold_updates_per_sec
    }

    /// Returns `true` if `kind` may run now, updating the last-run timestamp
    /// if so. `is_hot` bypasses the minimum interval entirely.
    pub fn try_acquire(&self, kind: ScanKind, now_millis: u64, is_hot: bool) -> bool {
        if is_hot {
            let mut state = self.state.lock();
            state.insert(kind, now_millis);
            return true;
        }
        let mut state = self.state.lock();
        let last = state.get(&kind).copied().unwrap_or(0);
        let min_interval = self.min_interval_millis[&kind];
        if now_millis.saturating_sub(last) >= min_interval {
            state.insert(kind, now_millis);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    #[test]
    fn throttle_blocks_within_interval_and_opens_after() {
        let throttle = ScanThrottle::new(1000.0);
        assert!(throttle.try_acquire(ScanKind::Triangular, 0, false));
        assert!(!throttle.try_acquire(ScanKind::Triangular, 100, false));
        assert!(throttle.try_acquire(ScanKind::Triangular, 500, false));
    }

    #[test]
    fn hot_pair_bypasses_throttle() {
        let throttle = ScanThrottle::new(1000.0);
        assert!(throttle.try_acquire(ScanKind::MultiLeg, 0, false));
        assert!(throttle.try_acquire(ScanKind::MultiLeg, 1, true));
    }

    #[test]
    fn classifies_hot_pair_once_rate_exceeds_threshold() {
        let throttle = ScanThrottle::new(2.0);
        let pool = PoolId::new(1, address!("0000000000000000000000000000000000000001"));
        assert!(!throttle.record_update_and_is_hot(pool, 0));
        assert!(!throttle.record_update_and_is_hot(pool, 10));
        assert!(throttle.record_update_and_is_hot(pool, 20));
    }
}
