use std::time::Duration;

use parking_lot::Mutex;

/// `getStats()` response: opportunities found, events processed, last scan
/// latencies.
#[derive(Debug, Clone, Default)]
pub struct DetectorStats {
    pub events_processed:      u64,
    pub opportunities_found:   u64,
    pub last_two_pair_latency:  Option<Duration>,
    pub last_triangular_latency: Option<Duration>,
    pub last_multi_leg_latency:  Option<Duration>
}

#[derive(Default)]
pub struct StatsTracker {
    inner: Mutex<DetectorStats>
}

impl StatsTracker {
    pub fn record_event(&self) {
        self.inner.lock().events_processed += 1;
    }

    pub fn record_opportunities(&self, n: u64) {
        self.inner.lock().opportunities_found += n;
    }

    pub fn record_two_pair_latency(&self, d: Duration) {
        self.inner.lock().last_two_pair_latency = Some(d);
    }

    pub fn record_triangular_latency(&self, d: Duration) {
        self.inner.lock().last_triangular_latency = Some(d);
    }

    pub fn record_multi_leg_latency(&self, d: Duration) {
        self.inner.lock().last_multi_leg_latency = Some(d);
    }

    pub fn snapshot(&self) -> DetectorStats {
        self.inner.lock().clone()
    }
}
