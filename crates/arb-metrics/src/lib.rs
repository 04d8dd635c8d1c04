//! Named counters/gauges/histograms for every fire-and-forget or
//! absorbed-error call site across the core. Each component gets a small
//! wrapper struct that pins down the metric names in one place, mirroring
//! `angstrom-metrics`'s `ConsensusMetricsWrapper`.
//!
//! No HTTP exporter is wired here — recording into the global `metrics`
//! recorder is all the core does; exposing it is an admin-surface concern
//! out of scope.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ChainMetrics {
    chain: &'static str
}

impl ChainMetrics {
    pub fn new(chain: &'static str) -> Self {
        Self { chain }
    }

    pub fn reconnect_attempted(&self) {
        metrics::counter!("chain_reconnect_attempts_total", "chain" => self.chain).increment(1);
    }

    pub fn endpoint_rotated(&self) {
        metrics::counter!("chain_endpoint_rotations_total", "chain" => self.chain).increment(1);
    }

    pub fn stale_connection(&self) {
        metrics::counter!("chain_stale_connections_total", "chain" => self.chain).increment(1);
    }

    pub fn data_gap(&self, blocks_missed: u64) {
        metrics::counter!("chain_data_gaps_total", "chain" => self.chain).increment(1);
        metrics::histogram!("chain_data_gap_blocks", "chain" => self.chain).record(blocks_missed as f64);
    }

    pub fn parse_error(&self) {
        metrics::counter!("chain_parse_errors_total", "chain" => self.chain).increment(1);
    }

    pub fn rate_limited(&self) {
        metrics::counter!("chain_rate_limit_total", "chain" => self.chain).increment(1);
    }

    pub fn health_score(&self, score: f64) {
        metrics::gauge!("chain_health_score", "chain" => self.chain).set(score);
    }
}

#[derive(Debug, Clone)]
pub struct DetectorMetrics {
    chain: &'static str
}

impl DetectorMetrics {
    pub fn new(chain: &'static str) -> Self {
        Self { chain }
    }

    pub fn events_processed(&self) {
        metrics::counter!("detector_events_processed_total", "chain" => self.chain).increment(1);
    }

    pub fn opportunity_found(&self, kind: &'static str) {
        metrics::counter!("detector_opportunities_found_total", "chain" => self.chain, "kind" => kind)
            .increment(1);
    }

    pub fn scan_latency(&self, kind: &'static str, latency: Duration) {
        metrics::histogram!("detector_scan_latency_seconds", "chain" => self.chain, "kind" => kind)
            .record(latency.as_secs_f64());
    }

    pub fn throttled(&self, kind: &'static str) {
        metrics::counter!("detector_scans_throttled_total", "chain" => self.chain, "kind" => kind)
            .increment(1);
    }

    pub fn pool_saturated_drop(&self, kind: &'static str) {
        metrics::counter!("detector_pool_saturated_drops_total", "chain" => self.chain, "kind" => kind)
            .increment(1);
    }

    pub fn profit_bounds_violation(&self) {
        metrics::counter!("detector_profit_bounds_violations_total", "chain" => self.chain).increment(1);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CacheMetrics;

impl CacheMetrics {
    pub fn l1_hit(&self) {
        metrics::counter!("cache_l1_hits_total").increment(1);
    }

    pub fn l1_miss(&self) {
        metrics::counter!("cache_l1_misses_total").increment(1);
    }

    pub fn l1_eviction(&self) {
        metrics::counter!("cache_l1_evictions_total").increment(1);
    }

    pub fn l2_hit(&self) {
        metrics::counter!("cache_l2_hits_total").increment(1);
    }

    pub fn l2_miss(&self) {
        metrics::counter!("cache_l2_misses_total").increment(1);
    }

    pub fn l2_error(&self, op: &'static str) {
        metrics::counter!("cache_l2_errors_total", "op" => op).increment(1);
    }
}

#[derive(Debug, Clone)]
pub struct WarmerMetrics {
    chain: &'static str
}

impl WarmerMetrics {
    pub fn new(chain: &'static str) -> Self {
        Self { chain }
    }

    pub fn debounced(&self) {
        metrics::counter!("warming_debounced_total", "chain" => self.chain).increment(1);
    }

    pub fn operation_started(&self) {
        metrics::counter!("warming_operations_total", "chain" => self.chain).increment(1);
    }

    pub fn pairs_warmed(&self, n: u64) {
        metrics::counter!("warming_pairs_warmed_total", "chain" => self.chain).increment(n);
    }

    pub fn pairs_already_in_l1(&self, n: u64) {
        metrics::counter!("warming_pairs_already_in_l1_total", "chain" => self.chain).increment(n);
    }

    pub fn pairs_not_found(&self, n: u64) {
        metrics::counter!("warming_pairs_not_found_total", "chain" => self.chain).increment(n);
    }

    pub fn timed_out(&self) {
        metrics::counter!("warming_timeouts_total", "chain" => self.chain).increment(1);
    }

    pub fn disabled_skip(&self) {
        metrics::counter!("warming_disabled_skips_total", "chain" => self.chain).increment(1);
    }
}

#[derive(Debug, Clone, Default)]
pub struct StreamMetrics;

impl StreamMetrics {
    pub fn publish_failed(&self, stream: &str) {
        metrics::counter!("stream_publish_failed_total", "stream" => stream.to_string()).increment(1);
    }

    pub fn acked(&self, stream: &str) {
        metrics::counter!("stream_acked_total", "stream" => stream.to_string()).increment(1);
    }

    pub fn moved_to_dlq(&self, stream: &str, reason: &'static str) {
        metrics::counter!("stream_dlq_total", "stream" => stream.to_string(), "reason" => reason)
            .increment(1);
    }

    pub fn handler_error(&self, stream: &str) {
        metrics::counter!("stream_handler_errors_total", "stream" => stream.to_string()).increment(1);
    }

    pub fn claimed(&self, stream: &str, count: usize) {
        metrics::counter!("stream_claimed_total", "stream" => stream.to_string()).increment(count as u64);
    }

    pub fn paused(&self, stream: &str) {
        metrics::gauge!("stream_consumer_paused", "stream" => stream.to_string()).set(1.0);
    }

    pub fn resumed(&self, stream: &str) {
        metrics::gauge!("stream_consumer_paused", "stream" => stream.to_string()).set(0.0);
    }
}

#[derive(Debug, Clone, Default)]
pub struct CoordinatorMetrics;

impl CoordinatorMetrics {
    pub fn opportunities_dropped(&self, reason: &'static str) {
        metrics::counter!("coordinator_opportunities_dropped_total", "reason" => reason).increment(1);
    }

    pub fn duplicate_dropped(&self) {
        metrics::counter!("coordinator_duplicates_dropped_total").increment(1);
    }

    pub fn forwarded(&self) {
        metrics::counter!("coordinator_forwarded_total").increment(1);
    }

    pub fn breaker_state_changed(&self, state: &'static str) {
        metrics::gauge!("coordinator_breaker_state").set(match state {
            "closed" => 0.0,
            "half_open" => 0.5,
            _ => 1.0
        });
    }

    pub fn leader_changed(&self, is_leader: bool) {
        metrics::gauge!("coordinator_is_leader").set(if is_leader { 1.0 } else { 0.0 });
    }
}
