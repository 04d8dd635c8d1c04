use serde::{Deserialize, Serialize};

use crate::primitive::ChainId;

/// Per-chain configuration (its abstract configuration surface).
/// Loading this from a file or environment is out of scope for the core; the
/// binary is responsible for populating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id:           ChainId,
    pub ws_primary:         String,
    pub ws_fallbacks:       Vec<String>,
    pub min_profit_bps:     i64,
    pub whale_threshold_usd: u64,
    pub expiry_millis:      u64,
    pub gas_estimate:       u64,
    pub block_time_millis:  u64,
    pub staleness_millis:   u64
}

impl ChainConfig {
    /// Staleness tier derived from block time (5s / 10s / 15s
    /// tiers).
    pub fn staleness_tier_millis(&self) -> u64 {
        match self.block_time_millis {
            0..=2000 => 5_000,
            2001..=6000 => 10_000,
            _ => 15_000
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[strum(serialize_all = "snake_case")]
pub enum WarmingStrategyKind {
    TopN,
    Threshold,
    TimeBased,
    Adaptive
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarmingConfig {
    pub strategy:              WarmingStrategyKind,
    pub max_pairs_per_warm:    usize,
    pub min_correlation_score: f64,
    pub timeout_millis:        u64,
    pub enabled:                bool,
    pub async_warming:          bool,
    /// `TopN`/`TimeBased` target width.
    pub top_n:                 usize,
    /// `TimeBased` weights.
    pub recency_weight:        f64,
    pub correlation_weight:    f64,
    pub recency_window_millis: u64,
    /// `Adaptive` bounds and step size.
    pub adaptive_min_pairs:    usize,
    pub adaptive_max_pairs:    usize,
    pub adaptive_target_hit_rate: f64,
    pub adaptive_adjustment_factor: f64,
    pub debounce_cleanup_max_age_millis: u64
}

impl Default for WarmingConfig {
    fn default() -> Self {
        Self {
            strategy:                     WarmingStrategyKind::TopN,
            max_pairs_per_warm:           10,
            min_correlation_score:        0.3,
            timeout_millis:               50,
            enabled:                      true,
            async_warming:                true,
            top_n:                        3,
            recency_weight:               0.4,
            correlation_weight:           0.6,
            recency_window_millis:        60_000,
            adaptive_min_pairs:           2,
            adaptive_max_pairs:           10,
            adaptive_target_hit_rate:     0.8,
            adaptive_adjustment_factor:   0.2,
            debounce_cleanup_max_age_millis: 30_000
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    pub batch_size:            usize,
    pub block_millis:          u64,
    pub max_stream_len:        usize,
    pub duplicate_window_millis: u64,
    /// How long a pending entry may sit unacked before a consumer will
    /// reclaim it for itself.
    pub claim_age_millis:      u64
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            batch_size: 50,
            block_millis: 1_000,
            max_stream_len: 10_000,
            duplicate_window_millis: 5_000,
            claim_age_millis: 24 * 60 * 60 * 1_000
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub window_millis:     u64,
    pub cooldown_millis:   u64
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, window_millis: 60_000, cooldown_millis: 30_000 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// L1 entry-count capacity (quantized from a MiB budget by the binary).
    pub l1_capacity: usize,
    pub l3_enabled:  bool,
    /// Deadline applied to every individual L2 call.
    pub l2_deadline_millis: u64
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { l1_capacity: 16_384, l3_enabled: false, l2_deadline_millis: 200 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LeaderLeaseConfig {
    pub leader_lock_ttl_millis: u64,
    pub base_retry_delay_millis: u64
}

impl Default for LeaderLeaseConfig {
    fn default() -> Self {
        Self { leader_lock_ttl_millis: 10_000, base_retry_delay_millis: 2_000 }
    }
}
