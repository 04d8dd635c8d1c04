use alloy_primitives::{Address, U256};
use arb_detector::TwoPairParams;
use arb_types::config::{BreakerConfig, CacheConfig, ChainConfig, LeaderLeaseConfig, StreamConfig, WarmingConfig};
use serde::Deserialize;

/// A pool the binary seeds into the Pair Repository at startup with zero
/// reserves; the first reserve-update log for it fills in real state.
/// Pool discovery itself (scanning factories, following new-pool events) is
/// an external collaborator, same as the upstream subscription.
#[derive(Debug, Clone, Deserialize)]
pub struct PoolSeed {
    pub address:  Address,
    pub dex_id:   u32,
    pub token0:   Address,
    pub token1:   Address,
    pub fee_bps:  u32
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainEntry {
    /// Leaked once at startup into the `&'static str` every per-chain
    /// component expects for its metrics label.
    pub name:   String,
    pub chain:  ChainConfig,
    #[serde(default)]
    pub pools:  Vec<PoolSeed>,
    /// Updates/sec above which a pair is "hot" and off-path scans back off
    ///.
    pub hot_pair_threshold_updates_per_sec: f64,
    pub two_pair: TwoPairSettings
}

/// Mirrors `arb_detector::TwoPairParams`, which has no `serde` impl (gas
/// pricing and reference-depth sizing are a deployment's call, not the
/// detector's).
#[derive(Debug, Clone, Deserialize)]
pub struct TwoPairSettings {
    pub min_profit_bps:         i64,
    pub max_staleness_millis:   u64,
    pub probe_fraction_bps:     u32,
    pub gas_cost_bps_at_reference_depth: i64,
    pub reference_depth:        u64,
    pub opportunity_ttl_millis: u64
}

impl From<TwoPairSettings> for TwoPairParams {
    fn from(s: TwoPairSettings) -> Self {
        Self {
            min_profit_bps: s.min_profit_bps,
            max_staleness_millis: s.max_staleness_millis,
            probe_fraction_bps: s.probe_fraction_bps,
            gas_cost_bps_at_reference_depth: s.gas_cost_bps_at_reference_depth,
            reference_depth: U256::from(s.reference_depth),
            opportunity_ttl_millis: s.opportunity_ttl_millis
        }
    }
}

/// Top-level wiring configuration. Loaded once from a JSON file at startup;
/// there is no hot-reload.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub redis_url:            String,
    #[serde(default = "default_opportunities_stream")]
    pub opportunities_stream:  String,
    #[serde(default = "default_execution_stream")]
    pub execution_stream:     String,
    #[serde(default = "default_coordinator_group")]
    pub coordinator_group:    String,
    #[serde(default = "default_leader_lock_key")]
    pub leader_lock_key:      String,
    pub chains:               Vec<ChainEntry>,
    #[serde(default)]
    pub stream:               StreamConfig,
    #[serde(default)]
    pub breaker:              BreakerConfig,
    #[serde(default)]
    pub leader_lease:         LeaderLeaseConfig,
    #[serde(default)]
    pub cache:                CacheConfig,
    #[serde(default)]
    pub warming:              WarmingConfig,
    #[serde(default)]
    pub correlation:          CorrelationSettings
}

/// Mirrors `arb_correlation::CorrelationConfig`, which has no `serde` impl
/// of its own (it never crosses a process boundary outside this binary).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct CorrelationSettings {
    pub co_occurrence_window_millis: u64,
    pub half_life_millis:            u64,
    pub max_tracked_pairs:           usize
}

impl Default for CorrelationSettings {
    fn default() -> Self {
        let defaults = arb_correlation::CorrelationConfig::default();
        Self {
            co_occurrence_window_millis: defaults.co_occurrence_window_millis,
            half_life_millis: defaults.half_life_millis,
            max_tracked_pairs: defaults.max_tracked_pairs
        }
    }
}

impl From<CorrelationSettings> for arb_correlation::CorrelationConfig {
    fn from(s: CorrelationSettings) -> Self {
        Self {
            co_occurrence_window_millis: s.co_occurrence_window_millis,
            half_life_millis: s.half_life_millis,
            max_tracked_pairs: s.max_tracked_pairs
        }
    }
}

fn default_opportunities_stream() -> String {
    "stream:opportunities".to_string()
}

fn default_execution_stream() -> String {
    "stream:execution-requests".to_string()
}

fn default_coordinator_group() -> String {
    "coordinator".to_string()
}

fn default_leader_lock_key() -> String {
    "coordinator:leader:lock".to_string()
}

impl AppConfig {
    pub fn load(path: &std::path::Path) -> eyre::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&raw)?;
        Ok(config)
    }
}
