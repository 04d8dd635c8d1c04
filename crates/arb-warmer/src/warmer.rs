use std::{sync::Arc, time::Duration};

use arb_cache::HierarchicalCache;
use arb_correlation::CorrelationTracker;
use arb_metrics::WarmerMetrics;
use arb_types::PoolId;
use dashmap::DashMap;
use tracing::warn;

use crate::strategy::{WarmingContext, WarmingStrategy};

#[derive(Debug, Clone, Copy)]
pub struct WarmerConfig {
    pub enabled:         bool,
    pub max_pairs_per_warm: usize,
    pub min_correlation_score: f64,
    pub timeout_millis:  u64
}

#[derive(Debug, Clone, Default)]
pub struct WarmingResult {
    pub pairs_warmed:        u64,
    pub pairs_already_in_l1: u64,
    pub pairs_not_found:     u64,
    pub timed_out:           bool
}

/// Converts a pool identity into its cache key. Co-located here rather than
/// in `arb-cache` since the key scheme is a warmer/detector convention, not
/// a cache concern.
pub fn cache_key(pool: PoolId) -> String {
    format!("price:{pool}")
}

/// Predictive Warmer (C7): debounced, correlation-driven L2 -> L1
/// promotion. Never initiates an L2 write.
pub struct PredictiveWarmer {
    chain: &'static str,
    config: WarmerConfig,
    cache: Arc<HierarchicalCache>,
    correlation: Arc<CorrelationTracker>,
    strategy: Arc<dyn WarmingStrategy>,
    metrics: WarmerMetrics,
    pending: DashMap<PoolId, u64>,
    last_hit_rate: parking_lot::Mutex<f64>
}

impl PredictiveWarmer {
    pub fn new(
        chain: &'static str,
        config: WarmerConfig,
        cache: Arc<HierarchicalCache>,
        correlation: Arc<CorrelationTracker>,
        strategy: Arc<dyn WarmingStrategy>
    ) -> Self {
        Self {
            chain,
            config,
            cache,
            correlation,
            strategy,
            metrics: WarmerMetrics::new(chain),
            pending: DashMap::new(),
            last_hit_rate: parking_lot::Mutex::new(0.0)
        }
    }

    /// `onPriceUpdate(pair, timestamp, chainId)` — hot-path entry. Debounces
    /// and spawns the background warming; never awaits on it.
    pub fn on_price_update(self: &Arc<Self>, pair: PoolId, timestamp_millis: u64) {
        if !self.config.enabled {
            self.metrics.disabled_skip();
            return;
        }

        if self.pending.contains_key(&pair) {
            self.metrics.debounced();
            return;
        }
        self.pending.insert(pair, timestamp_millis);

        let this = self.clone();
        tokio::spawn(async move {
            let _ = this.warm_for_pair(pair).await;
            this.pending.remove(&pair);
        });
    }

    /// `warmForPair(sourcePair) -> WarmingResult`.
    pub async fn warm_for_pair(&self, source_pair: PoolId) -> WarmingResult {
        if !self.config.enabled {
            self.metrics.disabled_skip();
            return WarmingResult::default();
        }

        self.metrics.operation_started();
        let deadline = Duration::from_millis(self.config.timeout_millis);
        match tokio::time::timeout(deadline, self.run_warming(source_pair)).await {
            Ok(result) => result,
            Err(_) => {
                self.metrics.timed_out();
                WarmingResult { timed_out: true, ..Default::default() }
            }
        }
    }

    async fn run_warming(&self, source_pair: PoolId) -> WarmingResult {
        let candidates = self.correlation.get_pairs_to_warm(
            source_pair,
            arb_types::now_millis(),
            self.config.max_pairs_per_warm,
            self.config.min_correlation_score
        );

        let ctx = WarmingContext {
            source_pair,
            candidates,
            current_l1_hit_rate: *self.last_hit_rate.lock(),
            timestamp_millis: arb_types::now_millis()
        };
        let selection = self.strategy.select(&ctx);
        let selected_count = selection.selected_pairs.len();

        let mut result = WarmingResult::default();
        for pool in selection.selected_pairs {
            let key = cache_key(pool);
            if self.cache.get_from_l1(&key).is_some() {
                result.pairs_already_in_l1 += 1;
                continue;
            }
            match self.cache.get(&key).await {
                Some(_) => result.pairs_warmed += 1,
                None => result.pairs_not_found += 1
            }
        }

        self.metrics.pairs_warmed(result.pairs_warmed);
        self.metrics.pairs_already_in_l1(result.pairs_already_in_l1);
        self.metrics.pairs_not_found(result.pairs_not_found);

        if selected_count > 0 {
            let observed_hit_rate = result.pairs_already_in_l1 as f64 / selected_count as f64;
            *self.last_hit_rate.lock() = observed_hit_rate;
            self.strategy.record_observed_hit_rate(observed_hit_rate);
        }

        result
    }

    /// `warmPairs(pairs) -> WarmingResult` — manual pre-population at
    /// startup.
    pub async fn warm_pairs(&self, pairs: &[PoolId]) -> WarmingResult {
        let mut total = WarmingResult::default();
        for &pool in pairs {
            let key = cache_key(pool);
            if self.cache.get_from_l1(&key).is_some() {
                total.pairs_already_in_l1 += 1;
                continue;
            }
            match self.cache.get(&key).await {
                Some(_) => total.pairs_warmed += 1,
                None => total.pairs_not_found += 1
            }
        }
        total
    }

    /// `cleanupStalePendingWarmings(maxAgeMs)`.
    pub fn cleanup_stale_pending_warmings(&self, max_age_millis: u64) {
        let now = arb_types::now_millis();
        let stale: Vec<PoolId> =
            self.pending.iter().filter(|e| now.saturating_sub(*e.value()) > max_age_millis).map(|e| *e.key()).collect();
        for pool in stale {
            warn!(chain = self.chain, %pool, "clearing stale pending warming entry");
            self.pending.remove(&pool);
        }
    }
}
