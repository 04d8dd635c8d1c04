//! Detector (C4): the two-pair inline scan always runs on the hot path;
//! triangular and multi-leg cyclic scans are throttled, bypassed for hot
//! pairs, and run off-path under a bounded worker budget.

pub mod cycle;
pub mod stats;
pub mod throttle;
pub mod two_pair;

use std::{sync::Arc, time::Instant};

use alloy_primitives::U256;
use arb_metrics::DetectorMetrics;
use arb_pairs::PairRepository;
use arb_types::{OpportunityKind, PriceUpdate};
use tokio::sync::{mpsc, Semaphore};
use tracing::warn;

pub use stats::DetectorStats;
pub use throttle::ScanKind;
pub use two_pair::TwoPairParams;

/// Off-path scan budget: new triangular/multi-leg jobs are dropped (not
/// queued) once this many are already running, to preserve hot-path latency
///.
const MAX_CONCURRENT_OFFPATH_SCANS: usize = 8;

pub struct Detector {
    chain: &'static str,
    chain_id: u64,
    repo: Arc<PairRepository>,
    params: TwoPairParams,
    throttle: Arc<throttle::ScanThrottle>,
    offpath_budget: Arc<Semaphore>,
    metrics: DetectorMetrics,
    stats: Arc<stats::StatsTracker>,
    offpath_tx: mpsc::UnboundedSender<arb_types::Opportunity>
}

impl Detector {
    pub fn new(
        chain: &'static str,
        chain_id: u64,
        repo: Arc<PairRepository>,
        params: TwoPairParams,
        hot_pair_threshold_updates_per_sec: f64
    ) -> (Self, mpsc::UnboundedReceiver<arb_types::Opportunity>) {
        let (offpath_tx, offpath_rx) = mpsc::unbounded_channel();
        let detector = Self {
            chain,
            chain_id,
            repo,
            params,
            throttle: Arc::new(throttle::ScanThrottle::new(hot_pair_threshold_updates_per_sec)),
            offpath_budget: Arc::new(Semaphore::new(MAX_CONCURRENT_OFFPATH_SCANS)),
            metrics: DetectorMetrics::new(chain),
            stats: Arc::new(stats::StatsTracker::default()),
            offpath_tx
        };
        (detector, offpath_rx)
    }

    /// `onPriceUpdate(priceUpdate) -> Vec<Opportunity>`. Returns the
    /// synchronous two-pair result inline; triangular/multi-leg results
    /// (when their throttle opens) arrive later on the off-path channel
    /// handed back from [`Detector::new`], since they never block this
    /// call.
    pub fn on_price_update(&self, update: &PriceUpdate, now_millis: u64) -> Vec<arb_types::Opportunity> {
        self.metrics.events_processed();
        self.stats.record_event();

        let Some(updated) = self.repo.lookup_by_address(self.chain_id, update.pool.address) else {
            return Vec::new();
        };
        let candidates = self.repo.lookup_by_token_pair(updated.token_pair_key());

        let started = Instant::now();
        let opportunities = two_pair::scan_two_pair(
            &updated,
            &candidates,
            &self.params,
            self.chain_id,
            now_millis,
            &format!("detector:{}:two_pair", self.chain)
        );
        self.stats.record_two_pair_latency(started.elapsed());
        if !opportunities.is_empty() {
            self.metrics.opportunity_found("two_pair");
            self.stats.record_opportunities(opportunities.len() as u64);
        }

        let is_hot = self.throttle.record_update_and_is_hot(update.pool, now_millis);
        self.maybe_spawn_offpath(ScanKind::Triangular, OpportunityKind::Triangular, 3, updated.token0, now_millis, is_hot);
        self.maybe_spawn_offpath(ScanKind::MultiLeg, OpportunityKind::MultiLeg, 7, updated.token0, now_millis, is_hot);

        opportunities
    }

    fn maybe_spawn_offpath(
        &self,
        kind: ScanKind,
        opp_kind: OpportunityKind,
        max_hops: usize,
        source_token: alloy_primitives::Address,
        now_millis: u64,
        is_hot: bool
    ) {
        if !self.throttle.try_acquire(kind, now_millis, is_hot) {
            self.metrics.throttled(opp_kind_label(opp_kind));
            return;
        }
        let Ok(permit) = self.offpath_budget.clone().try_acquire_owned() else {
            self.metrics.pool_saturated_drop(opp_kind_label(opp_kind));
            return;
        };

        let repo = self.repo.clone();
        let chain_id = self.chain_id;
        let min_profit_bps = self.params.min_profit_bps;
        let tx = self.offpath_tx.clone();
        let metrics = self.metrics.clone();
        let stats = self.stats.clone();
        let source = format!("detector:{}:{}", self.chain, opp_kind_label(opp_kind));
        let probe_fraction_bps = self.params.probe_fraction_bps;

        tokio::spawn(async move {
            let _permit = permit;
            let started = Instant::now();
            let pairs = repo.all_pairs_for_chain(chain_id);
            let opportunities = cycle::search_cycles(
                source_token,
                &pairs,
                max_hops,
                min_profit_bps,
                opp_kind,
                chain_id,
                |depth| depth.checked_mul(U256::from(probe_fraction_bps)).unwrap_or(U256::ZERO) / U256::from(10_000u64),
                now_millis,
                &source
            );

            let elapsed = started.elapsed();
            match opp_kind {
                OpportunityKind::Triangular => stats.record_triangular_latency(elapsed),
                OpportunityKind::MultiLeg => stats.record_multi_leg_latency(elapsed),
                _ => {}
            }

            if !opportunities.is_empty() {
                metrics.opportunity_found(opp_kind_label(opp_kind));
                stats.record_opportunities(opportunities.len() as u64);
            }
            for opp in opportunities {
                let _ = tx.send(opp);
            }
        });
    }

    pub fn get_stats(&self) -> DetectorStats {
        self.stats.snapshot()
    }
}

fn opp_kind_label(kind: OpportunityKind) -> &'static str {
    match kind {
        OpportunityKind::TwoPair => "two_pair",
        OpportunityKind::Triangular => "triangular",
        OpportunityKind::MultiLeg => "multi_leg",
        OpportunityKind::CrossChain => "cross_chain"
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use arb_pairs::test_utils::make_pair;
    use arb_types::{PoolId, RationalPrice};

    use super::*;

    fn params() -> TwoPairParams {
        TwoPairParams {
            min_profit_bps: 10,
            max_staleness_millis: 15_000,
            probe_fraction_bps: 10,
            gas_cost_bps_at_reference_depth: 5,
            reference_depth: U256::from(1_000_000u64),
            opportunity_ttl_millis: 2_000
        }
    }

    #[tokio::test]
    async fn on_price_update_returns_two_pair_opportunity_inline() {
        let repo = Arc::new(PairRepository::new());
        let token0 = address!("0000000000000000000000000000000000000001");
        let token1 = address!("0000000000000000000000000000000000000002");
        let pool_a = address!("0000000000000000000000000000000000000010");
        let pool_b = address!("0000000000000000000000000000000000000011");

        repo.upsert_pair(make_pair(1, pool_a, token0, token1, 30));
        let mut pair_b = make_pair(1, pool_b, token0, token1, 30);
        pair_b.apply_reserve_update(U256::from(1_000_000u64), U256::from(1_300_000u64), 2, 0);
        repo.upsert_pair(pair_b);

        let (detector, _rx) = Detector::new("ethereum", 1, repo, params(), 1000.0);

        let update = PriceUpdate {
            pool: PoolId::new(1, pool_a),
            mid_price: RationalPrice::new(U256::from(1u64), U256::from(1u64)),
            reserve0: U256::from(1_000_000u64),
            reserve1: U256::from(1_000_000u64),
            block_number: 1,
            source_received_millis: 0,
            published_millis: None
        };

        let opps = detector.on_price_update(&update, 1_000);
        assert_eq!(opps.len(), 1);
    }

    #[tokio::test]
    async fn on_price_update_for_unknown_pool_returns_empty() {
        let repo = Arc::new(PairRepository::new());
        let (detector, _rx) = Detector::new("ethereum", 1, repo, params(), 1000.0);
        let update = PriceUpdate {
            pool: PoolId::new(1, address!("0000000000000000000000000000000000000099")),
            mid_price: RationalPrice::new(U256::from(1u64), U256::from(1u64)),
            reserve0: U256::ZERO,
            reserve1: U256::ZERO,
            block_number: 1,
            source_received_millis: 0,
            published_millis: None
        };
        assert!(detector.on_price_update(&update, 0).is_empty());
    }
}
