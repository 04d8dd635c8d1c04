use alloy_primitives::U256;
use arb_types::{Leg, Opportunity, OpportunityKind, PairSnapshot, PipelineTimestamps};

/// Basis-point denominator (100% == 10_000 bps).
const BPS_DENOM: i64 = 10_000;

/// Profit percentage outside this range is treated as a decoder bug and the
/// opportunity is dropped (its numeric-bounds clamp: `[-100%, +10000%]`).
pub const PROFIT_BPS_CLAMP: (i64, i64) = (-BPS_DENOM, 100 * BPS_DENOM);

/// Constant-product swap output, `amountOut = amountIn * reserveOut * (10000 - feeBps) / (reserveIn * 10000 + amountIn * (10000 - feeBps))`.
fn swap_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_bps: u32) -> Option<U256> {
    if reserve_in.is_zero() || reserve_out.is_zero() || amount_in.is_zero() {
        return None;
    }
    let fee_factor = U256::from(BPS_DENOM as u64 - fee_bps as u64);
    let amount_in_with_fee = amount_in.checked_mul(fee_factor)?;
    let numerator = amount_in_with_fee.checked_mul(reserve_out)?;
    let denominator = reserve_in.checked_mul(U256::from(BPS_DENOM as u64))?.checked_add(amount_in_with_fee)?;
    if denominator.is_zero() {
        return None;
    }
    Some(numerator / denominator)
}

/// Net bps from buying on `cheap` and selling on `rich`, for a probe amount
/// sized to a fraction of the cheaper pool's depth, minus an estimated gas
/// cost (converted to bps via a liquidity-depth model: smaller pools bear a
/// larger relative gas cost).
fn net_bps_for_direction(
    probe_amount: U256,
    cheap: &PairSnapshot,
    rich: &PairSnapshot,
    gas_cost_bps_at_reference_depth: i64,
    reference_depth: U256
) -> Option<i64> {
    let intermediate = swap_out(probe_amount, cheap.reserve0, cheap.reserve1, cheap.fee_bps)?;
    let amount_back = swap_out(intermediate, rich.reserve1, rich.reserve0, rich.fee_bps)?;

    if amount_back <= probe_amount {
        return None;
    }

    let profit = amount_back - probe_amount;
    let gross_bps = profit.checked_mul(U256::from(BPS_DENOM as u64))?.checked_div(probe_amount)?;
    let gross_bps: i64 = gross_bps.try_into().unwrap_or(i64::MAX);

    let min_depth = cheap.reserve0.min(cheap.reserve1).min(rich.reserve0).min(rich.reserve1);
    let depth_ratio = if min_depth.is_zero() {
        f64::MAX
    } else {
        let reference = reference_depth.max(U256::from(1u64));
        reference.to::<u128>() as f64 / min_depth.to::<u128>().max(1) as f64
    };
    let gas_bps = ((gas_cost_bps_at_reference_depth as f64) * depth_ratio.max(1.0)) as i64;

    Some(gross_bps - gas_bps)
}

fn confidence(net_bps: i64, pool_depth_min: U256, staleness_millis: u64, max_staleness_millis: u64) -> f64 {
    let profit_component = (net_bps as f64 / 500.0).clamp(0.0, 1.0);
    let depth_component = (pool_depth_min.to::<u128>() as f64 / 1_000_000.0).clamp(0.0, 1.0);
    let staleness_component =
        1.0 - (staleness_millis as f64 / max_staleness_millis.max(1) as f64).clamp(0.0, 1.0);

    (0.5 * profit_component + 0.3 * depth_component + 0.2 * staleness_component).clamp(0.0, 1.0)
}

/// Parameters the Detector is configured with per chain.
#[derive(Debug, Clone, Copy)]
pub struct TwoPairParams {
    pub min_profit_bps:         i64,
    pub max_staleness_millis:   u64,
    pub probe_fraction_bps:     u32,
    pub gas_cost_bps_at_reference_depth: i64,
    pub reference_depth:        U256,
    pub opportunity_ttl_millis: u64
}

/// Scans every other pair sharing `updated`'s token-pair key for a
/// profitable two-pair round trip. Always runs inline on the hot path
///.
pub fn scan_two_pair(
    updated: &PairSnapshot,
    candidates: &[PairSnapshot],
    params: &TwoPairParams,
    chain_id: u64,
    now_millis: u64,
    source: &str
) -> Vec<Opportunity> {
    let mut best: Option<(PairSnapshot, PairSnapshot, i64)> = None;

    for candidate in candidates {
        if candidate.pool_address == updated.pool_address {
            continue;
        }
        if candidate.dex_id == updated.dex_id {
            continue;
        }
        if candidate.staleness_millis(now_millis) > params.max_staleness_millis {
            continue;
        }

        let probe = probe_amount(updated, params.probe_fraction_bps);
        let Some(probe) = probe else { continue };

        let forward = net_bps_for_direction(
            probe,
            updated,
            candidate,
            params.gas_cost_bps_at_reference_depth,
            params.reference_depth
        );
        let backward = net_bps_for_direction(
            probe,
            candidate,
            updated,
            params.gas_cost_bps_at_reference_depth,
            params.reference_depth
        );

        for (cheap, rich, net_bps) in [(updated, candidate, forward), (candidate, updated, backward)] {
            let Some(net_bps) = net_bps else { continue };
            if net_bps <= params.min_profit_bps {
                continue;
            }

            let better = match &best {
                None => true,
                Some((_, _, best_bps)) if net_bps > *best_bps => true,
                Some((best_cheap, _, best_bps)) if net_bps == *best_bps => {
                    tie_break_prefers(cheap, best_cheap, now_millis)
                }
                _ => false
            };
            if better {
                best = Some((*cheap, *rich, net_bps));
            }
        }
    }

    let Some((cheap, rich, net_bps)) = best else { return Vec::new() };

    if net_bps < PROFIT_BPS_CLAMP.0 || net_bps > PROFIT_BPS_CLAMP.1 {
        return Vec::new();
    }

    let pool_depth_min = cheap.reserve0.min(cheap.reserve1).min(rich.reserve0).min(rich.reserve1);
    let staleness = cheap.staleness_millis(now_millis).max(rich.staleness_millis(now_millis));
    let conf = confidence(net_bps, pool_depth_min, staleness, params.max_staleness_millis);

    let legs = vec![
        Leg { dex_id: cheap.dex_id, token0: cheap.token0, token1: cheap.token1, amount_in: None, amount_out: None },
        Leg { dex_id: rich.dex_id, token0: rich.token0, token1: rich.token1, amount_in: None, amount_out: None },
    ];

    let id = opportunity_id(chain_id, &legs, cheap.block_number.max(rich.block_number));
    let pipeline = PipelineTimestamps { ws_received: now_millis, published: now_millis, ..Default::default() };

    match Opportunity::new(
        id,
        OpportunityKind::TwoPair,
        chain_id,
        legs,
        net_bps,
        net_bps,
        conf,
        now_millis + params.opportunity_ttl_millis,
        pipeline,
        source.to_string()
    ) {
        Ok(opp) => vec![opp],
        Err(_) => Vec::new()
    }
}

fn probe_amount(pair: &PairSnapshot, probe_fraction_bps: u32) -> Option<U256> {
    let depth = pair.reserve0.min(pair.reserve1);
    if depth.is_zero() {
        return None;
    }
    let probe = depth.checked_mul(U256::from(probe_fraction_bps))?.checked_div(U256::from(BPS_DENOM as u64))?;
    if probe.is_zero() { None } else { Some(probe) }
}

fn tie_break_prefers(candidate: &PairSnapshot, incumbent: &PairSnapshot, now_millis: u64) -> bool {
    let candidate_age = candidate.staleness_millis(now_millis);
    let incumbent_age = incumbent.staleness_millis(now_millis);
    match candidate_age.cmp(&incumbent_age) {
        std::cmp::Ordering::Less => true,
        std::cmp::Ordering::Greater => false,
        std::cmp::Ordering::Equal => candidate.pool_address < incumbent.pool_address
    }
}

/// Deterministic hash of `{chain, legs, block}` identifying an opportunity.
pub fn opportunity_id(chain_id: u64, legs: &[Leg], block_number: u64) -> [u8; 32] {
    use alloy_primitives::keccak256;
    let mut buf = Vec::with_capacity(8 + 8 + legs.len() * 72);
    buf.extend_from_slice(&chain_id.to_be_bytes());
    buf.extend_from_slice(&block_number.to_be_bytes());
    for leg in legs {
        buf.extend_from_slice(&leg.dex_id.to_be_bytes());
        buf.extend_from_slice(leg.token0.as_slice());
        buf.extend_from_slice(leg.token1.as_slice());
    }
    keccak256(&buf).0
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;
    use proptest::prelude::*;

    use super::*;

    fn snap(pool: alloy_primitives::Address, dex: u32, r0: u64, r1: u64, last_update: u64) -> PairSnapshot {
        PairSnapshot {
            chain_id: 1,
            pool_address: pool,
            dex_id: dex,
            token0: address!("0000000000000000000000000000000000000001"),
            token1: address!("0000000000000000000000000000000000000002"),
            fee_bps: 30,
            reserve0: U256::from(r0),
            reserve1: U256::from(r1),
            block_number: 10,
            last_update_millis: last_update
        }
    }

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

    #[test]
    fn finds_opportunity_across_mispriced_pools() {
        let updated = snap(address!("0000000000000000000000000000000000000010"), 1, 1_000_000, 1_000_000, 1_000);
        let candidate = snap(address!("0000000000000000000000000000000000000011"), 2, 1_000_000, 1_300_000, 1_000);

        let opps = scan_two_pair(&updated, &[candidate], &params(), 1, 2_000, "detector");
        assert_eq!(opps.len(), 1);
        assert!(opps[0].net_bps > 0);
    }

    #[test]
    fn skips_same_dex_and_same_address() {
        let updated = snap(address!("0000000000000000000000000000000000000010"), 1, 1_000_000, 1_000_000, 1_000);
        let same_dex = snap(address!("0000000000000000000000000000000000000011"), 1, 1_000_000, 2_000_000, 1_000);
        let same_address = snap(updated.pool_address, 2, 1_000_000, 2_000_000, 1_000);

        let opps = scan_two_pair(&updated, &[same_dex, same_address], &params(), 1, 2_000, "detector");
        assert!(opps.is_empty());
    }

    #[test]
    fn skips_stale_candidate() {
        let updated = snap(address!("0000000000000000000000000000000000000010"), 1, 1_000_000, 1_000_000, 1_000);
        let stale = snap(address!("0000000000000000000000000000000000000011"), 2, 1_000_000, 2_000_000, 0);

        let opps = scan_two_pair(&updated, &[stale], &params(), 1, 100_000, "detector");
        assert!(opps.is_empty());
    }

    #[test]
    fn identical_reserves_yield_no_opportunity() {
        let updated = snap(address!("0000000000000000000000000000000000000010"), 1, 1_000_000, 1_000_000, 1_000);
        let candidate = snap(address!("0000000000000000000000000000000000000011"), 2, 1_000_000, 1_000_000, 1_000);
        let opps = scan_two_pair(&updated, &[candidate], &params(), 1, 2_000, "detector");
        assert!(opps.is_empty());
    }

    #[test]
    fn zero_reserves_are_skipped_not_panicking() {
        let updated = snap(address!("0000000000000000000000000000000000000010"), 1, 0, 0, 1_000);
        let candidate = snap(address!("0000000000000000000000000000000000000011"), 2, 1_000_000, 2_000_000, 1_000);
        let opps = scan_two_pair(&updated, &[candidate], &params(), 1, 2_000, "detector");
        assert!(opps.is_empty());
    }

    proptest! {
        #[test]
        fn every_published_opportunity_obeys_net_bps_bounds(
            r0 in 1u64..10_000_000,
            r1 in 1u64..10_000_000,
            r0_other in 1u64..10_000_000,
            r1_other in 1u64..10_000_000,
            now in 0u64..1_000_000
        ) {
            let updated = snap(address!("0000000000000000000000000000000000000010"), 1, r0, r1, 0);
            let candidate = snap(address!("0000000000000000000000000000000000000011"), 2, r0_other, r1_other, 0);
            let opps = scan_two_pair(&updated, &[candidate], &params(), 1, now, "detector");

            for opp in &opps {
                prop_assert!(opp.net_bps > 0);
                prop_assert!(opp.net_bps >= PROFIT_BPS_CLAMP.0 && opp.net_bps <= PROFIT_BPS_CLAMP.1);
                prop_assert!(opp.expiry_millis > opp.pipeline.published);
            }
        }
    }
}
