use alloy_primitives::{Address, U256};
use arb_types::{Leg, Opportunity, OpportunityKind, PairSnapshot, PipelineTimestamps};

use crate::two_pair::{opportunity_id, PROFIT_BPS_CLAMP};

/// One directed hop: swap `token_in` for `token_out` through `pool`.
#[derive(Debug, Clone, Copy)]
struct Edge<'a> {
    token_in:  Address,
    token_out: Address,
    pool:      &'a PairSnapshot
}

fn edges_for(pairs: &[PairSnapshot]) -> Vec<Edge<'_>> {
    let mut edges = Vec::with_capacity(pairs.len() * 2);
    for pool in pairs {
        edges.push(Edge { token_in: pool.token0, token_out: pool.token1, pool });
        edges.push(Edge { token_in: pool.token1, token_out: pool.token0, pool });
    }
    edges
}

/// Heuristic per-hop multiplier used only to prune the DFS: fee-adjusted
/// mid price, no liquidity-depth cap applied (that's checked exactly once
/// the full cycle is simulated with real amounts).
fn heuristic_hop_factor(edge: &Edge) -> f64 {
    let (reserve_in, reserve_out) = if edge.token_in == edge.pool.token0 {
        (edge.pool.reserve0, edge.pool.reserve1)
    } else {
        (edge.pool.reserve1, edge.pool.reserve0)
    };
    if reserve_in.is_zero() {
        return 0.0;
    }
    let price = reserve_out.to::<u128>() as f64 / reserve_in.to::<u128>().max(1) as f64;
    let fee_factor = 1.0 - (edge.pool.fee_bps as f64 / 10_000.0);
    price * fee_factor
}

fn swap_out(amount_in: U256, reserve_in: U256, reserve_out: U256, fee_bps: u32) -> Option<U256> {
    if reserve_in.is_zero() || reserve_out.is_zero() || amount_in.is_zero() {
        return None;
    }
    let fee_factor = U256::from(10_000u64 - fee_bps as u64);
    let amount_in_with_fee = amount_in.checked_mul(fee_factor)?;
    let numerator = amount_in_with_fee.checked_mul(reserve_out)?;
    let denominator = reserve_in.checked_mul(U256::from(10_000u64))?.checked_add(amount_in_with_fee)?;
    if denominator.is_zero() {
        return None;
    }
    Some(numerator / denominator)
}

/// Simulates the full cycle with a real probe amount, returning net bps (no
/// floats) or `None` if any hop is non-executable.
fn simulate_cycle(path: &[Edge], probe_amount: U256) -> Option<i64> {
    let mut amount = probe_amount;
    for edge in path {
        let (reserve_in, reserve_out) = if edge.token_in == edge.pool.token0 {
            (edge.pool.reserve0, edge.pool.reserve1)
        } else {
            (edge.pool.reserve1, edge.pool.reserve0)
        };
        amount = swap_out(amount, reserve_in, reserve_out, edge.pool.fee_bps)?;
    }
    if amount <= probe_amount {
        return None;
    }
    let profit = amount - probe_amount;
    let bps = profit.checked_mul(U256::from(10_000u64))?.checked_div(probe_amount)?;
    Some(bps.try_into().unwrap_or(i64::MAX))
}

fn min_depth(path: &[Edge]) -> U256 {
    path.iter().map(|e| e.pool.reserve0.min(e.pool.reserve1)).min().unwrap_or(U256::ZERO)
}

fn canonical_start(path: &[Edge]) -> bool {
    let start = path[0].token_in;
    path.iter().all(|e| e.token_in >= start) && path.iter().map(|e| e.token_in).min() == Some(start)
}

/// Depth-first, pruned cyclic search over `pairs`, starting and ending at
/// `source_token`. `max_hops` is 3 for triangular, up to 7 for multi-leg
///. Cycles are canonicalized to start at the lexicographically
/// smallest token to de-duplicate; only the first (best) profitable cycle
/// found per search is returned, mirroring the two-pair scan's single-best
/// emission.
#[allow(clippy::too_many_arguments)]
pub fn search_cycles(
    source_token: Address,
    pairs: &[PairSnapshot],
    max_hops: usize,
    min_profit_bps: i64,
    kind: OpportunityKind,
    chain_id: u64,
    probe_amount_fn: impl Fn(U256) -> U256,
    now_millis: u64,
    source: &str
) -> Vec<Opportunity> {
    let edges = edges_for(pairs);
    let mut path: Vec<Edge> = Vec::with_capacity(max_hops);
    let mut best: Option<(Vec<Edge>, i64)> = None;

    dfs(source_token, source_token, &edges, &mut path, max_hops, 1.0, &mut best);

    let Some((best_path, _)) = best else { return Vec::new() };
    if !canonical_start(&best_path) {
        return Vec::new();
    }

    let depth = min_depth(&best_path);
    let probe = probe_amount_fn(depth);
    if probe.is_zero() {
        return Vec::new();
    }

    let Some(net_bps) = simulate_cycle(&best_path, probe) else { return Vec::new() };
    if net_bps <= min_profit_bps || net_bps < PROFIT_BPS_CLAMP.0 || net_bps > PROFIT_BPS_CLAMP.1 {
        return Vec::new();
    }

    let legs: Vec<Leg> = best_path
        .iter()
        .map(|e| Leg { dex_id: e.pool.dex_id, token0: e.token_in, token1: e.token_out, amount_in: None, amount_out: None })
        .collect();
    let block_number = best_path.iter().map(|e| e.pool.block_number).max().unwrap_or(0);
    let id = opportunity_id(chain_id, &legs, block_number);
    let pipeline = PipelineTimestamps { ws_received: now_millis, published: now_millis, ..Default::default() };
    let confidence = (net_bps as f64 / 1000.0).clamp(0.0, 1.0);

    match Opportunity::new(
        id,
        kind,
        chain_id,
        legs,
        net_bps,
        net_bps,
        confidence,
        now_millis + 2_000,
        pipeline,
        source.to_string()
    ) {
        Ok(opp) => vec![opp],
        Err(_) => Vec::new()
    }
}

fn dfs<'a>(
    start: Address,
    current: Address,
    edges: &[Edge<'a>],
    path: &mut Vec<Edge<'a>>,
    max_hops: usize,
    cumulative_factor: f64,
    best: &mut Option<(Vec<Edge<'a>>, i64)>
) {
    if path.len() >= 2 && current == start {
        let heuristic_bps = ((cumulative_factor - 1.0) * 10_000.0) as i64;
        if best.as_ref().map(|(_, b)| heuristic_bps > *b).unwrap_or(true) {
            *best = Some((path.clone(), heuristic_bps));
        }
        return;
    }
    if path.len() >= max_hops {
        return;
    }
    // Prune: even at the theoretical best possible remaining multiplier of 1.0
    // per hop, a path already underwater by more than a small margin cannot
    // recover.
    if cumulative_factor < 0.5 {
        return;
    }

    for edge in edges {
        if edge.token_in != current {
            continue;
        }
        if path.iter().any(|e| e.pool.pool_address == edge.pool.pool_address) {
            continue;
        }
        if edge.token_out != start && path.len() + 1 >= max_hops {
            continue;
        }
        let factor = heuristic_hop_factor(edge);
        if factor <= 0.0 {
            continue;
        }
        path.push(*edge);
        dfs(start, edge.token_out, edges, path, max_hops, cumulative_factor * factor, best);
        path.pop();
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;

    fn pool(addr: Address, dex: u32, t0: Address, t1: Address, r0: u64, r1: u64) -> PairSnapshot {
        PairSnapshot {
            chain_id: 1,
            pool_address: addr,
            dex_id: dex,
            token0: t0,
            token1: t1,
            fee_bps: 30,
            reserve0: U256::from(r0),
            reserve1: U256::from(r1),
            block_number: 1,
            last_update_millis: 0
        }
    }

    #[test]
    fn finds_profitable_triangular_cycle() {
        let a = address!("0000000000000000000000000000000000000001");
        let b = address!("0000000000000000000000000000000000000002");
        let c = address!("0000000000000000000000000000000000000003");

        let pairs = vec![
            pool(address!("0000000000000000000000000000000000000010"), 1, a, b, 1_000_000, 1_000_000),
            pool(address!("0000000000000000000000000000000000000011"), 2, b, c, 1_000_000, 1_000_000),
            pool(address!("0000000000000000000000000000000000000012"), 3, c, a, 1_000_000, 1_300_000),
        ];

        let opps = search_cycles(
            a,
            &pairs,
            3,
            10,
            OpportunityKind::Triangular,
            1,
            |depth| depth / U256::from(100u64),
            1_000,
            "detector:triangular"
        );
        assert_eq!(opps.len(), 1);
        assert_eq!(opps[0].legs.len(), 3);
    }

    #[test]
    fn no_cycle_found_when_disconnected() {
        let a = address!("0000000000000000000000000000000000000001");
        let b = address!("0000000000000000000000000000000000000002");
        let pairs = vec![pool(address!("0000000000000000000000000000000000000010"), 1, a, b, 1_000_000, 1_000_000)];
        let opps = search_cycles(
            a,
            &pairs,
            3,
            10,
            OpportunityKind::Triangular,
            1,
            |depth| depth / U256::from(100u64),
            1_000,
            "detector:triangular"
        );
        assert!(opps.is_empty());
    }
}
