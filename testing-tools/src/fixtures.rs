//! Data builders for concrete end-to-end scenarios.

use std::sync::Arc;

use alloy_primitives::{address, Address, U256};
use arb_pairs::PairRepository;
use arb_types::PoolId;

/// `value * 10^decimals`, built by repeated multiplication to avoid any
/// assumption about which `pow` overload `U256` exposes.
pub fn units(value: u64, decimals: u32) -> U256 {
    let mut result = U256::from(value);
    for _ in 0..decimals {
        result *= U256::from(10u64);
    }
    result
}

pub const WETH: Address = address!("000000000000000000000000000000000000dead");
pub const USDC: Address = address!("0000000000000000000000000000000000000001");
pub const POOL_A: Address = address!("0000000000000000000000000000000000000a0a");
pub const POOL_B: Address = address!("0000000000000000000000000000000000000b0b");

/// Scenario 1: two pools for WETH/USDC on chain 1, `P1 @ dex=A` and
/// `P2 @ dex=B`, both 30 bps, seeded so a reserve update on `P2` opens a
/// `netBps >= 25` two-pair opportunity.
pub fn two_pair_scenario() -> (Arc<PairRepository>, PoolId, PoolId) {
    let repo = Arc::new(PairRepository::new());

    let mut p1 = arb_pairs::test_utils::make_pair(1, POOL_A, WETH, USDC, 30);
    p1.apply_reserve_update(units(1_000, 18), units(2_000_000, 6), 1, 0);
    repo.upsert_pair(p1);

    let mut p2 = arb_pairs::test_utils::make_pair(1, POOL_B, WETH, USDC, 30);
    p2.apply_reserve_update(units(1_000, 18), units(2_020_000, 6), 1, 0);
    repo.upsert_pair(p2);

    (repo, PoolId::new(1, POOL_A), PoolId::new(1, POOL_B))
}
