use std::fmt;

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};

/// EVM/Solana chain identifier. Solana and other non-EVM chains are mapped to
/// a stable synthetic id by the (out-of-scope) ingestion adapter; the core
/// only ever sees an opaque `u64`.
pub type ChainId = u64;

/// Canonical, order-independent identifier for a traded token pair on one
/// chain.
///
/// `token_a <= token_b` by byte value is the defining invariant: constructing
/// from an arbitrary `(token0, token1)` always normalizes, so two pools for
/// the same economic pair on the same chain produce the same key regardless
/// of which token the DEX calls `token0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenPairKey {
    pub chain_id: ChainId,
    pub token_a:  Address,
    pub token_b:  Address
}

impl TokenPairKey {
    pub fn new(chain_id: ChainId, token0: Address, token1: Address) -> Self {
        let (token_a, token_b) =
            if token0.as_slice() <= token1.as_slice() { (token0, token1) } else { (token1, token0) };
        Self { chain_id, token_a, token_b }
    }
}

impl fmt::Display for TokenPairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}-{}", self.chain_id, self.token_a, self.token_b)
    }
}

/// Identifies one pool uniquely: the chain plus the pool's on-chain address.
///
/// Pool addresses are compared case-insensitively at the byte level (as
/// [`Address`] always does); the "lower-cased" requirement from the pool
/// record is a presentation concern handled when a [`PoolId`] is formatted,
/// not a storage concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolId {
    pub chain_id: ChainId,
    pub address:  Address
}

impl PoolId {
    pub fn new(chain_id: ChainId, address: Address) -> Self {
        Self { chain_id, address }
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:#x}", self.chain_id, self.address)
    }
}

/// Per-chain health classification surfaced by the Connection Supervisor.
///
/// Health endpoints reflect per-chain state but the classification itself
/// is left undefined upstream; derived here from the same inputs used for
/// endpoint rotation scoring (latency, reliability, block freshness).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum HealthStatus {
    Starting,
    Healthy,
    Degraded,
    Unhealthy
}
