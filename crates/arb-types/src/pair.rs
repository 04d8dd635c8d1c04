use alloy_primitives::{Address, U256};

use crate::primitive::{ChainId, PoolId, TokenPairKey};

/// A single DEX liquidity pool, owned exclusively by the Pair Repository of
/// one chain partition.
///
/// Created on factory discovery or static config; mutated only by the Event
/// Decoder on reserve-update events; destroyed only on process exit.
#[derive(Debug, Clone)]
pub struct Pair {
    pub chain_id:           ChainId,
    /// Lower-cased on construction ([`Pair::new`]) per the data model.
    pub pool_address:       Address,
    pub dex_id:              u32,
    pub token0:              Address,
    pub token1:              Address,
    /// Swap fee, in basis points (1/10000).
    pub fee_bps:             u32,
    pub reserve0:            U256,
    pub reserve1:            U256,
    pub block_number:        u64,
    pub last_update_millis:  u64,
    /// Precomputed at construction so the hot path never allocates a key.
    chain_pair_key:          TokenPairKey
}

impl Pair {
    pub fn new(
        chain_id: ChainId,
        pool_address: Address,
        dex_id: u32,
        token0: Address,
        token1: Address,
        fee_bps: u32,
        reserve0: U256,
        reserve1: U256,
        block_number: u64,
        now_millis: u64
    ) -> Self {
        let chain_pair_key = TokenPairKey::new(chain_id, token0, token1);
        Self {
            chain_id,
            pool_address,
            dex_id,
            token0,
            token1,
            fee_bps,
            reserve0,
            reserve1,
            block_number,
            last_update_millis: now_millis,
            chain_pair_key
        }
    }

    pub fn pool_id(&self) -> PoolId {
        PoolId::new(self.chain_id, self.pool_address)
    }

    pub fn token_pair_key(&self) -> TokenPairKey {
        self.chain_pair_key
    }

    /// Applies a decoded reserve update in place. Direct field assignment,
    /// no structural copy, so the hot path stays allocation-free.
    ///
    /// Invariant: `last_update_millis` never regresses for this pair, and
    /// reserves are only overwritten with what the decoded event reports
    /// (never silently zeroed as a side effect of this call).
    pub fn apply_reserve_update(&mut self, reserve0: U256, reserve1: U256, block_number: u64, now_millis: u64) {
        self.reserve0 = reserve0;
        self.reserve1 = reserve1;
        self.block_number = block_number;
        self.last_update_millis = self.last_update_millis.max(now_millis);
    }

    pub fn snapshot(&self) -> PairSnapshot {
        PairSnapshot {
            chain_id:          self.chain_id,
            pool_address:      self.pool_address,
            dex_id:            self.dex_id,
            token0:            self.token0,
            token1:            self.token1,
            fee_bps:           self.fee_bps,
            reserve0:          self.reserve0,
            reserve1:          self.reserve1,
            block_number:      self.block_number,
            last_update_millis: self.last_update_millis
        }
    }
}

/// Immutable copy of a [`Pair`] used for detection, so a concurrent reserve
/// update can never race with an in-flight profitability calculation.
///
/// Created on demand by the Pair Repository, discarded after the detection
/// call that requested it.
#[derive(Debug, Clone, Copy)]
pub struct PairSnapshot {
    pub chain_id:           ChainId,
    pub pool_address:       Address,
    pub dex_id:             u32,
    pub token0:             Address,
    pub token1:             Address,
    pub fee_bps:            u32,
    pub reserve0:           U256,
    pub reserve1:           U256,
    pub block_number:       u64,
    pub last_update_millis: u64
}

impl PairSnapshot {
    pub fn pool_id(&self) -> PoolId {
        PoolId::new(self.chain_id, self.pool_address)
    }

    pub fn token_pair_key(&self) -> TokenPairKey {
        TokenPairKey::new(self.chain_id, self.token0, self.token1)
    }

    pub fn staleness_millis(&self, now_millis: u64) -> u64 {
        now_millis.saturating_sub(self.last_update_millis)
    }
}
