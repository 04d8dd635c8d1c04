use std::collections::HashMap;

use alloy_primitives::Address;
use arb_types::{ChainId, Pair, PairSnapshot, PoolId, TokenPairKey};
use parking_lot::RwLock;

/// Owns every [`Pair`] for every chain this process monitors. Lookups by
/// address or by token pair are both O(1): a slab of pairs plus two index
/// maps
///
/// Created once at startup; pairs are inserted as they're discovered and
/// otherwise live for the process lifetime.
pub struct PairRepository {
    inner: RwLock<Inner>
}

struct Inner {
    slots:        Vec<Option<Pair>>,
    free:         Vec<usize>,
    by_address:   HashMap<(ChainId, Address), usize>,
    by_token_pair: HashMap<TokenPairKey, Vec<usize>>
}

impl Default for PairRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl PairRepository {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                slots: Vec::new(),
                free: Vec::new(),
                by_address: HashMap::new(),
                by_token_pair: HashMap::new()
            })
        }
    }

    /// `upsertPair(pair)`. Replaces an existing pair at the same
    /// `(chainId, address)` in place so its slot index (and therefore any
    /// token-pair-key bucket membership) never changes.
    pub fn upsert_pair(&self, pair: Pair) {
        let key = (pair.chain_id, pair.pool_address);
        let mut inner = self.inner.write();

        if let Some(&idx) = inner.by_address.get(&key) {
            inner.slots[idx] = Some(pair);
            return;
        }

        let token_pair_key = pair.token_pair_key();
        let idx = if let Some(free_idx) = inner.free.pop() {
            inner.slots[free_idx] = Some(pair);
            free_idx
        } else {
            inner.slots.push(Some(pair));
            inner.slots.len() - 1
        };
        inner.by_address.insert(key, idx);
        inner.by_token_pair.entry(token_pair_key).or_default().push(idx);
    }

    /// `lookupByAddress(chainId, address) -> Pair?`, O(1).
    pub fn lookup_by_address(&self, chain_id: ChainId, address: Address) -> Option<PairSnapshot> {
        let inner = self.inner.read();
        let idx = *inner.by_address.get(&(chain_id, address))?;
        inner.slots[idx].as_ref().map(Pair::snapshot)
    }

    /// `lookupByTokenPair(chainId, tokenPairKey) -> &[Pair]`, O(1) to a small
    /// slice. An unknown key yields an empty, non-allocating `Vec`.
    pub fn lookup_by_token_pair(&self, key: TokenPairKey) -> Vec<PairSnapshot> {
        let inner = self.inner.read();
        match inner.by_token_pair.get(&key) {
            None => Vec::new(),
            Some(indices) => indices.iter().filter_map(|&idx| inner.slots[idx].as_ref()).map(Pair::snapshot).collect()
        }
    }

    /// `applyReserveUpdate`'s mutation step: direct field assignment on the
    /// owned pair, no structural copy. Returns the post-update snapshot, or
    /// `None` if the pair isn't known (silently dropped).
    pub fn apply_reserve_update(
        &self,
        pool_id: PoolId,
        reserve0: alloy_primitives::U256,
        reserve1: alloy_primitives::U256,
        block_number: u64,
        now_millis: u64
    ) -> Option<PairSnapshot> {
        let mut inner = self.inner.write();
        let idx = *inner.by_address.get(&(pool_id.chain_id, pool_id.address))?;
        let pair = inner.slots[idx].as_mut()?;
        pair.apply_reserve_update(reserve0, reserve1, block_number, now_millis);
        Some(pair.snapshot())
    }

    /// Every pair currently tracked for `chain_id`. Used by the cyclic
    /// (triangular/multi-leg) scans, which need the whole local graph rather
    /// than a single token-pair bucket.
    pub fn all_pairs_for_chain(&self, chain_id: ChainId) -> Vec<PairSnapshot> {
        let inner = self.inner.read();
        inner
            .slots
            .iter()
            .filter_map(|slot| slot.as_ref())
            .filter(|p| p.chain_id == chain_id)
            .map(Pair::snapshot)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_address.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::{address, U256};
    use proptest::prelude::*;

    use super::*;

    fn sample_pair(chain_id: ChainId, pool: Address, dex: u32) -> Pair {
        Pair::new(
            chain_id,
            pool,
            dex,
            address!("0000000000000000000000000000000000000001"),
            address!("0000000000000000000000000000000000000002"),
            30,
            U256::from(1_000u64),
            U256::from(2_000u64),
            10,
            0
        )
    }

    #[test]
    fn lookup_by_address_is_none_until_inserted() {
        let repo = PairRepository::new();
        let pool = address!("0000000000000000000000000000000000000009");
        assert!(repo.lookup_by_address(1, pool).is_none());
        repo.upsert_pair(sample_pair(1, pool, 1));
        assert!(repo.lookup_by_address(1, pool).is_some());
    }

    #[test]
    fn lookup_by_unknown_token_pair_is_empty_without_panicking() {
        let repo = PairRepository::new();
        let key = TokenPairKey::new(
            1,
            address!("0000000000000000000000000000000000000001"),
            address!("0000000000000000000000000000000000000002")
        );
        assert!(repo.lookup_by_token_pair(key).is_empty());
    }

    #[test]
    fn upsert_twice_replaces_rather_than_duplicates() {
        let repo = PairRepository::new();
        let pool = address!("0000000000000000000000000000000000000009");
        repo.upsert_pair(sample_pair(1, pool, 1));
        repo.upsert_pair(sample_pair(1, pool, 1));
        assert_eq!(repo.len(), 1);

        let key = TokenPairKey::new(
            1,
            address!("0000000000000000000000000000000000000001"),
            address!("0000000000000000000000000000000000000002")
        );
        assert_eq!(repo.lookup_by_token_pair(key).len(), 1);
    }

    #[test]
    fn apply_reserve_update_is_dropped_silently_for_unknown_pair() {
        let repo = PairRepository::new();
        let pool_id = PoolId::new(1, address!("00000000000000000000000000000000000099"));
        assert!(repo.apply_reserve_update(pool_id, U256::from(1u64), U256::from(2u64), 11, 5).is_none());
    }

    #[test]
    fn apply_reserve_update_mutates_in_place() {
        let repo = PairRepository::new();
        let pool = address!("0000000000000000000000000000000000000009");
        repo.upsert_pair(sample_pair(1, pool, 1));
        let snap =
            repo.apply_reserve_update(PoolId::new(1, pool), U256::from(5_000u64), U256::from(6_000u64), 11, 99).unwrap();
        assert_eq!(snap.reserve0, U256::from(5_000u64));
        assert_eq!(snap.last_update_millis, 99);
    }

    proptest! {
        #[test]
        fn last_update_millis_is_non_decreasing_in_arrival_order(
            timestamps in prop::collection::vec(0u64..1_000_000, 1..50)
        ) {
            let repo = PairRepository::new();
            let pool = address!("0000000000000000000000000000000000000009");
            repo.upsert_pair(sample_pair(1, pool, 1));
            let pool_id = PoolId::new(1, pool);

            let mut last_seen = 0u64;
            for (i, ts) in timestamps.iter().enumerate() {
                let snap = repo
                    .apply_reserve_update(pool_id, U256::from(i as u64 + 1), U256::from(i as u64 + 2), i as u64, *ts)
                    .unwrap();
                prop_assert!(snap.last_update_millis >= last_seen);
                last_seen = snap.last_update_millis;
            }
        }
    }
}
