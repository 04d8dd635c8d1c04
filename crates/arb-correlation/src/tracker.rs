use std::collections::HashMap;

use arb_types::{CorrelationRecord, PoolId};
use dashmap::DashMap;
use parking_lot::Mutex;
use slab::Slab;

/// Default co-occurrence window: pairs updated within this many millis of
/// each other are considered correlated.
pub const DEFAULT_CO_OCCURRENCE_WINDOW_MILLIS: u64 = 1_000;
pub const DEFAULT_HALF_LIFE_MILLIS: u64 = 5 * 60 * 1_000;
pub const DEFAULT_MAX_TRACKED_PAIRS: usize = 5_000;

#[derive(Debug, Clone, Copy)]
pub struct CorrelationConfig {
    pub co_occurrence_window_millis: u64,
    pub half_life_millis:            u64,
    pub max_tracked_pairs:           usize
}

impl Default for CorrelationConfig {
    fn default() -> Self {
        Self {
            co_occurrence_window_millis: DEFAULT_CO_OCCURRENCE_WINDOW_MILLIS,
            half_life_millis: DEFAULT_HALF_LIFE_MILLIS,
            max_tracked_pairs: DEFAULT_MAX_TRACKED_PAIRS
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct PartnerState {
    co_occurrences: u64,
    last_seen_millis: u64
}

#[derive(Debug, Default)]
struct SourceState {
    updates:  u64,
    partners: HashMap<PoolId, PartnerState>
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationStats {
    pub total_pairs:   usize,
    pub total_updates: u64
}

struct LruNode {
    key:  PoolId,
    prev: Option<usize>,
    next: Option<usize>
}

/// Intrusive doubly-linked recency order over tracked pairs, mirroring
/// `arb-cache`'s `LruCache`: touching an already-tracked key moves it to the
/// front instead of appending a duplicate, so the tail is always the true
/// least-recently-touched pair.
#[derive(Default)]
struct PairLru {
    nodes: Slab<LruNode>,
    index: HashMap<PoolId, usize>,
    head:  Option<usize>,
    tail:  Option<usize>
}

impl PairLru {
    fn len(&self) -> usize {
        self.index.len()
    }

    /// Moves `key` to the front, inserting it if new.
    fn touch(&mut self, key: PoolId) {
        if let Some(&idx) = self.index.get(&key) {
            self.detach(idx);
            self.push_front(idx);
            return;
        }
        let idx = self.nodes.insert(LruNode { key, prev: None, next: None });
        self.index.insert(key, idx);
        self.push_front(idx);
    }

    /// Removes `key` from the ordering without touching it, used when a
    /// tracked pair is evicted by some other path (reset, direct removal).
    fn remove(&mut self, key: &PoolId) {
        let Some(idx) = self.index.remove(key) else { return };
        self.detach(idx);
        self.nodes.remove(idx);
    }

    /// Pops and returns the least-recently-touched key.
    fn pop_lru(&mut self) -> Option<PoolId> {
        let tail = self.tail?;
        let key = self.nodes[tail].key;
        self.detach(tail);
        self.nodes.remove(tail);
        self.index.remove(&key);
        Some(key)
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.head = None;
        self.tail = None;
    }

    fn detach(&mut self, idx: usize) {
        let (prev, next) = (self.nodes[idx].prev, self.nodes[idx].next);
        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev
        }
        self.nodes[idx].prev = None;
        self.nodes[idx].next = None;
    }

    fn push_front(&mut self, idx: usize) {
        self.nodes[idx].prev = None;
        self.nodes[idx].next = self.head;
        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(idx);
        }
        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }
}

/// Tracks which pairs tend to update close together in time, scoring the
/// relationship with exponential recency decay. Keyed by source pair and
/// sharded internally via [`DashMap`], so concurrent updates to different
/// source pairs never contend on the same lock.
pub struct CorrelationTracker {
    config:  CorrelationConfig,
    recent:  DashMap<PoolId, u64>,
    sources: DashMap<PoolId, SourceState>,
    lru:     Mutex<PairLru>
}

impl CorrelationTracker {
    pub fn new(config: CorrelationConfig) -> Self {
        Self { config, recent: DashMap::new(), sources: DashMap::new(), lru: Mutex::new(PairLru::default()) }
    }

    /// `recordPriceUpdate(pair, timestampMillis)`.
    pub fn record_price_update(&self, pair: PoolId, timestamp_millis: u64) {
        let window = self.config.co_occurrence_window_millis;
        let partners: Vec<PoolId> = self
            .recent
            .iter()
            .filter(|entry| *entry.key() != pair && timestamp_millis.saturating_sub(*entry.value()) <= window)
            .map(|entry| *entry.key())
            .collect();

        self.recent.insert(pair, timestamp_millis);
        self.touch_lru(pair);
        self.maybe_evict();

        let mut source = self.sources.entry(pair).or_default();
        source.updates += 1;
        for partner in &partners {
            let entry = source.partners.entry(*partner).or_default();
            entry.co_occurrences += 1;
            entry.last_seen_millis = timestamp_millis;
        }
        drop(source);

        for partner in partners {
            let mut partner_source = self.sources.entry(partner).or_default();
            let entry = partner_source.partners.entry(pair).or_default();
            entry.co_occurrences += 1;
            entry.last_seen_millis = timestamp_millis;
        }
    }

    fn touch_lru(&self, pair: PoolId) {
        self.lru.lock().touch(pair);
    }

    fn maybe_evict(&self) {
        if self.sources.len() <= self.config.max_tracked_pairs {
            return;
        }
        let mut lru = self.lru.lock();
        while self.sources.len() > self.config.max_tracked_pairs {
            let Some(candidate) = lru.pop_lru() else { break };
            self.sources.remove(&candidate);
            self.recent.remove(&candidate);
        }
    }

    /// `getPairsToWarm(sourcePair, now, maxPairs, minScore)`.
    pub fn get_pairs_to_warm(&self, source_pair: PoolId, now_millis: u64, max_pairs: usize, min_score: f64) -> Vec<CorrelationRecord> {
        let Some(source) = self.sources.get(&source_pair) else { return Vec::new() };
        let updates_of_source = source.updates.max(1) as f64;

        let mut records: Vec<CorrelationRecord> = source
            .partners
            .iter()
            .map(|(partner, state)| {
                let age = now_millis.saturating_sub(state.last_seen_millis) as f64;
                let decay = (-age / self.config.half_life_millis.max(1) as f64).exp();
                let score = ((state.co_occurrences as f64 / updates_of_source) * decay).clamp(0.0, 1.0);
                CorrelationRecord {
                    source: source_pair,
                    correlated: *partner,
                    co_occurrences: state.co_occurrences,
                    last_seen_millis: state.last_seen_millis,
                    score
                }
            })
            .filter(|r| r.score >= min_score)
            .collect();

        records.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| b.last_seen_millis.cmp(&a.last_seen_millis))
                .then_with(|| pool_id_key(&a.correlated).cmp(&pool_id_key(&b.correlated)))
        });
        records.truncate(max_pairs);
        records
    }

    /// `getTrackedPairs()`.
    pub fn get_tracked_pairs(&self) -> Vec<PoolId> {
        self.sources.iter().map(|e| *e.key()).collect()
    }

    /// `getStats()`.
    pub fn get_stats(&self) -> CorrelationStats {
        let total_updates = self.sources.iter().map(|e| e.value().updates).sum();
        CorrelationStats { total_pairs: self.sources.len(), total_updates }
    }

    /// `reset()`.
    pub fn reset(&self) {
        self.sources.clear();
        self.recent.clear();
        self.lru.lock().clear();
    }
}

fn pool_id_key(pool: &PoolId) -> (u64, [u8; 20]) {
    (pool.chain_id, pool.address.into_array())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn pool(n: u8) -> PoolId {
        PoolId::new(1, alloy_primitives::Address::repeat_byte(n))
    }

    #[test]
    fn co_occurring_updates_raise_score_for_both_directions() {
        let tracker = CorrelationTracker::new(CorrelationConfig::default());
        tracker.record_price_update(pool(1), 0);
        tracker.record_price_update(pool(2), 100);

        let warm_from_1 = tracker.get_pairs_to_warm(pool(1), 100, 10, 0.0);
        assert_eq!(warm_from_1.len(), 1);
        assert_eq!(warm_from_1[0].correlated, pool(2));

        let warm_from_2 = tracker.get_pairs_to_warm(pool(2), 100, 10, 0.0);
        assert_eq!(warm_from_2.len(), 1);
        assert_eq!(warm_from_2[0].correlated, pool(1));
    }

    #[test]
    fn outside_window_does_not_correlate() {
        let tracker = CorrelationTracker::new(CorrelationConfig { co_occurrence_window_millis: 50, ..Default::default() });
        tracker.record_price_update(pool(1), 0);
        tracker.record_price_update(pool(2), 1_000);

        assert!(tracker.get_pairs_to_warm(pool(1), 1_000, 10, 0.0).is_empty());
    }

    #[test]
    fn score_decays_with_age() {
        let tracker = CorrelationTracker::new(CorrelationConfig { half_life_millis: 1_000, ..Default::default() });
        tracker.record_price_update(pool(1), 0);
        tracker.record_price_update(pool(2), 0);

        let near = tracker.get_pairs_to_warm(pool(1), 0, 10, 0.0)[0].score;
        let far = tracker.get_pairs_to_warm(pool(1), 10_000, 10, 0.0)[0].score;
        assert!(far < near);
    }

    #[test]
    fn reset_clears_all_state() {
        let tracker = CorrelationTracker::new(CorrelationConfig::default());
        tracker.record_price_update(pool(1), 0);
        tracker.record_price_update(pool(2), 0);
        tracker.reset();
        assert_eq!(tracker.get_stats().total_pairs, 0);
        assert!(tracker.get_tracked_pairs().is_empty());
    }

    #[test]
    fn eviction_bounds_tracked_source_count() {
        let tracker = CorrelationTracker::new(CorrelationConfig { max_tracked_pairs: 2, ..Default::default() });
        tracker.record_price_update(pool(1), 0);
        tracker.record_price_update(pool(2), 1);
        tracker.record_price_update(pool(3), 2);
        assert!(tracker.get_stats().total_pairs <= 2);
    }

    #[test]
    fn eviction_spares_a_pair_that_keeps_getting_retouched() {
        let tracker = CorrelationTracker::new(CorrelationConfig { max_tracked_pairs: 2, ..Default::default() });
        tracker.record_price_update(pool(1), 0);
        tracker.record_price_update(pool(2), 1);

        // pool(1) stays hot; pool(2) never gets touched again.
        for t in 2..10u64 {
            tracker.record_price_update(pool(1), t);
        }

        tracker.record_price_update(pool(3), 100);

        let tracked = tracker.get_tracked_pairs();
        assert!(tracked.contains(&pool(1)), "recently re-touched pair must not be evicted");
        assert!(!tracked.contains(&pool(2)), "stale pair should be the one evicted");
    }

    proptest! {
        #[test]
        fn every_returned_pair_is_distinct_and_in_unit_range(
            source_updates in 1u8..20,
            partner_updates in 0u8..20
        ) {
            let tracker = CorrelationTracker::new(CorrelationConfig::default());
            let source = pool(1);
            let partner = pool(2);

            let mut t = 0u64;
            for _ in 0..source_updates {
                tracker.record_price_update(source, t);
                t += 10;
                if t / 10 <= partner_updates as u64 {
                    tracker.record_price_update(partner, t);
                    t += 10;
                }
            }

            for record in tracker.get_pairs_to_warm(source, t, 50, 0.0) {
                prop_assert_ne!(record.source, record.correlated);
                prop_assert!(record.score >= 0.0 && record.score <= 1.0);
            }
        }
    }
}
