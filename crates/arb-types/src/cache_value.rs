use alloy_primitives::U256;

use crate::price::RationalPrice;

/// The small binary blob stored in the hierarchical cache: price plus
/// reserves plus block, as named by the L1 Cache Entry data model.
///
/// `sequence` increments on every write to this value, even though L1 is
/// process-local today — see SPEC_FULL.md §C.2 (versioned slots are the
/// documented upgrade path if L1 is ever made shared-memory).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheValue {
    pub price_numerator:   U256,
    pub price_denominator: U256,
    pub reserve0:          U256,
    pub reserve1:          U256,
    pub block_number:      u64,
    pub sequence:          u64
}

impl CacheValue {
    pub fn new(price: RationalPrice, reserve0: U256, reserve1: U256, block_number: u64) -> Self {
        Self {
            price_numerator: price.numerator,
            price_denominator: price.denominator,
            reserve0,
            reserve1,
            block_number,
            sequence: 0
        }
    }

    pub fn price(&self) -> RationalPrice {
        RationalPrice::new(self.price_numerator, self.price_denominator)
    }

    /// Fixed-width wire encoding used for the L2 transport: five 256-bit
    /// words plus an 8-byte sequence, big-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(32 * 4 + 8 + 8);
        out.extend_from_slice(&self.price_numerator.to_be_bytes::<32>());
        out.extend_from_slice(&self.price_denominator.to_be_bytes::<32>());
        out.extend_from_slice(&self.reserve0.to_be_bytes::<32>());
        out.extend_from_slice(&self.reserve1.to_be_bytes::<32>());
        out.extend_from_slice(&self.block_number.to_be_bytes());
        out.extend_from_slice(&self.sequence.to_be_bytes());
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != 32 * 4 + 8 + 8 {
            return None;
        }
        let mut offset = 0;
        let mut read_u256 = || {
            let word = U256::from_be_slice(&bytes[offset..offset + 32]);
            offset += 32;
            word
        };
        let price_numerator = read_u256();
        let price_denominator = read_u256();
        let reserve0 = read_u256();
        let reserve1 = read_u256();
        let block_number = u64::from_be_bytes(bytes[offset..offset + 8].try_into().ok()?);
        offset += 8;
        let sequence = u64::from_be_bytes(bytes[offset..offset + 8].try_into().ok()?);
        Some(Self { price_numerator, price_denominator, reserve0, reserve1, block_number, sequence })
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::U256;

    use super::*;

    #[test]
    fn roundtrips_through_bytes() {
        let value = CacheValue {
            price_numerator:   U256::from(3u64),
            price_denominator: U256::from(7u64),
            reserve0:          U256::from(1000u64),
            reserve1:          U256::from(2000u64),
            block_number:      42,
            sequence:          5
        };
        let bytes = value.to_bytes();
        assert_eq!(CacheValue::from_bytes(&bytes), Some(value));
    }

    #[test]
    fn rejects_truncated_bytes() {
        assert_eq!(CacheValue::from_bytes(&[0u8; 4]), None);
    }
}
